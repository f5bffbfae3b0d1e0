//! Flat layout of the single shader-visible CBV/SRV heap.
//!
//! ```text
//! | frame 0: objects | frame 0: materials | frame 1: objects | ... | pass x N | textures |
//! ```
//!
//! Every frame block is `object_count + material_count` long. The pass views
//! follow all frame blocks, one per frame, and the texture views come last.

use std::ops::Range;

use crate::error::FrameError;
use crate::error::FrameResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorLayout {
    object_count: u32,
    material_count: u32,
    frame_count: u32,
    texture_count: u32,
}

/// Heap indices a single draw binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawBindings {
    pub object_cbv: u32,
    pub material_cbv: u32,
    pub pass_cbv: u32,
    pub texture_srv: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    ObjectCbv { frame: u32 },
    MaterialCbv { frame: u32 },
    PassCbv,
    TextureSrv,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorRegion {
    pub kind: RegionKind,
    pub range: Range<u32>,
}

impl DescriptorLayout {
    /// The counts must keep [`heap_size`](Self::heap_size) within `u32`; scene
    /// sizes go through [`try_new`](Self::try_new).
    pub fn new(object_count: u32, material_count: u32, frame_count: u32, texture_count: u32) -> Self {
        Self {
            object_count,
            material_count,
            frame_count,
            texture_count,
        }
    }

    /// Plan a heap for the given counts, failing if any index would not fit in `u32`.
    pub fn try_new(
        object_count: usize,
        material_count: usize,
        frame_count: usize,
        texture_count: usize,
    ) -> FrameResult<Self> {
        let too_large = || {
            FrameError::Setup(format!(
                "{object_count} objects, {material_count} materials, {frame_count} frames and \
                 {texture_count} textures do not fit a descriptor heap"
            ))
        };
        let count = |n: usize| u32::try_from(n).map_err(|_| too_large());
        let layout = Self::new(
            count(object_count)?,
            count(material_count)?,
            count(frame_count)?,
            count(texture_count)?,
        );
        layout
            .object_count
            .checked_add(layout.material_count)
            .and_then(|stride| stride.checked_add(1))
            .and_then(|block| block.checked_mul(layout.frame_count))
            .and_then(|cbvs| cbvs.checked_add(layout.texture_count))
            .ok_or_else(|| too_large())?;
        Ok(layout)
    }

    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    pub fn material_count(&self) -> u32 {
        self.material_count
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    /// Length of one frame's object + material block.
    pub fn frame_stride(&self) -> u32 {
        self.object_count + self.material_count
    }

    pub fn object_cbv_base(&self) -> u32 {
        0
    }

    /// Offset of the material views inside each frame block.
    pub fn material_cbv_offset(&self) -> u32 {
        self.object_count
    }

    pub fn pass_cbv_offset(&self) -> u32 {
        self.frame_stride() * self.frame_count
    }

    pub fn texture_srv_offset(&self) -> u32 {
        (self.frame_stride() + 1) * self.frame_count
    }

    pub fn heap_size(&self) -> u32 {
        (self.frame_stride() + 1) * self.frame_count + self.texture_count
    }

    pub fn object_cbv_index(&self, frame: u32, obj_cb_index: u32) -> u32 {
        debug_assert!(frame < self.frame_count && obj_cb_index < self.object_count);
        frame * self.frame_stride() + self.object_cbv_base() + obj_cb_index
    }

    pub fn material_cbv_index(&self, frame: u32, mat_cb_index: u32) -> u32 {
        debug_assert!(frame < self.frame_count && mat_cb_index < self.material_count);
        frame * self.frame_stride() + self.material_cbv_offset() + mat_cb_index
    }

    pub fn pass_cbv_index(&self, frame: u32) -> u32 {
        debug_assert!(frame < self.frame_count);
        self.pass_cbv_offset() + frame
    }

    pub fn texture_srv_index(&self, diffuse_srv_index: u32) -> u32 {
        debug_assert!(diffuse_srv_index < self.texture_count);
        self.texture_srv_offset() + diffuse_srv_index
    }

    pub fn resolve_draw(
        &self,
        frame: u32,
        obj_cb_index: u32,
        mat_cb_index: u32,
        diffuse_srv_index: u32,
    ) -> DrawBindings {
        DrawBindings {
            object_cbv: self.object_cbv_index(frame, obj_cb_index),
            material_cbv: self.material_cbv_index(frame, mat_cb_index),
            pass_cbv: self.pass_cbv_index(frame),
            texture_srv: self.texture_srv_index(diffuse_srv_index),
        }
    }

    pub fn checked(&self, index: u32) -> FrameResult<u32> {
        if index < self.heap_size() {
            Ok(index)
        } else {
            Err(FrameError::Layout {
                index,
                heap_size: self.heap_size(),
            })
        }
    }

    /// Every region of the heap in index order. Empty regions are included.
    pub fn regions(&self) -> Vec<DescriptorRegion> {
        let mut regions = Vec::with_capacity(self.frame_count as usize * 2 + 2);
        for frame in 0..self.frame_count {
            let start = frame * self.frame_stride();
            let materials = start + self.material_cbv_offset();
            regions.push(DescriptorRegion {
                kind: RegionKind::ObjectCbv { frame },
                range: start..materials,
            });
            regions.push(DescriptorRegion {
                kind: RegionKind::MaterialCbv { frame },
                range: materials..materials + self.material_count,
            });
        }
        regions.push(DescriptorRegion {
            kind: RegionKind::PassCbv,
            range: self.pass_cbv_offset()..self.texture_srv_offset(),
        });
        regions.push(DescriptorRegion {
            kind: RegionKind::TextureSrv,
            range: self.texture_srv_offset()..self.heap_size(),
        });
        regions
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CpuDescriptorHandle(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GpuDescriptorHandle(pub u64);

/// Start handles of a created heap plus the increment size, which is queried
/// from the device once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorHeapInfo {
    pub cpu_start: CpuDescriptorHandle,
    pub gpu_start: GpuDescriptorHandle,
    pub increment_size: u32,
    pub capacity: u32,
}

impl DescriptorHeapInfo {
    pub fn cpu_handle(&self, index: u32) -> CpuDescriptorHandle {
        debug_assert!(index < self.capacity);
        CpuDescriptorHandle(self.cpu_start.0 + index as usize * self.increment_size as usize)
    }

    pub fn gpu_handle(&self, index: u32) -> GpuDescriptorHandle {
        debug_assert!(index < self.capacity);
        GpuDescriptorHandle(self.gpu_start.0 + index as u64 * self.increment_size as u64)
    }

    /// Inverse of [`gpu_handle`](Self::gpu_handle), `None` for handles outside the heap.
    pub fn gpu_index(&self, handle: GpuDescriptorHandle) -> Option<u32> {
        let offset = handle.0.checked_sub(self.gpu_start.0)?;
        let increment = self.increment_size as u64;
        if increment == 0 || offset % increment != 0 {
            return None;
        }
        let index = u32::try_from(offset / increment).ok()?;
        (index < self.capacity).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_of_everything_over_three_frames() {
        let layout = DescriptorLayout::new(4, 4, 3, 4);
        assert_eq!(layout.heap_size(), 31);
        assert_eq!(layout.pass_cbv_offset(), 24);
        assert_eq!(layout.texture_srv_offset(), 27);
        assert_eq!(layout.material_cbv_offset(), 4);
    }

    #[test]
    fn oversized_counts_are_a_setup_error() {
        let layout = DescriptorLayout::try_new(7, 4, 3, 4).unwrap();
        assert_eq!(layout, DescriptorLayout::new(7, 4, 3, 4));

        for (objects, materials, frames, textures) in [
            (u32::MAX as usize, 1, 3, 0),
            (1 << 31, 0, 3, 0),
            (0, 0, 3, u32::MAX as usize),
        ] {
            assert!(
                matches!(
                    DescriptorLayout::try_new(objects, materials, frames, textures),
                    Err(FrameError::Setup(_))
                ),
                "{objects} {materials} {frames} {textures}"
            );
        }
        #[cfg(target_pointer_width = "64")]
        assert!(DescriptorLayout::try_new(u32::MAX as usize + 1, 0, 3, 0).is_err());
    }

    #[test]
    fn regions_are_disjoint_and_fill_the_heap() {
        for frames in 0..=4 {
            for objects in 0..=5 {
                for materials in 0..=5 {
                    for textures in 0..=3 {
                        let layout = DescriptorLayout::new(objects, materials, frames, textures);
                        let mut owner = vec![None; layout.heap_size() as usize];
                        let mut total = 0;
                        for region in layout.regions() {
                            total += region.range.len() as u32;
                            for index in region.range.clone() {
                                assert_eq!(
                                    owner[index as usize].replace(region.kind),
                                    None,
                                    "{layout:?}: index {index} claimed twice"
                                );
                            }
                        }
                        assert_eq!(total, layout.heap_size(), "{layout:?}");
                        assert!(owner.iter().all(Option::is_some), "{layout:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn resolved_indices_fall_in_their_regions() {
        let layout = DescriptorLayout::new(7, 3, 3, 5);
        let regions = layout.regions();
        let region_of = |index: u32| {
            regions
                .iter()
                .find(|region| region.range.contains(&index))
                .map(|region| region.kind)
        };
        for frame in 0..3 {
            for object in 0..7 {
                let index = layout.object_cbv_index(frame, object);
                assert_eq!(region_of(index), Some(RegionKind::ObjectCbv { frame }));
            }
            for material in 0..3 {
                let index = layout.material_cbv_index(frame, material);
                assert_eq!(region_of(index), Some(RegionKind::MaterialCbv { frame }));
            }
            assert_eq!(region_of(layout.pass_cbv_index(frame)), Some(RegionKind::PassCbv));
        }
        for texture in 0..5 {
            assert_eq!(
                region_of(layout.texture_srv_index(texture)),
                Some(RegionKind::TextureSrv)
            );
        }
    }

    #[test]
    fn material_index_uses_the_frame_block() {
        let layout = DescriptorLayout::new(4, 4, 3, 4);
        let bindings = layout.resolve_draw(2, 1, 3, 2);
        assert_eq!(bindings.object_cbv, 2 * 8 + 1);
        assert_eq!(bindings.material_cbv, 2 * 8 + 4 + 3);
        assert_eq!(bindings.pass_cbv, 26);
        assert_eq!(bindings.texture_srv, 29);
    }

    #[test]
    fn checked_rejects_indices_past_the_heap() {
        let layout = DescriptorLayout::new(1, 1, 3, 1);
        assert_eq!(layout.checked(9).unwrap(), 9);
        assert!(matches!(
            layout.checked(10),
            Err(FrameError::Layout {
                index: 10,
                heap_size: 10
            })
        ));
    }

    #[test]
    fn handles_step_by_the_cached_increment() {
        let heap = DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle(0x1000),
            gpu_start: GpuDescriptorHandle(0x9000_0000),
            increment_size: 32,
            capacity: 31,
        };
        assert_eq!(heap.cpu_handle(3), CpuDescriptorHandle(0x1000 + 96));
        assert_eq!(heap.gpu_handle(30), GpuDescriptorHandle(0x9000_0000 + 960));
        assert_eq!(heap.gpu_index(heap.gpu_handle(17)), Some(17));
        assert_eq!(heap.gpu_index(GpuDescriptorHandle(0x9000_0000 + 33)), None);
        assert_eq!(heap.gpu_index(GpuDescriptorHandle(0x9000_0000 + 31 * 32)), None);
    }
}
