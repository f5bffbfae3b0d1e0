//! Per-tick CPU writes into the next ring slot.
//!
//! `select slot -> wait for it -> dirty objects -> dirty materials -> pass`.
//! Every write decrements the entity's dirty counter, so after a change each
//! of the N slots receives the new data exactly once. An entity whose slot
//! lies outside the buffers is dropped with a warning and never written.

use bevy_math::Vec3;
use bevy_math::Vec4;
use tracing::trace;
use tracing::warn;

use crate::camera::ViewProvider;
use crate::constants::Light;
use crate::constants::PassConstants;
use crate::constants::PassInputs;
use crate::error::FrameResult;
use crate::fence::FenceSynchronizer;
use crate::fence::GpuFence;
use crate::frame_ring::FrameRing;
use crate::frame_ring::FrameSlot;
use crate::scene::Material;
use crate::scene::RenderItem;
use crate::scene::Scene;
use crate::timer::GameTimer;
use crate::upload_buffer::UploadMemory;

/// Result of one [`FrameUpdateStage::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameUpdate {
    pub frame_index: usize,
    pub objects_written: usize,
    pub materials_written: usize,
    /// Dirty entities whose constant slot is outside the buffers.
    pub skipped: usize,
    /// Submissions the GPU had not finished once the slot was free.
    pub frames_in_flight: u64,
}

#[derive(Clone, Debug)]
pub struct FrameUpdateStage {
    pub ambient_light: Vec4,
    pub sun_strength: Vec3,
}

impl Default for FrameUpdateStage {
    fn default() -> Self {
        Self {
            ambient_light: Vec4::new(0.25, 0.25, 0.35, 1.0),
            sun_strength: Vec3::new(0.0, 0.9, 0.9),
        }
    }
}

impl FrameUpdateStage {
    pub fn pass_inputs(
        &self,
        camera: &impl ViewProvider,
        timer: &GameTimer,
        render_target_size: (u32, u32),
    ) -> PassInputs {
        PassInputs {
            view: camera.view(),
            projection: camera.projection(),
            eye_position: camera.eye_position(),
            render_target_size,
            near_z: camera.near_z(),
            far_z: camera.far_z(),
            total_time: timer.total_time(),
            delta_time: timer.delta_time(),
            ambient_light: self.ambient_light,
            lights: vec![Light::directional(camera.sun_direction(), self.sun_strength)],
        }
    }

    pub fn run<A, M, F, const N: usize>(
        &self,
        ring: &mut FrameRing<FrameSlot<A, M>, N>,
        fence: &mut FenceSynchronizer<F>,
        scene: &mut Scene,
        pass: &PassConstants,
    ) -> FrameResult<FrameUpdate>
    where
        M: UploadMemory,
        F: GpuFence,
    {
        ring.advance_slot();
        let frame_index = ring.current_index();
        let slot = ring.current_mut();

        fence.wait_until(slot.fence_value)?;
        debug_assert!(slot.is_free(fence.completed_value()));
        let frames_in_flight = fence
            .current_value()
            .saturating_sub(fence.completed_value());

        let objects = write_dirty_objects(slot, scene.items_mut())?;
        let materials = write_dirty_materials(slot, scene.materials_mut())?;
        slot.pass_constants.copy_data(0, pass)?;

        let objects_written = objects.written;
        let materials_written = materials.written;
        let skipped = objects.skipped + materials.skipped;
        trace!(
            frame_index,
            objects_written,
            materials_written,
            skipped,
            frames_in_flight,
            "updated frame slot"
        );
        Ok(FrameUpdate {
            frame_index,
            objects_written,
            materials_written,
            skipped,
            frames_in_flight,
        })
    }
}

#[derive(Default)]
struct Writes {
    written: usize,
    skipped: usize,
}

fn write_dirty_objects<A, M: UploadMemory>(
    slot: &mut FrameSlot<A, M>,
    items: &mut [RenderItem],
) -> FrameResult<Writes> {
    let capacity = slot.object_constants.capacity();
    let mut writes = Writes::default();
    for item in items.iter_mut().filter(|item| item.num_frames_dirty > 0) {
        let index = item.obj_cb_index as usize;
        if index >= capacity {
            warn!(item = %item.name, index, capacity, "object slot out of range, dropping its update");
            item.num_frames_dirty = 0;
            writes.skipped += 1;
            continue;
        }
        slot.object_constants.copy_data(index, &item.to_constants())?;
        item.num_frames_dirty -= 1;
        writes.written += 1;
    }
    Ok(writes)
}

fn write_dirty_materials<A, M: UploadMemory>(
    slot: &mut FrameSlot<A, M>,
    materials: &mut [Material],
) -> FrameResult<Writes> {
    let capacity = slot.material_constants.capacity();
    let mut writes = Writes::default();
    for material in materials.iter_mut().filter(|material| material.num_frames_dirty > 0) {
        let index = material.mat_cb_index as usize;
        if index >= capacity {
            warn!(material = %material.name, index, capacity, "material slot out of range, dropping its update");
            material.num_frames_dirty = 0;
            writes.skipped += 1;
            continue;
        }
        slot.material_constants.copy_data(index, &material.to_constants())?;
        material.num_frames_dirty -= 1;
        writes.written += 1;
    }
    Ok(writes)
}
