use tracing::debug;

use crate::backend::GraphicsBackend;
use crate::constants::MaterialConstants;
use crate::constants::ObjectConstants;
use crate::constants::PassConstants;
use crate::error::FrameResult;
use crate::upload_buffer::UploadBuffer;
use crate::upload_buffer::UploadMemory;

pub const FRAME_RESOURCE_COUNT: usize = 3;

/// Everything the CPU writes for one frame.
///
/// Owned by the CPU while `fence_value` is 0 or the GPU has completed it,
/// by the GPU otherwise.
pub struct FrameSlot<A, M> {
    pub fence_value: u64,
    pub command_allocator: A,
    pub object_constants: UploadBuffer<ObjectConstants, M>,
    pub material_constants: UploadBuffer<MaterialConstants, M>,
    pub pass_constants: UploadBuffer<PassConstants, M>,
}

pub type BackendFrameSlot<B> =
    FrameSlot<<B as GraphicsBackend>::Allocator, <B as GraphicsBackend>::Memory>;

impl<A, M: UploadMemory> FrameSlot<A, M> {
    pub fn new<B>(
        backend: &mut B,
        index: usize,
        object_count: usize,
        material_count: usize,
    ) -> FrameResult<Self>
    where
        B: GraphicsBackend<Allocator = A, Memory = M>,
    {
        // Zero-sized committed resources are invalid, keep one element around.
        let object_capacity = object_count.max(1);
        let material_capacity = material_count.max(1);

        let objects = backend.create_upload_memory(
            UploadBuffer::<ObjectConstants, M>::required_bytes(object_capacity),
            &format!("frame {index} object constants"),
        )?;
        let materials = backend.create_upload_memory(
            UploadBuffer::<MaterialConstants, M>::required_bytes(material_capacity),
            &format!("frame {index} material constants"),
        )?;
        let pass = backend.create_upload_memory(
            UploadBuffer::<PassConstants, M>::required_bytes(1),
            &format!("frame {index} pass constants"),
        )?;

        debug!(index, object_count, material_count, "allocated frame slot");
        Ok(Self {
            fence_value: 0,
            command_allocator: backend.create_command_allocator()?,
            object_constants: UploadBuffer::constant(objects, object_capacity),
            material_constants: UploadBuffer::constant(materials, material_capacity),
            pass_constants: UploadBuffer::constant(pass, 1),
        })
    }

    /// True when the CPU may overwrite this slot.
    pub fn is_free(&self, completed_value: u64) -> bool {
        self.fence_value == 0 || completed_value >= self.fence_value
    }
}

/// Fixed ring of `N` slots. Only rotates; waiting is the caller's job.
pub struct FrameRing<S, const N: usize = FRAME_RESOURCE_COUNT> {
    slots: [S; N],
    current: usize,
}

impl<S, const N: usize> FrameRing<S, N> {
    /// Build every slot up front. The first [`advance_slot`](Self::advance_slot)
    /// lands on slot 0. `N` must be at least 1; `FrameRing<_, 0>` fails to compile.
    pub fn try_new<E>(build: impl FnMut(usize) -> Result<S, E>) -> Result<Self, E> {
        const { assert!(N > 0, "a frame ring needs at least one slot") };
        Ok(Self {
            slots: array_init::try_array_init(build)?,
            current: N - 1,
        })
    }

    /// Move to `(current + 1) % N` and return the new slot.
    pub fn advance_slot(&mut self) -> &mut S {
        self.current = (self.current + 1) % N;
        &mut self.slots[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &S {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut S {
        &mut self.slots[self.current]
    }

    pub fn slots(&self) -> &[S; N] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [S; N] {
        &mut self.slots
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot_ring_reuses_slot_zero() {
        let mut ring = FrameRing::<usize, 1>::try_new(Ok::<_, ()>).unwrap();
        assert_eq!(ring.current_index(), 0);
        for _ in 0..3 {
            assert_eq!(*ring.advance_slot(), 0);
        }
        assert!(!ring.is_empty());
    }

    #[test]
    fn index_wraps_after_n_advances() {
        let mut ring = FrameRing::<usize>::try_new(Ok::<_, ()>).unwrap();
        let visited: Vec<usize> = (0..FRAME_RESOURCE_COUNT * 2)
            .map(|_| *ring.advance_slot())
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ring.current_index(), FRAME_RESOURCE_COUNT - 1);
    }

    #[test]
    fn slot_built_failure_propagates() {
        let ring = FrameRing::<usize, 4>::try_new(|i| if i == 2 { Err(i) } else { Ok(i) });
        assert_eq!(ring.err(), Some(2));
    }

    struct NullMemory;

    impl UploadMemory for NullMemory {
        fn write_bytes(&mut self, _offset: usize, _bytes: &[u8]) {}
        fn gpu_address(&self) -> u64 {
            0
        }
        fn byte_len(&self) -> usize {
            0
        }
    }

    fn slot(fence_value: u64) -> FrameSlot<(), NullMemory> {
        FrameSlot {
            fence_value,
            command_allocator: (),
            object_constants: UploadBuffer::constant(NullMemory, 0),
            material_constants: UploadBuffer::constant(NullMemory, 0),
            pass_constants: UploadBuffer::constant(NullMemory, 0),
        }
    }

    #[test]
    fn slot_is_free_once_its_fence_value_completes() {
        assert!(slot(0).is_free(0));
        assert!(!slot(5).is_free(4));
        assert!(slot(5).is_free(5));
        assert!(slot(5).is_free(9));
    }
}
