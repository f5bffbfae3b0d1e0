use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::FrameError;
use crate::error::FrameResult;

/// Constant buffer views must start on 256-byte boundaries.
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// Round `byte_size` up to the next multiple of [`CONSTANT_BUFFER_ALIGNMENT`].
pub fn constant_buffer_byte_size(byte_size: usize) -> usize {
    (byte_size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// CPU-writable, GPU-readable memory.
pub trait UploadMemory {
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]);
    fn gpu_address(&self) -> u64;
    fn byte_len(&self) -> usize;
}

/// Fixed-capacity array of `T` records in upload memory, one per aligned
/// element so each record can back its own constant buffer view.
pub struct UploadBuffer<T, M> {
    memory: M,
    element_stride: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod, M: UploadMemory> UploadBuffer<T, M> {
    /// Bytes of upload memory needed for `capacity` constant records.
    pub fn required_bytes(capacity: usize) -> usize {
        constant_buffer_byte_size(std::mem::size_of::<T>()) * capacity
    }

    pub fn constant(memory: M, capacity: usize) -> Self {
        let element_stride = constant_buffer_byte_size(std::mem::size_of::<T>());
        debug_assert!(memory.byte_len() >= element_stride * capacity);
        Self {
            memory,
            element_stride,
            capacity,
            _marker: PhantomData,
        }
    }

    pub fn copy_data(&mut self, index: usize, value: &T) -> FrameResult<()> {
        if index >= self.capacity {
            return Err(FrameError::BufferOverflow {
                index,
                capacity: self.capacity,
            });
        }
        self.memory
            .write_bytes(index * self.element_stride, bytemuck::bytes_of(value));
        Ok(())
    }

    pub fn element_gpu_address(&self, index: usize) -> u64 {
        self.memory.gpu_address() + (index * self.element_stride) as u64
    }

    pub fn element_stride(&self) -> usize {
        self.element_stride
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}
