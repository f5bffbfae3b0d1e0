use thiserror::Error;

use crate::mesh::MeshError;
use crate::scene::TextureError;

pub type FrameResult<T, E = FrameError> = core::result::Result<T, E>;

/// Failures surfaced by the frame pipeline.
///
/// Recording precondition failures (a render item pointing at a missing
/// material or geometry) are not errors; the recording stage skips those draws.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Resource, heap or pipeline creation failed. Never retried.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The device was removed or the queue went away. Recovering requires
    /// recreating every GPU resource, so callers must not retry the wait.
    #[error("graphics device lost: {0}")]
    DeviceLost(String),

    /// A graphics API call failed while building a command list.
    #[error("command recording failed: {0}")]
    Recording(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("descriptor index {index} is outside the {heap_size}-entry heap")]
    Layout { index: u32, heap_size: u32 },

    #[error("element {index} is outside an upload buffer of {capacity} elements")]
    BufferOverflow { index: usize, capacity: usize },

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

impl FrameError {
    pub fn is_device_lost(&self) -> bool {
        matches!(self, FrameError::DeviceLost(_))
    }
}
