//! Direct3D 12 implementation of [`GraphicsBackend`](crate::GraphicsBackend).

pub mod backend;
pub mod compile_shader;
pub mod create_device;
pub mod create_pipeline_state;
pub mod create_root_signature;
pub mod fence;
pub mod info_queue;
pub mod transition_barrier;
pub mod upload;

pub use backend::D3D12Backend;
pub use backend::D3D12Config;

pub const SWAP_CHAIN_BUFFER_COUNT: u32 = crate::FRAME_RESOURCE_COUNT as u32;

use windows::Win32::Graphics::Direct3D12::ID3D12Device;
use windows::Win32::Graphics::Dxgi::DXGI_ERROR_DEVICE_HUNG;
use windows::Win32::Graphics::Dxgi::DXGI_ERROR_DEVICE_REMOVED;
use windows::Win32::Graphics::Dxgi::DXGI_ERROR_DEVICE_RESET;

use crate::error::FrameError;

/// Turn removal-class HRESULTs into [`FrameError::DeviceLost`], attaching the
/// device's removal reason.
pub(crate) fn device_error(device: &ID3D12Device, error: windows::core::Error) -> FrameError {
    let code = error.code();
    if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET || code == DXGI_ERROR_DEVICE_HUNG {
        let reason = unsafe { device.GetDeviceRemovedReason() };
        return FrameError::DeviceLost(format!("{error} (removal reason: {reason:?})"));
    }
    FrameError::Windows(error)
}
