use tracing::warn;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::*;

use super::device_error;
use crate::error::FrameResult;
use crate::fence::poll_until_completed;
use crate::fence::GpuFence;

/// `ID3D12Fence` signaled on the direct queue, with an event to park on.
pub struct D3D12Fence {
    device: ID3D12Device,
    queue: ID3D12CommandQueue,
    fence: ID3D12Fence,
    /// `None` when the event could not be created; waits poll instead.
    event: Option<HANDLE>,
}

impl D3D12Fence {
    pub fn new(device: &ID3D12Device, queue: &ID3D12CommandQueue) -> FrameResult<Self> {
        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }?;
        let event = match unsafe { CreateEventA(None, false, false, None) } {
            Ok(event) => Some(event),
            Err(error) => {
                warn!(?error, "failed to create fence event, waits will poll");
                None
            }
        };
        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            fence,
            event,
        })
    }
}

impl GpuFence for D3D12Fence {
    fn completed_value(&self) -> u64 {
        // Reports u64::MAX once the device is removed.
        unsafe { self.fence.GetCompletedValue() }
    }

    fn signal(&mut self, value: u64) -> FrameResult<()> {
        unsafe { self.queue.Signal(&self.fence, value) }.map_err(|e| device_error(&self.device, e))
    }

    fn wait_for_value(&mut self, value: u64) -> FrameResult<()> {
        let Some(event) = self.event else {
            poll_until_completed(&*self, value);
            return Ok(());
        };
        unsafe { self.fence.SetEventOnCompletion(value, event) }
            .map_err(|e| device_error(&self.device, e))?;
        let waited = unsafe { WaitForSingleObjectEx(event, INFINITE, false) };
        if waited != WAIT_OBJECT_0 {
            warn!(?waited, value, "fence event wait failed, polling instead");
            poll_until_completed(&*self, value);
        }
        Ok(())
    }
}

impl Drop for D3D12Fence {
    fn drop(&mut self) {
        let Some(event) = self.event else {
            return;
        };
        if let Err(error) = unsafe { CloseHandle(event) } {
            warn!(?error, "failed to close fence event");
        }
    }
}
