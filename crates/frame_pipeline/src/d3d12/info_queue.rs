use tracing::debug;
use tracing::error;
use tracing::warn;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;

/// Debug layer messages, only present when the debug layer is enabled.
pub fn info_queue(device: &ID3D12Device) -> Option<ID3D12InfoQueue> {
    if cfg!(debug_assertions) {
        device.cast().ok()
    } else {
        None
    }
}

/// Forward stored debug layer messages to `tracing` and clear them.
pub fn drain_messages(queue: &ID3D12InfoQueue) {
    let count = unsafe { queue.GetNumStoredMessages() };
    for index in 0..count {
        let mut byte_len = 0usize;
        if unsafe { queue.GetMessage(index, None, &mut byte_len) }.is_err() || byte_len == 0 {
            continue;
        }
        // u64 storage keeps the message header's pointers aligned.
        let mut storage = vec![0u64; byte_len.div_ceil(8)];
        let message = storage.as_mut_ptr() as *mut D3D12_MESSAGE;
        if unsafe { queue.GetMessage(index, Some(message), &mut byte_len) }.is_err() {
            continue;
        }
        let message = unsafe { &*message };
        let text = unsafe { message.pDescription.to_string() }.unwrap_or_default();
        match message.Severity {
            D3D12_MESSAGE_SEVERITY_CORRUPTION | D3D12_MESSAGE_SEVERITY_ERROR => {
                error!(id = message.ID.0, "{text}")
            }
            D3D12_MESSAGE_SEVERITY_WARNING => warn!(id = message.ID.0, "{text}"),
            _ => debug!(id = message.ID.0, "{text}"),
        }
    }
    unsafe { queue.ClearStoredMessages() };
}
