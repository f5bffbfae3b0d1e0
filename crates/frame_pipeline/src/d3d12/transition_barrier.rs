use std::mem::ManuallyDrop;

use windows::Win32::Graphics::Direct3D12::*;

use crate::backend::ResourceState;

pub fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
    }
}

/// The barrier borrows `resource` without adding a reference; it must not
/// outlive it.
pub fn transition_barrier(
    resource: &ID3D12Resource,
    state_before: D3D12_RESOURCE_STATES,
    state_after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                StateBefore: state_before,
                StateAfter: state_after,
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
            }),
        },
    }
}
