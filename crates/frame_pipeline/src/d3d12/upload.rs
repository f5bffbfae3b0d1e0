use windows::core::HSTRING;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::error::FrameError;
use crate::error::FrameResult;
use crate::upload_buffer::UploadMemory;

pub fn buffer_desc(byte_len: u64) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: byte_len,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: D3D12_RESOURCE_FLAG_NONE,
    }
}

pub fn create_committed(
    device: &ID3D12Device,
    heap_type: D3D12_HEAP_TYPE,
    desc: &D3D12_RESOURCE_DESC,
    state: D3D12_RESOURCE_STATES,
    clear_value: Option<&D3D12_CLEAR_VALUE>,
    label: &str,
) -> FrameResult<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        ..Default::default()
    };
    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &heap_props,
            D3D12_HEAP_FLAG_NONE,
            desc,
            state,
            clear_value.map(|value| value as *const _),
            &mut resource,
        )?
    };
    let resource = resource.ok_or_else(|| FrameError::Setup(format!("{label}: no resource returned")))?;
    unsafe { resource.SetName(&HSTRING::from(label)) }.ok();
    Ok(resource)
}

/// Upload-heap buffer that stays mapped for its whole life.
pub struct D3D12UploadMemory {
    resource: ID3D12Resource,
    mapped: *mut u8,
    byte_len: usize,
}

impl D3D12UploadMemory {
    pub fn new(device: &ID3D12Device, byte_len: usize, label: &str) -> FrameResult<Self> {
        let resource = create_committed(
            device,
            D3D12_HEAP_TYPE_UPLOAD,
            &buffer_desc(byte_len as u64),
            D3D12_RESOURCE_STATE_GENERIC_READ,
            None,
            label,
        )?;
        let mut mapped = std::ptr::null_mut();
        // The CPU never reads back.
        let read_range = D3D12_RANGE { Begin: 0, End: 0 };
        unsafe { resource.Map(0, Some(&read_range), Some(&mut mapped)) }?;
        Ok(Self {
            resource,
            mapped: mapped as *mut u8,
            byte_len,
        })
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl UploadMemory for D3D12UploadMemory {
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.byte_len, "write past the end of upload memory");
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.add(offset), bytes.len()) };
    }

    fn gpu_address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
    }

    fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl Drop for D3D12UploadMemory {
    fn drop(&mut self) {
        unsafe { self.resource.Unmap(0, None) };
    }
}
