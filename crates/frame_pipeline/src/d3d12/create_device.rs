use tracing::info;
use tracing::warn;
use windows::core::*;
use windows::Win32::Foundation::E_FAIL;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::error::FrameError;
use crate::error::FrameResult;

pub fn create_device(use_warp_device: bool) -> FrameResult<(IDXGIFactory4, ID3D12Device)> {
    let mut debug_flags = DXGI_CREATE_FACTORY_FLAGS(0);
    if cfg!(debug_assertions) {
        unsafe {
            let mut debug: Option<ID3D12Debug> = None;
            if let Some(debug) = D3D12GetDebugInterface(&mut debug).ok().and(debug) {
                debug.EnableDebugLayer();
                debug_flags |= DXGI_CREATE_FACTORY_DEBUG;
                info!("D3D12 debug layer enabled");
            } else {
                warn!("D3D12 debug layer unavailable");
            }
        }
    }

    let dxgi_factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(debug_flags) }?;

    let adapter = if use_warp_device {
        info!("Using WARP adapter");
        unsafe { dxgi_factory.EnumWarpAdapter()? }
    } else {
        get_hardware_adapter(&dxgi_factory)?
    };

    let mut device: Option<ID3D12Device> = None;
    unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }?;
    let device = device.ok_or_else(|| FrameError::Setup("D3D12CreateDevice returned no device".to_owned()))?;
    Ok((dxgi_factory, device))
}

/// First non-software adapter that supports feature level 11.0.
fn get_hardware_adapter(factory: &IDXGIFactory4) -> Result<IDXGIAdapter1> {
    for i in 0.. {
        let adapter = match unsafe { factory.EnumAdapters1(i) } {
            Ok(adapter) => adapter,
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
            Err(e) => return Err(e),
        };
        let desc = unsafe { adapter.GetDesc1()? };
        let adapter_name = String::from_utf16_lossy(&desc.Description);

        if (DXGI_ADAPTER_FLAG(desc.Flags as i32) & DXGI_ADAPTER_FLAG_SOFTWARE)
            != DXGI_ADAPTER_FLAG_NONE
        {
            info!(adapter = adapter_name.trim_end_matches('\0'), "skipping software adapter");
            continue;
        }

        if unsafe {
            D3D12CreateDevice(
                &adapter,
                D3D_FEATURE_LEVEL_11_0,
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
        }
        .is_ok()
        {
            info!(adapter = adapter_name.trim_end_matches('\0'), "using hardware adapter");
            return Ok(adapter);
        }
    }
    Err(Error::new(E_FAIL, "No suitable hardware adapter found."))
}
