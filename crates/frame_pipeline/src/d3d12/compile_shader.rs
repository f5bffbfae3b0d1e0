use windows::core::*;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;

use crate::error::FrameError;
use crate::error::FrameResult;

pub const DEFAULT_SHADER: &str = include_str!("default.hlsl");

pub fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

/// Compile `source` for `entry_point`. `defines` is a list of `(name, value)`
/// pairs, both nul-terminated.
pub fn compile_shader(
    source: &str,
    defines: &[(&'static [u8], &'static [u8])],
    entry_point: PCSTR,
    target: PCSTR,
) -> FrameResult<ID3DBlob> {
    let compile_flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    let mut macros: Vec<D3D_SHADER_MACRO> = defines
        .iter()
        .map(|(name, value)| D3D_SHADER_MACRO {
            Name: PCSTR(name.as_ptr()),
            Definition: PCSTR(value.as_ptr()),
        })
        .collect();
    macros.push(D3D_SHADER_MACRO::default());

    let mut shader_blob = None;
    let mut error_blob = None;
    let result = unsafe {
        D3DCompile(
            source.as_ptr() as *const _,
            source.len(),
            s!("default.hlsl"),
            Some(macros.as_ptr()),
            None,
            entry_point,
            target,
            compile_flags,
            0,
            &mut shader_blob,
            Some(&mut error_blob),
        )
    };

    if let Err(e) = result {
        let entry_point = unsafe { String::from_utf8_lossy(entry_point.as_bytes()) };
        let message = error_blob
            .as_ref()
            .map(|error| String::from_utf8_lossy(blob_bytes(error)).into_owned())
            .unwrap_or_else(|| e.to_string());
        return Err(FrameError::Setup(format!("compiling {entry_point}: {message}")));
    }
    shader_blob.ok_or_else(|| FrameError::Setup("D3DCompile returned no bytecode".to_owned()))
}
