use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;

use super::compile_shader::blob_bytes;
use crate::backend::RootParameter;
use crate::error::FrameError;
use crate::error::FrameResult;

fn table_range(range_type: D3D12_DESCRIPTOR_RANGE_TYPE, register: u32) -> D3D12_DESCRIPTOR_RANGE {
    D3D12_DESCRIPTOR_RANGE {
        RangeType: range_type,
        NumDescriptors: 1,
        BaseShaderRegister: register,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    }
}

fn static_sampler(
    register: u32,
    filter: D3D12_FILTER,
    address: D3D12_TEXTURE_ADDRESS_MODE,
    max_anisotropy: u32,
) -> D3D12_STATIC_SAMPLER_DESC {
    D3D12_STATIC_SAMPLER_DESC {
        Filter: filter,
        AddressU: address,
        AddressV: address,
        AddressW: address,
        MipLODBias: 0.0,
        MaxAnisotropy: max_anisotropy,
        ComparisonFunc: D3D12_COMPARISON_FUNC_LESS_EQUAL,
        BorderColor: D3D12_STATIC_BORDER_COLOR_OPAQUE_WHITE,
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
        ShaderRegister: register,
        RegisterSpace: 0,
        ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
    }
}

/// `s0`..`s5`: point, linear and anisotropic, each in wrap and clamp.
fn static_samplers() -> [D3D12_STATIC_SAMPLER_DESC; 6] {
    [
        static_sampler(0, D3D12_FILTER_MIN_MAG_MIP_POINT, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 16),
        static_sampler(1, D3D12_FILTER_MIN_MAG_MIP_POINT, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 16),
        static_sampler(2, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 16),
        static_sampler(3, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 16),
        static_sampler(4, D3D12_FILTER_ANISOTROPIC, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 8),
        static_sampler(5, D3D12_FILTER_ANISOTROPIC, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 8),
    ]
}

/// One single-descriptor table per [`RootParameter`], in its discriminant order.
pub fn create_root_signature(device: &ID3D12Device) -> FrameResult<ID3D12RootSignature> {
    let ranges = [
        (RootParameter::ObjectCbv, table_range(D3D12_DESCRIPTOR_RANGE_TYPE_CBV, 0)),
        (RootParameter::PassCbv, table_range(D3D12_DESCRIPTOR_RANGE_TYPE_CBV, 1)),
        (RootParameter::MaterialCbv, table_range(D3D12_DESCRIPTOR_RANGE_TYPE_CBV, 2)),
        (RootParameter::DiffuseSrv, table_range(D3D12_DESCRIPTOR_RANGE_TYPE_SRV, 0)),
    ];
    debug_assert!(ranges
        .iter()
        .enumerate()
        .all(|(slot, (parameter, _))| *parameter as usize == slot));

    let parameters: Vec<D3D12_ROOT_PARAMETER> = ranges
        .iter()
        .map(|(_, range)| D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                    NumDescriptorRanges: 1,
                    pDescriptorRanges: range,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
        })
        .collect();
    let samplers = static_samplers();

    let desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        NumStaticSamplers: samplers.len() as u32,
        pStaticSamplers: samplers.as_ptr(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    let mut signature_blob = None;
    let mut error_blob = None;
    let serialize_result = unsafe {
        D3D12SerializeRootSignature(
            &desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut signature_blob,
            Some(&mut error_blob),
        )
    };
    if let Err(e) = serialize_result {
        let message = error_blob
            .as_ref()
            .map(|error| String::from_utf8_lossy(blob_bytes(error)).into_owned())
            .unwrap_or_else(|| e.to_string());
        return Err(FrameError::Setup(format!("root signature serialization: {message}")));
    }
    let signature_blob = signature_blob
        .ok_or_else(|| FrameError::Setup("root signature serialization returned no blob".to_owned()))?;

    Ok(unsafe { device.CreateRootSignature(0, blob_bytes(&signature_blob)) }?)
}
