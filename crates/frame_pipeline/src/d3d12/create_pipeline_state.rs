use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::compile_shader::compile_shader;
use super::compile_shader::DEFAULT_SHADER;
use crate::backend::PipelineKind;
use crate::error::FrameError;
use crate::error::FrameResult;

pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
pub const DEPTH_STENCIL_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

fn opaque_blend() -> D3D12_RENDER_TARGET_BLEND_DESC {
    D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: FALSE,
        LogicOpEnable: FALSE,
        SrcBlend: D3D12_BLEND_ONE,
        DestBlend: D3D12_BLEND_ZERO,
        BlendOp: D3D12_BLEND_OP_ADD,
        SrcBlendAlpha: D3D12_BLEND_ONE,
        DestBlendAlpha: D3D12_BLEND_ZERO,
        BlendOpAlpha: D3D12_BLEND_OP_ADD,
        LogicOp: D3D12_LOGIC_OP_NOOP,
        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
    }
}

fn transparent_blend() -> D3D12_RENDER_TARGET_BLEND_DESC {
    D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: TRUE,
        SrcBlend: D3D12_BLEND_SRC_ALPHA,
        DestBlend: D3D12_BLEND_INV_SRC_ALPHA,
        ..opaque_blend()
    }
}

/// Opaque, alpha-tested and transparent pipelines over the same root signature.
pub fn create_pipeline_states(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
) -> FrameResult<[ID3D12PipelineState; 3]> {
    let vertex_shader = compile_shader(DEFAULT_SHADER, &[], s!("VS"), s!("vs_5_0"))?;
    let pixel_shader = compile_shader(DEFAULT_SHADER, &[], s!("PS"), s!("ps_5_0"))?;
    let alpha_tested_pixel_shader =
        compile_shader(DEFAULT_SHADER, &[(b"ALPHA_TEST\0", b"1\0")], s!("PS"), s!("ps_5_0"))?;

    let input_element_descs: [D3D12_INPUT_ELEMENT_DESC; 3] = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("POSITION"),
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            ..Default::default()
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("NORMAL"),
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            AlignedByteOffset: 12,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            ..Default::default()
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("TEXCOORD"),
            Format: DXGI_FORMAT_R32G32_FLOAT,
            AlignedByteOffset: 24,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            ..Default::default()
        },
    ];

    let input_layout = D3D12_INPUT_LAYOUT_DESC {
        pInputElementDescs: input_element_descs.as_ptr(),
        NumElements: input_element_descs.len() as u32,
    };

    let opaque = PipelineInputs {
        root_signature,
        input_layout,
        vertex_shader: &vertex_shader,
        pixel_shader: &pixel_shader,
    };

    let mut pipelines = Vec::with_capacity(PipelineKind::ALL.len());
    for kind in PipelineKind::ALL {
        let desc = match kind {
            PipelineKind::Opaque => opaque.build(),
            // Alpha-tested geometry (the wire fence) is seen from both sides.
            PipelineKind::AlphaTested => {
                let mut desc = PipelineInputs {
                    pixel_shader: &alpha_tested_pixel_shader,
                    ..opaque
                }
                .build();
                desc.RasterizerState.CullMode = D3D12_CULL_MODE_NONE;
                desc
            }
            PipelineKind::Transparent => {
                let mut desc = opaque.build();
                desc.BlendState.RenderTarget[0] = transparent_blend();
                desc
            }
        };
        pipelines.push(unsafe { device.CreateGraphicsPipelineState::<ID3D12PipelineState>(&desc) }?);
    }
    pipelines
        .try_into()
        .map_err(|_| FrameError::Setup("pipeline count mismatch".to_owned()))
}

#[derive(Clone, Copy)]
struct PipelineInputs<'a> {
    root_signature: &'a ID3D12RootSignature,
    input_layout: D3D12_INPUT_LAYOUT_DESC,
    vertex_shader: &'a ID3DBlob,
    pixel_shader: &'a ID3DBlob,
}

fn bytecode(blob: &ID3DBlob) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: unsafe { blob.GetBufferPointer() },
        BytecodeLength: unsafe { blob.GetBufferSize() },
    }
}

impl PipelineInputs<'_> {
    /// Opaque defaults: back-face culling, depth test, no blending.
    fn build(&self) -> D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
        rtv_formats[0] = BACK_BUFFER_FORMAT;

        D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: unsafe { std::mem::transmute_copy(self.root_signature) },
            VS: bytecode(self.vertex_shader),
            PS: bytecode(self.pixel_shader),
            InputLayout: self.input_layout,
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE_BACK,
                DepthClipEnable: TRUE,
                ..Default::default()
            },
            BlendState: D3D12_BLEND_DESC {
                AlphaToCoverageEnable: FALSE,
                IndependentBlendEnable: FALSE,
                RenderTarget: [opaque_blend(); 8],
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: TRUE,
                DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
                DepthFunc: D3D12_COMPARISON_FUNC_LESS,
                StencilEnable: FALSE,
                ..Default::default()
            },
            SampleMask: u32::MAX,
            PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
            NumRenderTargets: 1,
            RTVFormats: rtv_formats,
            DSVFormat: DEPTH_STENCIL_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            ..Default::default()
        }
    }
}
