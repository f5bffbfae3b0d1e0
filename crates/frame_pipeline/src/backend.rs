//! The seam between the frame pipeline and a graphics API.

use crate::descriptor_layout::CpuDescriptorHandle;
use crate::descriptor_layout::DescriptorHeapInfo;
use crate::descriptor_layout::GpuDescriptorHandle;
use crate::error::FrameResult;
use crate::fence::GpuFence;
use crate::geometry::Geometry;
use crate::scene::GeometryId;
use crate::scene::RenderLayer;
use crate::scene::Texture;
use crate::scene::TextureId;
use crate::upload_buffer::UploadMemory;

/// Pipeline state objects built at setup, indexed by render layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Opaque,
    AlphaTested,
    Transparent,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Opaque,
        PipelineKind::AlphaTested,
        PipelineKind::Transparent,
    ];

    pub fn for_layer(layer: RenderLayer) -> Self {
        match layer {
            RenderLayer::Opaque => PipelineKind::Opaque,
            RenderLayer::AlphaTested => PipelineKind::AlphaTested,
            RenderLayer::Transparent => PipelineKind::Transparent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    RenderTarget,
}

/// Root signature slots. Each is a one-entry descriptor table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RootParameter {
    /// `b0`
    ObjectCbv = 0,
    /// `b1`
    PassCbv = 1,
    /// `b2`
    MaterialCbv = 2,
    /// `t0`
    DiffuseSrv = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawArgs {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
}

pub trait GraphicsBackend {
    /// Per-slot command allocator.
    type Allocator;
    /// CPU-writable, GPU-readable memory backing the constant buffers.
    type Memory: UploadMemory;
    type Fence: GpuFence;

    // Setup

    fn back_buffer_size(&self) -> (u32, u32);

    /// Queried once; handles step through the heap by this many bytes.
    fn descriptor_increment_size(&self) -> u32;

    /// Create the single shader-visible CBV/SRV heap.
    fn create_descriptor_heap(&mut self, capacity: u32) -> FrameResult<DescriptorHeapInfo>;

    fn create_upload_memory(&mut self, byte_len: usize, label: &str) -> FrameResult<Self::Memory>;

    fn create_command_allocator(&mut self) -> FrameResult<Self::Allocator>;

    fn create_fence(&mut self) -> FrameResult<Self::Fence>;

    fn upload_geometry(&mut self, id: GeometryId, geometry: &Geometry) -> FrameResult<()>;

    fn upload_texture(&mut self, id: TextureId, texture: &Texture) -> FrameResult<()>;

    fn create_constant_buffer_view(
        &mut self,
        handle: CpuDescriptorHandle,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> FrameResult<()>;

    fn create_shader_resource_view(
        &mut self,
        handle: CpuDescriptorHandle,
        texture: TextureId,
    ) -> FrameResult<()>;

    /// Submit pending uploads and block until they are resident.
    fn finish_setup(&mut self) -> FrameResult<()>;

    // Recording

    fn reset_allocator(&mut self, allocator: &mut Self::Allocator) -> FrameResult<()>;

    /// Open the command list against `allocator` with `pipeline` bound.
    fn begin_commands(
        &mut self,
        allocator: &Self::Allocator,
        pipeline: PipelineKind,
    ) -> FrameResult<()>;

    fn set_viewport_and_scissor(&mut self);

    fn transition_back_buffer(&mut self, before: ResourceState, after: ResourceState);

    fn clear_render_target(&mut self, color: [f32; 4]);

    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8);

    fn set_render_targets(&mut self);

    fn set_root_signature(&mut self);

    fn set_descriptor_heap(&mut self);

    fn set_pipeline_state(&mut self, pipeline: PipelineKind);

    fn set_descriptor_table(&mut self, parameter: RootParameter, handle: GpuDescriptorHandle);

    /// Bind vertex/index buffers and topology of an uploaded geometry.
    fn set_geometry(&mut self, geometry: GeometryId);

    fn draw_indexed(&mut self, args: DrawArgs);

    // Submission

    fn close_and_execute(&mut self) -> FrameResult<()>;

    fn present(&mut self) -> FrameResult<()>;
}
