use std::collections::HashMap;

use tracing::debug;
use tracing::info;
use tracing::warn;
use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use super::create_device::create_device;
use super::create_pipeline_state::create_pipeline_states;
use super::create_pipeline_state::BACK_BUFFER_FORMAT;
use super::create_pipeline_state::DEPTH_STENCIL_FORMAT;
use super::create_root_signature::create_root_signature;
use super::device_error;
use super::fence::D3D12Fence;
use super::info_queue::drain_messages;
use super::info_queue::info_queue;
use super::transition_barrier::resource_state;
use super::transition_barrier::transition_barrier;
use super::upload::buffer_desc;
use super::upload::create_committed;
use super::upload::D3D12UploadMemory;
use super::SWAP_CHAIN_BUFFER_COUNT;
use crate::backend::DrawArgs;
use crate::backend::GraphicsBackend;
use crate::backend::PipelineKind;
use crate::backend::ResourceState;
use crate::backend::RootParameter;
use crate::descriptor_layout::CpuDescriptorHandle;
use crate::descriptor_layout::DescriptorHeapInfo;
use crate::descriptor_layout::GpuDescriptorHandle;
use crate::error::FrameError;
use crate::error::FrameResult;
use crate::fence::FenceSynchronizer;
use crate::geometry::Geometry;
use crate::geometry::Vertex;
use crate::scene::GeometryId;
use crate::scene::Texture;
use crate::scene::TextureId;

#[derive(Clone, Debug)]
pub struct D3D12Config {
    pub width: u32,
    pub height: u32,
    pub use_warp_device: bool,
    pub vsync: bool,
}

impl Default for D3D12Config {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            use_warp_device: false,
            vsync: true,
        }
    }
}

struct GpuGeometry {
    _vertex_buffer: ID3D12Resource,
    _index_buffer: ID3D12Resource,
    vbv: D3D12_VERTEX_BUFFER_VIEW,
    ibv: D3D12_INDEX_BUFFER_VIEW,
}

pub struct D3D12Backend {
    config: D3D12Config,
    device: ID3D12Device,
    _dxgi_factory: IDXGIFactory4,
    command_queue: ID3D12CommandQueue,
    swap_chain: IDXGISwapChain3,
    render_targets: Vec<ID3D12Resource>,
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: u32,
    dsv_heap: ID3D12DescriptorHeap,
    _depth_stencil: ID3D12Resource,
    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
    root_signature: ID3D12RootSignature,
    pipelines: [ID3D12PipelineState; 3],
    command_list: ID3D12GraphicsCommandList,
    setup_allocator: ID3D12CommandAllocator,
    cbv_srv_heap: Option<ID3D12DescriptorHeap>,
    geometries: HashMap<GeometryId, GpuGeometry>,
    textures: HashMap<TextureId, ID3D12Resource>,
    /// Upload-heap copies of static data, released once setup has executed.
    staging: Vec<ID3D12Resource>,
    info_queue: Option<ID3D12InfoQueue>,
}

impl D3D12Backend {
    pub fn new(hwnd: HWND, config: D3D12Config) -> FrameResult<Self> {
        let (dxgi_factory, device) = create_device(config.use_warp_device)?;

        let command_queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })?
        };

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: SWAP_CHAIN_BUFFER_COUNT,
            Width: config.width,
            Height: config.height,
            Format: BACK_BUFFER_FORMAT,
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            ..Default::default()
        };
        let swap_chain: IDXGISwapChain3 = unsafe {
            dxgi_factory.CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)?
        }
        .cast()?;
        unsafe { dxgi_factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)? };

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: SWAP_CHAIN_BUFFER_COUNT,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                ..Default::default()
            })
        }?;
        let rtv_descriptor_size =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) };
        let rtv_start = unsafe { rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        let mut render_targets = Vec::with_capacity(SWAP_CHAIN_BUFFER_COUNT as usize);
        for i in 0..SWAP_CHAIN_BUFFER_COUNT {
            let resource: ID3D12Resource = unsafe { swap_chain.GetBuffer(i)? };
            let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                ptr: rtv_start.ptr + (i * rtv_descriptor_size) as usize,
            };
            unsafe { device.CreateRenderTargetView(&resource, None, handle) };
            render_targets.push(resource);
        }

        let dsv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: 1,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                ..Default::default()
            })
        }?;
        let depth_stencil = create_depth_stencil(&device, config.width, config.height)?;
        unsafe {
            device.CreateDepthStencilView(
                &depth_stencil,
                None,
                dsv_heap.GetCPUDescriptorHandleForHeapStart(),
            )
        };

        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: config.width as f32,
            Height: config.height as f32,
            MinDepth: D3D12_MIN_DEPTH,
            MaxDepth: D3D12_MAX_DEPTH,
        };
        let scissor_rect = RECT {
            left: 0,
            top: 0,
            right: config.width as i32,
            bottom: config.height as i32,
        };

        let root_signature = create_root_signature(&device)?;
        let pipelines = create_pipeline_states(&device, &root_signature)?;

        // Left open: setup records its copies here until `finish_setup`.
        let setup_allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)? };
        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &setup_allocator,
                &pipelines[PipelineKind::Opaque as usize],
            )
        }?;

        info!(
            width = config.width,
            height = config.height,
            vsync = config.vsync,
            "created D3D12 swap chain"
        );
        Ok(Self {
            info_queue: info_queue(&device),
            config,
            device,
            _dxgi_factory: dxgi_factory,
            command_queue,
            swap_chain,
            render_targets,
            rtv_heap,
            rtv_descriptor_size,
            dsv_heap,
            _depth_stencil: depth_stencil,
            viewport,
            scissor_rect,
            root_signature,
            pipelines,
            command_list,
            setup_allocator,
            cbv_srv_heap: None,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            staging: Vec::new(),
        })
    }

    fn back_buffer_index(&self) -> usize {
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() as usize }
    }

    fn rtv_handle(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() }.ptr
                + self.back_buffer_index() * self.rtv_descriptor_size as usize,
        }
    }

    fn dsv_handle(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        unsafe { self.dsv_heap.GetCPUDescriptorHandleForHeapStart() }
    }

    fn staging_buffer(&mut self, bytes: &[u8], label: &str) -> FrameResult<ID3D12Resource> {
        let staging = create_committed(
            &self.device,
            D3D12_HEAP_TYPE_UPLOAD,
            &buffer_desc(bytes.len() as u64),
            D3D12_RESOURCE_STATE_GENERIC_READ,
            None,
            label,
        )?;
        write_mapped(&staging, bytes)?;
        self.staging.push(staging.clone());
        Ok(staging)
    }

    /// Default-heap buffer filled through a staging copy on the setup list.
    fn default_buffer(
        &mut self,
        bytes: &[u8],
        final_state: D3D12_RESOURCE_STATES,
        label: &str,
    ) -> FrameResult<ID3D12Resource> {
        let buffer = create_committed(
            &self.device,
            D3D12_HEAP_TYPE_DEFAULT,
            &buffer_desc(bytes.len() as u64),
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
            label,
        )?;
        let staging = self.staging_buffer(bytes, &format!("{label} staging"))?;
        unsafe {
            self.command_list
                .CopyBufferRegion(&buffer, 0, &staging, 0, bytes.len() as u64);
            self.command_list.ResourceBarrier(&[transition_barrier(
                &buffer,
                D3D12_RESOURCE_STATE_COPY_DEST,
                final_state,
            )]);
        }
        Ok(buffer)
    }

    fn recording_error(&self, error: Error) -> FrameError {
        match device_error(&self.device, error) {
            FrameError::Windows(error) => FrameError::Recording(error.to_string()),
            other => other,
        }
    }

    fn submission_error(&self, error: Error) -> FrameError {
        match device_error(&self.device, error) {
            FrameError::Windows(error) => FrameError::Submission(error.to_string()),
            other => other,
        }
    }

    fn drain_debug_messages(&self) {
        if let Some(queue) = &self.info_queue {
            drain_messages(queue);
        }
    }
}

fn create_depth_stencil(device: &ID3D12Device, width: u32, height: u32) -> FrameResult<ID3D12Resource> {
    let desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Alignment: 0,
        Width: width as u64,
        Height: height,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DEPTH_STENCIL_FORMAT,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
    };
    let clear_value = D3D12_CLEAR_VALUE {
        Format: DEPTH_STENCIL_FORMAT,
        Anonymous: D3D12_CLEAR_VALUE_0 {
            DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                Depth: 1.0,
                Stencil: 0,
            },
        },
    };
    create_committed(
        device,
        D3D12_HEAP_TYPE_DEFAULT,
        &desc,
        D3D12_RESOURCE_STATE_DEPTH_WRITE,
        Some(&clear_value),
        "DepthStencil",
    )
}

fn write_mapped(resource: &ID3D12Resource, bytes: &[u8]) -> FrameResult<()> {
    let mut mapped = std::ptr::null_mut();
    let read_range = D3D12_RANGE { Begin: 0, End: 0 };
    unsafe {
        resource.Map(0, Some(&read_range), Some(&mut mapped))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped as *mut u8, bytes.len());
        resource.Unmap(0, None);
    }
    Ok(())
}

fn aligned_row_pitch(texture: &Texture) -> usize {
    let alignment = D3D12_TEXTURE_DATA_PITCH_ALIGNMENT as usize;
    texture.row_pitch().div_ceil(alignment) * alignment
}

impl GraphicsBackend for D3D12Backend {
    type Allocator = ID3D12CommandAllocator;
    type Memory = D3D12UploadMemory;
    type Fence = D3D12Fence;

    fn back_buffer_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn descriptor_increment_size(&self) -> u32 {
        unsafe {
            self.device
                .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV)
        }
    }

    fn create_descriptor_heap(&mut self, capacity: u32) -> FrameResult<DescriptorHeapInfo> {
        let heap: ID3D12DescriptorHeap = unsafe {
            self.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: capacity,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                ..Default::default()
            })
        }?;
        let info = DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle(unsafe { heap.GetCPUDescriptorHandleForHeapStart() }.ptr),
            gpu_start: GpuDescriptorHandle(unsafe { heap.GetGPUDescriptorHandleForHeapStart() }.ptr),
            increment_size: self.descriptor_increment_size(),
            capacity,
        };
        debug!(capacity, increment = info.increment_size, "created CBV/SRV heap");
        self.cbv_srv_heap = Some(heap);
        Ok(info)
    }

    fn create_upload_memory(&mut self, byte_len: usize, label: &str) -> FrameResult<Self::Memory> {
        D3D12UploadMemory::new(&self.device, byte_len, label)
    }

    fn create_command_allocator(&mut self) -> FrameResult<Self::Allocator> {
        Ok(unsafe {
            self.device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?
        })
    }

    fn create_fence(&mut self) -> FrameResult<Self::Fence> {
        D3D12Fence::new(&self.device, &self.command_queue)
    }

    fn upload_geometry(&mut self, id: GeometryId, geometry: &Geometry) -> FrameResult<()> {
        let vertex_bytes = geometry.vertex_bytes();
        let index_bytes = geometry.index_bytes();
        let vertex_buffer = self.default_buffer(
            vertex_bytes,
            D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
            &format!("{} vertices", geometry.name),
        )?;
        let index_buffer = self.default_buffer(
            index_bytes,
            D3D12_RESOURCE_STATE_INDEX_BUFFER,
            &format!("{} indices", geometry.name),
        )?;
        let vbv = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { vertex_buffer.GetGPUVirtualAddress() },
            StrideInBytes: std::mem::size_of::<Vertex>() as u32,
            SizeInBytes: vertex_bytes.len() as u32,
        };
        let ibv = D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: unsafe { index_buffer.GetGPUVirtualAddress() },
            SizeInBytes: index_bytes.len() as u32,
            Format: DXGI_FORMAT_R32_UINT,
        };
        self.geometries.insert(
            id,
            GpuGeometry {
                _vertex_buffer: vertex_buffer,
                _index_buffer: index_buffer,
                vbv,
                ibv,
            },
        );
        Ok(())
    }

    fn upload_texture(&mut self, id: TextureId, texture: &Texture) -> FrameResult<()> {
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: texture.width as u64,
            Height: texture.height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_NONE,
        };
        let resource = create_committed(
            &self.device,
            D3D12_HEAP_TYPE_DEFAULT,
            &desc,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
            &texture.name,
        )?;

        // Copy sources need 256-byte row pitches.
        let row_pitch = aligned_row_pitch(texture);
        let mut padded = vec![0u8; row_pitch * texture.height as usize];
        for (row, source) in texture.pixels.chunks_exact(texture.row_pitch()).enumerate() {
            padded[row * row_pitch..row * row_pitch + source.len()].copy_from_slice(source);
        }
        let staging = self.staging_buffer(&padded, &format!("{} staging", texture.name))?;

        let destination = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&resource) },
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { SubresourceIndex: 0 },
        };
        let source = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&staging) },
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: 0,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                        Width: texture.width,
                        Height: texture.height,
                        Depth: 1,
                        RowPitch: row_pitch as u32,
                    },
                },
            },
        };
        unsafe {
            self.command_list
                .CopyTextureRegion(&destination, 0, 0, 0, &source, None);
            self.command_list.ResourceBarrier(&[transition_barrier(
                &resource,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            )]);
        }
        self.textures.insert(id, resource);
        Ok(())
    }

    fn create_constant_buffer_view(
        &mut self,
        handle: CpuDescriptorHandle,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> FrameResult<()> {
        let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
            BufferLocation: gpu_address,
            SizeInBytes: size_in_bytes,
        };
        unsafe {
            self.device
                .CreateConstantBufferView(Some(&desc), D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.0 })
        };
        Ok(())
    }

    fn create_shader_resource_view(
        &mut self,
        handle: CpuDescriptorHandle,
        texture: TextureId,
    ) -> FrameResult<()> {
        let resource = self
            .textures
            .get(&texture)
            .ok_or_else(|| FrameError::Setup(format!("texture {} was never uploaded", texture.0)))?;
        let desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                    PlaneSlice: 0,
                    ResourceMinLODClamp: 0.0,
                },
            },
        };
        unsafe {
            self.device.CreateShaderResourceView(
                resource,
                Some(&desc),
                D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.0 },
            )
        };
        Ok(())
    }

    fn finish_setup(&mut self) -> FrameResult<()> {
        unsafe { self.command_list.Close()? };
        let command_lists = [Some(self.command_list.cast::<ID3D12CommandList>()?)];
        unsafe { self.command_queue.ExecuteCommandLists(&command_lists) };

        let mut fence = FenceSynchronizer::new(D3D12Fence::new(&self.device, &self.command_queue)?);
        fence.flush()?;
        info!(
            staging_buffers = self.staging.len(),
            geometries = self.geometries.len(),
            textures = self.textures.len(),
            "static data resident"
        );
        self.staging.clear();
        unsafe { self.setup_allocator.Reset()? };
        self.drain_debug_messages();
        Ok(())
    }

    fn reset_allocator(&mut self, allocator: &mut Self::Allocator) -> FrameResult<()> {
        unsafe { allocator.Reset() }.map_err(|e| self.recording_error(e))
    }

    fn begin_commands(
        &mut self,
        allocator: &Self::Allocator,
        pipeline: PipelineKind,
    ) -> FrameResult<()> {
        unsafe {
            self.command_list
                .Reset(allocator, &self.pipelines[pipeline as usize])
        }
        .map_err(|e| self.recording_error(e))
    }

    fn set_viewport_and_scissor(&mut self) {
        unsafe {
            self.command_list.RSSetViewports(&[self.viewport]);
            self.command_list.RSSetScissorRects(&[self.scissor_rect]);
        }
    }

    fn transition_back_buffer(&mut self, before: ResourceState, after: ResourceState) {
        let back_buffer = &self.render_targets[self.back_buffer_index()];
        unsafe {
            self.command_list.ResourceBarrier(&[transition_barrier(
                back_buffer,
                resource_state(before),
                resource_state(after),
            )])
        };
    }

    fn clear_render_target(&mut self, color: [f32; 4]) {
        unsafe {
            self.command_list
                .ClearRenderTargetView(self.rtv_handle(), &color, None)
        };
    }

    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8) {
        unsafe {
            self.command_list.ClearDepthStencilView(
                self.dsv_handle(),
                D3D12_CLEAR_FLAG_DEPTH | D3D12_CLEAR_FLAG_STENCIL,
                depth,
                stencil,
                &[],
            )
        };
    }

    fn set_render_targets(&mut self) {
        let rtv = self.rtv_handle();
        let dsv = self.dsv_handle();
        unsafe {
            self.command_list
                .OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv))
        };
    }

    fn set_root_signature(&mut self) {
        unsafe {
            self.command_list
                .SetGraphicsRootSignature(&self.root_signature)
        };
    }

    fn set_descriptor_heap(&mut self) {
        match &self.cbv_srv_heap {
            Some(heap) => unsafe { self.command_list.SetDescriptorHeaps(&[Some(heap.clone())]) },
            None => warn!("no CBV/SRV heap to bind"),
        }
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineKind) {
        unsafe {
            self.command_list
                .SetPipelineState(&self.pipelines[pipeline as usize])
        };
    }

    fn set_descriptor_table(&mut self, parameter: RootParameter, handle: GpuDescriptorHandle) {
        unsafe {
            self.command_list.SetGraphicsRootDescriptorTable(
                parameter as u32,
                D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.0 },
            )
        };
    }

    fn set_geometry(&mut self, geometry: GeometryId) {
        let Some(gpu) = self.geometries.get(&geometry) else {
            warn!(geometry = geometry.0, "geometry was never uploaded");
            return;
        };
        unsafe {
            self.command_list.IASetVertexBuffers(0, Some(&[gpu.vbv]));
            self.command_list.IASetIndexBuffer(Some(&gpu.ibv));
            self.command_list
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        }
    }

    fn draw_indexed(&mut self, args: DrawArgs) {
        unsafe {
            self.command_list.DrawIndexedInstanced(
                args.index_count,
                1,
                args.start_index_location,
                args.base_vertex_location,
                0,
            )
        };
    }

    fn close_and_execute(&mut self) -> FrameResult<()> {
        unsafe { self.command_list.Close() }.map_err(|e| self.recording_error(e))?;
        let command_lists = [Some(self.command_list.cast::<ID3D12CommandList>()?)];
        unsafe { self.command_queue.ExecuteCommandLists(&command_lists) };
        Ok(())
    }

    fn present(&mut self) -> FrameResult<()> {
        let sync_interval = u32::from(self.config.vsync);
        let result = unsafe { self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)) }.ok();
        self.drain_debug_messages();
        result.map_err(|e| self.submission_error(e))
    }
}
