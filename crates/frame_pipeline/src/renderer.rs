//! Wires the scene, the frame ring and both per-tick stages to a backend.

use bytemuck::Pod;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::backend::GraphicsBackend;
use crate::camera::ViewProvider;
use crate::command_recording::CommandRecordingStage;
use crate::command_recording::DrawStats;
use crate::descriptor_layout::DescriptorHeapInfo;
use crate::descriptor_layout::DescriptorLayout;
use crate::error::FrameResult;
use crate::fence::FenceSynchronizer;
use crate::frame_ring::BackendFrameSlot;
use crate::frame_ring::FrameRing;
use crate::frame_ring::FrameSlot;
use crate::frame_ring::FRAME_RESOURCE_COUNT;
use crate::frame_update::FrameUpdate;
use crate::frame_update::FrameUpdateStage;
use crate::scene::GeometryId;
use crate::scene::Scene;
use crate::scene::TextureId;
use crate::timer::GameTimer;
use crate::upload_buffer::UploadBuffer;

pub struct FrameRenderer<B: GraphicsBackend> {
    backend: B,
    scene: Scene,
    layout: DescriptorLayout,
    heap: DescriptorHeapInfo,
    ring: FrameRing<BackendFrameSlot<B>>,
    fence: FenceSynchronizer<B::Fence>,
    update_stage: FrameUpdateStage,
    recording_stage: CommandRecordingStage,
    frame_count: u64,
}

impl<B: GraphicsBackend> FrameRenderer<B> {
    /// Upload the scene, allocate the ring and fill the descriptor heap.
    ///
    /// Every descriptor is written here; the heap is never touched again.
    pub fn new(mut backend: B, scene: Scene) -> FrameResult<Self> {
        let layout = DescriptorLayout::try_new(
            scene.object_count(),
            scene.material_count(),
            FRAME_RESOURCE_COUNT,
            scene.texture_count(),
        )?;
        let heap = backend.create_descriptor_heap(layout.heap_size())?;
        debug!(
            heap_size = layout.heap_size(),
            pass_offset = layout.pass_cbv_offset(),
            texture_offset = layout.texture_srv_offset(),
            "planned descriptor heap"
        );

        for (index, geometry) in scene.geometries().iter().enumerate() {
            backend.upload_geometry(GeometryId(index), geometry)?;
        }
        for (index, texture) in scene.textures().iter().enumerate() {
            backend.upload_texture(TextureId(index), texture)?;
        }

        let ring: FrameRing<BackendFrameSlot<B>> = FrameRing::try_new(|index| {
            FrameSlot::new(
                &mut backend,
                index,
                scene.object_count(),
                scene.material_count(),
            )
        })?;

        for (frame, slot) in ring.slots().iter().enumerate() {
            let frame = frame as u32;
            for obj in 0..layout.object_count() {
                let index = layout.checked(layout.object_cbv_index(frame, obj))?;
                create_cbv(&mut backend, &heap, index, &slot.object_constants, obj as usize)?;
            }
            for mat in 0..layout.material_count() {
                let index = layout.checked(layout.material_cbv_index(frame, mat))?;
                create_cbv(&mut backend, &heap, index, &slot.material_constants, mat as usize)?;
            }
            let index = layout.checked(layout.pass_cbv_index(frame))?;
            create_cbv(&mut backend, &heap, index, &slot.pass_constants, 0)?;
        }
        for texture in 0..layout.texture_count() {
            let index = layout.checked(layout.texture_srv_index(texture))?;
            backend.create_shader_resource_view(heap.cpu_handle(index), TextureId(texture as usize))?;
        }

        backend.finish_setup()?;
        let fence = FenceSynchronizer::new(backend.create_fence()?);

        info!(
            objects = scene.object_count(),
            materials = scene.material_count(),
            textures = scene.texture_count(),
            frames = FRAME_RESOURCE_COUNT,
            "frame renderer ready"
        );
        Ok(Self {
            backend,
            scene,
            layout: layout.clone(),
            heap,
            ring,
            fence,
            update_stage: FrameUpdateStage::default(),
            recording_stage: CommandRecordingStage::new(layout, heap),
            frame_count: 0,
        })
    }

    /// CPU half of a tick: claim the next slot and write what changed into it.
    pub fn update(&mut self, camera: &impl ViewProvider, timer: &GameTimer) -> FrameResult<FrameUpdate> {
        let pass = self
            .update_stage
            .pass_inputs(camera, timer, self.backend.back_buffer_size())
            .to_constants();
        self.update_stage
            .run(&mut self.ring, &mut self.fence, &mut self.scene, &pass)
    }

    /// GPU half of a tick: record and submit the slot claimed by [`update`](Self::update).
    pub fn draw(&mut self) -> FrameResult<DrawStats> {
        let frame_index = self.ring.current_index() as u32;
        let stats = self.recording_stage.record_and_submit(
            &mut self.backend,
            self.ring.current_mut(),
            frame_index,
            &mut self.fence,
            &self.scene,
        )?;
        self.frame_count += 1;
        Ok(stats)
    }

    pub fn tick(&mut self, camera: &impl ViewProvider, timer: &GameTimer) -> FrameResult<DrawStats> {
        self.update(camera, timer)?;
        self.draw()
    }

    /// Wait until the GPU has finished every submitted frame.
    pub fn flush(&mut self) -> FrameResult<u64> {
        self.fence.flush()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn layout(&self) -> &DescriptorLayout {
        &self.layout
    }

    pub fn heap(&self) -> &DescriptorHeapInfo {
        &self.heap
    }

    pub fn ring(&self) -> &FrameRing<BackendFrameSlot<B>> {
        &self.ring
    }

    pub fn fence(&self) -> &FenceSynchronizer<B::Fence> {
        &self.fence
    }

    pub fn update_stage_mut(&mut self) -> &mut FrameUpdateStage {
        &mut self.update_stage
    }
}

impl<B: GraphicsBackend> Drop for FrameRenderer<B> {
    fn drop(&mut self) {
        // Slots own GPU memory the queue may still be reading.
        if let Err(error) = self.fence.flush() {
            error!(?error, "failed to drain the GPU before releasing frame resources");
        }
    }
}

fn create_cbv<B: GraphicsBackend, T: Pod>(
    backend: &mut B,
    heap: &DescriptorHeapInfo,
    index: u32,
    buffer: &UploadBuffer<T, B::Memory>,
    element: usize,
) -> FrameResult<()> {
    backend.create_constant_buffer_view(
        heap.cpu_handle(index),
        buffer.element_gpu_address(element),
        buffer.element_stride() as u32,
    )
}
