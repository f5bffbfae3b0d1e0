//! Builds, submits and fences one frame's command list.

use std::collections::HashSet;

use tracing::trace;
use tracing::warn;

use crate::backend::GraphicsBackend;
use crate::backend::PipelineKind;
use crate::backend::ResourceState;
use crate::backend::RootParameter;
use crate::descriptor_layout::DescriptorHeapInfo;
use crate::descriptor_layout::DescriptorLayout;
use crate::error::FrameResult;
use crate::fence::FenceSynchronizer;
use crate::frame_ring::FrameSlot;
use crate::scene::RenderItemId;
use crate::scene::RenderLayer;
use crate::scene::Scene;

/// `LightSteelBlue`
pub const CLEAR_COLOR: [f32; 4] = [0.690_196_1, 0.768_627_5, 0.870_588_3, 1.0];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub drawn: usize,
    /// Items with a reference or constant slot that did not resolve.
    pub skipped: usize,
    pub fence_value: u64,
}

pub struct CommandRecordingStage {
    layout: DescriptorLayout,
    heap: DescriptorHeapInfo,
    warned: HashSet<RenderItemId>,
}

impl CommandRecordingStage {
    pub fn new(layout: DescriptorLayout, heap: DescriptorHeapInfo) -> Self {
        Self {
            layout,
            heap,
            warned: HashSet::new(),
        }
    }

    /// Record the frame into `slot`'s allocator, submit it, present, and stamp
    /// `slot` with the fence value that retires it.
    ///
    /// `slot` must already be free; the frame update stage waits for it.
    pub fn record_and_submit<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        slot: &mut FrameSlot<B::Allocator, B::Memory>,
        frame_index: u32,
        fence: &mut FenceSynchronizer<B::Fence>,
        scene: &Scene,
    ) -> FrameResult<DrawStats> {
        backend.reset_allocator(&mut slot.command_allocator)?;
        backend.begin_commands(&slot.command_allocator, PipelineKind::Opaque)?;

        backend.set_viewport_and_scissor();
        backend.transition_back_buffer(ResourceState::Present, ResourceState::RenderTarget);
        backend.clear_render_target(CLEAR_COLOR);
        backend.clear_depth_stencil(1.0, 0);
        backend.set_render_targets();

        backend.set_root_signature();
        backend.set_descriptor_heap();

        let pass = self.layout.pass_cbv_index(frame_index);
        backend.set_descriptor_table(RootParameter::PassCbv, self.heap.gpu_handle(pass));

        let mut stats = DrawStats::default();
        for layer in RenderLayer::ALL {
            let items = scene.layer(layer);
            if items.is_empty() {
                continue;
            }
            backend.set_pipeline_state(PipelineKind::for_layer(layer));
            for &id in items {
                if self.draw_item(backend, frame_index, scene, id) {
                    stats.drawn += 1;
                } else {
                    stats.skipped += 1;
                }
            }
        }

        backend.transition_back_buffer(ResourceState::RenderTarget, ResourceState::Present);
        backend.close_and_execute()?;
        backend.present()?;

        let value = fence.advance();
        fence.signal(value)?;
        slot.fence_value = value;
        stats.fence_value = value;

        trace!(frame_index, drawn = stats.drawn, skipped = stats.skipped, value, "submitted frame");
        Ok(stats)
    }

    fn draw_item<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        frame_index: u32,
        scene: &Scene,
        id: RenderItemId,
    ) -> bool {
        let resolved = match scene.resolve(id) {
            Some(Ok(resolved)) => resolved,
            Some(Err(reason)) => {
                if self.warned.insert(id) {
                    let name = scene.item(id).map(|item| item.name.as_str()).unwrap_or_default();
                    warn!(item = name, %reason, "skipping draw");
                }
                return false;
            }
            None => {
                if self.warned.insert(id) {
                    warn!(item = id.0, "skipping draw of a render item that does not exist");
                }
                return false;
            }
        };

        let bindings = self.layout.resolve_draw(
            frame_index,
            resolved.item.obj_cb_index,
            resolved.material.mat_cb_index,
            resolved.material.diffuse_srv_index,
        );
        backend.set_descriptor_table(RootParameter::ObjectCbv, self.heap.gpu_handle(bindings.object_cbv));
        backend.set_descriptor_table(
            RootParameter::MaterialCbv,
            self.heap.gpu_handle(bindings.material_cbv),
        );
        backend.set_descriptor_table(RootParameter::DiffuseSrv, self.heap.gpu_handle(bindings.texture_srv));
        backend.set_geometry(resolved.geometry);
        backend.draw_indexed(resolved.draw_args);
        true
    }

    pub fn layout(&self) -> &DescriptorLayout {
        &self.layout
    }

    pub fn heap(&self) -> &DescriptorHeapInfo {
        &self.heap
    }
}
