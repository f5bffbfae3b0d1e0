//! A [`GraphicsBackend`] with no GPU behind it.
//!
//! Command lists are recorded into plain vectors and executed, in submission
//! order, by a worker thread that plays the part of the graphics queue. Fence
//! signals ride the same queue, so a fence value completes only after every
//! list submitted before it has executed. Execution checks that every draw
//! binds descriptors created during setup.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

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
use crate::fence::GpuFence;
use crate::fence::DEVICE_REMOVED_FENCE_VALUE;
use crate::geometry::Geometry;
use crate::scene::GeometryId;
use crate::scene::Texture;
use crate::scene::TextureId;
use crate::upload_buffer::UploadMemory;

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub width: u32,
    pub height: u32,
    /// Time the queue spends on each command list.
    pub latency: Duration,
    pub descriptor_increment_size: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            latency: Duration::ZERO,
            descriptor_increment_size: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    Begin { allocator: usize, pipeline: PipelineKind },
    SetViewportAndScissor { width: u32, height: u32 },
    Transition { before: ResourceState, after: ResourceState },
    ClearRenderTarget([f32; 4]),
    ClearDepthStencil { depth: f32, stencil: u8 },
    SetRenderTargets,
    SetRootSignature,
    SetDescriptorHeap,
    SetPipelineState(PipelineKind),
    /// `index` is `None` when the handle is not inside the heap.
    SetDescriptorTable { parameter: RootParameter, index: Option<u32> },
    SetGeometry(GeometryId),
    DrawIndexed(DrawArgs),
}

/// What a descriptor created during setup points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    Cbv { gpu_address: u64, size_in_bytes: u32 },
    Srv(TextureId),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub submissions: u64,
    pub draws: u64,
    pub presents: u64,
    pub signals: u64,
    pub validation_errors: Vec<String>,
}

/// Everything fixed at [`GraphicsBackend::finish_setup`].
#[derive(Debug, Default)]
struct Resources {
    views: HashMap<u32, ViewKind>,
    /// Index count per uploaded geometry.
    geometries: HashMap<GeometryId, u32>,
    textures: HashSet<TextureId>,
}

struct FenceState {
    completed: Mutex<u64>,
    reached: Condvar,
}

impl FenceState {
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, value: u64) {
        let mut completed = self.lock();
        *completed = (*completed).max(value);
        self.reached.notify_all();
    }

    fn wake(&self) {
        let _completed = self.lock();
        self.reached.notify_all();
    }
}

/// State shared between the backend, its fences and the queue thread.
#[derive(Default)]
struct Shared {
    device_lost: AtomicBool,
    executed: AtomicU64,
    stats: Mutex<HeadlessStats>,
    fences: Mutex<Vec<Arc<FenceState>>>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, HeadlessStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lose_device(&self) {
        self.device_lost.store(true, Ordering::SeqCst);
        let fences = self.fences.lock().unwrap_or_else(PoisonError::into_inner);
        for fence in fences.iter() {
            fence.wake();
        }
    }

    fn is_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }
}

enum QueueItem {
    Setup(Arc<Resources>),
    Execute { submission: u64, commands: Vec<RecordedCommand> },
    Signal(Arc<FenceState>, u64),
    Present,
    Shutdown,
}

pub struct HeadlessFence {
    state: Arc<FenceState>,
    shared: Arc<Shared>,
    queue: mpsc::Sender<QueueItem>,
}

impl GpuFence for HeadlessFence {
    fn completed_value(&self) -> u64 {
        if self.shared.is_lost() {
            return DEVICE_REMOVED_FENCE_VALUE;
        }
        *self.state.lock()
    }

    fn signal(&mut self, value: u64) -> FrameResult<()> {
        self.queue
            .send(QueueItem::Signal(Arc::clone(&self.state), value))
            .map_err(|_| FrameError::DeviceLost("queue thread has exited".to_owned()))
    }

    fn wait_for_value(&mut self, value: u64) -> FrameResult<()> {
        let mut completed = self.state.lock();
        while *completed < value && !self.shared.is_lost() {
            completed = self
                .state
                .reached
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct HeadlessAllocator {
    id: usize,
}

/// Upload memory with a made-up GPU virtual address.
#[derive(Debug)]
pub struct HeadlessMemory {
    bytes: Vec<u8>,
    gpu_address: u64,
    label: String,
}

impl HeadlessMemory {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl UploadMemory for HeadlessMemory {
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

const HEAP_CPU_START: usize = 0x0010_0000;
const HEAP_GPU_START: u64 = 0x00D0_0000_0000;
const FIRST_BUFFER_ADDRESS: u64 = 0x0001_0000_0000;
const RESOURCE_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

pub struct HeadlessBackend {
    config: HeadlessConfig,
    shared: Arc<Shared>,
    queue: mpsc::Sender<QueueItem>,
    worker: Option<JoinHandle<()>>,
    heap: Option<DescriptorHeapInfo>,
    resources: Resources,
    setup_finished: bool,
    next_address: u64,
    /// Last submission that used each allocator.
    allocator_submissions: Vec<u64>,
    open_list: Option<(usize, Vec<RecordedCommand>)>,
    submissions: u64,
    last_submission: Vec<RecordedCommand>,
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> FrameResult<Self> {
        let shared = Arc::new(Shared::default());
        let (queue, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("headless-queue".to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                let latency = config.latency;
                move || run_queue(receiver, shared, latency)
            })
            .map_err(|error| FrameError::Setup(format!("failed to spawn queue thread: {error}")))?;

        info!(
            width = config.width,
            height = config.height,
            latency_ms = config.latency.as_millis() as u64,
            "created headless device"
        );
        Ok(Self {
            config,
            shared,
            queue,
            worker: Some(worker),
            heap: None,
            resources: Resources::default(),
            setup_finished: false,
            next_address: FIRST_BUFFER_ADDRESS,
            allocator_submissions: Vec::new(),
            open_list: None,
            submissions: 0,
            last_submission: Vec::new(),
        })
    }

    pub fn stats(&self) -> HeadlessStats {
        self.shared.stats().clone()
    }

    /// Commands of the most recently submitted list.
    pub fn last_submission(&self) -> &[RecordedCommand] {
        &self.last_submission
    }

    pub fn view(&self, index: u32) -> Option<ViewKind> {
        self.resources.views.get(&index).copied()
    }

    pub fn view_count(&self) -> usize {
        self.resources.views.len()
    }

    /// Behave as if the device was removed: fences report `u64::MAX`,
    /// waiters wake, and further submissions fail.
    pub fn simulate_device_removed(&self) {
        warn!("simulating device removal");
        self.shared.lose_device();
    }

    fn send(&self, item: QueueItem) -> FrameResult<()> {
        self.queue
            .send(item)
            .map_err(|_| FrameError::DeviceLost("queue thread has exited".to_owned()))
    }

    fn ensure_setup_open(&self, what: &str) -> FrameResult<()> {
        if self.setup_finished {
            return Err(FrameError::Setup(format!(
                "{what} after setup finished; descriptor tables are immutable"
            )));
        }
        Ok(())
    }

    fn heap_index(&self, handle: CpuDescriptorHandle) -> FrameResult<u32> {
        let heap = self
            .heap
            .ok_or_else(|| FrameError::Setup("no descriptor heap has been created".to_owned()))?;
        let offset = handle
            .0
            .checked_sub(heap.cpu_start.0)
            .filter(|offset| heap.increment_size != 0 && offset % heap.increment_size as usize == 0)
            .ok_or_else(|| FrameError::Setup(format!("{handle:?} is not a heap slot")))?;
        let index = (offset / heap.increment_size as usize) as u32;
        if index >= heap.capacity {
            return Err(FrameError::Layout {
                index,
                heap_size: heap.capacity,
            });
        }
        Ok(index)
    }

    fn insert_view(&mut self, handle: CpuDescriptorHandle, view: ViewKind) -> FrameResult<()> {
        self.ensure_setup_open("creating a view")?;
        let index = self.heap_index(handle)?;
        if self.resources.views.insert(index, view).is_some() {
            return Err(FrameError::Setup(format!("descriptor {index} written twice")));
        }
        Ok(())
    }

    fn record(&mut self, command: RecordedCommand) {
        match &mut self.open_list {
            Some((_, commands)) => commands.push(command),
            None => warn!(?command, "recorded outside an open command list"),
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Allocator = HeadlessAllocator;
    type Memory = HeadlessMemory;
    type Fence = HeadlessFence;

    fn back_buffer_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn descriptor_increment_size(&self) -> u32 {
        self.config.descriptor_increment_size
    }

    fn create_descriptor_heap(&mut self, capacity: u32) -> FrameResult<DescriptorHeapInfo> {
        self.ensure_setup_open("creating a descriptor heap")?;
        if self.heap.is_some() {
            return Err(FrameError::Setup("descriptor heap already exists".to_owned()));
        }
        let heap = DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle(HEAP_CPU_START),
            gpu_start: GpuDescriptorHandle(HEAP_GPU_START),
            increment_size: self.config.descriptor_increment_size,
            capacity,
        };
        debug!(capacity, "created descriptor heap");
        self.heap = Some(heap);
        Ok(heap)
    }

    fn create_upload_memory(&mut self, byte_len: usize, label: &str) -> FrameResult<Self::Memory> {
        if byte_len == 0 {
            return Err(FrameError::Setup(format!("{label}: zero-sized buffer")));
        }
        let gpu_address = self.next_address;
        let span = (byte_len as u64).div_ceil(RESOURCE_PLACEMENT_ALIGNMENT) * RESOURCE_PLACEMENT_ALIGNMENT;
        self.next_address += span;
        Ok(HeadlessMemory {
            bytes: vec![0; byte_len],
            gpu_address,
            label: label.to_owned(),
        })
    }

    fn create_command_allocator(&mut self) -> FrameResult<Self::Allocator> {
        self.allocator_submissions.push(0);
        Ok(HeadlessAllocator {
            id: self.allocator_submissions.len() - 1,
        })
    }

    fn create_fence(&mut self) -> FrameResult<Self::Fence> {
        let state = Arc::new(FenceState {
            completed: Mutex::new(0),
            reached: Condvar::new(),
        });
        self.shared
            .fences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&state));
        Ok(HeadlessFence {
            state,
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
        })
    }

    fn upload_geometry(&mut self, id: GeometryId, geometry: &Geometry) -> FrameResult<()> {
        self.ensure_setup_open("uploading geometry")?;
        if geometry.vertices.is_empty() || geometry.indices.is_empty() {
            return Err(FrameError::Setup(format!("geometry {:?} is empty", geometry.name)));
        }
        self.resources
            .geometries
            .insert(id, geometry.indices.len() as u32);
        Ok(())
    }

    fn upload_texture(&mut self, id: TextureId, texture: &Texture) -> FrameResult<()> {
        self.ensure_setup_open("uploading a texture")?;
        if texture.pixels.len() != texture.row_pitch() * texture.height as usize {
            return Err(FrameError::Setup(format!(
                "texture {:?} has {} bytes for {}x{}",
                texture.name,
                texture.pixels.len(),
                texture.width,
                texture.height
            )));
        }
        self.resources.textures.insert(id);
        Ok(())
    }

    fn create_constant_buffer_view(
        &mut self,
        handle: CpuDescriptorHandle,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> FrameResult<()> {
        if size_in_bytes % 256 != 0 || gpu_address % 256 != 0 {
            return Err(FrameError::Setup(format!(
                "constant buffer view at {gpu_address:#x} of {size_in_bytes} bytes is not 256-byte aligned"
            )));
        }
        self.insert_view(
            handle,
            ViewKind::Cbv {
                gpu_address,
                size_in_bytes,
            },
        )
    }

    fn create_shader_resource_view(
        &mut self,
        handle: CpuDescriptorHandle,
        texture: TextureId,
    ) -> FrameResult<()> {
        if !self.resources.textures.contains(&texture) {
            return Err(FrameError::Setup(format!("texture {} was never uploaded", texture.0)));
        }
        self.insert_view(handle, ViewKind::Srv(texture))
    }

    fn finish_setup(&mut self) -> FrameResult<()> {
        self.ensure_setup_open("finishing setup")?;
        self.setup_finished = true;
        let resources = Resources {
            views: self.resources.views.clone(),
            geometries: self.resources.geometries.clone(),
            textures: self.resources.textures.clone(),
        };
        info!(views = resources.views.len(), "headless setup finished");
        self.send(QueueItem::Setup(Arc::new(resources)))
    }

    fn reset_allocator(&mut self, allocator: &mut Self::Allocator) -> FrameResult<()> {
        let last_use = self.allocator_submissions[allocator.id];
        let executed = self.shared.executed.load(Ordering::SeqCst);
        if last_use > executed {
            return Err(FrameError::Recording(format!(
                "allocator {} reset while submission {last_use} is still executing (executed {executed})",
                allocator.id
            )));
        }
        Ok(())
    }

    fn begin_commands(
        &mut self,
        allocator: &Self::Allocator,
        pipeline: PipelineKind,
    ) -> FrameResult<()> {
        if self.open_list.is_some() {
            return Err(FrameError::Recording("command list is already open".to_owned()));
        }
        self.open_list = Some((
            allocator.id,
            vec![RecordedCommand::Begin {
                allocator: allocator.id,
                pipeline,
            }],
        ));
        Ok(())
    }

    fn set_viewport_and_scissor(&mut self) {
        self.record(RecordedCommand::SetViewportAndScissor {
            width: self.config.width,
            height: self.config.height,
        });
    }

    fn transition_back_buffer(&mut self, before: ResourceState, after: ResourceState) {
        self.record(RecordedCommand::Transition { before, after });
    }

    fn clear_render_target(&mut self, color: [f32; 4]) {
        self.record(RecordedCommand::ClearRenderTarget(color));
    }

    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8) {
        self.record(RecordedCommand::ClearDepthStencil { depth, stencil });
    }

    fn set_render_targets(&mut self) {
        self.record(RecordedCommand::SetRenderTargets);
    }

    fn set_root_signature(&mut self) {
        self.record(RecordedCommand::SetRootSignature);
    }

    fn set_descriptor_heap(&mut self) {
        self.record(RecordedCommand::SetDescriptorHeap);
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineKind) {
        self.record(RecordedCommand::SetPipelineState(pipeline));
    }

    fn set_descriptor_table(&mut self, parameter: RootParameter, handle: GpuDescriptorHandle) {
        let index = self.heap.and_then(|heap| heap.gpu_index(handle));
        self.record(RecordedCommand::SetDescriptorTable { parameter, index });
    }

    fn set_geometry(&mut self, geometry: GeometryId) {
        self.record(RecordedCommand::SetGeometry(geometry));
    }

    fn draw_indexed(&mut self, args: DrawArgs) {
        self.record(RecordedCommand::DrawIndexed(args));
    }

    fn close_and_execute(&mut self) -> FrameResult<()> {
        let (allocator, commands) = self
            .open_list
            .take()
            .ok_or_else(|| FrameError::Recording("no open command list to close".to_owned()))?;
        if self.shared.is_lost() {
            return Err(FrameError::DeviceLost("ExecuteCommandLists on a removed device".to_owned()));
        }
        self.submissions += 1;
        self.allocator_submissions[allocator] = self.submissions;
        self.last_submission = commands.clone();
        self.send(QueueItem::Execute {
            submission: self.submissions,
            commands,
        })
    }

    fn present(&mut self) -> FrameResult<()> {
        if self.shared.is_lost() {
            return Err(FrameError::DeviceLost("Present on a removed device".to_owned()));
        }
        self.send(QueueItem::Present)
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        let _ = self.queue.send(QueueItem::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("headless queue thread panicked");
            }
        }
    }
}

/// Marks the device lost if the queue thread unwinds, so no waiter hangs.
struct PanicGuard(Arc<Shared>);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lose_device();
        }
    }
}

fn run_queue(receiver: mpsc::Receiver<QueueItem>, shared: Arc<Shared>, latency: Duration) {
    let _guard = PanicGuard(Arc::clone(&shared));
    let mut resources = Arc::new(Resources::default());

    while let Ok(item) = receiver.recv() {
        match item {
            QueueItem::Setup(fixed) => resources = fixed,
            QueueItem::Execute {
                submission,
                commands,
            } => {
                if !latency.is_zero() {
                    std::thread::sleep(latency);
                }
                if !shared.is_lost() {
                    let (draws, errors) = execute(&commands, &resources);
                    let mut stats = shared.stats();
                    stats.submissions += 1;
                    stats.draws += draws;
                    for message in errors {
                        error!(submission, %message, "invalid command list");
                        stats.validation_errors.push(format!("submission {submission}: {message}"));
                    }
                }
                shared.executed.store(submission, Ordering::SeqCst);
            }
            QueueItem::Signal(fence, value) => {
                if !shared.is_lost() {
                    shared.stats().signals += 1;
                    fence.complete(value);
                }
            }
            QueueItem::Present => shared.stats().presents += 1,
            QueueItem::Shutdown => break,
        }
    }
    debug!("headless queue drained");
}

/// Walk a command list the way the GPU would consume it and report draws
/// that would read unbound or wrong descriptors.
fn execute(commands: &[RecordedCommand], resources: &Resources) -> (u64, Vec<String>) {
    let mut errors = Vec::new();
    let mut draws = 0;
    let mut back_buffer = ResourceState::Present;
    let mut began = false;
    let mut root_signature = false;
    let mut heap = false;
    let mut geometry = None;
    let mut tables: HashMap<RootParameter, Option<u32>> = HashMap::new();

    for (position, command) in commands.iter().enumerate() {
        match command {
            RecordedCommand::Begin { .. } => began = true,
            RecordedCommand::Transition { before, after } => {
                if *before != back_buffer {
                    errors.push(format!(
                        "command {position}: transition from {before:?} but back buffer is {back_buffer:?}"
                    ));
                }
                back_buffer = *after;
            }
            RecordedCommand::ClearRenderTarget(_) if back_buffer != ResourceState::RenderTarget => {
                errors.push(format!("command {position}: clear while back buffer is {back_buffer:?}"));
            }
            RecordedCommand::SetRootSignature => root_signature = true,
            RecordedCommand::SetDescriptorHeap => heap = true,
            RecordedCommand::SetDescriptorTable { parameter, index } => {
                if !root_signature || !heap {
                    errors.push(format!(
                        "command {position}: descriptor table bound before root signature and heap"
                    ));
                }
                tables.insert(*parameter, *index);
            }
            RecordedCommand::SetGeometry(id) => geometry = Some(*id),
            RecordedCommand::DrawIndexed(args) => {
                draws += 1;
                if !began || back_buffer != ResourceState::RenderTarget {
                    errors.push(format!("command {position}: draw outside the render pass"));
                }
                check_tables(position, &tables, resources, &mut errors);
                check_geometry(position, geometry, args, resources, &mut errors);
            }
            _ => {}
        }
    }

    if back_buffer != ResourceState::Present {
        errors.push(format!("list ends with back buffer in {back_buffer:?}"));
    }
    (draws, errors)
}

fn check_tables(
    position: usize,
    tables: &HashMap<RootParameter, Option<u32>>,
    resources: &Resources,
    errors: &mut Vec<String>,
) {
    for parameter in [
        RootParameter::ObjectCbv,
        RootParameter::PassCbv,
        RootParameter::MaterialCbv,
        RootParameter::DiffuseSrv,
    ] {
        let view = match tables.get(&parameter) {
            None => {
                errors.push(format!("command {position}: {parameter:?} never bound"));
                continue;
            }
            Some(None) => {
                errors.push(format!("command {position}: {parameter:?} bound outside the heap"));
                continue;
            }
            Some(Some(index)) => (index, resources.views.get(index)),
        };
        let matches = match (parameter, view.1) {
            (RootParameter::DiffuseSrv, Some(ViewKind::Srv(_))) => true,
            (RootParameter::DiffuseSrv, _) => false,
            (_, Some(ViewKind::Cbv { .. })) => true,
            _ => false,
        };
        if !matches {
            errors.push(format!(
                "command {position}: {parameter:?} reads descriptor {} holding {:?}",
                view.0, view.1
            ));
        }
    }
}

fn check_geometry(
    position: usize,
    geometry: Option<GeometryId>,
    args: &DrawArgs,
    resources: &Resources,
    errors: &mut Vec<String>,
) {
    let Some(id) = geometry else {
        errors.push(format!("command {position}: draw without geometry"));
        return;
    };
    match resources.geometries.get(&id) {
        None => errors.push(format!("command {position}: geometry {} was never uploaded", id.0)),
        Some(&index_count) if args.start_index_location + args.index_count > index_count => {
            errors.push(format!(
                "command {position}: draw reads indices {}..{} of {index_count}",
                args.start_index_location,
                args.start_index_location + args.index_count
            ))
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::FenceSynchronizer;

    #[test]
    fn fence_completes_in_submission_order() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            latency: Duration::from_millis(5),
            ..Default::default()
        })
        .unwrap();
        let mut fence = FenceSynchronizer::new(backend.create_fence().unwrap());
        let allocator = backend.create_command_allocator().unwrap();

        for _ in 0..3 {
            backend.begin_commands(&allocator, PipelineKind::Opaque).unwrap();
            backend.close_and_execute().unwrap();
            let value = fence.advance();
            fence.signal(value).unwrap();
        }
        fence.wait_until(3).unwrap();
        assert_eq!(fence.completed_value(), 3);
        assert_eq!(backend.stats().submissions, 3);
    }

    #[test]
    fn allocator_reset_before_completion_is_refused() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            latency: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();
        let mut allocator = backend.create_command_allocator().unwrap();
        backend.begin_commands(&allocator, PipelineKind::Opaque).unwrap();
        backend.close_and_execute().unwrap();
        let error = backend.reset_allocator(&mut allocator).unwrap_err();
        assert!(matches!(error, FrameError::Recording(_)));
    }

    #[test]
    fn removal_wakes_waiters_with_device_lost() {
        let mut backend = HeadlessBackend::new(HeadlessConfig::default()).unwrap();
        let mut fence = FenceSynchronizer::new(backend.create_fence().unwrap());
        backend.simulate_device_removed();

        // Never signaled: only the removal can end this wait.
        let error = fence.wait_until(10).unwrap_err();
        assert!(error.is_device_lost());
        assert_eq!(fence.completed_value(), DEVICE_REMOVED_FENCE_VALUE);

        let allocator = backend.create_command_allocator().unwrap();
        backend.begin_commands(&allocator, PipelineKind::Opaque).unwrap();
        assert!(backend.close_and_execute().unwrap_err().is_device_lost());
    }

    #[test]
    fn views_are_frozen_after_setup() {
        let mut backend = HeadlessBackend::new(HeadlessConfig::default()).unwrap();
        let heap = backend.create_descriptor_heap(4).unwrap();
        let memory = backend.create_upload_memory(256, "cb").unwrap();
        backend
            .create_constant_buffer_view(heap.cpu_handle(0), memory.gpu_address(), 256)
            .unwrap();
        assert!(backend
            .create_constant_buffer_view(heap.cpu_handle(0), memory.gpu_address(), 256)
            .is_err());
        backend.finish_setup().unwrap();
        assert!(backend
            .create_constant_buffer_view(heap.cpu_handle(1), memory.gpu_address(), 256)
            .is_err());
        assert_eq!(backend.view_count(), 1);
    }

    #[test]
    fn draw_without_bindings_is_reported() {
        let mut backend = HeadlessBackend::new(HeadlessConfig::default()).unwrap();
        backend.create_descriptor_heap(1).unwrap();
        backend.finish_setup().unwrap();
        let mut fence = FenceSynchronizer::new(backend.create_fence().unwrap());
        let allocator = backend.create_command_allocator().unwrap();

        backend.begin_commands(&allocator, PipelineKind::Opaque).unwrap();
        backend.transition_back_buffer(ResourceState::Present, ResourceState::RenderTarget);
        backend.draw_indexed(DrawArgs {
            index_count: 3,
            start_index_location: 0,
            base_vertex_location: 0,
        });
        backend.transition_back_buffer(ResourceState::RenderTarget, ResourceState::Present);
        backend.close_and_execute().unwrap();
        fence.flush().unwrap();

        let stats = backend.stats();
        assert_eq!(stats.draws, 1);
        // Four unbound tables plus the missing geometry.
        assert_eq!(stats.validation_errors.len(), 5, "{:?}", stats.validation_errors);
    }
}
