//! Frame-resource ring, fence synchronization and descriptor heap layout for a
//! small hard-coded scene.
//!
//! The CPU prepares frame *k+1* while the GPU still consumes frame *k*. Each of
//! the [`FRAME_RESOURCE_COUNT`] ring slots owns its constant buffers and command
//! allocator and is stamped with the fence value that marks the GPU as done with
//! it. The [`DescriptorLayout`] maps every per-frame constant buffer view and the
//! shared texture views into one shader-visible heap.
//!
//! Graphics API access goes through [`GraphicsBackend`]. [`headless`] runs
//! everywhere with a worker thread standing in for the GPU queue; `d3d12` is
//! only built on Windows.

pub mod backend;
pub mod camera;
pub mod command_recording;
pub mod constants;
pub mod descriptor_layout;
pub mod error;
pub mod fence;
pub mod frame_ring;
pub mod frame_update;
pub mod geometry;
pub mod headless;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod timer;
pub mod upload_buffer;

#[cfg(windows)]
pub mod d3d12;

pub use backend::DrawArgs;
pub use backend::GraphicsBackend;
pub use backend::PipelineKind;
pub use backend::ResourceState;
pub use backend::RootParameter;
pub use camera::InputState;
pub use camera::OrbitCamera;
pub use camera::ViewProvider;
pub use command_recording::CommandRecordingStage;
pub use command_recording::DrawStats;
pub use descriptor_layout::DescriptorHeapInfo;
pub use descriptor_layout::DescriptorLayout;
pub use error::FrameError;
pub use error::FrameResult;
pub use fence::FenceSynchronizer;
pub use fence::GpuFence;
pub use frame_ring::FrameRing;
pub use frame_ring::FrameSlot;
pub use frame_ring::FRAME_RESOURCE_COUNT;
pub use frame_update::FrameUpdate;
pub use frame_update::FrameUpdateStage;
pub use renderer::FrameRenderer;
pub use scene::Scene;
pub use scene::SceneBuilder;
pub use timer::GameTimer;
