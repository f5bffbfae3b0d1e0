use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use bevy_math::Mat4;
use bevy_math::Vec3;
use frame_pipeline::command_recording::CLEAR_COLOR;
use frame_pipeline::constants::ObjectConstants;
use frame_pipeline::geometry::room;
use frame_pipeline::headless::HeadlessBackend;
use frame_pipeline::headless::HeadlessConfig;
use frame_pipeline::headless::RecordedCommand;
use frame_pipeline::headless::ViewKind;
use frame_pipeline::scene::demo_scene;
use frame_pipeline::scene::Material;
use frame_pipeline::scene::RenderItem;
use frame_pipeline::scene::RenderLayer;
use frame_pipeline::scene::Texture;
use frame_pipeline::FrameRenderer;
use frame_pipeline::GameTimer;
use frame_pipeline::OrbitCamera;
use frame_pipeline::PipelineKind;
use frame_pipeline::ResourceState;
use frame_pipeline::RootParameter;
use frame_pipeline::Scene;
use frame_pipeline::SceneBuilder;
use frame_pipeline::FRAME_RESOURCE_COUNT;
use tracing_subscriber::fmt::MakeWriter;

fn renderer_with(scene: Scene, latency: Duration) -> FrameRenderer<HeadlessBackend> {
    let backend = HeadlessBackend::new(HeadlessConfig {
        latency,
        ..Default::default()
    })
    .unwrap();
    FrameRenderer::new(backend, scene).unwrap()
}

fn demo_renderer(latency: Duration) -> FrameRenderer<HeadlessBackend> {
    renderer_with(demo_scene(None, None).unwrap(), latency)
}

#[test]
fn setup_points_every_descriptor_at_its_slot() {
    let renderer = demo_renderer(Duration::ZERO);
    let layout = renderer.layout().clone();
    let backend = renderer.backend();

    assert_eq!(layout.heap_size(), (7 + 4 + 1) * 3 + 4);
    assert_eq!(backend.view_count(), layout.heap_size() as usize);

    for (frame, slot) in renderer.ring().slots().iter().enumerate() {
        let frame = frame as u32;
        for obj in 0..layout.object_count() {
            assert_eq!(
                backend.view(layout.object_cbv_index(frame, obj)),
                Some(ViewKind::Cbv {
                    gpu_address: slot.object_constants.element_gpu_address(obj as usize),
                    size_in_bytes: 256,
                })
            );
        }
        for mat in 0..layout.material_count() {
            assert_eq!(
                backend.view(layout.material_cbv_index(frame, mat)),
                Some(ViewKind::Cbv {
                    gpu_address: slot.material_constants.element_gpu_address(mat as usize),
                    size_in_bytes: 256,
                })
            );
        }
        assert_eq!(
            backend.view(layout.pass_cbv_index(frame)),
            Some(ViewKind::Cbv {
                gpu_address: slot.pass_constants.element_gpu_address(0),
                size_in_bytes: slot.pass_constants.element_stride() as u32,
            })
        );
    }
    for texture in 0..layout.texture_count() {
        assert_eq!(
            backend.view(layout.texture_srv_index(texture)),
            Some(ViewKind::Srv(frame_pipeline::scene::TextureId(texture as usize)))
        );
    }
}

#[test]
fn frames_execute_without_binding_errors() {
    let mut renderer = demo_renderer(Duration::from_millis(1));
    let camera = OrbitCamera::default();
    let mut timer = GameTimer::new();

    for _ in 0..10 {
        timer.tick_fixed(Duration::from_millis(16));
        let stats = renderer.tick(&camera, &timer).unwrap();
        assert_eq!(stats.drawn, 7);
        assert_eq!(stats.skipped, 0);
    }
    renderer.flush().unwrap();

    let stats = renderer.backend().stats();
    assert!(stats.validation_errors.is_empty(), "{:#?}", stats.validation_errors);
    assert_eq!(stats.submissions, 10);
    assert_eq!(stats.presents, 10);
    assert_eq!(stats.draws, 70);
    assert_eq!(renderer.frame_count(), 10);
}

#[test]
fn cpu_stays_at_most_n_minus_one_frames_ahead() {
    let mut renderer = demo_renderer(Duration::from_millis(15));
    let camera = OrbitCamera::default();
    let timer = GameTimer::new();

    for tick in 0..12 {
        let update = renderer.update(&camera, &timer).unwrap();
        assert_eq!(update.frame_index, tick % FRAME_RESOURCE_COUNT);
        assert!(update.frames_in_flight <= FRAME_RESOURCE_COUNT as u64 - 1);

        let slot = renderer.ring().current();
        assert!(renderer.fence().completed_value() >= slot.fence_value);

        let stats = renderer.draw().unwrap();
        assert_eq!(stats.fence_value, tick as u64 + 1);
        assert_eq!(renderer.ring().current().fence_value, stats.fence_value);
    }
}

#[test]
fn command_list_follows_the_frame_recipe() {
    let mut renderer = demo_renderer(Duration::ZERO);
    let camera = OrbitCamera::default();
    let timer = GameTimer::new();

    // Second tick records into ring slot 1.
    renderer.tick(&camera, &timer).unwrap();
    renderer.tick(&camera, &timer).unwrap();
    let layout = renderer.layout().clone();
    let commands = renderer.backend().last_submission().to_vec();

    assert!(matches!(
        commands[0],
        RecordedCommand::Begin {
            pipeline: PipelineKind::Opaque,
            ..
        }
    ));
    assert!(matches!(commands[1], RecordedCommand::SetViewportAndScissor { .. }));
    assert_eq!(
        commands[2..9],
        [
            RecordedCommand::Transition {
                before: ResourceState::Present,
                after: ResourceState::RenderTarget,
            },
            RecordedCommand::ClearRenderTarget(CLEAR_COLOR),
            RecordedCommand::ClearDepthStencil {
                depth: 1.0,
                stencil: 0,
            },
            RecordedCommand::SetRenderTargets,
            RecordedCommand::SetRootSignature,
            RecordedCommand::SetDescriptorHeap,
            RecordedCommand::SetDescriptorTable {
                parameter: RootParameter::PassCbv,
                index: Some(layout.pass_cbv_index(1)),
            },
        ]
    );
    assert_eq!(
        commands.last(),
        Some(&RecordedCommand::Transition {
            before: ResourceState::RenderTarget,
            after: ResourceState::Present,
        })
    );

    let pipelines: Vec<PipelineKind> = commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::SetPipelineState(kind) => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(pipelines, PipelineKind::ALL);

    // Every object and material table points into frame 1's region.
    let stride = layout.frame_stride();
    for command in &commands {
        if let RecordedCommand::SetDescriptorTable {
            parameter,
            index: Some(index),
        } = command
        {
            match parameter {
                RootParameter::ObjectCbv => {
                    assert!((stride..stride + layout.object_count()).contains(index))
                }
                RootParameter::MaterialCbv => assert!(
                    (stride + layout.material_cbv_offset()..2 * stride).contains(index)
                ),
                RootParameter::DiffuseSrv => assert!(*index >= layout.texture_srv_offset()),
                RootParameter::PassCbv => assert_eq!(*index, layout.pass_cbv_index(1)),
            }
        }
    }
}

#[test]
fn moved_item_reaches_every_slot_then_stops() {
    let mut renderer = demo_renderer(Duration::ZERO);
    let camera = OrbitCamera::default();
    let timer = GameTimer::new();
    for _ in 0..FRAME_RESOURCE_COUNT {
        renderer.tick(&camera, &timer).unwrap();
    }

    let wall = renderer.scene().find_item("wall").unwrap();
    let obj = renderer.scene().item(wall).unwrap().obj_cb_index as usize;
    let moved = Mat4::from_translation(Vec3::new(0.0, 7.0, 0.0));
    assert!(renderer.scene_mut().set_world(wall, moved));

    let mut writes = Vec::new();
    for _ in 0..FRAME_RESOURCE_COUNT + 2 {
        let update = renderer.update(&camera, &timer).unwrap();
        writes.push(update.objects_written);
        renderer.draw().unwrap();
    }
    assert_eq!(writes, [1, 1, 1, 0, 0]);

    for slot in renderer.ring().slots() {
        let stride = slot.object_constants.element_stride();
        let bytes = &slot.object_constants.memory().bytes()[obj * stride..];
        let record: ObjectConstants =
            bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<ObjectConstants>()]);
        assert_eq!(record.world[3][..3], [0.0, 7.0, 0.0]);
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn item_without_material_is_skipped_and_warned_once() {
    let mut builder = SceneBuilder::new();
    let geometry = builder.add_geometry(room());
    let texture = builder.add_texture(Texture::solid("white", [255; 4]));
    let material = builder.add_material(Material::new("plain", texture));
    builder.add_item(
        RenderLayer::Opaque,
        RenderItem::new("floor", geometry, "floor").with_material(material),
    );
    builder.add_item(RenderLayer::Opaque, RenderItem::new("bare wall", geometry, "wall"));
    builder.add_item(
        RenderLayer::Transparent,
        RenderItem::new("lost mirror", geometry, "no such submesh").with_material(material),
    );

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut renderer = renderer_with(builder.build(), Duration::ZERO);
        let camera = OrbitCamera::default();
        let timer = GameTimer::new();
        for _ in 0..4 {
            let stats = renderer.tick(&camera, &timer).unwrap();
            assert_eq!(stats.drawn, 1);
            assert_eq!(stats.skipped, 2);
        }
        renderer.flush().unwrap();
        assert!(renderer.backend().stats().validation_errors.is_empty());
    });

    let text = logs.text();
    assert_eq!(text.matches("skipping draw").count(), 2, "{text}");
    assert!(text.contains("bare wall"));
    assert!(text.contains("no such submesh"));
}

#[test]
fn constant_slot_out_of_range_skips_only_that_draw() {
    let mut scene = demo_scene(None, None).unwrap();
    // sphere1 loses its object slot; woodCrate (sphere1, sphere4) its material slot.
    scene.items_mut()[0].obj_cb_index = 99;
    scene.materials_mut()[0].mat_cb_index = 50;

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut renderer = renderer_with(scene, Duration::ZERO);
        let camera = OrbitCamera::default();
        let timer = GameTimer::new();
        for tick in 0..4 {
            let update = renderer.update(&camera, &timer).unwrap();
            assert_eq!(update.skipped, if tick == 0 { 2 } else { 0 });
            let stats = renderer.draw().unwrap();
            assert_eq!(stats.drawn, 5);
            assert_eq!(stats.skipped, 2);
        }
        renderer.flush().unwrap();
        assert!(renderer.backend().stats().validation_errors.is_empty());
        assert_eq!(renderer.backend().stats().draws, 20);
    });

    let text = logs.text();
    assert_eq!(text.matches("skipping draw").count(), 2, "{text}");
    assert_eq!(text.matches("out of range, dropping its update").count(), 2, "{text}");
    assert!(text.contains("object slot 99"));
    assert!(text.contains("material slot 50"));
}

#[test]
fn device_removal_surfaces_as_device_lost() {
    let mut renderer = demo_renderer(Duration::from_millis(5));
    let camera = OrbitCamera::default();
    let timer = GameTimer::new();
    renderer.tick(&camera, &timer).unwrap();

    renderer.backend().simulate_device_removed();

    let error = renderer.tick(&camera, &timer).unwrap_err();
    assert!(error.is_device_lost(), "{error}");
    assert!(renderer.flush().unwrap_err().is_device_lost());
}

#[test]
fn empty_scene_still_clears_and_presents() {
    let mut renderer = renderer_with(SceneBuilder::new().build(), Duration::ZERO);
    assert_eq!(renderer.layout().heap_size(), 3);

    let camera = OrbitCamera::default();
    let timer = GameTimer::new();
    let stats = renderer.tick(&camera, &timer).unwrap();
    assert_eq!(stats.drawn, 0);
    renderer.flush().unwrap();

    let commands = renderer.backend().last_submission();
    assert!(commands.contains(&RecordedCommand::ClearRenderTarget(CLEAR_COLOR)));
    assert!(!commands
        .iter()
        .any(|command| matches!(command, RecordedCommand::SetPipelineState(_))));
    assert_eq!(renderer.backend().stats().presents, 1);
}
