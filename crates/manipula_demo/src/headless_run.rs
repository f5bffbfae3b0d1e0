use std::time::Duration;
use std::time::Instant;

use eyre::eyre;
use frame_pipeline::headless::HeadlessBackend;
use frame_pipeline::headless::HeadlessConfig;
use frame_pipeline::scene::demo_scene;
use frame_pipeline::FrameRenderer;
use frame_pipeline::GameTimer;
use frame_pipeline::OrbitCamera;
use tracing::debug;
use tracing::info;

use crate::config::DemoConfig;
use crate::demo_error::DemoResult;

const FRAME_TIME: Duration = Duration::from_micros(16_667);
const ORBIT_SPEED: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessSummary {
    pub frames: u64,
    pub draws: u64,
    pub skipped: u64,
}

/// Drive the demo scene without a window. The camera orbits at a fixed rate
/// and every tick advances the timer by one 60 Hz frame.
pub fn run_headless(config: &DemoConfig) -> DemoResult<HeadlessSummary> {
    let backend = HeadlessBackend::new(HeadlessConfig {
        width: config.width,
        height: config.height,
        latency: config.latency,
        ..Default::default()
    })?;
    let scene = demo_scene(config.mesh.as_deref(), config.textures.as_deref())?;
    let mut renderer = FrameRenderer::new(backend, scene)?;

    let mut camera = OrbitCamera::default();
    camera.set_aspect(config.width, config.height);
    let mut timer = GameTimer::new();
    let mut summary = HeadlessSummary::default();
    let frames = config.frame_limit().unwrap_or(crate::config::DEFAULT_HEADLESS_FRAMES);

    let started = Instant::now();
    for _ in 0..frames {
        timer.tick_fixed(FRAME_TIME);
        camera.theta += ORBIT_SPEED * timer.delta_time();
        let stats = renderer.tick(&camera, &timer)?;
        summary.frames += 1;
        summary.draws += stats.drawn as u64;
        summary.skipped += stats.skipped as u64;
        debug!(fence_value = stats.fence_value, "frame done");
    }
    renderer.flush()?;

    let stats = renderer.backend().stats();
    if !stats.validation_errors.is_empty() {
        return Err(eyre!(
            "{} command lists failed validation, first: {}",
            stats.validation_errors.len(),
            stats.validation_errors[0]
        )
        .into());
    }
    info!(
        frames = summary.frames,
        draws = summary.draws,
        skipped = summary.skipped,
        presents = stats.presents,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "headless run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_run_draws_every_item() {
        let config = DemoConfig {
            headless: true,
            frames: Some(8),
            latency: Duration::from_millis(1),
            ..Default::default()
        };
        let summary = run_headless(&config).unwrap();
        assert_eq!(
            summary,
            HeadlessSummary {
                frames: 8,
                draws: 8 * 7,
                skipped: 0,
            }
        );
    }

    #[test]
    fn missing_mesh_is_reported() {
        let config = DemoConfig {
            headless: true,
            frames: Some(1),
            mesh: Some("does/not/exist.ply".into()),
            ..Default::default()
        };
        assert!(run_headless(&config).is_err());
    }
}
