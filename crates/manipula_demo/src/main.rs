pub mod config;
pub mod demo_error;
pub mod headless_run;
#[cfg_attr(not(windows), allow(dead_code))]
pub mod input_map;

#[cfg(windows)]
pub mod create_window;
#[cfg(windows)]
pub mod demo_window;
#[cfg(windows)]
pub mod window_class;
#[cfg(windows)]
pub mod window_run;

use config::DemoConfig;
use demo_error::DemoResult;
use headless_run::run_headless;
use tracing::info;
use tracing::warn;
use tracing::Level;

pub fn main() -> DemoResult<()> {
    color_eyre::install()?;
    let config = DemoConfig::from_args(std::env::args().skip(1))?;

    tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_target(false)
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();
    for arg in &config.ignored {
        warn!(arg = %arg, "ignoring unrecognised argument");
    }
    info!(?config, "Ahoy, world!");

    if config.headless {
        run_headless(&config)?;
        return Ok(());
    }
    run_windowed(&config)
}

#[cfg(windows)]
fn run_windowed(config: &DemoConfig) -> DemoResult<()> {
    window_run::run_windowed(config)
}

#[cfg(not(windows))]
fn run_windowed(config: &DemoConfig) -> DemoResult<()> {
    warn!("windowed mode needs Direct3D 12, running headless instead");
    run_headless(config)?;
    Ok(())
}
