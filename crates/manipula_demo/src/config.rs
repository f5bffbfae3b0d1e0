use std::path::PathBuf;
use std::time::Duration;

use eyre::eyre;

use crate::demo_error::DemoResult;

pub const DEFAULT_HEADLESS_FRAMES: u64 = 300;

#[derive(Clone, Debug, PartialEq)]
pub struct DemoConfig {
    pub use_warp_device: bool,
    pub headless: bool,
    /// Stop after this many frames. Windowed runs default to running until closed.
    pub frames: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// OBJ or PLY file appended to the scene.
    pub mesh: Option<PathBuf>,
    /// Directory holding PNG replacements for the generated scene textures.
    pub textures: Option<PathBuf>,
    /// Simulated GPU time per submission in headless mode.
    pub latency: Duration,
    pub verbose: bool,
    /// Arguments that were not recognised. Reported once logging is up.
    pub ignored: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            use_warp_device: false,
            headless: false,
            frames: None,
            width: 1280,
            height: 720,
            vsync: false,
            mesh: None,
            textures: None,
            latency: Duration::ZERO,
            verbose: false,
            ignored: Vec::new(),
        }
    }
}

impl DemoConfig {
    /// Parse `-flag` or `/flag` arguments, case-insensitively. The program name
    /// must already be stripped.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> DemoResult<Self> {
        let mut config = DemoConfig::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let Some(flag) = arg.strip_prefix('-').or_else(|| arg.strip_prefix('/')) else {
                config.ignored.push(arg);
                continue;
            };
            match flag.to_ascii_lowercase().as_str() {
                "warp" => config.use_warp_device = true,
                "headless" => config.headless = true,
                "vsync" => config.vsync = true,
                "verbose" => config.verbose = true,
                "frames" => config.frames = Some(number(&arg, args.next())?),
                "width" => config.width = number(&arg, args.next())?,
                "height" => config.height = number(&arg, args.next())?,
                "latency-ms" => config.latency = Duration::from_millis(number(&arg, args.next())?),
                "mesh" => {
                    let path = args
                        .next()
                        .ok_or_else(|| eyre!("{arg} expects a file path"))?;
                    config.mesh = Some(PathBuf::from(path));
                }
                "textures" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| eyre!("{arg} expects a directory"))?;
                    config.textures = Some(PathBuf::from(dir));
                }
                _ => config.ignored.push(arg),
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(eyre!("window size {}x{} is empty", config.width, config.height).into());
        }
        Ok(config)
    }

    pub fn frame_limit(&self) -> Option<u64> {
        match (self.frames, self.headless) {
            (Some(frames), _) => Some(frames),
            (None, true) => Some(DEFAULT_HEADLESS_FRAMES),
            (None, false) => None,
        }
    }

    pub fn title(&self) -> String {
        let mut title = "Manipula".to_owned();
        if self.use_warp_device {
            title.push_str(" (WARP)");
        }
        title
    }
}

fn number<T: std::str::FromStr>(flag: &str, value: Option<String>) -> DemoResult<T> {
    let value = value.ok_or_else(|| eyre!("{flag} expects a number"))?;
    value
        .parse()
        .map_err(|_| eyre!("{flag} expects a number, got {value:?}").into())
}
