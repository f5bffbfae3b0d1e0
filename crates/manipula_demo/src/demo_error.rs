use frame_pipeline::FrameError;

pub type DemoResult<T, E = DemoReport> = core::result::Result<T, E>;

pub struct DemoReport {
    inner: eyre::Report,
}

impl DemoReport {
    /// True when the report was raised because the graphics device went away.
    pub fn is_device_lost(&self) -> bool {
        self.inner
            .downcast_ref::<FrameError>()
            .is_some_and(FrameError::is_device_lost)
    }
}

impl From<eyre::Report> for DemoReport {
    fn from(report: eyre::Report) -> Self {
        Self { inner: report }
    }
}

impl From<FrameError> for DemoReport {
    fn from(error: FrameError) -> Self {
        Self {
            inner: eyre::Report::new(error),
        }
    }
}

impl std::fmt::Display for DemoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::fmt::Debug for DemoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for DemoReport {
    fn from(error: windows::core::Error) -> Self {
        Self {
            inner: eyre::Report::new(WrappedWindowsError::from(error)),
        }
    }
}

/// Keeps the HRESULT text on one line in reports.
#[cfg(windows)]
pub struct WrappedWindowsError {
    inner: windows::core::Error,
}

#[cfg(windows)]
impl From<windows::core::Error> for WrappedWindowsError {
    fn from(error: windows::core::Error) -> Self {
        Self { inner: error }
    }
}

#[cfg(windows)]
impl std::error::Error for WrappedWindowsError {}

#[cfg(windows)]
impl std::fmt::Display for WrappedWindowsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(windows)]
impl std::fmt::Debug for WrappedWindowsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_survives_the_report() {
        let report = DemoReport::from(FrameError::DeviceLost("hung".to_owned()));
        assert!(report.is_device_lost());
        assert!(report.to_string().contains("hung"));

        let report = DemoReport::from(eyre::eyre!("bad flag"));
        assert!(!report.is_device_lost());
    }
}
