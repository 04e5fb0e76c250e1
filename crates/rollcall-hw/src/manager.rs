//! Device connection manager.
//!
//! Owns the acquire/release policy for the camera capability. Acquisition
//! is refused up front when the hosting surface is not a trusted context —
//! the check runs before any device request is attempted.

use crate::camera::V4l2Source;
use crate::frame::{CaptureError, FrameSource, SimulatedSource};

/// Which frame source backs a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Real camera over V4L2.
    V4l2 { device: String },
    /// Synthetic frames for camera-less deployments and tests.
    Simulated { width: u32, height: u32 },
}

/// Acquires and hands out frame sources.
///
/// `secure_context` is supplied by the hosting deployment; an untrusted
/// surface never reaches the device layer.
pub struct CameraManager {
    kind: SourceKind,
    secure_context: bool,
}

impl CameraManager {
    pub fn new(kind: SourceKind, secure_context: bool) -> Self {
        Self { kind, secure_context }
    }

    /// Acquire a live frame source, or a distinguishable failure reason.
    pub fn acquire(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if !self.secure_context {
            return Err(CaptureError::InsecureContext);
        }

        match &self.kind {
            SourceKind::V4l2 { device } => {
                let source = V4l2Source::open(device)?;
                Ok(Box::new(source))
            }
            SourceKind::Simulated { width, height } => {
                tracing::debug!(width, height, "acquired simulated frame source");
                Ok(Box::new(SimulatedSource::with_dimensions(*width, *height)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insecure_context_is_refused_before_the_device_is_touched() {
        // A nonexistent device would report not-found — insecure-context
        // winning proves the check runs first.
        let manager = CameraManager::new(
            SourceKind::V4l2 { device: "/dev/rollcall-no-such-video".into() },
            false,
        );
        let err = manager.acquire().unwrap_err();
        assert_eq!(err.reason(), "insecure-context");
    }

    #[test]
    fn simulated_source_acquires_with_requested_geometry() {
        let manager =
            CameraManager::new(SourceKind::Simulated { width: 640, height: 360 }, true);
        let mut source = manager.acquire().unwrap();
        let frame = source.grab().unwrap();
        assert_eq!((frame.width, frame.height), (640, 360));
    }

    #[test]
    fn v4l2_acquisition_failure_reaches_the_caller() {
        let manager = CameraManager::new(
            SourceKind::V4l2 { device: "/dev/rollcall-no-such-video".into() },
            true,
        );
        let err = manager.acquire().unwrap_err();
        assert_eq!(err.reason(), "not-found");
    }
}
