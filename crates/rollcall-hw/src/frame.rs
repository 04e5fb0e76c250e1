//! Frame source contract, frame descriptors, and the simulated source.

use thiserror::Error;

/// Why a camera capability could not be acquired (or a frame grabbed).
///
/// These reasons are user-visible diagnostics and must stay distinguishable;
/// the session surfaces them verbatim on its event channel.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("permission denied: {0} — allow camera access for this service")]
    PermissionDenied(String),
    #[error("no camera found: {0}")]
    NotFound(String),
    #[error("camera in use or hardware error: {0}")]
    InUse(String),
    #[error("camera constraints not satisfied: {0}")]
    ConstraintError(String),
    #[error("insecure context: camera access requires a trusted origin")]
    InsecureContext,
    #[error("camera error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Stable machine-readable reason code for status payloads.
    pub fn reason(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "permission-denied",
            CaptureError::NotFound(_) => "not-found",
            CaptureError::InUse(_) => "in-use",
            CaptureError::ConstraintError(_) => "constraint-error",
            CaptureError::InsecureContext => "insecure-context",
            CaptureError::Unknown(_) => "unknown",
        }
    }
}

/// Descriptor of one grabbed frame. No pixel payload crosses this boundary —
/// the detection oracle consumes dimensions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

/// A live video capability: one stream, no audio.
///
/// `release` is idempotent teardown — safe to call repeatedly and on a
/// source whose underlying handle is already gone. After `release`, `grab`
/// fails; it never silently produces frames from a torn-down device.
pub trait FrameSource: Send {
    /// Dequeue the next frame and return its descriptor.
    fn grab(&mut self) -> Result<FrameInfo, CaptureError>;

    /// Stop the underlying stream and drop the device handle.
    fn release(&mut self);
}

/// Synthetic frame source for camera-less deployments and tests.
///
/// Emits a fixed 1280×720 descriptor by default with a monotonically
/// increasing sequence number.
pub struct SimulatedSource {
    width: u32,
    height: u32,
    sequence: u32,
    released: bool,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::with_dimensions(1280, 720)
    }

    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self { width, height, sequence: 0, released: false }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SimulatedSource {
    fn grab(&mut self) -> Result<FrameInfo, CaptureError> {
        if self.released {
            return Err(CaptureError::Unknown("frame source released".to_string()));
        }
        self.sequence = self.sequence.wrapping_add(1);
        Ok(FrameInfo {
            width: self.width,
            height: self.height,
            sequence: self.sequence,
        })
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_source_counts_sequences() {
        let mut source = SimulatedSource::new();
        let a = source.grab().unwrap();
        let b = source.grab().unwrap();

        assert_eq!((a.width, a.height), (1280, 720));
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
    }

    #[test]
    fn release_is_idempotent_and_stops_grabs() {
        let mut source = SimulatedSource::with_dimensions(640, 360);
        source.grab().unwrap();
        source.release();
        source.release();

        assert!(source.grab().is_err());
    }

    #[test]
    fn reason_codes_are_distinct() {
        let errors = [
            CaptureError::PermissionDenied("x".into()),
            CaptureError::NotFound("x".into()),
            CaptureError::InUse("x".into()),
            CaptureError::ConstraintError("x".into()),
            CaptureError::InsecureContext,
            CaptureError::Unknown("x".into()),
        ];
        let mut reasons: Vec<&str> = errors.iter().map(|e| e.reason()).collect();
        reasons.sort_unstable();
        reasons.dedup();
        assert_eq!(reasons.len(), errors.len());
    }
}
