//! rollcall-hw — Frame-source abstraction for the attendance camera.
//!
//! Provides the device connection manager, a V4L2-backed source, and a
//! simulated source for camera-less deployments and deterministic tests.

pub mod camera;
pub mod frame;
pub mod manager;

pub use camera::V4l2Source;
pub use frame::{CaptureError, FrameInfo, FrameSource, SimulatedSource};
pub use manager::{CameraManager, SourceKind};
