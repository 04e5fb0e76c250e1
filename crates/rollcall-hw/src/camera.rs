//! V4L2 camera capture via the `v4l` crate.

use std::io;
use std::path::Path;

use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::frame::{CaptureError, FrameInfo, FrameSource};

/// Requested capture dimensions; the driver may negotiate down.
const IDEAL_WIDTH: u32 = 1280;
const IDEAL_HEIGHT: u32 = 720;

/// V4L2-backed frame source.
///
/// Holds the narrowest viable capability: a single video capture stream,
/// no audio. The handle is dropped on `release`, which closes the device.
pub struct V4l2Source {
    device: Option<Device>,
    width: u32,
    height: u32,
    device_path: String,
}

/// Map an open(2)-level error on the device node to the diagnostic taxonomy.
fn classify_open_error(err: &io::Error, path: &str) -> CaptureError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(path.to_string()),
        io::ErrorKind::NotFound => CaptureError::NotFound(path.to_string()),
        _ if err.raw_os_error() == Some(EBUSY) => CaptureError::InUse(path.to_string()),
        _ => CaptureError::Unknown(format!("{path}: {err}")),
    }
}

/// `EBUSY` from <asm-generic/errno-base.h>.
const EBUSY: i32 = 16;

impl V4l2Source {
    /// Open a V4L2 device by path (e.g. "/dev/video0") and negotiate a
    /// single video stream.
    pub fn open(device_path: &str) -> Result<Self, CaptureError> {
        if !Path::new(device_path).exists() {
            return Err(CaptureError::NotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path)
            .map_err(|e| classify_open_error(&e, device_path))?;

        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::Unknown(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CaptureError::ConstraintError(format!(
                "{device_path}: device does not support video capture"
            )));
        }

        // Request the ideal format; accept whatever the driver negotiates.
        // Only the frame geometry matters downstream — pixels never cross
        // the oracle boundary.
        let mut fmt = device
            .format()
            .map_err(|e| CaptureError::ConstraintError(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = IDEAL_WIDTH;
        fmt.height = IDEAL_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CaptureError::ConstraintError(format!("failed to set format: {e}")))?;

        if negotiated.width == 0 || negotiated.height == 0 {
            return Err(CaptureError::ConstraintError(format!(
                "{device_path}: driver negotiated a zero-sized frame"
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device: Some(device),
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
        })
    }
}

impl FrameSource for V4l2Source {
    fn grab(&mut self) -> Result<FrameInfo, CaptureError> {
        let device = self.device.as_ref().ok_or_else(|| {
            CaptureError::Unknown(format!("{}: frame source released", self.device_path))
        })?;

        let mut stream = MmapStream::with_buffers(device, BufType::VideoCapture, 4)
            .map_err(|e| CaptureError::Unknown(format!("failed to create mmap stream: {e}")))?;

        let (_buf, meta) = stream
            .next()
            .map_err(|e| CaptureError::Unknown(format!("failed to dequeue buffer: {e}")))?;

        Ok(FrameInfo {
            width: self.width,
            height: self.height,
            sequence: meta.sequence,
        })
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            tracing::info!(device = %self.device_path, "camera released");
        }
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.release();
    }
}
