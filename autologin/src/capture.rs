//! Screen capture through `xcap`.

use std::time::SystemTime;

use image::GrayImage;
use tracing::debug;

use crate::errors::AutoLoginError;
use crate::types::Point;

/// A captured screen frame. Immutable once captured.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGBA8 pixel data, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Virtual-screen coordinates of the frame's top-left corner. Match
    /// positions inside the frame are offset by this to obtain click points.
    pub origin: Point,
    pub captured_at: SystemTime,
}

impl Frame {
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32, origin: Point) -> Self {
        Self {
            data,
            width,
            height,
            origin,
            captured_at: SystemTime::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Grayscale view of the frame for correlation. `None` for an empty
    /// frame or a buffer that does not hold `width * height` RGBA pixels.
    pub(crate) fn to_luma(&self) -> Option<GrayImage> {
        if self.is_empty() {
            return None;
        }
        let rgba = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())?;
        Some(image::DynamicImage::ImageRgba8(rgba).to_luma8())
    }
}

/// Source of screen frames. The production implementation captures a monitor;
/// tests substitute prepared frames.
#[async_trait::async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// Capture the current screen contents. No retry, no side effects beyond
    /// the capture call itself; transient failures are the caller's problem.
    async fn capture(&self) -> Result<Frame, AutoLoginError>;
}

/// Captures the primary monitor.
pub struct MonitorCapturer;

#[async_trait::async_trait]
impl ScreenCapturer for MonitorCapturer {
    async fn capture(&self) -> Result<Frame, AutoLoginError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutoLoginError::Capture(format!("failed to list monitors: {e}")))?;

        let mut primary = None;
        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    primary = Some(monitor);
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    return Err(AutoLoginError::Capture(format!(
                        "error checking monitor primary status: {e}"
                    )));
                }
            }
        }
        let primary = primary
            .ok_or_else(|| AutoLoginError::Capture("could not find primary monitor".to_string()))?;

        let x = primary
            .x()
            .map_err(|e| AutoLoginError::Capture(format!("failed to get monitor x: {e}")))?;
        let y = primary
            .y()
            .map_err(|e| AutoLoginError::Capture(format!("failed to get monitor y: {e}")))?;

        let image = primary
            .capture_image()
            .map_err(|e| AutoLoginError::Capture(format!("failed to capture screen: {e}")))?;

        let (width, height) = (image.width(), image.height());
        debug!(width, height, "captured primary monitor");

        Ok(Frame::from_rgba(
            image.into_raw(),
            width,
            height,
            Point::new(x, y),
        ))
    }
}
