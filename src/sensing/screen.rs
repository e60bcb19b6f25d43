use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use xcap::Monitor;

use crate::map::SUPPORTED_RESOLUTION;

/// Source of full-display captures. Implementations block; callers run them on the
/// blocking pool.
pub trait ScreenSource: Send + 'static {
    fn capture(&mut self) -> Result<DynamicImage>;

    fn resolution(&mut self) -> Result<(u32, u32)> {
        Ok(self.capture()?.dimensions())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("screen is not WQHD: detected {width}x{height}, only {}x{} is supported", SUPPORTED_RESOLUTION.0, SUPPORTED_RESOLUTION.1)]
pub struct UnsupportedResolution {
    pub width: u32,
    pub height: u32,
}

pub fn ensure_supported_resolution((width, height): (u32, u32)) -> Result<(), UnsupportedResolution> {
    if (width, height) == SUPPORTED_RESOLUTION {
        Ok(())
    } else {
        Err(UnsupportedResolution { width, height })
    }
}

pub struct XcapScreen {
    monitor: Monitor,
}

impl XcapScreen {
    pub fn open(monitor_index: usize) -> Result<Self> {
        let monitors = Monitor::all().context("failed to enumerate monitors")?;
        let count = monitors.len();
        let Some(monitor) = monitors.into_iter().nth(monitor_index) else {
            bail!("monitor {monitor_index} not found ({count} available)");
        };
        Ok(Self { monitor })
    }
}

impl ScreenSource for XcapScreen {
    fn capture(&mut self) -> Result<DynamicImage> {
        let raw = self
            .monitor
            .capture_image()
            .context("failed to capture screen. On macOS, grant Screen Recording permission to the terminal")?;
        let image = DynamicImage::ImageRgba8(raw);
        if image.dimensions() == (0, 0) {
            bail!("captured empty screenshot, possible permission issue or no display");
        }
        Ok(image)
    }
}
