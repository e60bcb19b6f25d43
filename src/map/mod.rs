//! Map modes and the fixed crop rectangles that belong to them.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GenericImageView};
use thiserror::Error;

/// The only capture resolution the regions below are valid for.
pub const SUPPORTED_RESOLUTION: (u32, u32) = (2560, 1440);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    Overlay,
    Spawn,
}

impl MapMode {
    pub const ALL: [MapMode; 2] = [MapMode::Overlay, MapMode::Spawn];

    pub fn as_str(self) -> &'static str {
        match self {
            MapMode::Overlay => "overlay",
            MapMode::Spawn => "spawn",
        }
    }

    /// Small region used only to decide whether a capture shows this screen.
    pub fn sniff_region(self) -> Region {
        match self {
            MapMode::Overlay => OVERLAY_SNIFF,
            MapMode::Spawn => SPAWN_SNIFF,
        }
    }

    /// Region cut out of every accepted frame when compiling the video.
    pub fn display_region(self) -> Region {
        match self {
            MapMode::Overlay => OVERLAY_DISPLAY,
            MapMode::Spawn => SPAWN_DISPLAY,
        }
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("map mode {value:?} is invalid, only \"overlay\" and \"spawn\" are accepted")]
pub struct InvalidMapMode {
    pub value: String,
}

impl FromStr for MapMode {
    type Err = InvalidMapMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MapMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| InvalidMapMode {
                value: value.to_string(),
            })
    }
}

/// Rectangle in source pixel space; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

const OVERLAY_SNIFF: Region = Region::new(1650, 1130, 1842, 1268);
const OVERLAY_DISPLAY: Region = Region::new(695, 97, 1865, 1293);
const SPAWN_SNIFF: Region = Region::new(1000, 1440 - 300, 1600, 1440);
const SPAWN_DISPLAY: Region = Region::new(813, 201, 1747, 1139);

impl Region {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left < self.right && self.top < self.bottom && self.right <= width && self.bottom <= height
    }

    /// Copies the region out of `image`. Unlike `crop_imm`, a rectangle that does not
    /// fit is an error rather than silently clamped.
    pub fn crop(&self, image: &DynamicImage) -> Result<DynamicImage, CropError> {
        let (width, height) = image.dimensions();
        if !self.fits_within(width, height) {
            return Err(CropError::CropUnsupported {
                region: *self,
                width,
                height,
            });
        }
        Ok(image.crop_imm(self.left, self.top, self.width(), self.height()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CropError {
    #[error("crop {region} does not fit within a {width}x{height} image")]
    CropUnsupported {
        region: Region,
        width: u32,
        height: u32,
    },
}
