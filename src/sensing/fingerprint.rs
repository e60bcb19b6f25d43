use image::imageops::{self, FilterType};
use image::DynamicImage;

/// Edge length of the icon a fingerprint is built from.
pub const ICON_SIZE: u32 = 11;

/// Perceptual signature of an image: an area-averaged `ICON_SIZE` square icon,
/// stored as luma plus two chroma channels in `[0, 255]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    cells: Vec<[f32; 3]>,
}

/// Per-channel sum of squared differences between two fingerprints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDistance {
    pub luma: f64,
    pub blue: f64,
    pub red: f64,
}

impl ChannelDistance {
    pub fn score(&self) -> u64 {
        (self.luma + self.blue + self.red) as u64
    }
}

impl Fingerprint {
    pub fn of(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let icon = imageops::resize(&rgb, ICON_SIZE, ICON_SIZE, FilterType::Triangle);
        let cells = icon
            .pixels()
            .map(|pixel| {
                let [r, g, b] = pixel.0.map(f32::from);
                to_ycbcr(r, g, b)
            })
            .collect();
        Self { cells }
    }

    pub fn distance(&self, other: &Fingerprint) -> ChannelDistance {
        let mut distance = ChannelDistance {
            luma: 0.0,
            blue: 0.0,
            red: 0.0,
        };
        for (a, b) in self.cells.iter().zip(&other.cells) {
            distance.luma += squared(a[0], b[0]);
            distance.blue += squared(a[1], b[1]);
            distance.red += squared(a[2], b[2]);
        }
        distance
    }
}

fn squared(a: f32, b: f32) -> f64 {
    let d = f64::from(a) - f64::from(b);
    d * d
}

// Full-range BT.601.
fn to_ycbcr(r: f32, g: f32, b: f32) -> [f32; 3] {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    [y, cb, cr]
}
