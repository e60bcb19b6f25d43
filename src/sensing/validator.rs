use std::sync::Arc;

use image::DynamicImage;

use crate::map::{CropError, MapMode};

use super::fingerprint::Fingerprint;
use super::seeds::SeedStore;

/// Highest score still accepted as the expected screen.
pub const SCORE_THRESHOLD: u64 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub score: u64,
}

impl Verdict {
    pub fn from_score(score: u64) -> Self {
        Self {
            is_valid: score <= SCORE_THRESHOLD,
            score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameValidator {
    seeds: Arc<SeedStore>,
}

impl FrameValidator {
    pub fn new(seeds: Arc<SeedStore>) -> Self {
        Self { seeds }
    }

    /// Compares the sniff region of `frame` against the seed for `mode`.
    pub fn validate(&self, frame: &DynamicImage, mode: MapMode) -> Result<Verdict, CropError> {
        let sniff = mode.sniff_region().crop(frame)?;
        let candidate = Fingerprint::of(&sniff);
        let distance = self.seeds.get(mode).distance(&candidate);
        Ok(Verdict::from_score(distance.score()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets;
    use image::codecs::jpeg::JpegEncoder;

    fn validator() -> FrameValidator {
        FrameValidator::new(Arc::new(SeedStore::from_embedded().unwrap()))
    }

    fn reference(mode: MapMode) -> DynamicImage {
        let bytes = match mode {
            MapMode::Overlay => assets::OVERLAY_REFERENCE,
            MapMode::Spawn => assets::SPAWN_REFERENCE,
        };
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn reference_screen_matches_its_own_seed_exactly() {
        let validator = validator();
        for mode in MapMode::ALL {
            let verdict = validator.validate(&reference(mode), mode).unwrap();
            assert_eq!(verdict, Verdict { is_valid: true, score: 0 }, "{mode}");
        }
    }

    #[test]
    fn reference_survives_lossy_reencoding() {
        let validator = validator();
        for mode in MapMode::ALL {
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, 75)
                .encode_image(&reference(mode).to_rgb8())
                .unwrap();
            let reencoded = image::load_from_memory(&jpeg).unwrap();
            let verdict = validator.validate(&reencoded, mode).unwrap();
            assert!(verdict.is_valid, "{mode} score {}", verdict.score);
        }
    }

    #[test]
    fn other_mode_screen_is_rejected() {
        let validator = validator();
        let spawn_as_overlay = validator
            .validate(&reference(MapMode::Spawn), MapMode::Overlay)
            .unwrap();
        assert!(!spawn_as_overlay.is_valid, "score {}", spawn_as_overlay.score);

        let overlay_as_spawn = validator
            .validate(&reference(MapMode::Overlay), MapMode::Spawn)
            .unwrap();
        assert!(!overlay_as_spawn.is_valid, "score {}", overlay_as_spawn.score);
    }

    #[test]
    fn blank_screen_is_rejected() {
        let blank = DynamicImage::new_rgb8(2560, 1440);
        let verdict = validator().validate(&blank, MapMode::Overlay).unwrap();
        assert!(!verdict.is_valid);
        assert!(verdict.score > SCORE_THRESHOLD);
    }

    #[test]
    fn validation_is_deterministic() {
        let validator = validator();
        let frame = reference(MapMode::Overlay);
        let first = validator.validate(&frame, MapMode::Spawn).unwrap();
        let second = validator.validate(&frame, MapMode::Spawn).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(Verdict::from_score(SCORE_THRESHOLD).is_valid);
        assert!(!Verdict::from_score(500_001).is_valid);
        assert!(Verdict::from_score(0).is_valid);
    }

    #[test]
    fn undersized_frame_is_crop_unsupported() {
        let frame = DynamicImage::new_rgb8(1920, 1080);
        let err = validator().validate(&frame, MapMode::Spawn).unwrap_err();
        assert!(matches!(err, CropError::CropUnsupported { width: 1920, height: 1080, .. }));
    }
}
