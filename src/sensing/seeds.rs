use thiserror::Error;

use crate::assets;
use crate::map::{CropError, MapMode};

use super::fingerprint::Fingerprint;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reference image for {mode} could not be decoded: {source}")]
    Decode {
        mode: MapMode,
        #[source]
        source: image::ImageError,
    },
    #[error("reference image for {mode} could not be cropped: {source}")]
    Crop {
        mode: MapMode,
        #[source]
        source: CropError,
    },
}

/// Fingerprints of the reference screens, one per map mode. Built once at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct SeedStore {
    overlay: Fingerprint,
    spawn: Fingerprint,
}

impl SeedStore {
    pub fn from_embedded() -> Result<Self, SeedError> {
        Self::from_references(assets::OVERLAY_REFERENCE, assets::SPAWN_REFERENCE)
    }

    pub fn from_references(overlay: &[u8], spawn: &[u8]) -> Result<Self, SeedError> {
        Ok(Self {
            overlay: seed_fingerprint(MapMode::Overlay, overlay)?,
            spawn: seed_fingerprint(MapMode::Spawn, spawn)?,
        })
    }

    pub fn get(&self, mode: MapMode) -> &Fingerprint {
        match mode {
            MapMode::Overlay => &self.overlay,
            MapMode::Spawn => &self.spawn,
        }
    }
}

fn seed_fingerprint(mode: MapMode, bytes: &[u8]) -> Result<Fingerprint, SeedError> {
    let reference =
        image::load_from_memory(bytes).map_err(|source| SeedError::Decode { mode, source })?;
    let sniff = mode
        .sniff_region()
        .crop(&reference)
        .map_err(|source| SeedError::Crop { mode, source })?;
    Ok(Fingerprint::of(&sniff))
}
