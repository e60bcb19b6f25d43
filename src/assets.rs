//! Reference images compiled into the binary.
//!
//! The shipped PNGs are synthetic 2560x1440 placeholders with the right geometry, not
//! real game captures, so every real screen is rejected until `assets/overlay_map.png`
//! and `assets/spawn_map.png` are replaced with actual captures of those screens.

/// Reference for the tactical map overlay (placeholder until replaced by a real capture).
pub const OVERLAY_REFERENCE: &[u8] = include_bytes!("../assets/overlay_map.png");

/// Reference for the spawn selection screen (placeholder until replaced by a real capture).
pub const SPAWN_REFERENCE: &[u8] = include_bytes!("../assets/spawn_map.png");

pub const LOGO: &[u8] = include_bytes!("../assets/logo.png");
