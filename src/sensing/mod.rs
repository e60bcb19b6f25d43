pub mod controller;
pub mod fingerprint;
pub mod loop_worker;
pub mod screen;
pub mod seeds;
pub mod validator;

pub use controller::RecordingController;
pub use loop_worker::{Backoff, CaptureCounters, Sampler};
pub use screen::{ensure_supported_resolution, ScreenSource, XcapScreen};
pub use seeds::SeedStore;
pub use validator::{FrameValidator, Verdict};
