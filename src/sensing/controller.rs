use std::future::Future;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{capture_loop, Backoff, CaptureCounters, Sampler};
use super::screen::ScreenSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Owns the running capture loop of one recording.
pub struct RecordingController {
    handle: Option<JoinHandle<Result<CaptureCounters>>>,
    cancel_token: Option<CancellationToken>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start<S: ScreenSource>(&mut self, sampler: Sampler<S>, backoff: Backoff) -> Result<()> {
        if self.handle.is_some() {
            bail!("recording already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(sampler, backoff, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Waits until either the loop ends on its own (a fatal error) or `shutdown`
    /// resolves, in which case the loop is stopped gracefully.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<CaptureCounters> {
        let Some(handle) = self.handle.as_mut() else {
            bail!("recording is not active");
        };

        let finished = tokio::select! {
            joined = handle => Some(joined),
            _ = shutdown => None,
        };

        match finished {
            Some(joined) => {
                self.handle = None;
                self.cancel_token = None;
                joined.context("capture loop task failed to join")?
            }
            None => {
                log_info!("stop requested, finishing the current capture");
                self.stop().await
            }
        }
    }

    pub async fn stop(&mut self) -> Result<CaptureCounters> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle.await.context("capture loop task failed to join")?,
            None => Ok(CaptureCounters::default()),
        }
    }
}

impl Default for RecordingController {
    fn default() -> Self {
        Self::new()
    }
}
