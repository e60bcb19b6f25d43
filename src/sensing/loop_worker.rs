use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::map::{MapMode, SUPPORTED_RESOLUTION};
use crate::store::{FrameStamp, FrameStore, PersistError};

use super::screen::ScreenSource;
use super::validator::FrameValidator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Sampling,
    BackoffValid,
    BackoffInvalid,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Accepted,
    Rejected,
    BackoffElapsed,
    Cancelled,
}

impl SchedulerState {
    pub fn next(self, event: SchedulerEvent) -> Self {
        match (self, event) {
            (SchedulerState::Stopped, _) | (_, SchedulerEvent::Cancelled) => SchedulerState::Stopped,
            (SchedulerState::Sampling, SchedulerEvent::Accepted) => SchedulerState::BackoffValid,
            (SchedulerState::Sampling, SchedulerEvent::Rejected) => SchedulerState::BackoffInvalid,
            (SchedulerState::BackoffValid | SchedulerState::BackoffInvalid, SchedulerEvent::BackoffElapsed) => {
                SchedulerState::Sampling
            }
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub after_valid: Duration,
    pub after_invalid: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            after_valid: Duration::from_secs(30),
            after_invalid: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounters {
    pub valid: u64,
    pub non_valid: u64,
}

pub type Clock = Box<dyn FnMut() -> NaiveTime + Send>;

pub fn system_clock() -> Clock {
    Box::new(|| Local::now().time())
}

/// Everything one sampling iteration needs. Moved onto the blocking pool for each
/// iteration and handed back afterwards.
pub struct Sampler<S: ScreenSource> {
    screen: S,
    validator: FrameValidator,
    store: FrameStore,
    mode: MapMode,
    clock: Clock,
    counters: CaptureCounters,
    last_stamp: Option<FrameStamp>,
}

impl<S: ScreenSource> Sampler<S> {
    pub fn new(screen: S, validator: FrameValidator, store: FrameStore, mode: MapMode, clock: Clock) -> Self {
        Self {
            screen,
            validator,
            store,
            mode,
            clock,
            counters: CaptureCounters::default(),
            last_stamp: None,
        }
    }

    pub fn counters(&self) -> CaptureCounters {
        self.counters
    }

    /// Capture, validate, and persist or discard. Errors are fatal to the loop; a frame
    /// that fails validation is not an error.
    pub fn sample(&mut self) -> Result<SchedulerEvent> {
        let frame = self.screen.capture().context("screen capture failed")?;
        let stamp = FrameStamp::from_time((self.clock)());
        log_debug!("captured frame"; width = frame.width(), height = frame.height(), stamp = stamp);

        let verdict = match self.validator.validate(&frame, self.mode) {
            Ok(verdict) if verdict.is_valid => verdict,
            Ok(verdict) => {
                self.counters.non_valid += 1;
                log_info!(
                    "screenshot was not valid";
                    non_valid_count = self.counters.non_valid,
                    valid_count = self.counters.valid,
                    score = verdict.score
                );
                return Ok(SchedulerEvent::Rejected);
            }
            Err(err) => {
                self.counters.non_valid += 1;
                log_error!(
                    "screenshot could not be validated";
                    err = err,
                    non_valid_count = self.counters.non_valid,
                    valid_count = self.counters.valid
                );
                return Ok(SchedulerEvent::Rejected);
            }
        };

        if let Some(last) = self.last_stamp {
            if last.wraps_before(&stamp) {
                log_warn!(
                    "capture clock went past midnight, frames will no longer sort chronologically";
                    previous = last,
                    current = stamp
                );
            }
        }

        match self.store.persist(stamp, &frame) {
            Ok(path) => {
                self.counters.valid += 1;
                self.last_stamp = Some(stamp);
                let (width, height) = SUPPORTED_RESOLUTION;
                log_info!(
                    "screenshot was valid";
                    non_valid_count = self.counters.non_valid,
                    valid_count = self.counters.valid,
                    filename = stamp.file_name(),
                    score = verdict.score,
                    bounds = format!("{width}x{height}"),
                    path = path.display()
                );
            }
            Err(PersistError::AlreadyExists { path }) => {
                log_warn!("frame already exists, keeping the earlier capture"; path = path.display());
            }
            Err(err) => return Err(err).context("failed to persist frame"),
        }
        Ok(SchedulerEvent::Accepted)
    }
}

/// Drives `Sampling -> Backoff* -> Sampling` until `cancel_token` fires. Returns the
/// final counters, or the first fatal capture/persist error.
pub async fn capture_loop<S: ScreenSource>(
    sampler: Sampler<S>,
    backoff: Backoff,
    cancel_token: CancellationToken,
) -> Result<CaptureCounters> {
    let mut sampler = Some(sampler);
    let mut state = SchedulerState::Sampling;
    let mut counters = CaptureCounters::default();

    log_info!("starting to capture screenshots");

    while state != SchedulerState::Stopped {
        let event = match state {
            SchedulerState::Sampling => {
                let Some(mut current) = sampler.take() else {
                    break;
                };
                let started = Instant::now();
                // The iteration runs to completion even if cancellation arrives meanwhile,
                // so a frame is either fully written or not written at all.
                let (returned, outcome) = tokio::task::spawn_blocking(move || {
                    let outcome = current.sample();
                    (current, outcome)
                })
                .await
                .context("capture worker join failed")?;
                counters = returned.counters();
                sampler = Some(returned);
                log_debug!("sample took {}ms", started.elapsed().as_millis());

                let event = outcome?;
                if cancel_token.is_cancelled() {
                    SchedulerEvent::Cancelled
                } else {
                    event
                }
            }
            SchedulerState::BackoffValid | SchedulerState::BackoffInvalid => {
                let delay = if state == SchedulerState::BackoffValid {
                    backoff.after_valid
                } else {
                    backoff.after_invalid
                };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => SchedulerEvent::BackoffElapsed,
                    _ = cancel_token.cancelled() => SchedulerEvent::Cancelled,
                }
            }
            SchedulerState::Stopped => SchedulerEvent::Cancelled,
        };
        state = state.next(event);
    }

    log_info!(
        "capture loop shutting down";
        valid_count = counters.valid,
        non_valid_count = counters.non_valid
    );
    Ok(counters)
}
