//! Wires the sensing loop, the frame store and the video compiler into the
//! `record start` and `record convert` commands.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::map::MapMode;
use crate::sensing::loop_worker::system_clock;
use crate::sensing::{
    ensure_supported_resolution, CaptureCounters, FrameValidator, RecordingController, Sampler,
    ScreenSource, SeedStore, XcapScreen,
};
use crate::settings::{RecorderSettings, SettingsStore};
use crate::store::{default_base_dir, validate_session_name, FrameStore, SessionDir};
use crate::video::{compile, CompileReport, Compositor, GlyphPainter, LabelPainter, MissingFont};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Records until Ctrl-C / SIGTERM, then compiles the session unless disabled.
pub async fn record_start(name: &str, mode: MapMode, no_compile: bool) -> Result<()> {
    validate_session_name(name)?;
    let base = default_base_dir()?;
    let settings = SettingsStore::load(&base)?.settings().clone();

    let monitor_index = settings.monitor_index;
    let screen = tokio::task::spawn_blocking(move || XcapScreen::open(monitor_index))
        .await
        .context("monitor lookup task failed")??;

    let (session, counters) = record(screen, &base, name, mode, &settings, shutdown_signal()).await?;
    log_info!(
        "recording stopped";
        session = session.name(),
        valid_count = counters.valid,
        non_valid_count = counters.non_valid
    );

    if no_compile || !settings.compile_on_stop {
        log_info!("skipping video compilation"; session = session.name());
        return Ok(());
    }
    let name = name.to_string();
    let report = tokio::task::spawn_blocking(move || convert(&base, &name, mode, &settings))
        .await
        .context("video compilation task failed")??;
    log_report(&report);
    Ok(())
}

/// Compiles a previously recorded session.
pub async fn record_convert(name: &str, mode: MapMode) -> Result<()> {
    validate_session_name(name)?;
    let base = default_base_dir()?;
    let settings = SettingsStore::load(&base)?.settings().clone();
    let name = name.to_string();
    let report = tokio::task::spawn_blocking(move || convert(&base, &name, mode, &settings))
        .await
        .context("video compilation task failed")??;
    log_report(&report);
    Ok(())
}

/// Checks the display, creates `<base>/<name>/` and samples `screen` until `shutdown`
/// resolves or the loop hits a fatal error.
pub async fn record<S, F>(
    screen: S,
    base: &Path,
    name: &str,
    mode: MapMode,
    settings: &RecorderSettings,
    shutdown: F,
) -> Result<(SessionDir, CaptureCounters)>
where
    S: ScreenSource,
    F: Future<Output = ()>,
{
    let (screen, resolution) = tokio::task::spawn_blocking(move || {
        let mut screen = screen;
        let resolution = screen.resolution();
        (screen, resolution)
    })
    .await
    .context("resolution probe task failed")?;
    let resolution = resolution.context("failed to determine the screen resolution")?;
    ensure_supported_resolution(resolution)?;

    let seeds = SeedStore::from_embedded().context("failed to fingerprint the reference screens")?;
    let session = SessionDir::create(base, name)?;
    log_info!(
        "recording started";
        session = session.name(),
        mode = mode,
        path = session.path().display()
    );

    let sampler = Sampler::new(
        screen,
        FrameValidator::new(Arc::new(seeds)),
        FrameStore::new(session.clone(), settings.jpeg_quality),
        mode,
        system_clock(),
    );
    let mut controller = RecordingController::new();
    controller.start(sampler, settings.backoff())?;
    let counters = controller.run_until(shutdown).await?;
    Ok((session, counters))
}

/// Blocking. Builds the compositor for `mode` and compiles `<base>/<name>/`.
pub fn convert(base: &Path, name: &str, mode: MapMode, settings: &RecorderSettings) -> Result<CompileReport> {
    let session = SessionDir::new(base, name)?;
    let painter: Box<dyn LabelPainter> = match GlyphPainter::discover(settings.font_path.as_deref()) {
        Ok(painter) => Box::new(painter),
        Err(err) => {
            log_error!("timestamps cannot be drawn, every frame will be skipped"; err = err);
            Box::new(MissingFont {
                reason: err.to_string(),
            })
        }
    };
    let compositor = Compositor::new(mode.display_region(), painter, settings.font_size)
        .context("failed to decode the embedded logo")?;
    let report = compile(&session, mode, &compositor, settings.jpeg_quality)?;
    Ok(report)
}

fn log_report(report: &CompileReport) {
    if report.frames_written == 0 {
        log_warn!("video contains no frames"; path = report.artifact.display());
    }
    for skipped in &report.skipped {
        log_info!("skipped"; filename = skipped.file_name, reason = skipped.reason);
    }
    log_info!(
        "video ready";
        path = report.artifact.display(),
        frames = report.frames_written,
        skipped = report.skipped.len()
    );
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log_error!("failed to listen for Ctrl-C"; err = err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log_error!("failed to listen for SIGTERM"; err = err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    log_info!("shutdown signal received");
}
