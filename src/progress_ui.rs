//! Progress UI (spinner) for processing passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hyperlink_core::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

/// Returns true when a spinner should be drawn on stderr.
pub(crate) fn should_use_spinner(stderr_is_terminal: bool, quiet: bool, disabled: bool) -> bool {
    stderr_is_terminal && !quiet && !disabled && !is_dumb_terminal()
}

fn is_dumb_terminal() -> bool {
    std::env::var("TERM").is_ok_and(|term| term == "dumb")
}

/// Spawns the spinner when requested.
///
/// Returns (handle, stop); set `stop` and await the handle to clear the line.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    progress: watch::Receiver<ProgressEvent>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(progress, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    progress: watch::Receiver<ProgressEvent>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let event = *progress.borrow();
            spinner.set_message(format_event(&event));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn format_event(event: &ProgressEvent) -> String {
    format!(
        "[{}/{}] {}% {}...",
        event.current.min(event.total),
        event.total,
        event.percent,
        event.phase
    )
}
