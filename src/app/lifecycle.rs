use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::app::monitor::Monitor;
use crate::error::AppError;
use crate::notify::{Notifier, SYSTEM_DOWN, SYSTEM_UP};

/// Set at startup, cleared exactly once when shutdown is requested. The
/// signal listener writes it, the capture loop reads it between frames.
#[derive(Clone, Debug)]
pub struct ContinuationFlag(Arc<AtomicBool>);

impl ContinuationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn should_continue(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true only for the call that performed the transition.
    pub fn request_stop(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for ContinuationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs SIGINT and SIGTERM handlers that clear `flag`. The handler does
/// nothing else: the final notification is sent after the loop drains.
pub fn listen_for_signals(flag: ContinuationFlag) -> io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            let name = select! {
                // CANCEL SAFETY: `Signal::recv` is cancel safe.
                received = interrupt.recv() => match received {
                    Some(()) => "SIGINT",
                    None => break,
                },
                received = terminate.recv() => match received {
                    Some(()) => "SIGTERM",
                    None => break,
                },
            };
            if flag.request_stop() {
                tracing::info!(signal = name, "shutdown requested, finishing current frame");
            } else {
                tracing::debug!(signal = name, "shutdown already in progress");
            }
        }
    }))
}

/// Announces the system, runs the loop to completion and tears down: the
/// capture session is released and "system down" is sent exactly once,
/// whether the loop stopped on a signal, a quit, exhaustion or a panic.
pub async fn supervise(mut monitor: Monitor, notifier: &Notifier, flush_timeout: Duration) -> Result<(), AppError> {
    notifier.send_text(SYSTEM_UP);
    tracing::info!("system is up");

    let outcome = AssertUnwindSafe(monitor.run()).catch_unwind().await;
    monitor.release();
    drop(monitor);

    notifier.send_text(SYSTEM_DOWN);
    notifier.flush(flush_timeout).await;
    tracing::info!("system is down");

    outcome.map_err(|panic| {
        let reason = panic_message(panic.as_ref());
        tracing::error!(%reason, "capture loop panicked");
        AppError::LoopPanicked(reason)
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
