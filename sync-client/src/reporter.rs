//! Live progress of the initial transfer.
//!
//! The completion wait streams samples into an unbounded channel; a
//! background task drains it through a [`ProgressFilter`] and hands every
//! value worth showing to a [`ProgressRenderer`].
//!
//! Samples arriving during the warm-up period are held back and flushed when
//! it ends, or as soon as the producer closes the channel, whichever comes
//! first. Either way every held sample goes through the filter.

use crate::agent::ProgressSender;
use devsync_core::ProgressFilter;
use devsync_types::ProgressSample;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something that shows a completion percentage.
pub trait ProgressRenderer: Send + 'static {
    /// Show `percent` (0 to 100).
    fn render(&mut self, percent: f64);
}

impl<F> ProgressRenderer for F
where
    F: FnMut(f64) + Send + 'static,
{
    fn render(&mut self, percent: f64) {
        self(percent)
    }
}

/// Renders progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRenderer;

impl ProgressRenderer for LogRenderer {
    fn render(&mut self, percent: f64) {
        tracing::info!(percent, "Synchronizing your files ({:.0}%)", percent);
    }
}

/// Handle to the background progress task.
#[derive(Debug)]
pub struct ProgressReporter<R> {
    handle: JoinHandle<(R, ProgressFilter)>,
}

impl<R: ProgressRenderer> ProgressReporter<R> {
    /// Spawn the consumer task; returns the producer half and the handle.
    pub fn spawn(renderer: R, warmup: Duration) -> (ProgressSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(consume(renderer, rx, warmup));
        (tx, Self { handle })
    }

    /// Wait for the task to drain the channel.
    ///
    /// The producer must be gone by now. Renders exactly 100 last when
    /// `completed` is set.
    pub async fn finish(self, completed: bool) {
        match self.handle.await {
            Ok((mut renderer, mut filter)) => {
                if completed {
                    renderer.render(filter.finish());
                }
            }
            Err(e) => tracing::warn!(error = %e, "Progress reporter task failed"),
        }
    }
}

async fn consume<R: ProgressRenderer>(
    mut renderer: R,
    mut rx: mpsc::UnboundedReceiver<ProgressSample>,
    warmup: Duration,
) -> (R, ProgressFilter) {
    let mut filter = ProgressFilter::new();

    if !warmup.is_zero() {
        let mut held = Vec::new();
        let warmup_end = tokio::time::sleep(warmup);
        tokio::pin!(warmup_end);

        let closed = loop {
            tokio::select! {
                _ = &mut warmup_end => break false,
                sample = rx.recv() => match sample {
                    Some(sample) => held.push(sample),
                    None => break true,
                },
            }
        };

        if closed {
            tracing::debug!(held = held.len(), "Progress closed during warm-up");
        }
        for sample in held {
            if let Some(percent) = filter.offer(sample) {
                renderer.render(percent);
            }
        }
    }

    while let Some(sample) = rx.recv().await {
        if let Some(percent) = filter.offer(sample) {
            renderer.render(percent);
        }
    }
    (renderer, filter)
}
