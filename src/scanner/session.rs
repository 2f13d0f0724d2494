//! One camera session and everything that must die with it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureStream, Dimensions};

/// Owns the capture stream and the periodic tasks reading from it.
///
/// `close` cancels the token, aborts both tasks and stops the stream. It is
/// idempotent and also runs on drop.
pub struct ScanSession {
    generation: u64,
    stream: Arc<dyn CaptureStream>,
    dimensions: Dimensions,
    cancel_token: CancellationToken,
    in_flight: Arc<AtomicBool>,
    sampler: Option<JoinHandle<()>>,
    resolution_poll: Option<JoinHandle<()>>,
    closed: bool,
}

impl ScanSession {
    pub fn open(generation: u64, stream: Arc<dyn CaptureStream>, dimensions: Dimensions) -> Self {
        Self {
            generation,
            stream,
            dimensions,
            cancel_token: CancellationToken::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            sampler: None,
            resolution_poll: None,
            closed: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stream(&self) -> &Arc<dyn CaptureStream> {
        &self.stream
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Busy flag shared with the sampling task.
    pub fn in_flight(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.in_flight)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn attach_tasks(&mut self, sampler: JoinHandle<()>, resolution_poll: JoinHandle<()>) {
        if self.closed {
            sampler.abort();
            resolution_poll.abort();
            return;
        }
        self.sampler = Some(sampler);
        self.resolution_poll = Some(resolution_poll);
    }

    /// Periodic tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        [&self.sampler, &self.resolution_poll]
            .into_iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel_token.cancel();
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
        if let Some(handle) = self.resolution_poll.take() {
            handle.abort();
        }
        self.stream.stop();
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.close();
    }
}
