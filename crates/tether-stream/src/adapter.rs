//! Single-attempt stream passthrough with liveness observation.
//!
//! [`ResilientStream`] yields exactly what the wrapped source yields. It adds
//! observability only: the monitor is started on first poll, fed on every item,
//! marked failed on an error and always stopped once the stream is over (or
//! dropped early). Retrying is the caller's job, see [`crate::retry_with_backoff`].

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::stream::{FusedStream, Stream};
use pin_project_lite::pin_project;

use crate::{ConnectionMonitor, ResilienceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Streaming,
    Done,
}

/// Stops the monitor if the stream is dropped mid-flight.
#[derive(Debug)]
struct StopOnDrop {
    monitor: ConnectionMonitor,
    armed: bool,
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.monitor.stop();
        }
    }
}

pin_project! {
    /// Finite, non-restartable stream wrapper that drives a [`ConnectionMonitor`].
    ///
    /// Once the source ends or yields an error, the adapter yields `None` forever.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct ResilientStream<S> {
        #[pin]
        source: S,
        phase: Phase,
        guard: StopOnDrop,
    }
}

impl<S> ResilientStream<S> {
    /// Wrap `source`, reporting liveness to `monitor`.
    pub fn new(source: S, monitor: ConnectionMonitor) -> Self {
        Self {
            source,
            phase: Phase::NotStarted,
            guard: StopOnDrop {
                monitor,
                armed: false,
            },
        }
    }

    /// Wrap `source` with a fresh monitor built from `config`.
    pub fn with_config(source: S, config: &ResilienceConfig) -> Self {
        Self::new(source, ConnectionMonitor::new(config))
    }

    /// The monitor observing this stream.
    #[must_use]
    pub const fn monitor(&self) -> &ConnectionMonitor {
        &self.guard.monitor
    }
}

impl<S, T, E> Stream for ResilientStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: Display,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match *this.phase {
            Phase::Done => return Poll::Ready(None),
            Phase::NotStarted => {
                this.guard.monitor.start();
                this.guard.armed = true;
                *this.phase = Phase::Streaming;
            }
            Phase::Streaming => {}
        }

        match ready!(this.source.poll_next(cx)) {
            Some(Ok(item)) => {
                this.guard.monitor.record_event();
                Poll::Ready(Some(Ok(item)))
            }
            Some(Err(error)) => {
                let message = error.to_string();
                this.guard.monitor.mark_failed(Some(&message));
                this.guard.monitor.stop();
                this.guard.armed = false;
                *this.phase = Phase::Done;
                Poll::Ready(Some(Err(error)))
            }
            None => {
                this.guard.monitor.stop();
                this.guard.armed = false;
                *this.phase = Phase::Done;
                Poll::Ready(None)
            }
        }
    }
}

impl<S, T, E> FusedStream for ResilientStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: Display,
{
    fn is_terminated(&self) -> bool {
        self.phase == Phase::Done
    }
}

/// Extension trait adding [`ResilientStream`] construction to fallible streams.
pub trait ResilientStreamExt: Sized {
    /// Wrap `self` in a [`ResilientStream`] reporting to `monitor`.
    fn resilient(self, monitor: ConnectionMonitor) -> ResilientStream<Self>;
}

impl<S, T, E> ResilientStreamExt for S
where
    S: Stream<Item = Result<T, E>>,
    E: Display,
{
    fn resilient(self, monitor: ConnectionMonitor) -> ResilientStream<Self> {
        ResilientStream::new(self, monitor)
    }
}
