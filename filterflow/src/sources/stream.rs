use super::Source;
use crate::core::Unit;
use crate::errors::FilterResult;
use crate::pipeline::ShutdownToken;
use futures::stream::{Stream, StreamExt};
use futures::task::{waker, ArcWake};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, Thread};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wakes the pulling thread when the stream has progress to make.
struct Unparker(Thread);

impl ArcWake for Unparker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

/// Drives an async stream one unit per pull.
///
/// While the stream is pending the pulling thread parks, waking when the
/// stream signals progress or every `poll_interval` to check the shutdown
/// token.
#[derive(Debug)]
pub struct StreamSource<S> {
    stream: Option<S>,
    poll_interval: Duration,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Unit> + Unpin + Send,
{
    /// Wraps a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how often a pending pull checks for shutdown.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl<S> Source for StreamSource<S>
where
    S: Stream<Item = Unit> + Unpin + Send,
{
    fn pull(&mut self, shutdown: &ShutdownToken) -> FilterResult<Option<Unit>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let waker = waker(Arc::new(Unparker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            if shutdown.is_shutting_down() {
                return Ok(None);
            }
            match stream.poll_next_unpin(&mut cx) {
                Poll::Ready(unit) => return Ok(unit),
                Poll::Pending => thread::park_timeout(self.poll_interval),
            }
        }
    }

    fn close_source(&mut self) -> FilterResult<()> {
        self.stream = None;
        Ok(())
    }
}
