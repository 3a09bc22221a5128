use super::Source;
use crate::core::Unit;
use crate::errors::{FilterError, FilterResult};
use crate::pipeline::ShutdownToken;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;

/// Creates a bounded link between producers and a pipeline.
///
/// Producers block (or await) once `capacity` units are waiting. The source
/// checks the shutdown token every `poll_interval` while it waits.
pub fn channel(
    capacity: usize,
    poll_interval: Duration,
) -> FilterResult<(UnitSender, ChannelSource)> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let runtime = Builder::new_current_thread().enable_time().build()?;
    Ok((
        UnitSender { tx },
        ChannelSource {
            rx,
            runtime,
            poll_interval,
        },
    ))
}

/// The producing end of a [`channel`].
#[derive(Debug, Clone)]
pub struct UnitSender {
    tx: mpsc::Sender<Unit>,
}

impl UnitSender {
    /// Sends a unit, waiting for capacity.
    pub async fn send(&self, unit: impl Into<Unit>) -> FilterResult<()> {
        self.tx
            .send(unit.into())
            .await
            .map_err(|_| FilterError::PipelineClosed("channel".to_string()))
    }

    /// Sends a unit from a thread outside any async runtime, blocking for
    /// capacity.
    pub fn send_blocking(&self, unit: impl Into<Unit>) -> FilterResult<()> {
        self.tx
            .blocking_send(unit.into())
            .map_err(|_| FilterError::PipelineClosed("channel".to_string()))
    }
}

/// The consuming end of a [`channel`], used as a pipeline source.
///
/// Exhausted once every [`UnitSender`] is dropped and the buffer is empty.
///
/// The source waits on a runtime of its own, so it must be pulled from a
/// plain thread, and dropped there. Pulling from inside a tokio runtime is an
/// error; drive the pipeline from `tokio::task::spawn_blocking` or a
/// dedicated thread instead.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Unit>,
    runtime: Runtime,
    poll_interval: Duration,
}

impl Source for ChannelSource {
    fn pull(&mut self, shutdown: &ShutdownToken) -> FilterResult<Option<Unit>> {
        if Handle::try_current().is_ok() {
            return Err(FilterError::logic(
                "ChannelSource cannot be pulled from inside an async runtime; \
                 run the pipeline on a blocking thread",
            ));
        }
        loop {
            if shutdown.is_shutting_down() {
                return Ok(None);
            }
            let next = self
                .runtime
                .block_on(tokio::time::timeout(self.poll_interval, self.rx.recv()));
            match next {
                Ok(unit) => return Ok(unit),
                Err(_elapsed) => continue,
            }
        }
    }

    fn close_source(&mut self) -> FilterResult<()> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Packet;

    #[test]
    fn test_channel_from_thread() {
        let (tx, mut source) = channel(2, Duration::from_millis(10)).unwrap();
        let producer = std::thread::spawn(move || {
            for i in 0..5 {
                tx.send_blocking(Packet::new(format!("p{i}"))).unwrap();
            }
        });

        let token = ShutdownToken::new();
        let mut count = 0;
        while let Some(unit) = source.pull(&token).unwrap() {
            assert!(!unit.is_control());
            count += 1;
        }
        producer.join().unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_pull_stops_on_shutdown() {
        let (_tx, mut source) = channel(1, Duration::from_millis(5)).unwrap();
        let token = ShutdownToken::new();
        let remote = token.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.shut_down("stop");
        });

        assert!(source.pull(&token).unwrap().is_none());
        stopper.join().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_async_producer() {
        let (tx, mut source) = channel(1, Duration::from_millis(5)).unwrap();
        let consumer = std::thread::spawn(move || {
            let token = ShutdownToken::new();
            let mut count = 0;
            while source.pull(&token).unwrap().is_some() {
                count += 1;
            }
            count
        });

        for i in 0..3 {
            tx.send(Packet::new(format!("p{i}"))).await.unwrap();
        }
        drop(tx);
        assert_eq!(consumer.join().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pull_inside_runtime_is_an_error() {
        let (_tx, mut source) = channel(1, Duration::from_millis(5)).unwrap();
        let err = source.pull(&ShutdownToken::new()).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Logic);

        // The source owns a runtime, which may not be dropped on an async task.
        std::thread::spawn(move || drop(source)).join().unwrap();
    }

    #[test]
    fn test_send_after_close_fails() {
        let (tx, mut source) = channel(1, Duration::from_millis(5)).unwrap();
        source.close_source().unwrap();

        assert!(tx.send_blocking(Packet::new("late")).is_err());
    }
}
