use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FrameSink, FrameSource, Link};

/// Send failures to inject into a [`MemoryLink`], consumed one per send.
#[derive(Debug, Clone, Default)]
pub struct Faults(Arc<Mutex<VecDeque<io::ErrorKind>>>);

impl Faults {
    pub fn fail_next_sends(&self, count: usize, kind: io::ErrorKind) {
        let mut queue = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        queue.extend(std::iter::repeat(kind).take(count));
    }

    /// Injected failures not yet consumed by a send.
    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn next(&self) -> Option<io::ErrorKind> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

/// One end of an in-process link. Frames sent on one end arrive in order at
/// the other; dropping an end closes the link for its peer.
#[derive(Debug)]
pub struct MemoryLink {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    faults: Faults,
}

impl MemoryLink {
    pub fn pair() -> (MemoryLink, MemoryLink) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryLink {
                tx: a_tx,
                rx: a_rx,
                faults: Faults::default(),
            },
            MemoryLink {
                tx: b_tx,
                rx: b_rx,
                faults: Faults::default(),
            },
        )
    }

    /// Handle for injecting send failures on this end, usable after `split`.
    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }
}

#[derive(Debug)]
pub struct MemorySink {
    tx: mpsc::UnboundedSender<Bytes>,
    faults: Faults,
}

#[derive(Debug)]
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Link for MemoryLink {
    type Sink = MemorySink;
    type Source = MemorySource;

    fn split(self) -> (MemorySink, MemorySource) {
        (
            MemorySink {
                tx: self.tx,
                faults: self.faults,
            },
            MemorySource { rx: self.rx },
        )
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> {
        if let Some(kind) = self.faults.next() {
            return Err(io::Error::new(kind, "injected send failure"));
        }
        self.tx
            .send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed the link"))
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair() {
        let (a, b) = MemoryLink::pair();
        let faults = a.faults();
        let (mut a_sink, _a_source) = a.split();
        let (b_sink, mut b_source) = b.split();

        a_sink.send_frame(Bytes::from_static(b"one")).await.unwrap();
        faults.fail_next_sends(1, io::ErrorKind::TimedOut);
        assert_eq!(faults.remaining(), 1);
        let error = a_sink.send_frame(Bytes::from_static(b"lost")).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
        assert_eq!(faults.remaining(), 0);
        a_sink.send_frame(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(b_source.recv_frame().await.unwrap().unwrap(), "one");
        assert_eq!(b_source.recv_frame().await.unwrap().unwrap(), "two");

        drop(b_sink);
        drop(b_source);
        let error = a_sink.send_frame(Bytes::from_static(b"gone")).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let (a, b) = MemoryLink::pair();
        let (_a_sink, mut a_source) = a.split();
        drop(b);
        assert_eq!(a_source.recv_frame().await.unwrap(), None);
    }
}
