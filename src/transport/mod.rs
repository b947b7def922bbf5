//! Links carrying whole Matter messages to and from one remote node.
//!
//! A link is split once into a sending and a receiving half so that the
//! session can send from one task while another waits for responses.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
#[cfg(feature = "udp")]
pub mod udp;

pub use memory::{Faults, MemoryLink};
#[cfg(feature = "udp")]
pub use udp::UdpLink;

#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()>;
}

#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame. `Ok(None)` means the peer is gone for good.
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>>;
}

pub trait Link: Send + 'static {
    type Sink: FrameSink;
    type Source: FrameSource;

    fn split(self) -> (Self::Sink, Self::Source);
}

/// Errors after which the same frame may go through on a later attempt.
pub fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(is_transient(&io::ErrorKind::TimedOut.into()));
        assert!(is_transient(&io::ErrorKind::ConnectionRefused.into()));
        assert!(!is_transient(&io::ErrorKind::BrokenPipe.into()));
        assert!(!is_transient(&io::ErrorKind::ConnectionReset.into()));
    }
}
