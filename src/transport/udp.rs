use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;

use super::{FrameSink, FrameSource, Link};
use crate::constants::UDP_MESSAGE_LIMIT;

/// A UDP socket bound locally and connected to one node.
///
/// To let the socket pick any port, bind to `0.0.0.0:0` for IPv4 or `[::]:0`
/// for IPv6.
#[derive(Debug, Clone)]
pub struct UdpLink {
    local_address: SocketAddr,
    peer_address: SocketAddr,
    // Shared between the two halves, tokio sockets need no cloning
    socket: Arc<UdpSocket>,
}

impl UdpLink {
    pub async fn connect(local_address: SocketAddr, peer_address: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local_address).await?;
        socket.connect(peer_address).await?;
        Ok(Self {
            local_address: socket.local_addr()?,
            peer_address,
            socket: Arc::new(socket),
        })
    }

    pub fn local_address(&self) -> &SocketAddr {
        &self.local_address
    }

    pub fn peer_address(&self) -> &SocketAddr {
        &self.peer_address
    }
}

#[derive(Debug)]
pub struct UdpSink {
    socket: Arc<UdpSocket>,
}

#[derive(Debug)]
pub struct UdpSource {
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
}

impl Link for UdpLink {
    type Sink = UdpSink;
    type Source = UdpSource;

    fn split(self) -> (UdpSink, UdpSource) {
        (
            UdpSink {
                socket: self.socket.clone(),
            },
            UdpSource {
                socket: self.socket,
                buf: vec![0; UDP_MESSAGE_LIMIT],
            },
        )
    }
}

#[async_trait]
impl FrameSink for UdpSink {
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> {
        self.socket.send(&frame).await.map(|_| ())
    }
}

#[async_trait]
impl FrameSource for UdpSource {
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        let len = self.socket.recv(&mut self.buf).await?;
        Ok(Some(Bytes::copy_from_slice(&self.buf[..len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_frames() {
        let node = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let node_address = node.local_addr().unwrap();

        let link = UdpLink::connect("127.0.0.1:0".parse().unwrap(), node_address)
            .await
            .unwrap();
        let local = *link.local_address();
        assert_eq!(link.peer_address(), &node_address);
        let (mut sink, mut source) = link.split();

        sink.send_frame(Bytes::from_static(b"ping")).await.unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = node.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, local);

        node.send_to(b"pong", local).await.unwrap();
        assert_eq!(source.recv_frame().await.unwrap().unwrap(), "pong");
    }
}
