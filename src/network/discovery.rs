use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use bytes::BytesMut;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::core::{ClientConfig, DeviceAddress, Result};
use crate::protocol::{CommandFrame, FrameCodec, Opcode};

/// Receive buffer size for discovery replies; one datagram per reply
const RECV_BUFFER_SIZE: usize = 2048;

/// Discovers devices on the local network using the default configuration.
///
/// Broadcasts one probe frame and collects every reply received within the
/// timeout window. The timeout is the only termination condition; there is
/// no signal that "all" devices have replied. Replies arriving after the
/// window are ignored. Safe to call repeatedly.
pub async fn discover(window: Duration) -> Result<Vec<DeviceAddress>> {
    discover_with(&ClientConfig::default(), window).await
}

/// Discovers devices using an explicit configuration.
///
/// Devices are deduplicated by source address; the returned list preserves
/// first-reply order.
pub async fn discover_with(config: &ClientConfig, window: Duration) -> Result<Vec<DeviceAddress>> {
    let socket = broadcast_socket(config)?;
    let mut codec = FrameCodec::new();

    let mut probe = BytesMut::new();
    codec.encode(CommandFrame::discover_probe(), &mut probe)?;
    let target = SocketAddr::new(config.broadcast_addr, config.discovery_port);
    socket.send_to(&probe, target).await?;
    debug!(%target, "discovery probe sent");

    let mut seen: HashSet<SocketAddr> = HashSet::new();
    let mut devices = Vec::new();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let deadline = Instant::now() + window;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let (len, src) = match timeout(remaining, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(Err(e)) => {
                // Transient receive errors (e.g. ICMP unreachable surfacing
                // on the socket) must not end the collection window early.
                warn!(error = %e, "discovery receive error");
                continue;
            }
            Ok(Ok(recv)) => recv,
        };

        let mut datagram = BytesMut::from(&buf[..len]);
        let frame = match codec.decode(&mut datagram) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                debug!(%src, error = %e, "ignoring malformed discovery datagram");
                continue;
            }
        };

        // Our own probe loops back on the broadcast socket; anything other
        // than a reply is not a device answering.
        if frame.opcode != Opcode::DiscoverReply {
            continue;
        }

        if !seen.insert(src) {
            continue;
        }

        let model = String::from_utf8_lossy(&frame.payload).into_owned();
        debug!(%src, model, "device replied");
        devices.push(DeviceAddress::new(src.ip(), config.control_port, model));
    }

    Ok(devices)
}

/// Builds the broadcast UDP socket, bound to an ephemeral local port.
fn broadcast_socket(config: &ClientConfig) -> Result<UdpSocket> {
    let domain = Domain::for_address(SocketAddr::new(config.broadcast_addr, 0));
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    let bind_addr = if config.broadcast_addr.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    socket.bind(&bind_addr.into())?;

    let std_socket: StdUdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    /// Binds a fake device on loopback that answers probes with `replies`
    /// discovery replies, returning the port it listens on.
    async fn fake_responder(model: &'static str, replies: usize) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut codec = FrameCodec::new();
            let mut buf = vec![0u8; 2048];
            let (len, src) = socket.recv_from(&mut buf).await.unwrap();

            let mut datagram = BytesMut::from(&buf[..len]);
            let frame = codec.decode(&mut datagram).unwrap().unwrap();
            assert_eq!(frame.opcode, Opcode::DiscoverProbe);

            let mut reply = BytesMut::new();
            codec
                .encode(CommandFrame::discover_reply(model), &mut reply)
                .unwrap();
            for _ in 0..replies {
                socket.send_to(&reply, src).await.unwrap();
            }
        });

        port
    }

    fn loopback_config(discovery_port: u16) -> ClientConfig {
        ClientConfig {
            discovery_port,
            broadcast_addr: IpAddr::V4("127.0.0.1".parse().unwrap()),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_discover_finds_responder() {
        let port = fake_responder("HS602-T", 1).await;
        let config = loopback_config(port);

        let devices = discover_with(&config, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].model, "HS602-T");
        assert_eq!(devices[0].host, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(devices[0].port, config.control_port);
    }

    #[tokio::test]
    async fn test_discover_deduplicates_by_source() {
        let port = fake_responder("HS602-T", 3).await;
        let config = loopback_config(port);

        let devices = discover_with(&config, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_empty_after_full_window() {
        // Bind a silent socket so the probe has somewhere to land without
        // generating port-unreachable errors.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = loopback_config(silent.local_addr().unwrap().port());

        let window = Duration::from_millis(200);
        let start = std::time::Instant::now();
        let devices = discover_with(&config, window).await.unwrap();
        let elapsed = start.elapsed();

        assert!(devices.is_empty());
        assert!(elapsed >= window, "returned before the window elapsed");
        assert!(elapsed < window * 5, "window overrun: {:?}", elapsed);
    }
}
