use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use url::Url;

use crate::discovery::BridgeLocator;
use crate::error::ApiResult;

/// Broadcasts one `M-SEARCH` and listens for a bridge reply.
pub struct SsdpLocator {
    target: SocketAddr,
    window: Duration,
}

impl SsdpLocator {
    #[must_use]
    pub const fn new(target: SocketAddr, window: Duration) -> Self {
        Self { target, window }
    }
}

/// Extract the bridge address from an SSDP reply.
///
/// Only replies from a Hue bridge are accepted, and the address is the host
/// part of the url in the `LOCATION` header.
#[must_use]
pub fn parse_ssdp_reply(data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    if !text.contains(hue::SSDP_BRIDGE_MARKER) {
        return None;
    }

    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("location"))
        .and_then(|(_, value)| value.split_whitespace().last())
        .and_then(|location| Url::parse(location).ok())
        .and_then(|url| url.host_str().map(ToString::to_string))
}

#[async_trait]
impl BridgeLocator for SsdpLocator {
    fn name(&self) -> &'static str {
        "ssdp"
    }

    async fn locate(&self) -> ApiResult<Option<String>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket
            .send_to(hue::ssdp_search_request().as_bytes(), self.target)
            .await?;

        log::debug!("Sent M-SEARCH to {}, listening for {:?}", self.target, self.window);

        let deadline = Instant::now() + self.window;
        let mut buf = vec![0u8; 2048];

        loop {
            let Ok(res) = timeout_at(deadline, socket.recv_from(&mut buf)).await else {
                log::debug!("No bridge answered M-SEARCH");
                return Ok(None);
            };
            let (len, peer) = res?;

            if let Some(address) = parse_ssdp_reply(&buf[..len]) {
                log::debug!("Bridge at {address} answered from {peer}");
                return Ok(Some(address));
            }
            log::trace!("Ignoring SSDP reply from {peer}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use crate::discovery::BridgeLocator;
    use crate::discovery::ssdp::{SsdpLocator, parse_ssdp_reply};

    const BRIDGE_REPLY: &str = "HTTP/1.1 200 OK\r\n\
        HOST: 239.255.255.250:1900\r\n\
        CACHE-CONTROL: max-age=100\r\n\
        LOCATION: http://192.168.1.20:80/description.xml\r\n\
        SERVER: Hue/1.0 UPnP/1.0 IpBridge/1.60.0\r\n\
        hue-bridgeid: 001788FFFE000000\r\n\
        ST: upnp:rootdevice\r\n\r\n";

    #[test]
    fn parse_bridge_reply() {
        assert_eq!(
            parse_ssdp_reply(BRIDGE_REPLY.as_bytes()).as_deref(),
            Some("192.168.1.20")
        );
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let reply = "SERVER: IpBridge/1.0\r\nLocation: http://10.0.0.7/description.xml\r\n";
        assert_eq!(parse_ssdp_reply(reply.as_bytes()).as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn ignore_other_devices() {
        let reply = "HTTP/1.1 200 OK\r\nLOCATION: http://192.168.1.5:49152/desc.xml\r\nSERVER: Linux UPnP/1.0\r\n";
        assert_eq!(parse_ssdp_reply(reply.as_bytes()), None);

        let reply = "SERVER: IpBridge/1.0\r\n";
        assert_eq!(parse_ssdp_reply(reply.as_bytes()), None);
    }

    #[tokio::test]
    async fn loopback_round_trip() {
        let responder = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let target = responder.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (len, peer) = responder.recv_from(&mut buf).await.unwrap();
            assert!(buf[..len].starts_with(b"M-SEARCH"));
            responder
                .send_to(b"HTTP/1.1 200 OK\r\nSERVER: Linux UPnP/1.0\r\n\r\n", peer)
                .await
                .unwrap();
            responder.send_to(BRIDGE_REPLY.as_bytes(), peer).await.unwrap();
        });

        let locator = SsdpLocator::new(target, Duration::from_secs(5));
        assert_eq!(locator.locate().await.unwrap().as_deref(), Some("192.168.1.20"));
    }

    #[tokio::test]
    async fn silence_is_not_found() {
        let silent = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let locator = SsdpLocator::new(silent.local_addr().unwrap(), Duration::from_millis(100));

        assert_eq!(locator.locate().await.unwrap(), None);
    }
}
