use std::net::{Ipv4Addr, SocketAddrV4};

pub mod error;
pub mod hs;
pub mod legacy_api;

pub const HUE_DISCOVERY_URL: &str = "https://discovery.meethue.com/";

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;
pub const SSDP_TARGET: SocketAddrV4 = SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT);

/// Substring present in every SSDP reply sent by a Hue bridge
pub const SSDP_BRIDGE_MARKER: &str = "IpBridge";

pub const MDNS_SERVICE_TYPE: &str = "_hue._tcp.local.";

pub const MAX_BRIGHTNESS: u8 = 254;
pub const MAX_SATURATION: u8 = 255;

/// Build the `M-SEARCH` datagram used for bridge discovery.
#[must_use]
pub fn ssdp_search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {SSDP_TARGET}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: ssdp:all\r\n\
         \r\n"
    )
}
