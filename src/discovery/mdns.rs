use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use tokio::time::{Instant, timeout_at};

use crate::discovery::BridgeLocator;
use crate::error::ApiResult;

/// Browses for bridges announcing `_hue._tcp` on the local link.
pub struct MdnsLocator {
    window: Duration,
}

impl MdnsLocator {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl BridgeLocator for MdnsLocator {
    fn name(&self) -> &'static str {
        "mdns"
    }

    async fn locate(&self) -> ApiResult<Option<String>> {
        let mdns = ServiceDaemon::new()?;
        let receiver = mdns.browse(hue::MDNS_SERVICE_TYPE)?;
        let deadline = Instant::now() + self.window;

        let mut found = None;
        while found.is_none() {
            let Ok(event) = timeout_at(deadline, receiver.recv_async()).await else {
                break;
            };
            let Ok(event) = event else {
                break;
            };

            if let ServiceEvent::ServiceResolved(info) = event {
                log::debug!("Resolved {}", info.get_fullname());
                found = info.get_addresses().iter().find_map(|addr| match addr {
                    IpAddr::V4(ip) => Some(ip.to_string()),
                    IpAddr::V6(_) => None,
                });
            }
        }

        if let Err(err) = mdns.shutdown() {
            log::debug!("Failed to stop mdns daemon: {err}");
        }

        Ok(found)
    }
}
