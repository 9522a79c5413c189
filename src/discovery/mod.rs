pub mod cloud;
pub mod mdns;
pub mod ssdp;

use std::fmt::{self, Display};
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::error::{ApiError, ApiResult};

use self::cloud::CloudLocator;
use self::mdns::MdnsLocator;
use self::ssdp::SsdpLocator;

/// One way of finding a bridge on the local network.
#[async_trait]
pub trait BridgeLocator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the lookup worked but found no bridge.
    async fn locate(&self) -> ApiResult<Option<String>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(String),
    NotFound,
}

/// Tries each locator in turn until one produces an address.
pub struct DiscoveryEngine {
    locators: Vec<Arc<dyn BridgeLocator>>,
}

impl DiscoveryEngine {
    #[must_use]
    pub fn new(locators: Vec<Arc<dyn BridgeLocator>>) -> Self {
        Self { locators }
    }

    /// Cloud lookup, then SSDP, then (if enabled) mDNS.
    #[must_use]
    pub fn from_config(conf: &DiscoveryConfig, http: reqwest::Client) -> Self {
        let mut locators: Vec<Arc<dyn BridgeLocator>> = vec![
            Arc::new(CloudLocator::new(http, conf.cloud_url.clone())),
            Arc::new(SsdpLocator::new(
                SocketAddr::V4(conf.ssdp_target),
                conf.ssdp_timeout(),
            )),
        ];

        if conf.mdns {
            locators.push(Arc::new(MdnsLocator::new(conf.mdns_timeout())));
        }

        Self::new(locators)
    }

    pub async fn discover(&self) -> ApiResult<DiscoveryOutcome> {
        let mut not_found = false;
        let mut last_err = None;

        for locator in &self.locators {
            match locator.locate().await {
                Ok(Some(address)) => {
                    log::info!("Found bridge at {address} using {}", locator.name());
                    return Ok(DiscoveryOutcome::Found(address));
                }
                Ok(None) => {
                    log::debug!("No bridge found using {}", locator.name());
                    not_found = true;
                }
                Err(err) => {
                    log::warn!("Discovery using {} failed: {err}", locator.name());
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if !not_found => Err(err),
            _ => Ok(DiscoveryOutcome::NotFound),
        }
    }

    pub async fn discover_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> ApiResult<DiscoveryOutcome> {
        tokio::select! {
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            res = self.discover() => res,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Discovering,
    Found(String),
    NotFound,
    Failed(String),
    Cancelled,
}

impl DiscoveryState {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        !matches!(self, Self::Idle | Self::Discovering)
    }
}

impl Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Discovering => write!(f, "discovering"),
            Self::Found(address) => write!(f, "found bridge at {address}"),
            Self::NotFound => write!(f, "no bridge found"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryStatus {
    pub attempt: u64,
    pub state: DiscoveryState,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs discovery attempts in the background and publishes their progress.
///
/// Starting a new attempt supersedes the running one; a superseded attempt
/// can never publish its result.
pub struct Discoverer {
    engine: Arc<DiscoveryEngine>,
    status: watch::Sender<DiscoveryStatus>,
    running: Mutex<Option<Running>>,
}

impl Discoverer {
    #[must_use]
    pub fn new(engine: DiscoveryEngine) -> Self {
        let (status, _) = watch::channel(DiscoveryStatus {
            attempt: 0,
            state: DiscoveryState::Idle,
        });
        Self {
            engine: Arc::new(engine),
            status,
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DiscoveryStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> DiscoveryStatus {
        self.status.borrow().clone()
    }

    /// Start a new attempt, returning its number.
    pub async fn start(&self) -> u64 {
        let mut running = self.running.lock().await;
        if let Some(old) = running.take() {
            old.cancel.cancel();
            old.task.abort();
        }

        let mut attempt = 0;
        self.status.send_modify(|status| {
            status.attempt += 1;
            status.state = DiscoveryState::Discovering;
            attempt = status.attempt;
        });

        let cancel = CancellationToken::new();
        let engine = self.engine.clone();
        let status = self.status.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let state = match engine.discover_with_cancel(&token).await {
                Ok(DiscoveryOutcome::Found(address)) => DiscoveryState::Found(address),
                Ok(DiscoveryOutcome::NotFound) => DiscoveryState::NotFound,
                Err(ApiError::Cancelled) => DiscoveryState::Cancelled,
                Err(err) => DiscoveryState::Failed(err.user_message()),
            };
            Self::publish(&status, attempt, state);
        });

        *running = Some(Running { cancel, task });
        drop(running);

        log::debug!("Discovery attempt {attempt} started");
        attempt
    }

    /// Cancel the running attempt, if any.
    pub async fn abort(&self) {
        if let Some(old) = self.running.lock().await.take() {
            old.cancel.cancel();
            old.task.abort();
            let attempt = self.status.borrow().attempt;
            Self::publish(&self.status, attempt, DiscoveryState::Cancelled);
        }
    }

    /// Wait until the latest attempt has finished.
    pub async fn wait(&self) -> ApiResult<DiscoveryState> {
        let mut rx = self.subscribe();
        let status = rx
            .wait_for(|status| status.state.is_finished())
            .await
            .map_err(|_| ApiError::service_error("Discovery status channel closed"))?;
        Ok(status.state.clone())
    }

    fn publish(status: &watch::Sender<DiscoveryStatus>, attempt: u64, state: DiscoveryState) {
        status.send_if_modified(|current| {
            if current.attempt != attempt || current.state != DiscoveryState::Discovering {
                log::debug!("Dropping result of superseded discovery attempt {attempt}");
                return false;
            }
            current.state = state;
            true
        });
    }
}
