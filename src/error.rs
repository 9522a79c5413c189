use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, SendError};
use uuid::Uuid;

use hue::legacy_api::HueError;
use huetrek_api::backend::BackendRequest;

#[derive(Error, Debug)]
pub enum ApiError {
    /* mapped errors */
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    MdnsSdError(#[from] mdns_sd::Error),

    #[error(transparent)]
    HueError(#[from] hue::error::HueError),

    #[error(transparent)]
    SendError(#[from] SendError<Arc<BackendRequest>>),

    #[error(transparent)]
    RecvError(#[from] RecvError),

    /* bridge protocol */
    #[error("Bridge error: {0}")]
    BridgeProtocol(#[from] HueError),

    #[error("Empty response from bridge")]
    NoData,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No bridge found on the local network")]
    NoBridgeFound,

    /* local state */
    #[error("Unknown bridge {0}")]
    UnknownBridge(Uuid),

    #[error("No bridge matches {0:?}")]
    BridgeNotFound(String),

    #[error("No current bridge selected")]
    NoCurrentBridge,

    #[error("Unknown light {0:?}")]
    UnknownLight(String),

    #[error("Unknown group {0:?}")]
    UnknownGroup(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Coarse classification used to pick a user facing message and retry action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Cancelled,
    NoData,
    Decoding,
    LinkButton,
    BridgeProtocol,
    NotFound,
    Local,
}

impl ApiError {
    pub fn service_error(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReqwestError(err) if err.is_decode() => ErrorKind::Decoding,
            Self::ReqwestError(_) | Self::IOError(_) | Self::MdnsSdError(_) => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NoData => ErrorKind::NoData,
            Self::SerdeJson(_) | Self::UnexpectedResponse(_) => ErrorKind::Decoding,
            Self::BridgeProtocol(err) if err.is_link_button() => ErrorKind::LinkButton,
            Self::BridgeProtocol(_) => ErrorKind::BridgeProtocol,
            Self::NoBridgeFound => ErrorKind::NotFound,
            _ => ErrorKind::Local,
        }
    }

    /// Message shown for failures while talking to an already paired bridge.
    #[must_use]
    pub fn user_message(&self) -> String {
        match (self.kind(), self) {
            (ErrorKind::Transport, _) => "Unable to connect to bridge".into(),
            (ErrorKind::Cancelled, _) => "Cancelled".into(),
            (ErrorKind::NoData, _) => "No data received".into(),
            (ErrorKind::Decoding, _) => "Unable to process bridge response".into(),
            (ErrorKind::LinkButton, _) => "Press the link button on the bridge and retry".into(),
            (ErrorKind::BridgeProtocol, Self::BridgeProtocol(err)) => err.description.clone(),
            (ErrorKind::NotFound, _) => "No bridge found on the local network".into(),
            _ => self.to_string(),
        }
    }

    /// Message shown for failures during pairing, where any bridge reported
    /// error means the link button has not been accepted yet.
    #[must_use]
    pub fn pairing_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transport => "Unable to reach bridge".into(),
            ErrorKind::LinkButton | ErrorKind::BridgeProtocol => {
                "Press the link button on the bridge and retry".into()
            }
            _ => self.user_message(),
        }
    }

    #[must_use]
    pub fn is_link_button(&self) -> bool {
        self.kind() == ErrorKind::LinkButton
    }
}
