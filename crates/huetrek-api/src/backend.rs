use serde::{Deserialize, Serialize};

use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType};

/// Work items queued for the bridge backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendRequest {
    Fetch(ApiResourceType),
    FetchAll,
    LightUpdate(String, ApiLightStateUpdate),
    GroupUpdate(String, ApiLightStateUpdate),
}

impl BackendRequest {
    /// Resource types to re-fetch once this request has completed, whether
    /// it succeeded or not.
    #[must_use]
    pub const fn refresh_after(&self) -> &'static [ApiResourceType] {
        match self {
            Self::Fetch(_) | Self::FetchAll => &[],
            Self::LightUpdate(..) => &[ApiResourceType::Lights, ApiResourceType::Groups],
            Self::GroupUpdate(..) => &[ApiResourceType::Groups, ApiResourceType::Lights],
        }
    }
}
