use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{Receiver, Sender};

use hue::hs::{Hsb, Rgb};
use hue::legacy_api::{ApiLightStateUpdate, ApiResourceType};
use huetrek_api::backend::BackendRequest;

use crate::error::{ApiError, ApiResult};
use crate::model::{Group, Light, Sensor};

/// Change notifications published by [`BridgeStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Replaced(ApiResourceType),
    LightChanged(String),
    GroupChanged(String),
    Error(String),
    ErrorCleared,
    Cleared,
}

/// The failure currently shown to the user, and the request that retries it.
#[derive(Clone, Debug)]
pub struct SyncError {
    pub message: String,
    pub retry: BackendRequest,
    pub when: DateTime<Utc>,
}

/// In-memory mirror of one bridge.
///
/// The backend task and user intents both go through `&mut self`, so with
/// the store behind a single mutex every collection swap is atomic.
#[derive(Debug)]
pub struct BridgeStore {
    lights: Vec<Light>,
    groups: Vec<Group>,
    sensors: Vec<Sensor>,
    error: Option<SyncError>,
    last_fetch: HashMap<ApiResourceType, DateTime<Utc>>,
    backend_updates: Sender<Arc<BackendRequest>>,
    events: Sender<StoreEvent>,
}

impl Default for BridgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeStore {
    const BACKEND_QUEUE_SIZE: usize = 32;
    const EVENTS_BUFFER_SIZE: usize = 128;

    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: vec![],
            groups: vec![],
            sensors: vec![],
            error: None,
            last_fetch: HashMap::new(),
            backend_updates: Sender::new(Self::BACKEND_QUEUE_SIZE),
            events: Sender::new(Self::EVENTS_BUFFER_SIZE),
        }
    }

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    #[must_use]
    pub fn light(&self, id: &str) -> Option<&Light> {
        self.lights.iter().find(|l| l.id == id)
    }

    #[must_use]
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn last_fetch(&self, rtype: ApiResourceType) -> Option<DateTime<Utc>> {
        self.last_fetch.get(&rtype).copied()
    }

    pub fn replace_lights(&mut self, mut lights: Vec<Light>) {
        lights.sort_by(|a, b| a.name.cmp(&b.name));
        self.lights = lights;
        self.mark_replaced(ApiResourceType::Lights);
    }

    pub fn replace_groups(&mut self, mut groups: Vec<Group>) {
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        self.groups = groups;
        self.mark_replaced(ApiResourceType::Groups);
    }

    pub fn replace_sensors(&mut self, mut sensors: Vec<Sensor>) {
        sensors.sort_by(|a, b| a.name.cmp(&b.name));
        self.sensors = sensors;
        self.mark_replaced(ApiResourceType::Sensors);
    }

    fn mark_replaced(&mut self, rtype: ApiResourceType) {
        self.last_fetch.insert(rtype, Utc::now());
        self.notify(StoreEvent::Replaced(rtype));
    }

    /* light intents */

    pub fn toggle_light(&mut self, id: &str) -> ApiResult<()> {
        let light = self.light_mut(id)?;
        let on = !light.on().unwrap_or(false);
        light.set_on(on);
        self.light_intent(id, ApiLightStateUpdate::new().with_on(on))
    }

    pub fn set_light_brightness(&mut self, id: &str, bri: u8) -> ApiResult<()> {
        let bri = bri.min(hue::MAX_BRIGHTNESS);
        self.light_mut(id)?.set_brightness(bri);
        self.light_intent(id, ApiLightStateUpdate::new().with_bri(bri))
    }

    pub fn set_light_color(&mut self, id: &str, rgb: Rgb) -> ApiResult<()> {
        let hsb = Hsb::from_rgb(rgb);
        self.light_mut(id)?.set_hsb(&hsb);
        self.light_intent(id, ApiLightStateUpdate::new().with_hsb(&hsb))
    }

    /* group intents */

    pub fn toggle_group(&mut self, id: &str) -> ApiResult<()> {
        let group = self.group_mut(id)?;
        let on = !group.action.on.unwrap_or(false);
        group.set_on(on);
        self.group_intent(id, ApiLightStateUpdate::new().with_on(on))
    }

    pub fn set_group_brightness(&mut self, id: &str, bri: u8) -> ApiResult<()> {
        let bri = bri.min(hue::MAX_BRIGHTNESS);
        self.group_mut(id)?.set_brightness(bri);
        self.group_intent(id, ApiLightStateUpdate::new().with_bri(bri))
    }

    pub fn set_group_color(&mut self, id: &str, rgb: Rgb) -> ApiResult<()> {
        let hsb = Hsb::from_rgb(rgb);
        self.group_mut(id)?.set_hsb(&hsb);
        self.group_intent(id, ApiLightStateUpdate::new().with_hsb(&hsb))
    }

    fn light_mut(&mut self, id: &str) -> ApiResult<&mut Light> {
        self.lights
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ApiError::UnknownLight(id.to_string()))
    }

    fn group_mut(&mut self, id: &str) -> ApiResult<&mut Group> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| ApiError::UnknownGroup(id.to_string()))
    }

    fn light_intent(&self, id: &str, upd: ApiLightStateUpdate) -> ApiResult<()> {
        self.notify(StoreEvent::LightChanged(id.to_string()));
        self.backend_request(BackendRequest::LightUpdate(id.to_string(), upd))
    }

    fn group_intent(&self, id: &str, upd: ApiLightStateUpdate) -> ApiResult<()> {
        self.notify(StoreEvent::GroupChanged(id.to_string()));
        self.backend_request(BackendRequest::GroupUpdate(id.to_string(), upd))
    }

    /* sync state */

    pub fn request_refresh(&self, rtype: Option<ApiResourceType>) -> ApiResult<()> {
        self.backend_request(rtype.map_or(BackendRequest::FetchAll, BackendRequest::Fetch))
    }

    pub fn report_error(&mut self, err: &ApiError, retry: BackendRequest) {
        let message = err.user_message();
        log::warn!("Bridge sync failed ({message}): {err}");
        self.error = Some(SyncError {
            message: message.clone(),
            retry,
            when: Utc::now(),
        });
        self.notify(StoreEvent::Error(message));
    }

    /// Re-queue the request bound to the current error, and clear it.
    pub fn retry(&mut self) -> ApiResult<()> {
        let Some(error) = self.error.take() else {
            return Ok(());
        };
        self.notify(StoreEvent::ErrorCleared);
        self.backend_request(error.retry)
    }

    pub fn dismiss_error(&mut self) {
        if self.error.take().is_some() {
            self.notify(StoreEvent::ErrorCleared);
        }
    }

    /// Forget everything mirrored from the previous bridge.
    pub fn clear(&mut self) {
        self.lights.clear();
        self.groups.clear();
        self.sensors.clear();
        self.error = None;
        self.last_fetch.clear();
        self.notify(StoreEvent::Cleared);
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn backend_event_stream(&self) -> Receiver<Arc<BackendRequest>> {
        self.backend_updates.subscribe()
    }

    pub fn backend_request(&self, req: BackendRequest) -> ApiResult<()> {
        log::debug!("Backend request: {req:?}");

        self.backend_updates.send(Arc::new(req))?;

        Ok(())
    }

    fn notify(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
