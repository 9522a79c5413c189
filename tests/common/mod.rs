#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast::Receiver;

use huetrek::resource::StoreEvent;

pub const USERNAME: &str = "83b7780291a6ceffbe0bd049104df";

/// State behind the fake bridge, shared with the test for inspection.
pub struct FakeState {
    /// Registration attempts rejected before the link button counts as pressed
    pub press_after: u32,
    pub register_calls: u32,
    pub devicetypes: Vec<String>,
    pub fail_puts: bool,
    pub puts: Vec<(String, Value)>,
    pub lights: Map<String, Value>,
    pub groups: Map<String, Value>,
    pub sensors: Map<String, Value>,
}

impl FakeState {
    fn new() -> Self {
        let lights = json!({
            "1": {
                "name": "Kitchen",
                "type": "Extended color light",
                "modelid": "LCT015",
                "state": {"on": true, "bri": 200, "hue": 8000, "sat": 120, "colormode": "hs", "reachable": true}
            },
            "2": {
                "name": "Attic",
                "type": "Dimmable light",
                "state": {"on": false, "bri": 50, "reachable": false}
            }
        });

        let groups = json!({
            "1": {
                "name": "Downstairs",
                "lights": ["1", "2"],
                "type": "Room",
                "class": "Kitchen",
                "state": {"all_on": false, "any_on": true},
                "action": {"on": true, "bri": 200, "hue": 8000, "sat": 120}
            }
        });

        let sensors = json!({
            "1": {
                "name": "Dial",
                "type": "ZLLRelativeRotary",
                "manufacturername": "Signify Netherlands B.V.",
                "productname": "Hue tap dial switch",
                "state": {"rotaryevent": 2, "expectedrotation": 45, "expectedeventduration": 400, "lastupdated": "2024-01-01T10:00:00"},
                "config": {"on": true, "battery": 90, "reachable": true}
            }
        });

        Self {
            press_after: 0,
            register_calls: 0,
            devicetypes: vec![],
            fail_puts: false,
            puts: vec![],
            lights: into_map(lights),
            groups: into_map(groups),
            sensors: into_map(sensors),
        }
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn hue_error(typ: u32, address: &str, description: &str) -> Value {
    json!([{"error": {"type": typ, "address": address, "description": description}}])
}

type Shared = Arc<Mutex<FakeState>>;

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.register_calls += 1;
    state
        .devicetypes
        .push(body["devicetype"].as_str().unwrap_or_default().to_string());

    if state.register_calls <= state.press_after {
        return Json(hue_error(101, "", "link button not pressed"));
    }
    Json(json!([{"success": {"username": USERNAME}}]))
}

async fn get_collection(
    State(state): State<Shared>,
    Path((user, kind)): Path<(String, String)>,
) -> Json<Value> {
    if user != USERNAME {
        return Json(hue_error(1, &format!("/{kind}"), "unauthorized user"));
    }

    let state = state.lock().unwrap();
    let res = match kind.as_str() {
        "lights" => Value::Object(state.lights.clone()),
        "groups" => Value::Object(state.groups.clone()),
        "sensors" => Value::Object(state.sensors.clone()),
        _ => hue_error(4, &format!("/{kind}"), "method, GET, not available for resource"),
    };
    Json(res)
}

fn apply(target: &mut Value, body: &Value, prefix: &str) -> Vec<Value> {
    let mut reply = vec![];
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            target[key] = value.clone();
            let mut entry = Map::new();
            entry.insert(format!("{prefix}/{key}"), value.clone());
            reply.push(json!({ "success": entry }));
        }
    }
    reply
}

async fn put_light(
    State(state): State<Shared>,
    Path((_user, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut guard = state.lock().unwrap();
    let state = &mut *guard;
    state.puts.push((format!("lights/{id}"), body.clone()));

    if state.fail_puts {
        let address = format!("/lights/{id}/state/on");
        return Json(hue_error(201, &address, "parameter, on, is not modifiable. Device is set to off."));
    }

    let Some(light) = state.lights.get_mut(&id) else {
        return Json(hue_error(3, &format!("/lights/{id}"), &format!("resource, /lights/{id}, not available")));
    };
    let reply = apply(&mut light["state"], &body, &format!("/lights/{id}/state"));
    Json(Value::Array(reply))
}

async fn put_group(
    State(state): State<Shared>,
    Path((_user, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut guard = state.lock().unwrap();
    let state = &mut *guard;
    state.puts.push((format!("groups/{id}"), body.clone()));

    let Some(group) = state.groups.get_mut(&id) else {
        return Json(hue_error(3, &format!("/groups/{id}"), &format!("resource, /groups/{id}, not available")));
    };
    let reply = apply(&mut group["action"], &body, &format!("/groups/{id}/action"));

    let members: Vec<String> = group["lights"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    for member in members {
        if let Some(light) = state.lights.get_mut(&member) {
            apply(&mut light["state"], &body, "");
        }
    }

    if let Some(on) = body.get("on").and_then(Value::as_bool) {
        if let Some(group) = state.groups.get_mut(&id) {
            group["state"] = json!({"all_on": on, "any_on": on});
        }
    }

    Json(Value::Array(reply))
}

/// Minimal bridge speaking the v1 http api on a random local port.
pub struct FakeBridge {
    pub address: String,
    pub state: Shared,
}

impl FakeBridge {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::new()));

        let app = Router::new()
            .route("/api", post(register))
            .route("/api/", post(register))
            .route("/api/{user}/{kind}", get(get_collection))
            .route("/api/{user}/lights/{id}/state", put(put_light))
            .route("/api/{user}/groups/{id}/action", put(put_group))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { address, state }
    }

    pub fn with<T>(&self, func: impl FnOnce(&mut FakeState) -> T) -> T {
        func(&mut self.state.lock().unwrap())
    }
}

/// Wait for `count` replaced collections, panicking on timeout.
pub async fn wait_replaced(events: &mut Receiver<StoreEvent>, count: usize) -> Vec<StoreEvent> {
    let mut seen = vec![];
    let mut replaced = 0;
    tokio::time::timeout(Duration::from_secs(10), async {
        while replaced < count {
            let event = events.recv().await.unwrap();
            if matches!(event, StoreEvent::Replaced(_)) {
                replaced += 1;
            }
            seen.push(event);
        }
    })
    .await
    .expect("timed out waiting for store events");
    seen
}
