use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use serde::Serialize;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

use hue::hs::Rgb;
use hue::legacy_api::ApiResourceType;

use huetrek::appstate::AppState;
use huetrek::config;
use huetrek::discovery::DiscoveryState;
use huetrek::error::{ApiError, ApiResult};
use huetrek::registry::CurrentBridge;
use huetrek::resource::{BridgeStore, StoreEvent};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "huetrek.yaml")]
    config: Utf8PathBuf,

    /// Print resources as json
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look for a bridge on the local network
    Discover,
    /// Pair with a bridge (discovering one if no address is given)
    Pair {
        address: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List paired bridges
    Bridges,
    /// Make a paired bridge current
    Use { bridge: String },
    Rename { bridge: String, name: String },
    Remove { bridge: String },
    /// Use the built-in demo bridge
    Demo,
    Lights,
    Groups,
    Sensors,
    Light {
        id: String,
        #[command(subcommand)]
        action: Action,
    },
    Group {
        id: String,
        #[command(subcommand)]
        action: Action,
    },
    /// Follow changes on the current bridge
    Watch,
}

#[derive(Subcommand, Debug)]
enum Action {
    Toggle,
    Bri { value: u8 },
    /// Set color from a hex value, like "#ff8000"
    Color { hex: String },
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "info",
        "huetrek=info",
        "mdns_sd=off",
        "reqwest=info",
        "hyper_util=info",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn install_signal_handlers(cancel: &CancellationToken) -> ApiResult<()> {
    fn shutdown(msg: &str, cancel: &CancellationToken) {
        log::warn!("{msg}");
        let _ = std::io::stderr().flush();
        cancel.cancel();
    }

    let token = cancel.clone();
    tokio::spawn(async move {
        if matches!(signal::ctrl_c().await, Ok(())) {
            shutdown("Ctrl-C pressed, exiting..", &token);
        }
    });

    let token = cancel.clone();
    let mut signal = signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if matches!(signal.recv().await, Some(())) {
            shutdown("SIGTERM received, exiting..", &token);
        }
    });

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> ApiResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn next_matching(
    events: &mut Receiver<StoreEvent>,
    done: &mut impl FnMut(&StoreEvent) -> bool,
) -> ApiResult<()> {
    loop {
        match events.recv().await? {
            StoreEvent::Error(msg) => return Err(ApiError::service_error(msg)),
            event if done(&event) => return Ok(()),
            _ => {}
        }
    }
}

/// Wait for the next event matching `done`, failing on sync errors.
async fn wait_for_event(
    events: &mut Receiver<StoreEvent>,
    timeout: Duration,
    mut done: impl FnMut(&StoreEvent) -> bool,
) -> ApiResult<()> {
    tokio::time::timeout(timeout, next_matching(events, &mut done))
        .await
        .map_err(|_| ApiError::service_error("Timed out waiting for bridge"))?
}

/// Start the backend for the current bridge and wait for the first full sync.
async fn connect(appstate: &AppState) -> ApiResult<Receiver<StoreEvent>> {
    let mut events = appstate.store.lock().await.subscribe();

    if !appstate.activate().await? {
        return Err(ApiError::NoCurrentBridge);
    }

    let timeout = appstate.config().huetrek.request_timeout() * 3;
    let mut pending = ApiResourceType::ALL.to_vec();
    wait_for_event(&mut events, timeout, |event| {
        if let StoreEvent::Replaced(rtype) = event {
            pending.retain(|r| r != rtype);
        }
        pending.is_empty()
    })
    .await?;

    Ok(events)
}

fn print_lights(store: &BridgeStore) {
    for light in store.lights() {
        let color = light.color().map_or_else(|| "-".to_string(), |c| c.hex());
        println!(
            "{:>4}  {:<28} on:{:<5} bri:{:<3} color:{color}{}",
            light.id,
            light.name,
            light.on(),
            light.brightness(),
            if light.reachable { "" } else { "  (unreachable)" },
        );
    }
}

fn print_groups(store: &BridgeStore) {
    for group in store.groups() {
        println!(
            "{:>4}  {:<28} on:{:<5} bri:{:<3} lights:{}",
            group.id,
            group.name,
            group.action.on,
            group.action.brightness,
            group.lights.iter().join(","),
        );
    }
}

fn print_sensors(store: &BridgeStore) {
    for sensor in store.sensors() {
        let mut details = vec![format!("on:{}", sensor.on)];
        if sensor.battery.is_known() {
            details.push(format!("battery:{}%", sensor.battery));
        }
        if let Some(rotation) = sensor.rotary.and_then(|r| r.expected_rotation) {
            details.push(format!("rotation:{rotation}"));
        }
        if let Some(updated) = &sensor.last_updated {
            details.push(format!("updated:{updated}"));
        }
        println!(
            "{:>4}  {:<28} {:<18} {}",
            sensor.id,
            sensor.name,
            sensor.sensor_type,
            details.iter().join(" "),
        );
    }
}

async fn show(appstate: &AppState, rtype: ApiResourceType, json: bool) -> ApiResult<()> {
    connect(appstate).await?;
    let store = appstate.store.lock().await;

    match (rtype, json) {
        (ApiResourceType::Lights, true) => print_json(store.lights())?,
        (ApiResourceType::Groups, true) => print_json(store.groups())?,
        (ApiResourceType::Sensors, true) => print_json(store.sensors())?,
        (ApiResourceType::Lights, false) => print_lights(&store),
        (ApiResourceType::Groups, false) => print_groups(&store),
        (ApiResourceType::Sensors, false) => print_sensors(&store),
    }
    drop(store);

    Ok(())
}

/// Apply one intent, then wait for the bridge to report the result back.
async fn control(
    appstate: &AppState,
    rtype: ApiResourceType,
    id: &str,
    action: Action,
) -> ApiResult<()> {
    let mut events = connect(appstate).await?;

    {
        let mut store = appstate.store.lock().await;
        match (rtype, action) {
            (ApiResourceType::Groups, Action::Toggle) => store.toggle_group(id)?,
            (ApiResourceType::Groups, Action::Bri { value }) => {
                store.set_group_brightness(id, value)?;
            }
            (ApiResourceType::Groups, Action::Color { hex }) => {
                store.set_group_color(id, Rgb::from_hex(&hex)?)?;
            }
            (_, Action::Toggle) => store.toggle_light(id)?,
            (_, Action::Bri { value }) => store.set_light_brightness(id, value)?,
            (_, Action::Color { hex }) => store.set_light_color(id, Rgb::from_hex(&hex)?)?,
        }
    }

    let timeout = appstate.config().huetrek.request_timeout() * 2;
    wait_for_event(&mut events, timeout, |event| {
        *event == StoreEvent::Replaced(rtype)
    })
    .await?;

    let store = appstate.store.lock().await;
    if rtype == ApiResourceType::Groups {
        let group = store
            .group(id)
            .ok_or_else(|| ApiError::UnknownGroup(id.to_string()))?;
        println!(
            "{}: on:{} bri:{}",
            group.name, group.action.on, group.action.brightness
        );
    } else {
        let light = store
            .light(id)
            .ok_or_else(|| ApiError::UnknownLight(id.to_string()))?;
        println!("{}: on:{} bri:{}", light.name, light.on(), light.brightness());
    }
    drop(store);

    Ok(())
}

async fn watch(appstate: &AppState, cancel: &CancellationToken) -> ApiResult<()> {
    let mut events = appstate.store.lock().await.subscribe();
    if !appstate.activate().await? {
        return Err(ApiError::NoCurrentBridge);
    }

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            event = events.recv() => event?,
        };

        let store = appstate.store.lock().await;
        match event {
            StoreEvent::Replaced(rtype) => {
                log::info!("Refreshed {rtype:?}");
            }
            StoreEvent::LightChanged(id) => {
                if let Some(light) = store.light(&id) {
                    log::info!("Light {}: on:{} bri:{}", light.name, light.on(), light.brightness());
                }
            }
            StoreEvent::GroupChanged(id) => {
                if let Some(group) = store.group(&id) {
                    log::info!("Group {}: on:{}", group.name, group.action.on);
                }
            }
            StoreEvent::Error(msg) => log::error!("{msg}"),
            StoreEvent::ErrorCleared | StoreEvent::Cleared => {}
        }
        drop(store);
    }
}

async fn discover(appstate: &AppState, cancel: &CancellationToken) -> ApiResult<String> {
    let discoverer = appstate.discoverer();
    discoverer.start().await;

    let state = tokio::select! {
        () = cancel.cancelled() => {
            discoverer.abort().await;
            return Err(ApiError::Cancelled);
        }
        state = discoverer.wait() => state?,
    };

    match state {
        DiscoveryState::Found(address) => Ok(address),
        DiscoveryState::Failed(msg) => Err(ApiError::service_error(msg)),
        DiscoveryState::Cancelled => Err(ApiError::Cancelled),
        _ => Err(ApiError::NoBridgeFound),
    }
}

async fn list_bridges(appstate: &AppState, json: bool) -> ApiResult<()> {
    let registry = appstate.registry();
    let registry = registry.lock().await;

    if json {
        return print_json(registry.configs());
    }

    let current = registry.current();
    for config in registry.configs() {
        let mark = if current == CurrentBridge::Bridge(config.id) { "*" } else { " " };
        println!("{mark} {}  {:<20} {}", config.id, config.name, config.address);
    }
    if current == CurrentBridge::Demo {
        println!("* demo");
    }
    drop(registry);

    Ok(())
}

async fn run_command(
    appstate: &AppState,
    cli: Cli,
    cancel: &CancellationToken,
) -> ApiResult<()> {
    match cli.command {
        Command::Discover => {
            let address = discover(appstate, cancel).await?;
            println!("{address}");
        }
        Command::Pair { address, name } => {
            let address = match address {
                Some(address) => address,
                None => discover(appstate, cancel).await?,
            };
            log::info!("Pairing with {address}, press the link button on the bridge");
            let config = appstate
                .pair_and_add(&address, name, cancel)
                .await
                .inspect_err(|err| log::error!("{}", err.pairing_message()))?;
            println!("Paired with {} at {} ({})", config.name, config.address, config.id);
        }
        Command::Bridges => list_bridges(appstate, cli.json).await?,
        Command::Use { bridge } => {
            let id = appstate.registry().lock().await.find(&bridge)?.id;
            appstate.switch_bridge(&id).await?;
        }
        Command::Rename { bridge, name } => {
            let id = appstate.registry().lock().await.find(&bridge)?.id;
            appstate.rename_bridge(&id, &name).await?;
        }
        Command::Remove { bridge } => {
            let id = appstate.registry().lock().await.find(&bridge)?.id;
            let removed = appstate.remove_bridge(&id).await?;
            println!("Removed {}", removed.name);
        }
        Command::Demo => appstate.use_demo().await?,
        Command::Lights => show(appstate, ApiResourceType::Lights, cli.json).await?,
        Command::Groups => show(appstate, ApiResourceType::Groups, cli.json).await?,
        Command::Sensors => show(appstate, ApiResourceType::Sensors, cli.json).await?,
        Command::Light { id, action } => {
            control(appstate, ApiResourceType::Lights, &id, action).await?;
        }
        Command::Group { id, action } => {
            control(appstate, ApiResourceType::Groups, &id, action).await?;
        }
        Command::Watch => watch(appstate, cancel).await?,
    }

    Ok(())
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let cli = Cli::parse();

    let config = config::parse(&cli.config)?;
    log::debug!("Configuration loaded successfully");

    let appstate = AppState::from_config(config)?;

    let cancel = CancellationToken::new();
    install_signal_handlers(&cancel)?;

    let res = run_command(&appstate, cli, &cancel).await;

    appstate.shutdown().await;

    res
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("HueTrek error: {}", err.user_message());
        log::debug!("{err}");
        std::process::exit(1);
    }
}
