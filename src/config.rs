use camino::Utf8Path;
use config::{Config, ConfigError};

pub use huetrek_api::config::*;

pub const DEFAULT_DEVICETYPE: &str = "hue_ios_app";

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("huetrek.state_file", "huetrek-state.yaml")?
        .set_default("huetrek.request_timeout_secs", 10)?
        .set_default("huetrek.demo_fallback", false)?
        .set_default("discovery.cloud_url", hue::HUE_DISCOVERY_URL)?
        .set_default("discovery.ssdp_target", hue::SSDP_TARGET.to_string())?
        .set_default("discovery.ssdp_timeout_secs", 5)?
        .set_default("discovery.mdns", false)?
        .set_default("discovery.mdns_timeout_secs", 5)?
        .set_default("pairing.devicetype", DEFAULT_DEVICETYPE)?
        .set_default("pairing.poll_interval_secs", 2)?
        .set_default("pairing.attempts", 30)?
        .set_default("sync.poll_interval_secs", 30)?
        .add_source(config::File::with_name(filename.as_str()).required(false))
        .build()?;

    settings.try_deserialize()
}
