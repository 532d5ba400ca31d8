//! Server configuration from environment.

use sar_core::{SimulationConfig, ZoomBounds};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub simulation: SimulationConfig,
    /// How often the loop polls the simulation clock
    pub clock_resolution_ms: u64,
    /// Snapshot broadcast buffer; slower subscribers lag and resync
    pub stream_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            simulation: SimulationConfig::default(),
            clock_resolution_ms: 100,
            stream_capacity: 256,
            log_format: LogFormat::Text,
        }
    }
}

fn var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let sim = defaults.simulation.clone();
        let zoom = ZoomBounds {
            min: var("SAR_ZOOM_MIN").unwrap_or(sim.zoom.min),
            max: var("SAR_ZOOM_MAX").unwrap_or(sim.zoom.max),
            step: var("SAR_ZOOM_STEP").unwrap_or(sim.zoom.step),
        }
        .normalized();

        let simulation = SimulationConfig {
            drone_telemetry_interval_ms: var("SAR_DRONE_TICK_MS")
                .unwrap_or(sim.drone_telemetry_interval_ms),
            drone_position_interval_ms: var("SAR_POSITION_TICK_MS")
                .unwrap_or(sim.drone_position_interval_ms),
            victim_vitals_interval_ms: var("SAR_VICTIM_TICK_MS")
                .unwrap_or(sim.victim_vitals_interval_ms),
            metrics_interval_ms: var("SAR_METRICS_TICK_MS").unwrap_or(sim.metrics_interval_ms),
            alert_rotation_interval_ms: var("SAR_ALERT_ROTATE_MS")
                .unwrap_or(sim.alert_rotation_interval_ms),
            alert_page_size: var("SAR_ALERT_PAGE_SIZE").unwrap_or(sim.alert_page_size),
            alert_capacity: var("SAR_ALERT_CAPACITY").unwrap_or(sim.alert_capacity),
            timeline_capacity: var("SAR_TIMELINE_CAP").unwrap_or(sim.timeline_capacity),
            zoom,
            seed: var("SAR_SEED"),
        };

        let log_format = match env::var("SAR_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            server_port: var("SAR_PORT").unwrap_or(defaults.server_port),
            simulation,
            clock_resolution_ms: var::<u64>("SAR_CLOCK_RESOLUTION_MS")
                .unwrap_or(defaults.clock_resolution_ms)
                .max(1),
            stream_capacity: var::<usize>("SAR_STREAM_CAPACITY")
                .unwrap_or(defaults.stream_capacity)
                .max(1),
            log_format,
        }
    }
}
