use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_TICK_RATE_HZ: f64 = 60.0;

/// Runtime settings of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Update ticks per second.
    pub tick_rate_hz: f64,
    /// Root pulses running longer than this are aborted.
    pub pulse_timeout_ms: Option<u64>,
    /// Lookup key -> parameter name, used by registered parameter nodes.
    pub registered_parameters: HashMap<String, String>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            pulse_timeout_ms: None,
            registered_parameters: HashMap::new(),
        }
    }
}

impl FieldConfig {
    pub fn tick_interval(&self) -> Duration {
        let rate = if self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0 {
            self.tick_rate_hz
        } else {
            DEFAULT_TICK_RATE_HZ
        };
        Duration::from_secs_f64(1.0 / rate)
    }

    pub fn pulse_timeout(&self) -> Option<Duration> {
        self.pulse_timeout_ms.map(Duration::from_millis)
    }

    pub fn register_parameter(mut self, lookup: &str, name: &str) -> Self {
        self.registered_parameters
            .insert(lookup.to_string(), name.to_string());
        self
    }

    pub fn resolve_parameter(&self, lookup: &str) -> Option<&str> {
        self.registered_parameters.get(lookup).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tick_rate_falls_back_to_default() {
        let config = FieldConfig {
            tick_rate_hz: 0.0,
            ..FieldConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn registered_parameters_resolve() {
        let config = FieldConfig::default().register_parameter("mute", "MuteSelf");
        assert_eq!(config.resolve_parameter("mute"), Some("MuteSelf"));
        assert_eq!(config.resolve_parameter("other"), None);
    }
}
