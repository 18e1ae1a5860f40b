use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the listening socket, the relay timers and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub relay: RelaySettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Timers used by the relay: the heartbeat period and the transport keepalive.
#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    pub heartbeat_interval_secs: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RelaySettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// How long a peer may stay silent before the transport closes it.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs + self.ping_timeout_secs)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub relay: Option<PartialRelaySettings>,
    pub log: Option<PartialLogSettings>,
}

/// Partial server settings.
///
/// Used when loading server configuration from external sources with optional values.
#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Partial relay settings.
#[derive(Debug, Deserialize)]
pub struct PartialRelaySettings {
    pub heartbeat_interval_secs: Option<u64>,
    pub ping_interval_secs: Option<u64>,
    pub ping_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "localhost".to_string(),
                port: 3004,
            },
            relay: RelaySettings {
                heartbeat_interval_secs: 30,
                ping_interval_secs: 20,
                ping_timeout_secs: 10,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge_onto(self, default: Settings) -> Settings {
        let server = self.server;
        let relay = self.relay;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            relay: RelaySettings {
                heartbeat_interval_secs: relay
                    .as_ref()
                    .and_then(|r| r.heartbeat_interval_secs)
                    .unwrap_or(default.relay.heartbeat_interval_secs),
                ping_interval_secs: relay
                    .as_ref()
                    .and_then(|r| r.ping_interval_secs)
                    .unwrap_or(default.relay.ping_interval_secs),
                ping_timeout_secs: relay
                    .as_ref()
                    .and_then(|r| r.ping_timeout_secs)
                    .unwrap_or(default.relay.ping_timeout_secs),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
