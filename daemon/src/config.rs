use serde::{Deserialize, Serialize};

use crate::cli::CliArgs;
use crate::error::ConfigError;

/// Process-wide tunables not exposed on the CLI, with committee-of-one
/// defaults matching the upstream implementation's behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often the CSV sideband writer flushes to disk.
    pub csv_flush_interval_secs: u64,
    /// Multiplier on `samples_per_epoch` used as the ring's overflow cap.
    pub ring_overflow_multiplier: usize,
    /// Per-sink outbound queue depth before drop-newest backpressure applies.
    pub sink_queue_depth: usize,
    /// Bounded grace period given to in-flight fan-out at shutdown.
    pub shutdown_grace_secs: u64,
    /// Datagram destination for the `--lsl` inter-application signal bus sink.
    pub lsl_target_addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            csv_flush_interval_secs: 5,
            ring_overflow_multiplier: 20,
            sink_queue_depth: 64,
            shutdown_grace_secs: 1,
            lsl_target_addr: "127.0.0.1:16571".to_string(),
        }
    }
}

/// TSDB connection parameters, present only when every credential was
/// supplied.
#[derive(Clone, Debug)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub raw_samples: bool,
}

/// TLS material for the control channel, present only when both cert and key
/// were supplied.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Fully validated, process-wide configuration. Construct via
/// [`Config::from_cli`], which enforces the cross-field invariants the CLI
/// parser alone cannot.
#[derive(Clone, Debug)]
pub struct Config {
    pub board_id: i32,
    pub channels: Vec<String>,
    pub serial_port: Option<String>,
    pub websocket_port: u16,
    pub samples_per_epoch: usize,
    pub output_dir: String,
    pub wait_for_commands: bool,
    pub just_wait: bool,
    pub influx: Option<InfluxConfig>,
    pub tls: Option<TlsConfig>,
    pub streamer: Option<String>,
    pub lsl: bool,
    pub daemon: DaemonConfig,
}

const DEFAULT_WEBSOCKET_PORT: u16 = 8080;

impl Config {
    pub fn from_cli(args: CliArgs) -> Result<Self, ConfigError> {
        if args.channels.is_empty() {
            return Err(ConfigError::MissingArgument("channels"));
        }

        let influx_fields = [
            args.influx_url.is_some(),
            args.influx_database.is_some(),
            args.influx_username.is_some(),
            args.influx_password.is_some(),
        ];
        let influx_present = influx_fields.iter().filter(|&&b| b).count();
        let influx = if influx_present == 4 {
            Some(InfluxConfig {
                url: args.influx_url.unwrap(),
                database: args.influx_database.unwrap(),
                username: args.influx_username.unwrap(),
                password: args.influx_password.unwrap(),
                raw_samples: args.influx_raw_samples,
            })
        } else if influx_present == 0 {
            None
        } else {
            return Err(ConfigError::IncompleteInflux);
        };

        let tls = match (args.ssl_cert, args.ssl_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig { cert_path, key_path }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        Ok(Config {
            board_id: args.board_id,
            channels: args.channels,
            serial_port: args.serial_port,
            websocket_port: args.websocket_port.unwrap_or(DEFAULT_WEBSOCKET_PORT),
            samples_per_epoch: args.samples_per_epoch,
            output_dir: args.output_dir,
            wait_for_commands: args.wait_for_commands,
            just_wait: args.just_wait,
            influx,
            tls,
            streamer: args.streamer,
            lsl: args.lsl,
            daemon: DaemonConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            board_id: 1,
            channels: vec!["Fp1".into(), "Fp2".into()],
            serial_port: None,
            websocket_port: None,
            samples_per_epoch: 250,
            output_dir: ".".into(),
            wait_for_commands: false,
            just_wait: false,
            influx_url: None,
            influx_database: None,
            influx_username: None,
            influx_password: None,
            influx_raw_samples: false,
            ssl_cert: None,
            ssl_key: None,
            streamer: None,
            lsl: false,
        }
    }

    #[test]
    fn defaults_apply_when_optional_fields_absent() {
        let config = Config::from_cli(base_args()).unwrap();
        assert_eq!(config.websocket_port, DEFAULT_WEBSOCKET_PORT);
        assert!(config.influx.is_none());
        assert!(config.tls.is_none());
    }

    #[test]
    fn partial_influx_credentials_are_rejected() {
        let mut args = base_args();
        args.influx_url = Some("http://localhost:8086".into());
        let err = Config::from_cli(args).unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteInflux));
    }

    #[test]
    fn partial_tls_material_is_rejected() {
        let mut args = base_args();
        args.ssl_cert = Some("cert.pem".into());
        let err = Config::from_cli(args).unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteTls));
    }

    #[test]
    fn complete_influx_credentials_are_accepted() {
        let mut args = base_args();
        args.influx_url = Some("http://localhost:8086".into());
        args.influx_database = Some("eeg".into());
        args.influx_username = Some("user".into());
        args.influx_password = Some("pass".into());
        let config = Config::from_cli(args).unwrap();
        assert!(config.influx.is_some());
    }
}
