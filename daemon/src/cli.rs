use clap::Parser;

/// Command-line surface for the acquisition daemon. Field names mirror the
/// upstream Python tool's flag names so existing launch scripts keep working.
#[derive(Parser, Clone, Debug)]
#[command(name = "brainwave_daemon", about = "Real-time EEG acquisition and feature pipeline")]
pub struct CliArgs {
    /// Acquisition board identifier.
    #[arg(short = 'b', long = "board_id")]
    pub board_id: i32,

    /// Enabled channel labels, in acquisition order.
    #[arg(short = 'c', long = "channels", num_args = 1.., required = true)]
    pub channels: Vec<String>,

    /// Serial device path for the acquisition board.
    #[arg(long = "serial_port", alias = "sp")]
    pub serial_port: Option<String>,

    /// Control-channel (WebSocket) listen port.
    #[arg(long = "websocket_port", alias = "wp")]
    pub websocket_port: Option<u16>,

    /// Samples per epoch (`N`).
    #[arg(long = "samples_per_epoch", alias = "spe", default_value_t = 250)]
    pub samples_per_epoch: usize,

    /// Directory for CSV sideband persistence.
    #[arg(short = 'o', long = "output_dir", default_value = ".")]
    pub output_dir: String,

    /// Stay IDLE at startup until an explicit `start` command arrives.
    #[arg(short = 'w', long = "wait_for_commands", default_value_t = false)]
    pub wait_for_commands: bool,

    /// Diagnostic idle mode: accept connections but never run the pipeline.
    #[arg(short = 'j', long = "just_wait", default_value_t = false)]
    pub just_wait: bool,

    #[arg(long = "influx_url")]
    pub influx_url: Option<String>,
    #[arg(long = "influx_database")]
    pub influx_database: Option<String>,
    #[arg(long = "influx_username")]
    pub influx_username: Option<String>,
    #[arg(long = "influx_password")]
    pub influx_password: Option<String>,

    /// Writes every raw sample (not just epoch aggregates) to the TSDB.
    /// Off by default; see the Open Question on raw-sample writes.
    #[arg(long = "influx_raw_samples", default_value_t = false)]
    pub influx_raw_samples: bool,

    /// TLS certificate for the control channel.
    #[arg(long = "ssl_cert")]
    pub ssl_cert: Option<String>,
    /// TLS private key for the control channel.
    #[arg(long = "ssl_key")]
    pub ssl_key: Option<String>,

    /// Optional sideband streamer URI, driver-owned.
    #[arg(long = "streamer")]
    pub streamer: Option<String>,

    /// Enables the inter-application (LSL-style) sideband sink.
    #[arg(long = "lsl", default_value_t = false)]
    pub lsl: bool,
}
