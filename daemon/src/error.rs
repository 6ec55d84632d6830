use thiserror::Error;

/// Fatal, startup-only configuration faults. The only error kind (besides an
/// explicit `quit`) that terminates the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),
    #[error("inconsistent influx credentials: provide all of url/database/username/password or none")]
    IncompleteInflux,
    #[error("--ssl_cert and --ssl_key must both be provided or neither")]
    IncompleteTls,
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A malformed or unrecognized inbound control-channel message. The
/// connection survives; only an error envelope is sent back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON command: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// A sink failed to deliver an epoch. Logged and dropped; acquisition
/// continues regardless.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("tsdb write failed: {0}")]
    Tsdb(String),
    #[error("broadcast send failed: {0}")]
    Broadcast(String),
    #[error("csv write failed: {0}")]
    Csv(#[from] std::io::Error),
}
