use std::time::Duration;

use brainwave_daemon::cli::CliArgs;
use brainwave_daemon::config::Config;
use brainwave_daemon::control::{Command, OutEnvelope};
use brainwave_daemon::lifecycle::LifecycleController;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn test_args() -> CliArgs {
    CliArgs {
        board_id: 0,
        channels: vec!["Fp1".into(), "Fp2".into()],
        serial_port: None,
        websocket_port: None,
        samples_per_epoch: 64,
        output_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        wait_for_commands: true,
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

async fn next_envelope(rx: &mut tokio::sync::broadcast::Receiver<String>) -> serde_json::Value {
    let text = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for envelope")
        .expect("broadcast channel closed");
    serde_json::from_str(&text).expect("envelope was not valid JSON")
}

#[tokio::test]
async fn start_stop_cycle_emits_connected_then_stopped() {
    let config = Config::from_cli(test_args()).unwrap();
    let broadcaster = brainwave_daemon::control::Broadcaster::new(32);
    let mut events = broadcaster.subscribe();

    let mut controller = LifecycleController::new(config, broadcaster);
    let (commands_tx, commands_rx) = mpsc::channel(4);
    let run_handle = tokio::spawn(async move {
        controller.run(commands_rx).await;
    });

    commands_tx.send(Command::Start { channels: None }).await.unwrap();

    let mut saw_connected = false;
    for _ in 0..6 {
        let envelope = next_envelope(&mut events).await;
        if envelope["address"] == "brainflow_event" && envelope["event"] == "connected" {
            saw_connected = true;
            break;
        }
    }
    assert!(saw_connected, "expected a brainflow_event(connected) envelope");

    commands_tx.send(Command::Stop).await.unwrap();
    let mut saw_stopped = false;
    for _ in 0..6 {
        let envelope = next_envelope(&mut events).await;
        if envelope["address"] == "brainflow_event" && envelope["event"] == "stopped" {
            saw_stopped = true;
            break;
        }
    }
    assert!(saw_stopped, "expected a brainflow_event(stopped) envelope");

    commands_tx.send(Command::Quit).await.unwrap();
    let _ = timeout(Duration::from_secs(2), run_handle).await;
}

#[tokio::test]
async fn unknown_command_returns_error_envelope_without_stopping_pipeline() {
    use brainwave_daemon::control::parse_command;

    let err = parse_command(r#"{"command":"frobnicate"}"#).unwrap_err();
    let envelope = OutEnvelope::log_with_status(err.to_string(), "error");
    let json = serde_json::to_string(&envelope).unwrap();
    assert!(json.contains(r#""status":"error""#));
}
