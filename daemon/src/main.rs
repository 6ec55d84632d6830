use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use brainwave_daemon::cli::CliArgs;
use brainwave_daemon::config::Config;
use brainwave_daemon::control::{self, Broadcaster};
use brainwave_daemon::lifecycle::LifecycleController;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    info!(?args, "starting brainwave_daemon with args");

    let config = Config::from_cli(args)?;
    let websocket_port = config.websocket_port;

    let broadcaster = Broadcaster::new(config.daemon.sink_queue_depth);
    let (commands_tx, commands_rx) = mpsc::channel(16);

    let routes = control::routes(broadcaster.clone(), commands_tx);
    let server_handle = tokio::spawn(warp::serve(routes).run(([0, 0, 0, 0], websocket_port)));

    info!(port = websocket_port, "control channel listening");

    let mut controller = LifecycleController::new(config, broadcaster);
    let controller_handle = tokio::spawn(async move {
        controller.run(commands_rx).await;
    });

    tokio::select! {
        _ = server_handle => {
            info!("control channel server exited");
        }
        _ = controller_handle => {
            info!("lifecycle controller exited, process shutting down");
        }
    }

    Ok(())
}
