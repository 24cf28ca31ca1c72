use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};
use tokio::time::{interval, MissedTickBehavior};

use manager::{EventDispatcher, GameManager, WardenConfig};
use rcon::{DestinationRegistry, QueryKind, RconConnection, ServerStatus};
use shared::{CoreEvent, GameServerEvent, Manager, ServerEventKind};

/// Main-method of the application.
/// Parses command-line arguments, loads the server list, then runs the event
/// pump and one status monitor per managed server until ctrl-c.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Path to the JSON configuration file
        #[clap(short, long, default_value = "warden.json")]
        config: String,
        /// Override the status poll interval (seconds)
        #[clap(short, long)]
        poll_interval: Option<u64>,
    }

    env_logger::init();

    let args = Args::parse();
    let mut config = WardenConfig::load(&args.config)?;
    if let Some(secs) = args.poll_interval {
        config.poll_interval_secs = secs;
    }

    let registry = Arc::new(DestinationRegistry::new());
    let manager = Arc::new(GameManager::new(
        config.servers.iter().map(|server| server.address).collect(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new());
    let token = manager.cancellation_token();

    // Event pump runs for the process lifetime.
    let pump = {
        let dispatcher = Arc::clone(&dispatcher);
        let token = token.clone();
        tokio::spawn(async move { dispatcher.start_processing(token).await })
    };

    // One monitor per server.
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let mut monitors = Vec::with_capacity(config.servers.len());
    for server in &config.servers {
        info!("monitoring {} ({})", server.display_name(), server.address);
        let connection = RconConnection::new(
            server.address,
            server.rcon_password.clone(),
            Arc::clone(&registry),
        );
        let manager: Arc<dyn Manager> = manager.clone();
        let dispatcher = Arc::clone(&dispatcher);
        monitors.push(tokio::spawn(monitor_server(
            connection,
            manager,
            dispatcher,
            poll_interval,
        )));
    }

    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down");

    // Flip is_running first so routine events stop, give connect/disconnect
    // bookkeeping a moment to drain, then cancel everything.
    manager.begin_shutdown();
    tokio::time::sleep(Duration::from_millis(250)).await;
    token.cancel();

    for monitor in monitors {
        let _ = monitor.await;
    }
    let _ = pump.await;

    Ok(())
}

/// Polls one server's status on a fixed cadence and reports reachability
/// changes as game-server events.
async fn monitor_server(
    connection: RconConnection,
    manager: Arc<dyn Manager>,
    dispatcher: Arc<EventDispatcher>,
    poll_interval: Duration,
) {
    let token = manager.cancellation_token();
    let endpoint = connection.endpoint();

    dispatcher.queue_event(
        Arc::clone(&manager),
        CoreEvent::Server(GameServerEvent {
            kind: ServerEventKind::MonitoringStarted,
            server: endpoint,
        }),
    );

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reachable = true;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match connection.send_query(QueryKind::GetStatus, "", true).await {
            Ok(lines) => {
                match ServerStatus::parse(&lines) {
                    Ok(status) => debug!(
                        "{}: {} players on {}",
                        endpoint,
                        status.players.len(),
                        status.map_name().unwrap_or("unknown map"),
                    ),
                    Err(err) => warn!("{}: {}", endpoint, err),
                }
                if !reachable {
                    reachable = true;
                    info!("{} is reachable again", endpoint);
                    dispatcher.queue_event(
                        Arc::clone(&manager),
                        CoreEvent::Server(GameServerEvent {
                            kind: ServerEventKind::ConnectionRestored,
                            server: endpoint,
                        }),
                    );
                }
            }
            Err(err) => {
                warn!("status query to {} failed: {}", endpoint, err);
                if reachable {
                    reachable = false;
                    dispatcher.queue_event(
                        Arc::clone(&manager),
                        CoreEvent::Server(GameServerEvent {
                            kind: ServerEventKind::ConnectionLost,
                            server: endpoint,
                        }),
                    );
                }
            }
        }
    }

    dispatcher.queue_event(
        manager,
        CoreEvent::Server(GameServerEvent {
            kind: ServerEventKind::MonitoringStopped,
            server: endpoint,
        }),
    );
}
