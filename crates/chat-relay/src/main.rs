mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use chat_bus::{EventBus, LoggingSubscriber, SubscriberId};
use chat_moderation::{ModerationContext, ModerationPolicy};
use chat_server::{ChatServer, ChatServerConfig};
use chat_stats::{spawn_reporter, StatsAggregator};
use chat_transcript::TranscriptSink;
use ws_gateway::Gateway;

use crate::cli::Cli;

/// How long to wait for the transcript writer to flush on shutdown.
const TRANSCRIPT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge overrides: CLI, then PORT, then file.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref listen) = cli.listen {
        cfg.network.listen_addr = listen.clone();
    } else if let Ok(port) = std::env::var("PORT") {
        cfg.network.listen_addr = format!("0.0.0.0:{port}");
    }
    if let Some(strategy) = cli.strategy {
        cfg.moderation.strategy = Some(strategy);
    }
    if let Some(ref policy) = cli.policy {
        cfg.moderation.policy_file = Some(policy.clone());
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        listen = %cfg.network.listen_addr,
        "chat-relay starting"
    );

    // 4. Load the moderation policy.
    let policy = match cfg.moderation.policy_file {
        Some(ref path) => chat_moderation::loader::load_policy(path)
            .context("failed to load moderation policy")?,
        None => ModerationPolicy::default(),
    };
    let strategy = cfg.moderation.strategy.unwrap_or(policy.default_strategy);
    let moderation = Arc::new(ModerationContext::with_strategy(policy, strategy));

    info!(
        policy_file = ?cfg.moderation.policy_file,
        strategy = %moderation.strategy_name(),
        "moderation configured"
    );

    // 5. Start the event bus and its passive observers.
    let (bus, _bus_handle) = EventBus::start(cfg.bus.ingress_capacity);
    bus.subscribe(
        SubscriberId::from(LoggingSubscriber::ID),
        Arc::new(LoggingSubscriber),
    );

    let transcript = match cfg.logging.transcript() {
        Some(transcript_cfg) => {
            let path = transcript_cfg.path.clone();
            let max_bytes = transcript_cfg.max_bytes;
            let (sink, handle) = TranscriptSink::start(transcript_cfg)
                .await
                .context("failed to start transcript writer")?;
            bus.subscribe(SubscriberId::from(TranscriptSink::ID), sink.clone());
            info!(path = %path.display(), ?max_bytes, "transcript enabled");
            Some((sink, handle))
        }
        None => None,
    };

    let stats = StatsAggregator::shared();
    let reporter = spawn_reporter(
        Arc::clone(&stats),
        Duration::from_secs(cfg.stats.report_interval_secs),
    );

    // 6. Build the chat server and its WebSocket front door.
    let server = ChatServer::new(
        bus.clone(),
        Arc::clone(&moderation),
        stats,
        ChatServerConfig {
            mailbox_capacity: cfg.bus.mailbox_capacity,
        },
    );

    let listen_addr: SocketAddr = cfg
        .network
        .listen_addr
        .parse()
        .context("invalid listen address")?;
    let gateway = Gateway::new(listen_addr, server.clone());

    // 7. Serve until the gateway fails or a shutdown signal arrives.
    let gateway_result = tokio::select! {
        r = gateway.run() => {
            info!("gateway exited");
            r
        }
        _ = shutdown_signal() => Ok(()),
    };

    // 8. Shut down.
    info!(
        connections = server.connection_count(),
        moderation = ?moderation.stats(),
        bus = ?server.bus_metrics(),
        "chat-relay shutting down"
    );

    server.shutdown();
    reporter.abort();

    if let Some((sink, handle)) = transcript {
        bus.unsubscribe(&SubscriberId::from(TranscriptSink::ID));
        drop(sink);
        if tokio::time::timeout(TRANSCRIPT_DRAIN_TIMEOUT, handle)
            .await
            .is_err()
        {
            warn!("transcript writer did not finish flushing in time");
        }
    }

    gateway_result
}

/// Resolve on ctrl-c or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (ctrl-c)"),
        _ = terminate => info!("received SIGTERM"),
    }
}
