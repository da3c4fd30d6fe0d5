//! Nitric demo application
//!
//! Registers an API route, a topic subscription, a schedule and a trigger
//! worker against a running Nitric server, then serves until the server
//! closes the streams or the process is interrupted.

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use nitric::context::WorkerContext;
use nitric::middleware::{Handler, compose, middleware};
use nitric::worker::Schedule;
use nitric::{
    ApiRoute, Config, HttpContext, IntervalContext, Manager, MessageContext, ShutdownHandle,
    StreamWorker, Subscription, TriggerHandlers,
};

/// Nitric demo - a few workers wired against a Nitric server
#[derive(Parser, Debug)]
#[command(name = "nitric-demo")]
#[command(about = "Runs demo workers against a Nitric server")]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Name of the API to serve routes on
    #[arg(long, default_value = "main")]
    api: String,

    /// Topic to subscribe to
    #[arg(long, default_value = "updates")]
    topic: String,

    /// Rate of the heartbeat schedule
    #[arg(long, default_value = "5 minutes")]
    every: String,
}

fn log_requests() -> nitric::Middleware<HttpContext> {
    middleware(|ctx: HttpContext, next: Handler<HttpContext>| async move {
        tracing::info!("{} {}", ctx.request.method(), ctx.request.path());
        next(ctx).await
    })
}

fn hello() -> nitric::Middleware<HttpContext> {
    middleware(|mut ctx: HttpContext, next: Handler<HttpContext>| async move {
        let name = ctx.request.path_param("name").unwrap_or("world").to_string();
        ctx.response.json(&json!({ "message": format!("hello {name}") }))?;
        next(ctx).await
    })
}

fn on_update() -> nitric::Middleware<MessageContext> {
    middleware(|ctx: MessageContext, next: Handler<MessageContext>| async move {
        tracing::info!(
            "Update {} on {}: {}",
            ctx.id(),
            ctx.request.topic_name(),
            ctx.request.message()
        );
        next(ctx).await
    })
}

fn heartbeat() -> nitric::Middleware<IntervalContext> {
    middleware(|ctx: IntervalContext, next: Handler<IntervalContext>| async move {
        tracing::info!("Heartbeat from {}", ctx.request.schedule_name());
        next(ctx).await
    })
}

async fn shutdown_signal(handle: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown requested");
    handle.shutdown();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let mut manager = Manager::new(args.config);

    let route = ApiRoute::new(&args.api, "/hello/:name").method("GET");
    let channel = manager.connect().await?;
    manager.register(StreamWorker::api(
        channel,
        route,
        compose([log_requests(), hello()]),
    ));

    let channel = manager.connect().await?;
    manager.register(StreamWorker::subscription(
        channel,
        Subscription::new(&args.topic),
        compose([on_update()]),
    ));

    let channel = manager.connect().await?;
    manager.register(StreamWorker::schedule(
        channel,
        Schedule::every("heartbeat", &args.every),
        compose([heartbeat()]),
    ));

    let channel = manager.connect().await?;
    manager.register(StreamWorker::trigger(
        channel,
        "demo",
        TriggerHandlers::new()
            .http(compose([log_requests(), hello()]))
            .event(on_update()),
    ));

    tokio::spawn(shutdown_signal(manager.shutdown_handle()));
    manager.run().await?;

    Ok(())
}
