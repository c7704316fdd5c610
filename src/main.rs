use std::{process, sync::Arc, time::Duration};

use clap::Parser;
use purgery::{
    application::{
        error::AppError, ingress::PurgeIngress, queue::PurgeQueue, worker::PurgeWorker,
    },
    config,
    infra::{
        http::{self, HttpState},
        purge::HttpPurger,
        store, telemetry,
    },
    shutdown::{self, Shutdown},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = config::CliArgs::parse();

    match cli_args.command.as_ref() {
        Some(config::Command::Migrate(args)) => run_migrate(&cli_args, args).await,
        Some(config::Command::Serve(_)) | None => run_serve(config::load(&cli_args)?).await,
    }
}

async fn run_migrate(
    cli_args: &config::CliArgs,
    args: &config::MigrateArgs,
) -> Result<(), AppError> {
    let settings = config::load_migrate(cli_args, args)?;
    telemetry::init(&settings.logging)?;

    // Opening the store applies any pending migrations.
    store::open(&settings.store)
        .await
        .map_err(AppError::Store)?;
    info!("purge store is up to date");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    telemetry::init(&settings.logging)?;

    let repo = store::open(&settings.store)
        .await
        .map_err(AppError::Store)?;
    let queue = PurgeQueue::new(repo, &settings.queue.options());
    let purger = HttpPurger::new(&settings.purge.options())?;
    let worker = PurgeWorker::new(queue.clone(), Arc::new(purger), settings.queue.backoff);
    let router = http::build_router(HttpState::new(
        PurgeIngress::new(queue),
        settings.auth.api_key.as_str(),
    ));

    let addr = settings.server.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;
    info!(
        %addr,
        consumer_id = %settings.queue.consumer_id,
        cache_addr = %settings.purge.cache_addr,
        "purgery listening"
    );

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown::os_signal().await;
            shutdown.trigger("signal received");
        }
    });

    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await
        }
    });
    let mut consumer = tokio::spawn(worker.run(shutdown.clone()));

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        joined = &mut server => {
            shutdown.trigger("http server stopped");
            drain(consumer, grace, "purge worker").await;
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(AppError::unexpected(format!("http server failed: {err}"))),
                Err(err) => Err(AppError::unexpected(format!("http server task failed: {err}"))),
            }
        }
        joined = &mut consumer => {
            shutdown.trigger("purge worker stopped");
            drain(server, grace, "http server").await;
            joined.map_err(|err| AppError::unexpected(format!("purge worker task failed: {err}")))
        }
    }
}

/// Wait for a sibling task to finish, abandoning it once `grace` elapses.
async fn drain<T>(handle: JoinHandle<T>, grace: Duration, task: &'static str) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(_)) => info!(task, "stopped"),
        Ok(Err(err)) => error!(task, error = %err, "task failed while stopping"),
        Err(_) => {
            warn!(task, ?grace, "did not stop within the grace period; abandoning");
            abort.abort();
        }
    }
}
