use std::{process, sync::Arc};

use sqlx::PgPool;
use tokio::{net::TcpListener, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use warbler::{
    application::error::AppError,
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState, SessionConfig},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect(settings: &config::Settings) -> Result<PgPool, AppError> {
    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::Migrate)?;

    Ok(pool)
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect(&settings).await?;
    pool.close().await;
    info!(target = "warbler::migrate", "database schema is up to date");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    if settings.session.uses_default_secret() {
        warn!(
            target = "warbler::config",
            "session.secret_key is the built-in default; set SECRET_KEY before exposing the server"
        );
    }

    let pool = connect(&settings).await?;
    let state = HttpState::new(
        PostgresRepositories::new(pool.clone()),
        SessionConfig::from(&settings.session),
        settings.feed.limit,
    );
    let router = http::build_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;
    info!(
        target = "warbler::http",
        addr = %settings.server.addr,
        "listening"
    );

    let drain = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let drain = drain.clone();
        async move { drain.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    let result = tokio::select! {
        joined = &mut server => flatten_server_result(joined),
        () = shutdown_signal() => {
            drain.notify_one();
            match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
                Ok(joined) => flatten_server_result(joined),
                Err(_) => {
                    warn!(
                        target = "warbler::http",
                        "graceful shutdown timed out; dropping open connections"
                    );
                    Ok(())
                }
            }
        }
    };

    pool.close().await;
    result
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(InfraError::Serve(err).into()),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "warbler::http", error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!(target = "warbler::http", "shutdown signal received, draining connections");
}
