use std::future::IntoFuture;
use std::io::Write;
use std::process;
use std::sync::Arc;

use inkpost::{
    application::{blog::BlogService, error::AppError},
    cache::{CacheConfig, QueryCache},
    config,
    infra::{
        self,
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Search(args) => run_search(settings, args).await,
    }
}

async fn build_blog_service(settings: &config::Settings) -> Result<BlogService, AppError> {
    let source = infra::build_source(&settings.source).await?;
    let cache = QueryCache::new(CacheConfig::from(&settings.cache));
    Ok(BlogService::new(source, cache, settings.content.limits()))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let blog = build_blog_service(&settings).await?;
    let state = AppState {
        blog,
        revalidate_token: settings.admin.revalidate_token.clone(),
    };
    if state.revalidate_token.is_none() {
        info!("no revalidate token configured, cache revalidation endpoint disabled");
    }
    serve_http(&settings, state).await
}

async fn run_search(settings: config::Settings, args: config::SearchArgs) -> Result<(), AppError> {
    let blog = build_blog_service(&settings).await?;
    let posts = blog.search(&args.query, Some(args.limit)).await?;
    info!(query = %args.query, results = posts.len(), "search finished");

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &posts)
        .map_err(|err| AppError::unexpected(format!("failed to encode results: {err}")))?;
    writeln!(stdout).map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { trigger.notified().await });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        outcome = &mut server => return flatten_server(outcome),
        () = shutdown_signal() => {
            info!(
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "shutdown requested, draining connections"
            );
            shutdown.notify_one();
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(outcome) => flatten_server(outcome),
        Err(_) => {
            warn!("graceful shutdown timed out, dropping open connections");
            Ok(())
        }
    }
}

fn flatten_server(
    outcome: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
