use std::{future::IntoFuture, process, sync::Arc};

use pdf_generator::{
    application::{
        error::AppError,
        render::{ChromiumPdfRenderer, PdfRenderer, RenderRequest},
    },
    config,
    infra::{
        browser::{BrowserManager, BrowsingContextProvider},
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let browser = BrowserManager::shared(settings.browser.clone());
    let renderer: Arc<dyn PdfRenderer> = Arc::new(ChromiumPdfRenderer::new(
        browser.clone(),
        &settings.render,
    ));
    let state = HttpState::new(renderer, settings.render.default_filename.as_str());
    let body_limit = usize::try_from(settings.server.body_limit_bytes.get())
        .map_err(|_| InfraError::configuration("server.body_limit_bytes exceeds usize"))?;
    let router = http::build_router(state, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;
    info!(
        target = "pdf_generator::server",
        addr = %settings.server.addr,
        "PDF generator listening"
    );

    let served = tokio::select! {
        result = axum::serve(listener, router.into_make_service()).into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        signal = shutdown_signal() => {
            info!(target = "pdf_generator::server", signal, "Shutdown signal received");
            Ok(())
        }
    };

    if let Err(err) = browser.shutdown().await {
        warn!(
            target = "pdf_generator::server",
            error = %err,
            "Browser shutdown failed"
        );
    }
    served
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let html = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| InfraError::read(&args.input, err))?;
    let mut request = RenderRequest::new(html);
    if let Some(css_path) = args.css.as_ref() {
        let css = tokio::fs::read_to_string(css_path)
            .await
            .map_err(|err| InfraError::read(css_path, err))?;
        request = request.with_css(css);
    }

    let browser = BrowserManager::shared(settings.browser.clone());
    let renderer = ChromiumPdfRenderer::new(browser.clone(), &settings.render);
    let rendered = renderer.render(&request).await;
    browser.shutdown().await?;
    let pdf = rendered?;

    tokio::fs::write(&args.output, &pdf)
        .await
        .map_err(|err| InfraError::write(&args.output, err))?;
    info!(
        target = "pdf_generator::render",
        input = %args.input.display(),
        output = %args.output.display(),
        pdf_bytes = pdf.len(),
        "PDF written"
    );
    Ok(())
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(
                target = "pdf_generator::server",
                error = %err,
                "Failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(
                    target = "pdf_generator::server",
                    error = %err,
                    "Failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
