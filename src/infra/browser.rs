//! Lifecycle owner for the shared headless browser and its browsing context.
//!
//! One browser process and one browsing context exist at a time. Both are
//! created on first use and reused by every render; each render gets its own
//! page inside the context. [`BrowserManager::shutdown`] tears both down, and
//! the next [`BrowsingContextProvider::open_page`] call launches them again.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::browser_protocol::{
        browser::BrowserContextId,
        target::{CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams},
    },
};
use futures::StreamExt;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;

const BLANK_PAGE: &str = "about:blank";

/// Flags applied to every launch regardless of configuration.
const BASE_ARGS: [&str; 4] = [
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--hide-scrollbars",
    "--font-render-hinting=none",
];

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("invalid browser configuration: {0}")]
    Config(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to create browsing context: {0}")]
    Context(String),
    #[error("failed to open page: {0}")]
    Page(String),
    #[error("failed to shut down browser: {0}")]
    Shutdown(String),
}

/// Source of pages for the render pipeline.
///
/// Implementations own the browser lifecycle; callers only ever see pages and
/// are responsible for closing them.
#[async_trait]
pub trait BrowsingContextProvider: Send + Sync {
    /// Open a fresh page in the shared browsing context, creating the browser
    /// and context first if none are running.
    async fn open_page(&self) -> Result<Page, BrowserError>;

    /// Dispose the browsing context and close the browser process.
    async fn shutdown(&self) -> Result<(), BrowserError>;

    /// Whether a browser session currently exists.
    async fn is_running(&self) -> bool;
}

struct BrowserSession {
    browser: Browser,
    context_id: BrowserContextId,
    handler: JoinHandle<()>,
}

/// Lazily-initialised, process-wide browser and browsing context.
pub struct BrowserManager {
    settings: BrowserSettings,
    session: Mutex<Option<BrowserSession>>,
}

impl BrowserManager {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    pub fn shared(settings: BrowserSettings) -> Arc<Self> {
        Arc::new(Self::new(settings))
    }

    async fn launch(&self) -> Result<BrowserSession, BrowserError> {
        let config = browser_config(&self.settings)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(
                        target = "pdf_generator::browser",
                        error = %err,
                        "Browser handler reported an error"
                    );
                }
            }
            debug!(
                target = "pdf_generator::browser",
                "Browser handler stream ended"
            );
        });

        let context_id = match browser
            .execute(CreateBrowserContextParams::default())
            .await
        {
            Ok(response) => response.result.browser_context_id,
            Err(err) => {
                if let Err(close_err) = browser.close().await {
                    warn!(
                        target = "pdf_generator::browser",
                        error = %close_err,
                        "Failed to close browser after context creation error"
                    );
                }
                handler.abort();
                return Err(BrowserError::Context(err.to_string()));
            }
        };

        info!(
            target = "pdf_generator::browser",
            headless = self.settings.headless,
            executable = self
                .settings
                .executable
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "auto".to_string()),
            "Browser and browsing context started"
        );

        Ok(BrowserSession {
            browser,
            context_id,
            handler,
        })
    }
}

#[async_trait]
impl BrowsingContextProvider for BrowserManager {
    async fn open_page(&self) -> Result<Page, BrowserError> {
        let mut guard = self.session.lock().await;

        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }

        let Some(session) = guard.as_ref() else {
            return Err(BrowserError::Context(
                "browsing context unavailable".to_string(),
            ));
        };

        let params = CreateTargetParams::builder()
            .url(BLANK_PAGE)
            .browser_context_id(session.context_id.clone())
            .build()
            .map_err(BrowserError::Page)?;

        session
            .browser
            .new_page(params)
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };

        if let Err(err) = session
            .browser
            .execute(DisposeBrowserContextParams::new(session.context_id.clone()))
            .await
        {
            warn!(
                target = "pdf_generator::browser",
                error = %err,
                "Failed to dispose browsing context"
            );
        }

        let closed = session.browser.close().await;
        if closed.is_ok() {
            if let Err(err) = session.browser.wait().await {
                warn!(
                    target = "pdf_generator::browser",
                    error = %err,
                    "Failed to reap browser process"
                );
            }
        }
        session.handler.abort();

        closed.map_err(|err| BrowserError::Shutdown(err.to_string()))?;
        info!(target = "pdf_generator::browser", "Browser shut down");
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

fn browser_config(settings: &BrowserSettings) -> Result<BrowserConfig, BrowserError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(settings.request_timeout)
        .args(launch_args(settings));

    if !settings.headless {
        builder = builder.with_head();
    }
    if !settings.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = settings.executable.as_ref() {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(BrowserError::Config)
}

/// Extra command-line flags passed to the browser process.
pub(crate) fn launch_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(|arg| arg.to_string()).collect();
    for arg in &settings.extra_args {
        if !args.contains(arg) {
            args.push(arg.clone());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_include_base_flags() {
        let args = launch_args(&BrowserSettings::default());
        assert!(args.iter().any(|arg| arg == "--disable-dev-shm-usage"));
        assert!(args.iter().any(|arg| arg == "--font-render-hinting=none"));
    }

    #[test]
    fn launch_args_append_extra_flags_without_duplicates() {
        let settings = BrowserSettings {
            extra_args: vec!["--lang=de-DE".to_string(), "--disable-gpu".to_string()],
            ..BrowserSettings::default()
        };

        let args = launch_args(&settings);
        assert_eq!(args.last().map(String::as_str), Some("--lang=de-DE"));
        assert_eq!(args.iter().filter(|arg| *arg == "--disable-gpu").count(), 1);
    }

    #[tokio::test]
    async fn shutdown_without_session_is_a_no_op() {
        let manager = BrowserManager::new(BrowserSettings::default());
        assert!(!manager.is_running().await);
        manager.shutdown().await.expect("nothing to shut down");
        assert!(!manager.is_running().await);
    }
}
