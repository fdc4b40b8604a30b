//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{env, net::SocketAddr, num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{BrowserOverrides, CliArgs, Command, RenderArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pdf-generator";
const ENV_PREFIX: &str = "PDFGEN";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_BODY_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_BROWSER_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FILENAME: &str = "document.pdf";

/// Plain environment variables consulted for the listener port, first match wins.
pub const PORT_ENV_VARS: [&str; 2] = ["PORT", "PDF_GENERATOR_PORT"];

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub browser: BrowserSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub body_limit_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary; auto-detected when absent.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub extra_args: Vec<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub settle_delay: Duration,
    pub network_idle: Duration,
    pub readiness_timeout: Duration,
    pub default_filename: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: false,
            extra_args: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_BROWSER_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            network_idle: Duration::from_millis(DEFAULT_NETWORK_IDLE_MS),
            readiness_timeout: Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECS),
            default_filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence
/// (files → `PDFGEN__*` → `PORT`/`PDF_GENERATOR_PORT` → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("browser.extra_args")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_port_env(|name| env::var(name).ok())?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_browser_overrides(&args.browser),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    browser: RawBrowserSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    /// Apply the first non-empty port variable from [`PORT_ENV_VARS`].
    fn apply_port_env<F>(&mut self, lookup: F) -> Result<(), LoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = PORT_ENV_VARS.iter().find_map(|name| {
            lookup(name).and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        });

        if let Some(value) = value {
            let port = value.parse::<u16>().map_err(|err| {
                LoadError::invalid("server.port", format!("`{value}` is not a port: {err}"))
            })?;
            self.server.port = Some(port);
        }

        Ok(())
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.body_limit_bytes {
            self.server.body_limit_bytes = Some(limit);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_browser_overrides(&overrides.browser);
    }

    fn apply_browser_overrides(&mut self, overrides: &BrowserOverrides) {
        if let Some(path) = overrides.chrome_executable.as_ref() {
            self.browser.executable = Some(path.clone());
        }
        if let Some(headless) = overrides.headless {
            self.browser.headless = Some(headless);
        }
        if let Some(sandbox) = overrides.sandbox {
            self.browser.sandbox = Some(sandbox);
        }
        if let Some(delay) = overrides.settle_delay_ms {
            self.render.settle_delay_ms = Some(delay);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            browser,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            browser: build_browser_settings(browser)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let limit_value = server.body_limit_bytes.unwrap_or(DEFAULT_BODY_LIMIT_BYTES);
    let body_limit_bytes = NonZeroU64::new(limit_value).ok_or_else(|| {
        LoadError::invalid("server.body_limit_bytes", "must be greater than zero")
    })?;
    usize::try_from(limit_value).map_err(|_| {
        LoadError::invalid(
            "server.body_limit_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        body_limit_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let defaults = BrowserSettings::default();

    let executable = browser
        .executable
        .filter(|path| !path.as_os_str().is_empty());

    let timeout_secs = browser
        .request_timeout_seconds
        .unwrap_or(DEFAULT_BROWSER_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "browser.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let extra_args = browser
        .extra_args
        .unwrap_or_default()
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .collect();

    Ok(BrowserSettings {
        executable,
        headless: browser.headless.unwrap_or(defaults.headless),
        sandbox: browser.sandbox.unwrap_or(defaults.sandbox),
        extra_args,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let settle_delay =
        Duration::from_millis(render.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS));
    let network_idle =
        Duration::from_millis(render.network_idle_ms.unwrap_or(DEFAULT_NETWORK_IDLE_MS));

    let readiness_secs = render
        .readiness_timeout_seconds
        .unwrap_or(DEFAULT_READINESS_TIMEOUT_SECS);
    if readiness_secs == 0 {
        return Err(LoadError::invalid(
            "render.readiness_timeout_seconds",
            "must be greater than zero",
        ));
    }
    let readiness_timeout = Duration::from_secs(readiness_secs);
    if network_idle >= readiness_timeout {
        return Err(LoadError::invalid(
            "render.network_idle_ms",
            "must be shorter than render.readiness_timeout_seconds",
        ));
    }

    let default_filename = render
        .default_filename
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    if default_filename.is_empty() {
        return Err(LoadError::invalid(
            "render.default_filename",
            "must not be empty",
        ));
    }

    Ok(RenderSettings {
        settle_delay,
        network_idle,
        readiness_timeout,
        default_filename,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    body_limit_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    executable: Option<PathBuf>,
    headless: Option<bool>,
    sandbox: Option<bool>,
    extra_args: Option<Vec<String>>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    settle_delay_ms: Option<u64>,
    network_idle_ms: Option<u64>,
    readiness_timeout_seconds: Option<u64>,
    default_filename: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
