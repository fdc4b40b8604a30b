use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pdf-generator binary.
#[derive(Debug, Parser)]
#[command(
    name = "pdf-generator",
    version,
    about = "Render HTML documents to A4 PDFs with headless Chromium"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PDFGEN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP rendering service.
    Serve(Box<ServeArgs>),
    /// Render a single HTML file to PDF and exit.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowserOverrides {
    /// Override the Chrome/Chromium executable used for rendering.
    #[arg(long = "chrome-executable", env = "CHROME_BIN", value_name = "PATH")]
    pub chrome_executable: Option<PathBuf>,

    /// Run the browser headless (default) or with a visible window.
    #[arg(
        long = "browser-headless",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub headless: Option<bool>,

    /// Keep the Chromium sandbox enabled.
    #[arg(
        long = "browser-sandbox",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sandbox: Option<bool>,

    /// Override the settling delay applied before PDF export.
    #[arg(long = "render-settle-delay-ms", value_name = "MILLISECONDS")]
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Override the listener host.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Override the maximum accepted request body size in bytes.
    #[arg(long = "body-limit-bytes", value_name = "BYTES")]
    pub body_limit_bytes: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// HTML file whose contents become the document body.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Destination for the rendered PDF.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Extra stylesheet appended after the built-in styles.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub css: Option<PathBuf>,
}
