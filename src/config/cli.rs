use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the inkpost binary.
#[derive(Debug, Parser)]
#[command(name = "inkpost", version, about = "Inkpost blog content service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "INKPOST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the JSON HTTP service.
    Serve(Box<ServeArgs>),
    /// Run one ranked search against the configured source and print JSON.
    Search(SearchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKindArg {
    Mock,
    Remote,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SourceOverrides {
    /// Select the content source (mock|remote).
    #[arg(long = "source", value_enum, value_name = "KIND")]
    pub source_kind: Option<SourceKindArg>,

    /// Override the fixture file used by the mock source.
    #[arg(long = "fixtures", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub fixtures_path: Option<PathBuf>,

    /// Override the REST API base URL used by the remote source.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub source: SourceOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Toggle the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached queries.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub source: SourceOverrides,

    /// Free-text query matched against titles, bodies, taxonomy and authors.
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(usize))]
    pub limit: usize,
}
