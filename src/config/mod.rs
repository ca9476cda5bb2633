//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::blog::ContentLimits;
use crate::application::pagination::{MAX_PAGE_SIZE, MAX_RELATED_LIMIT};
use crate::cache::Ttl;

mod cli;

pub use cli::{
    CliArgs, Command, SearchArgs, ServeArgs, ServeOverrides, SourceKindArg, SourceOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "inkpost";
const ENV_PREFIX: &str = "INKPOST";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_SHORT_TTL_SECS: u64 = 60;
const DEFAULT_MEDIUM_TTL_SECS: u64 = 300;
const DEFAULT_LONG_TTL_SECS: u64 = 3600;
const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_RECENT_LIMIT: u64 = 5;
const DEFAULT_RELATED_LIMIT: u64 = 3;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub source: SourceSettings,
    pub cache: CacheSettings,
    pub content: ContentSettings,
    pub admin: AdminSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

/// Which content source backs the service.
#[derive(Debug, Clone)]
pub enum SourceSettings {
    /// In-memory fixture store; `None` loads the bundled fixture.
    Mock { fixtures_path: Option<PathBuf> },
    Remote(RemoteSettings),
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub short_ttl: Ttl,
    pub medium_ttl: Ttl,
    pub long_ttl: Ttl,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub page_size: NonZeroU32,
    pub recent_limit: NonZeroUsize,
    pub related_limit: NonZeroUsize,
}

impl ContentSettings {
    pub fn limits(&self) -> ContentLimits {
        ContentLimits {
            page_size: self.page_size.get(),
            recent_limit: self.recent_limit.get(),
            related_limit: self.related_limit.get(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminSettings {
    /// Bearer token for `POST /api/revalidate`; the route is disabled when unset.
    pub revalidate_token: Option<String>,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Search(args)) => raw.apply_source_overrides(&args.source),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
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
    source: RawSourceSettings,
    cache: RawCacheSettings,
    content: RawContentSettings,
    admin: RawAdminSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }

        self.apply_source_overrides(&overrides.source);
    }

    fn apply_source_overrides(&mut self, overrides: &SourceOverrides) {
        if let Some(kind) = overrides.source_kind {
            self.source.kind = Some(match kind {
                SourceKindArg::Mock => "mock".to_string(),
                SourceKindArg::Remote => "remote".to_string(),
            });
        }
        if let Some(path) = overrides.fixtures_path.as_ref() {
            self.source.fixtures_path = Some(path.clone());
        }
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.source.api_base_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            source,
            cache,
            content,
            admin,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            source: build_source_settings(source)?,
            cache: build_cache_settings(cache)?,
            content: build_content_settings(content)?,
            admin: build_admin_settings(admin),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

fn build_source_settings(source: RawSourceSettings) -> Result<SourceSettings, LoadError> {
    let kind = source
        .kind
        .as_deref()
        .map(str::trim)
        .unwrap_or("mock")
        .to_ascii_lowercase();

    match kind.as_str() {
        "mock" => {
            let fixtures_path = source
                .fixtures_path
                .filter(|path| !path.as_os_str().is_empty());
            Ok(SourceSettings::Mock { fixtures_path })
        }
        "remote" => {
            let raw_url = source
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
            let mut base_url = Url::parse(raw_url.trim()).map_err(|err| {
                LoadError::invalid("source.api_base_url", format!("invalid URL: {err}"))
            })?;
            if base_url.cannot_be_a_base() {
                return Err(LoadError::invalid(
                    "source.api_base_url",
                    "URL cannot be used as a base",
                ));
            }
            if !base_url.path().ends_with('/') {
                let path = format!("{}/", base_url.path());
                base_url.set_path(&path);
            }

            let timeout_secs = source.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
            if timeout_secs == 0 {
                return Err(LoadError::invalid(
                    "source.timeout_seconds",
                    "must be greater than zero",
                ));
            }

            Ok(SourceSettings::Remote(RemoteSettings {
                base_url,
                api_token: non_blank(source.api_token),
                timeout: Duration::from_secs(timeout_secs),
            }))
        }
        other => Err(LoadError::invalid(
            "source.kind",
            format!("unknown source `{other}` (expected `mock` or `remote`)"),
        )),
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        short_ttl: ttl(
            cache.short_ttl.unwrap_or(DEFAULT_SHORT_TTL_SECS),
            "cache.short_ttl",
        )?,
        medium_ttl: ttl(
            cache.medium_ttl.unwrap_or(DEFAULT_MEDIUM_TTL_SECS),
            "cache.medium_ttl",
        )?,
        long_ttl: ttl(
            cache.long_ttl.unwrap_or(DEFAULT_LONG_TTL_SECS),
            "cache.long_ttl",
        )?,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let page_size = non_zero_u32(
        content.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        "content.page_size",
    )?;
    if page_size.get() > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "content.page_size",
            format!("must be at most {MAX_PAGE_SIZE}"),
        ));
    }

    let recent_limit = non_zero_usize(
        content.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT),
        "content.recent_limit",
    )?;
    let related_limit = non_zero_usize(
        content.related_limit.unwrap_or(DEFAULT_RELATED_LIMIT),
        "content.related_limit",
    )?;
    if related_limit.get() > MAX_RELATED_LIMIT {
        return Err(LoadError::invalid(
            "content.related_limit",
            format!("must be at most {MAX_RELATED_LIMIT}"),
        ));
    }

    Ok(ContentSettings {
        page_size,
        recent_limit,
        related_limit,
    })
}

fn build_admin_settings(admin: RawAdminSettings) -> AdminSettings {
    AdminSettings {
        revalidate_token: non_blank(admin.revalidate_token),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSourceSettings {
    kind: Option<String>,
    fixtures_path: Option<PathBuf>,
    api_base_url: Option<String>,
    api_token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    short_ttl: Option<u64>,
    medium_ttl: Option<u64>,
    long_ttl: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    page_size: Option<u64>,
    recent_limit: Option<u64>,
    related_limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    revalidate_token: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn ttl(seconds: u64, key: &'static str) -> Result<Ttl, LoadError> {
    Ttl::seconds(seconds).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
