//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tandem";
const ENV_PREFIX: &str = "TANDEM";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000/";
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DEDUP_WINDOW_MINUTES: u64 = 60;
const MAX_DEDUP_WINDOW_MINUTES: u64 = 365 * 24 * 60;
const DEFAULT_QUEUE_CAPACITY: u64 = 1024;
const DEFAULT_MAX_CONCURRENT_DISPATCHES: u64 = 8;
const DEFAULT_EMAIL_FROM: &str = "tandem@localhost";

/// Command-line arguments for the tandem binary.
#[derive(Debug, Parser)]
#[command(
    name = "tandem",
    version,
    about = "Shared availability calendars with threshold notifications"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TANDEM_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
    /// Print the availability summary of a calendar for a date range as JSON.
    Summary(SummaryArgs),
    /// Recount a date and dispatch notifications for any threshold transition.
    Recheck(RecheckArgs),
    /// Print the public holidays that apply to a timezone.
    Holidays(HolidaysArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Public token of the calendar.
    #[arg(long, value_name = "TOKEN")]
    pub token: String,

    /// First date of the range (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub from: String,

    /// Last date of the range (YYYY-MM-DD), inclusive.
    #[arg(long, value_name = "DATE")]
    pub to: String,

    /// Participant viewing the summary; required to see ids on locked calendars.
    #[arg(long, value_name = "ID")]
    pub participant: Option<Uuid>,
}

#[derive(Debug, Args, Clone)]
pub struct RecheckArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Public token of the calendar.
    #[arg(long, value_name = "TOKEN")]
    pub token: String,

    /// Date to recount (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub date: String,

    /// Recount every date from `--date` through this one on the background worker.
    #[arg(long, value_name = "DATE")]
    pub until: Option<String>,

    /// Override the public base URL used in notification links.
    #[arg(long = "public-base-url", value_name = "URL")]
    pub public_base_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct HolidaysArgs {
    /// IANA timezone name, e.g. Europe/Berlin.
    #[arg(long, value_name = "TZ")]
    pub timezone: String,

    /// Calendar year.
    #[arg(long, value_name = "YEAR")]
    pub year: i32,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub notify: NotifySettings,
    pub email: EmailSettings,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub public_base_url: Url,
    pub outbound_timeout: Duration,
    pub dedup_window: time::Duration,
    pub queue_capacity: NonZeroUsize,
    pub max_concurrent_dispatches: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
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
    raw.apply_cli(cli);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    notify: RawNotifySettings,
    email: RawEmailSettings,
}

impl RawSettings {
    fn apply_cli(&mut self, cli: &CliArgs) {
        self.apply_logging_overrides(&cli.logging);
        match &cli.command {
            Command::Migrate(args) => self.apply_database_override(&args.database),
            Command::Summary(args) => self.apply_database_override(&args.database),
            Command::Recheck(args) => {
                self.apply_database_override(&args.database);
                if let Some(url) = args.public_base_url.as_ref() {
                    self.notify.public_base_url = Some(url.clone());
                }
            }
            Command::Holidays(_) => {}
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            notify,
            email,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            notify: build_notify_settings(notify)?,
            email: build_email_settings(email)?,
        })
    }
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        max_connections: non_zero_u32(max_connections.into(), "database.max_connections")?,
    })
}

fn build_notify_settings(notify: RawNotifySettings) -> Result<NotifySettings, LoadError> {
    let raw_url = non_blank(notify.public_base_url)
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
    let public_base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("notify.public_base_url", err.to_string()))?;
    if !matches!(public_base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "notify.public_base_url",
            "scheme must be http or https",
        ));
    }

    let timeout_secs = notify
        .outbound_timeout_seconds
        .unwrap_or(DEFAULT_OUTBOUND_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "notify.outbound_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let dedup_minutes = notify
        .dedup_window_minutes
        .unwrap_or(DEFAULT_DEDUP_WINDOW_MINUTES);
    if dedup_minutes > MAX_DEDUP_WINDOW_MINUTES {
        return Err(LoadError::invalid(
            "notify.dedup_window_minutes",
            "must not exceed one year",
        ));
    }

    let queue_capacity = notify.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
    let queue_capacity = usize::try_from(queue_capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| LoadError::invalid("notify.queue_capacity", "must be greater than zero"))?;

    let max_concurrent = notify
        .max_concurrent_dispatches
        .unwrap_or(DEFAULT_MAX_CONCURRENT_DISPATCHES);

    Ok(NotifySettings {
        public_base_url,
        outbound_timeout: Duration::from_secs(timeout_secs),
        dedup_window: time::Duration::minutes(dedup_minutes as i64),
        queue_capacity,
        max_concurrent_dispatches: non_zero_u32(
            max_concurrent,
            "notify.max_concurrent_dispatches",
        )?,
    })
}

fn build_email_settings(email: RawEmailSettings) -> Result<EmailSettings, LoadError> {
    let api_url = non_blank(email.api_url);
    if let Some(url) = api_url.as_ref() {
        Url::parse(url).map_err(|err| LoadError::invalid("email.api_url", err.to_string()))?;
    }

    let from_address =
        non_blank(email.from_address).unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string());
    if !from_address.contains('@') {
        return Err(LoadError::invalid(
            "email.from_address",
            "must be an email address",
        ));
    }

    Ok(EmailSettings {
        api_url,
        api_key: non_blank(email.api_key),
        from_address,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotifySettings {
    public_base_url: Option<String>,
    outbound_timeout_seconds: Option<u64>,
    dedup_window_minutes: Option<u64>,
    queue_capacity: Option<u64>,
    max_concurrent_dispatches: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEmailSettings {
    api_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value = u32::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
