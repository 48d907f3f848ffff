use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SAMPLE_CAP: usize = 50;
const DEFAULT_MAX_OBJECT_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_FETCH_BACKOFF_MS: u64 = 100;
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_GATEWAY_ADDR: &str = "127.0.0.1:4030";
const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "tabular-mcpd", version, about = "Tabular MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "TABULAR_SAMPLE_CAP", default_value_t = DEFAULT_SAMPLE_CAP)]
    sample_cap: usize,

    #[arg(long, env = "TABULAR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "TABULAR_MAX_OBJECT_BYTES",
        default_value_t = DEFAULT_MAX_OBJECT_BYTES
    )]
    max_object_bytes: usize,

    #[arg(long, env = "TABULAR_S3_REGION")]
    s3_region: Option<String>,

    #[arg(long, env = "TABULAR_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    #[arg(
        long,
        env = "TABULAR_S3_FORCE_PATH_STYLE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    s3_force_path_style: bool,

    #[arg(long, env = "TABULAR_ALLOWED_BUCKETS")]
    allowed_buckets: Option<String>,

    #[arg(long, env = "TABULAR_FETCH_ATTEMPTS", default_value_t = DEFAULT_FETCH_ATTEMPTS)]
    fetch_attempts: u32,

    #[arg(
        long,
        env = "TABULAR_FETCH_BACKOFF_MS",
        default_value_t = DEFAULT_FETCH_BACKOFF_MS
    )]
    fetch_backoff_ms: u64,

    #[arg(
        long = "stdio",
        env = "TABULAR_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "TABULAR_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "TABULAR_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "TABULAR_GATEWAY_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    gateway_serve: bool,

    #[arg(long, env = "TABULAR_GATEWAY_ADDR", default_value = DEFAULT_GATEWAY_ADDR)]
    gateway_addr: SocketAddr,

    #[arg(
        long,
        env = "TABULAR_INVOCATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_INVOCATION_TIMEOUT_SECS
    )]
    invocation_timeout_secs: u64,

    #[arg(long, env = "TABULAR_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    #[arg(long)]
    event_file: Option<PathBuf>,

    #[arg(long, env = "TABULAR_PROXY_URL")]
    proxy_url: Option<String>,

    #[arg(
        long,
        env = "TABULAR_LOG_JSON",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    log_json: bool,
}

/// Where a one-shot platform event is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInput {
    Stdin,
    File(PathBuf),
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct TabularConfig {
    pub sample_cap: usize,
    pub data_dir: Option<PathBuf>,
    pub max_object_bytes: usize,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_force_path_style: bool,
    pub allowed_buckets: Option<Vec<String>>,
    pub fetch_attempts: u32,
    pub fetch_backoff: Duration,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub gateway_serve: bool,
    pub gateway_addr: SocketAddr,
    pub invocation_timeout: Duration,
    pub max_body_bytes: usize,
    pub event_input: Option<EventInput>,
    /// Remote gateway `/mcp` URL; when set the daemon only runs the stdio proxy.
    pub proxy_url: Option<String>,
    pub log_json: bool,
}

/// Startup configuration that cannot be used.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting with no default was not supplied.
    MissingSetting(&'static str),
    /// A setting was supplied but is out of range or malformed.
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl TabularConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    /// True when at least one long-running server is enabled.
    pub const fn serves_anything(&self) -> bool {
        self.enable_stdio || self.mcp_serve || self.gateway_serve
    }
}

fn positive<T>(name: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Copy + Default + PartialOrd + fmt::Display,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_buckets(value: Option<String>) -> Option<Vec<String>> {
    let buckets: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|bucket| !bucket.is_empty())
        .map(str::to_string)
        .collect();
    if buckets.is_empty() { None } else { Some(buckets) }
}

impl TryFrom<CliArgs> for TabularConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let sample_cap = positive("TABULAR_SAMPLE_CAP", args.sample_cap)?;
        let max_object_bytes = positive("TABULAR_MAX_OBJECT_BYTES", args.max_object_bytes)?;
        let fetch_attempts = positive("TABULAR_FETCH_ATTEMPTS", args.fetch_attempts)?;
        let invocation_timeout_secs =
            positive("TABULAR_INVOCATION_TIMEOUT_SECS", args.invocation_timeout_secs)?;
        let max_body_bytes = positive("TABULAR_MAX_BODY_BYTES", args.max_body_bytes)?;

        if let Some(dir) = &args.data_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::InvalidSetting {
                name: "TABULAR_DATA_DIR",
                value: dir.display().to_string(),
            });
        }

        let event_input = args.event_file.map(|path| {
            if path.as_os_str() == "-" {
                EventInput::Stdin
            } else {
                EventInput::File(path)
            }
        });

        let proxy_url = non_blank(args.proxy_url);
        if let Some(url) = &proxy_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidSetting {
                name: "TABULAR_PROXY_URL",
                value: url.clone(),
            });
        }
        if proxy_url.is_some() && event_input.is_some() {
            return Err(ConfigError::InvalidSetting {
                name: "--event-file",
                value: "cannot be combined with TABULAR_PROXY_URL".to_string(),
            });
        }

        let config = Self {
            sample_cap,
            data_dir: args.data_dir,
            max_object_bytes,
            s3_region: non_blank(args.s3_region),
            s3_endpoint: non_blank(args.s3_endpoint),
            s3_force_path_style: args.s3_force_path_style,
            allowed_buckets: parse_buckets(args.allowed_buckets),
            fetch_attempts,
            fetch_backoff: Duration::from_millis(args.fetch_backoff_ms),
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            gateway_serve: args.gateway_serve,
            gateway_addr: args.gateway_addr,
            invocation_timeout: Duration::from_secs(invocation_timeout_secs),
            max_body_bytes,
            event_input,
            proxy_url,
            log_json: args.log_json,
        };

        if config.event_input.is_none() && config.proxy_url.is_none() && !config.serves_anything()
        {
            return Err(ConfigError::MissingSetting(
                "TABULAR_ENABLE_STDIO, TABULAR_MCP_SERVE, TABULAR_GATEWAY_SERVE or TABULAR_PROXY_URL",
            ));
        }
        Ok(config)
    }
}
