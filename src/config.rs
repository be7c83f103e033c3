use anyhow::{Context, Result};
use std::env;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// JSON in production unless `LOG_FORMAT` says otherwise.
    fn resolve(raw: Option<&str>, env: &Environment) -> Self {
        match raw.map(str::to_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") | Some("text") => Self::Pretty,
            _ if env.is_prod() => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,
    pub log_format: LogFormat,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Site service (in-memory registry when unset)
    pub site_service_url: Option<Url>,
    pub site_service_token: Option<String>,
    pub site_service_timeout_seconds: u64,

    // Uploads
    pub upload_dir: String,
    pub upload_public_base_url: String,
    pub upload_max_bytes: usize,

    // Numbering
    pub tender_number_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            server_addr: "0.0.0.0:8080".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            site_service_url: None,
            site_service_token: None,
            site_service_timeout_seconds: 30,
            upload_dir: "./uploads".to_string(),
            upload_public_base_url: "/files".to_string(),
            upload_max_bytes: 10 * 1024 * 1024, // 10 MiB
            tender_number_prefix: "TND".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or(defaults.server_addr);
        let log_format = LogFormat::resolve(non_empty_var("LOG_FORMAT").as_deref(), &env);

        // Database
        let database_url = non_empty_var("DATABASE_URL");
        let database_max_connections =
            parsed_var("DATABASE_MAX_CONNECTIONS").unwrap_or(defaults.database_max_connections);

        // CORS
        let cors_allow_origins = match env::var("CORS_ALLOW_ORIGINS") {
            Ok(origins) => origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.cors_allow_origins,
        };

        // Site service
        let site_service_url = non_empty_var("SITE_SERVICE_URL")
            .map(|raw| Url::parse(&raw).context("SITE_SERVICE_URL must be a valid URL"))
            .transpose()?;
        let site_service_token = non_empty_var("SITE_SERVICE_TOKEN");
        let site_service_timeout_seconds = parsed_var("SITE_SERVICE_TIMEOUT_SECONDS")
            .unwrap_or(defaults.site_service_timeout_seconds);

        // Uploads
        let upload_dir = non_empty_var("UPLOAD_DIR").unwrap_or(defaults.upload_dir);
        let upload_public_base_url =
            non_empty_var("UPLOAD_PUBLIC_BASE_URL").unwrap_or(defaults.upload_public_base_url);
        let upload_max_bytes = parsed_var("UPLOAD_MAX_BYTES").unwrap_or(defaults.upload_max_bytes);

        let tender_number_prefix =
            non_empty_var("TENDER_NUMBER_PREFIX").unwrap_or(defaults.tender_number_prefix);

        Ok(Settings {
            env,
            server_addr,
            log_format,
            database_url,
            database_max_connections,
            cors_allow_origins,
            site_service_url,
            site_service_token,
            site_service_timeout_seconds,
            upload_dir,
            upload_public_base_url,
            upload_max_bytes,
            tender_number_prefix,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
