use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::enrollment::identity::{
    StudentIdAllocator, DEFAULT_STUDENT_ID_PREFIX, DEFAULT_STUDENT_ID_WIDTH,
};

const MAX_STUDENT_ID_WIDTH: usize = 12;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admissions: AdmissionsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let student_id_prefix = env::var("APP_STUDENT_ID_PREFIX")
            .map(|value| value.trim().to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_STUDENT_ID_PREFIX.to_string());
        let student_id_width = match env::var("APP_STUDENT_ID_WIDTH") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|width| (1..=MAX_STUDENT_ID_WIDTH).contains(width))
                .ok_or(ConfigError::InvalidStudentIdWidth)?,
            Err(_) => DEFAULT_STUDENT_ID_WIDTH,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            admissions: AdmissionsConfig {
                student_id_prefix,
                student_id_width,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Identifier format for newly admitted students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionsConfig {
    pub student_id_prefix: String,
    pub student_id_width: usize,
}

impl AdmissionsConfig {
    pub fn allocator(&self) -> StudentIdAllocator {
        StudentIdAllocator::new(self.student_id_prefix.clone(), self.student_id_width)
    }
}

impl Default for AdmissionsConfig {
    fn default() -> Self {
        Self {
            student_id_prefix: DEFAULT_STUDENT_ID_PREFIX.to_string(),
            student_id_width: DEFAULT_STUDENT_ID_WIDTH,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStudentIdWidth,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStudentIdWidth => write!(
                f,
                "APP_STUDENT_ID_WIDTH must be a number between 1 and {MAX_STUDENT_ID_WIDTH}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidStudentIdWidth => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
