use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreBackend,
    pub session: SessionConfig,
    pub mail: MailConfig,
    pub security: SecurityConfig,
    pub membership: MembershipConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Never defaulted; must come from `DATABASE_URL`.
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_days: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    Log,
    Smtp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// Domain used for the placeholder email of auto-provisioned members
    pub placeholder_domain: String,
    /// Documents every new application starts with
    pub default_documents: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL is required when STORE_BACKEND=postgres")]
    MissingDatabaseUrl,

    #[error("SMTP_HOST is required when MAIL_TRANSPORT=smtp")]
    MissingSmtpHost,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.store = StoreBackend::Memory,
                "postgres" => self.store = StoreBackend::Postgres,
                other => tracing::warn!("Ignoring unknown STORE_BACKEND '{}'", other),
            }
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_TTL_DAYS") {
            self.session.ttl_days = v.parse().unwrap_or(self.session.ttl_days);
        }
        if let Ok(v) = env::var("SESSION_SECURE_COOKIE") {
            self.session.secure_cookie = v.parse().unwrap_or(self.session.secure_cookie);
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_TRANSPORT") {
            match v.to_ascii_lowercase().as_str() {
                "smtp" => self.mail.transport = MailTransport::Smtp,
                "log" => self.mail.transport = MailTransport::Log,
                other => tracing::warn!("Ignoring unknown MAIL_TRANSPORT '{}'", other),
            }
        }
        if let Ok(v) = env::var("SMTP_HOST") {
            self.mail.smtp_host = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.mail.smtp_port = v.parse().unwrap_or(self.mail.smtp_port);
        }
        if let Ok(v) = env::var("SMTP_USERNAME") {
            self.mail.smtp_username = Some(v);
        }
        if let Ok(v) = env::var("SMTP_PASSWORD") {
            self.mail.smtp_password = Some(v);
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        // Membership overrides
        if let Ok(v) = env::var("MEMBERSHIP_PLACEHOLDER_DOMAIN") {
            self.membership.placeholder_domain = v;
        }

        self
    }

    /// Startup check for settings that have no safe default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.mail.transport == MailTransport::Smtp && self.mail.smtp_host.is_none() {
            return Err(ConfigError::MissingSmtpHost);
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                name: "BCRYPT_COST",
                value: self.security.bcrypt_cost.to_string(),
            });
        }
        if self.session.ttl_days <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "SESSION_TTL_DAYS",
                value: self.session.ttl_days.to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn default_documents() -> Vec<String> {
        vec![
            "Заявление о вступлении в профсоюз".to_string(),
            "Согласие на обработку персональных данных".to_string(),
            "Заявление на удержание членских взносов".to_string(),
        ]
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            store: StoreBackend::Postgres,
            session: SessionConfig {
                cookie_name: "session-id".to_string(),
                ttl_days: 7,
                secure_cookie: false,
            },
            mail: MailConfig {
                transport: MailTransport::Log,
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from: "noreply@localhost".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                bcrypt_cost: 10,
            },
            membership: MembershipConfig {
                placeholder_domain: "members.local".to_string(),
                default_documents: Self::default_documents(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            store: StoreBackend::Postgres,
            session: SessionConfig {
                cookie_name: "session-id".to_string(),
                ttl_days: 7,
                secure_cookie: true,
            },
            mail: MailConfig {
                transport: MailTransport::Smtp,
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from: "noreply@staging.example.com".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                bcrypt_cost: 12,
            },
            membership: MembershipConfig {
                placeholder_domain: "members.staging.example.com".to_string(),
                default_documents: Self::default_documents(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            store: StoreBackend::Postgres,
            session: SessionConfig {
                cookie_name: "session-id".to_string(),
                ttl_days: 7,
                secure_cookie: true,
            },
            mail: MailConfig {
                transport: MailTransport::Smtp,
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from: "noreply@example.com".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                bcrypt_cost: 12,
            },
            membership: MembershipConfig {
                placeholder_domain: "members.example.com".to_string(),
                default_documents: Self::default_documents(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
