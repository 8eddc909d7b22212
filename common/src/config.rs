// Configuration management with layered configuration (file, env)

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub cadence: CadenceConfig,
    pub security: SecurityConfig,
    pub email: EmailChannelConfig,
    pub whatsapp: WhatsappChannelConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Cadence engine tunables. Business timezone governs business-hour checks
/// and the "sent today" day boundary; step delays gate steps 2 and 3 behind
/// the previous step's send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    pub timezone: Tz,
    pub step2_delay_days: i64,
    pub step3_delay_days: i64,
    pub lock_ttl_seconds: u64,
    pub tick_budget_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret expected in the X-Cadence-Secret trigger header.
    pub trigger_secret: String,
    /// HMAC-SHA256 key for inbound delivery webhook signatures.
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailChannelConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappChannelConfig {
    /// WhatsApp Business Cloud API base. Tests point this at a mock server.
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
    pub access_token: String,
    pub phone_number_id: String,
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults -> file -> env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if self.cadence.step2_delay_days < 0 || self.cadence.step3_delay_days < 0 {
            return Err("Cadence step delays cannot be negative".to_string());
        }
        if self.cadence.lock_ttl_seconds == 0 {
            return Err("Cadence lock_ttl_seconds must be greater than 0".to_string());
        }
        if self.cadence.tick_budget_seconds == 0 {
            return Err("Cadence tick_budget_seconds must be greater than 0".to_string());
        }

        if self.security.trigger_secret.is_empty() {
            return Err("Trigger secret cannot be empty".to_string());
        }
        if self.security.webhook_secret.is_empty() {
            return Err("Webhook secret cannot be empty".to_string());
        }

        if self.email.smtp_host.is_empty() {
            return Err("SMTP host cannot be empty".to_string());
        }
        if self.email.from_address.is_empty() {
            return Err("Email from_address cannot be empty".to_string());
        }

        if self.whatsapp.api_base.is_empty() {
            return Err("WhatsApp api_base cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/leadflow".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
            },
            cadence: CadenceConfig {
                timezone: chrono_tz::UTC,
                step2_delay_days: 3,
                step3_delay_days: 7,
                lock_ttl_seconds: 300,
                tick_budget_seconds: 300,
            },
            security: SecurityConfig {
                trigger_secret: "change-me-in-production".to_string(),
                webhook_secret: "change-me-in-production".to_string(),
            },
            email: EmailChannelConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 587,
                smtp_username: String::new(),
                smtp_password: String::new(),
                from_address: "outreach@leadflow.local".to_string(),
                from_name: Some("LeadFlow".to_string()),
            },
            whatsapp: WhatsappChannelConfig {
                api_base: default_whatsapp_api_base(),
                access_token: String::new(),
                phone_number_id: String::new(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
            },
        }
    }
}
