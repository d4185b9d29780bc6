use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub extraction: ExtractionConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// OAuth 登录成功后跳转的前端地址
    pub client_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 未配置时使用内存用户存储
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    pub pdfs_dir: PathBuf,
    pub max_file_bytes: usize,
    pub max_batch_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub callback_url: Option<String>,
}

impl GoogleConfig {
    /// 三项齐全才启用 Google 登录
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.callback_url.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                client_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
            },
            storage: StorageConfig {
                uploads_dir: PathBuf::from("uploads"),
                pdfs_dir: PathBuf::from("pdfs"),
                max_file_bytes: 10 * 1024 * 1024,
                max_batch_files: 10,
            },
            extraction: ExtractionConfig {
                api_key: String::new(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
                timeout_secs: 60,
            },
            auth: AuthConfig {
                jwt_secret: "change-me".to_string(),
                token_ttl_days: 7,
                bcrypt_cost: 12,
            },
            google: GoogleConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> config/receipt 文件 -> APP_* 环境变量 -> 兼容旧环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let legacy = |name: &str| std::env::var(name).ok();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("server.client_url", defaults.server.client_url)?
            .set_default("database.max_connections", defaults.database.max_connections as i64)?
            .set_default("storage.uploads_dir", "uploads")?
            .set_default("storage.pdfs_dir", "pdfs")?
            .set_default("storage.max_file_bytes", defaults.storage.max_file_bytes as i64)?
            .set_default("storage.max_batch_files", defaults.storage.max_batch_files as i64)?
            .set_default("extraction.api_key", defaults.extraction.api_key)?
            .set_default("extraction.base_url", defaults.extraction.base_url)?
            .set_default("extraction.model", defaults.extraction.model)?
            .set_default("extraction.timeout_secs", defaults.extraction.timeout_secs as i64)?
            .set_default("auth.jwt_secret", defaults.auth.jwt_secret)?
            .set_default("auth.token_ttl_days", defaults.auth.token_ttl_days)?
            .set_default("auth.bcrypt_cost", defaults.auth.bcrypt_cost as i64)?
            .add_source(File::with_name("config/receipt").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .set_override_option("server.port", legacy("PORT"))?
            .set_override_option("server.client_url", legacy("CLIENT_URL"))?
            .set_override_option("database.url", legacy("DATABASE_URL"))?
            .set_override_option("extraction.api_key", legacy("GEMINI_API_KEY"))?
            .set_override_option("auth.jwt_secret", legacy("JWT_SECRET"))?
            .set_override_option("google.client_id", legacy("GOOGLE_CLIENT_ID"))?
            .set_override_option("google.client_secret", legacy("GOOGLE_CLIENT_SECRET"))?
            .set_override_option("google.callback_url", legacy("GOOGLE_CALLBACK_URL"))?
            .build()?
            .try_deserialize()
    }
}
