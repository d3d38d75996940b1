use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub raffle: RaffleConfig,
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
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// 票据二维码 HMAC 签名密钥
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    /// PIN / 主持人口令的 bcrypt cost
    #[serde(default = "default_pin_hash_cost")]
    pub pin_hash_cost: u32,
    /// 场次空闲多久后从内存中移除（秒），持久化数据不受影响
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: i64,
    /// 空闲清理任务的执行间隔（秒）
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

fn default_pin_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_idle_eviction_secs() -> i64 {
    3600
}

fn default_eviction_interval_secs() -> u64 {
    300
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            pin_hash_cost: default_pin_hash_cost(),
            idle_eviction_secs: default_idle_eviction_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    signing: SigningConfig {
                        secret: get_env("HMAC_SECRET").unwrap_or_default(),
                    },
                    raffle: RaffleConfig {
                        pin_hash_cost: get_env_parse("PIN_HASH_COST", default_pin_hash_cost()),
                        idle_eviction_secs: get_env_parse(
                            "IDLE_EVICTION_SECS",
                            default_idle_eviction_secs(),
                        ),
                        eviction_interval_secs: get_env_parse(
                            "EVICTION_INTERVAL_SECS",
                            default_eviction_interval_secs(),
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("HMAC_SECRET") {
            config.signing.secret = v;
        }
        if let Ok(v) = env::var("PIN_HASH_COST")
            && let Ok(n) = v.parse()
        {
            config.raffle.pin_hash_cost = n;
        }
        if let Ok(v) = env::var("IDLE_EVICTION_SECS")
            && let Ok(n) = v.parse()
        {
            config.raffle.idle_eviction_secs = n;
        }
        if let Ok(v) = env::var("EVICTION_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.raffle.eviction_interval_secs = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// 启动前校验：签名密钥必须配置，bcrypt cost 必须在合法范围内
    pub fn validate(&self) -> Result<(), AppError> {
        if self.signing.secret.trim().is_empty() {
            return Err(AppError::ConfigError(
                "signing.secret (HMAC_SECRET) must be set".to_string(),
            ));
        }
        if !(4..=31).contains(&self.raffle.pin_hash_cost) {
            return Err(AppError::ConfigError(
                "raffle.pin_hash_cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }
}
