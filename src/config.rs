//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// 运行环境: development, production
    pub environment: String,
}

impl AppSection {
    /// 开发环境下错误响应携带详细信息
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 存储后端: postgres, memory
    pub backend: String,
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.backend.eq_ignore_ascii_case("memory")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// Argon2 内存开销（KiB）
    pub argon2_memory_kib: u32,
    /// Argon2 迭代次数
    pub argon2_iterations: u32,
    /// 是否信任 X-Forwarded-For 头
    pub trust_proxy: bool,
    /// IP 白名单（可选）
    pub allowed_ips: Option<Vec<String>>,
    /// 请求体大小上限（字节）
    pub max_request_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// 不记录审计日志的路径前缀
    pub excluded_path_prefixes: Vec<String>,
    /// 审计快照中保留的请求/响应体最大字节数
    pub max_body_bytes: usize,
}

impl AuditConfig {
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// 启动时同步权限目录
    pub run_on_startup: bool,
    /// 自定义清单文件（JSON），为空时使用内置清单
    pub manifest_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("app.environment", "production")?
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 3600)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.argon2_memory_kib", 65536)?
            .set_default("security.argon2_iterations", 3)?
            .set_default("security.trust_proxy", true)?
            .set_default("security.max_request_body_bytes", 1024 * 1024)?
            .set_default("audit.excluded_path_prefixes", vec!["/api/v1/audit-logs"])?
            .set_default("audit.max_body_bytes", 16 * 1024)?
            .set_default("bootstrap.run_on_startup", true)?;

        // 从环境变量加载配置（前缀为 SCHOOL_）
        settings = settings.add_source(
            Environment::with_prefix("SCHOOL")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("audit.excluded_path_prefixes")
                .with_list_parse_key("security.allowed_ips")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.app.environment.to_lowercase().as_str() {
            "development" | "production" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid environment: {}. Must be one of: development, production",
                    other
                )))
            }
        }

        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        match self.database.backend.to_lowercase().as_str() {
            "memory" => {}
            "postgres" => {
                if self.database.url.expose_secret().is_empty() {
                    return Err(ConfigError::Message(
                        "database.url is required for the postgres backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid database backend: {}. Must be one of: postgres, memory",
                    other
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        if self.audit.max_body_bytes == 0 {
            return Err(ConfigError::Message("audit.max_body_bytes must be > 0".to_string()));
        }

        Ok(())
    }
}

/// 单元测试用配置（内存后端、低成本 Argon2）
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        app: AppSection {
            environment: "development".to_string(),
        },
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            backend: "memory".to_string(),
            url: Secret::new(String::new()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test_secret_key_32_characters_long!".to_string()),
            access_token_exp_secs: 900,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_digit: true,
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            trust_proxy: true,
            allowed_ips: None,
            max_request_body_bytes: 1024 * 1024,
        },
        audit: AuditConfig {
            excluded_path_prefixes: vec!["/api/v1/audit-logs".to_string()],
            max_body_bytes: 16 * 1024,
        },
        bootstrap: BootstrapConfig {
            run_on_startup: true,
            manifest_path: None,
        },
    }
}
