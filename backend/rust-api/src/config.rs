use serde::Deserialize;
use std::env;

pub const DEFAULT_JWT_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,
    pub bind_addr: String,
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub llm: LlmConfig,
}

/// Chat-completions endpoint used for narrative analysis
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    /// Narrative analysis is disabled without a key
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
        let is_prod = app_env == "prod";

        // config/*.toml, then APP__ environment overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let string_setting = |key: &str, var: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(var).ok())
                .filter(|v| !v.trim().is_empty())
        };

        let mongo_uri = string_setting("database.mongo_uri", "MONGODB_URI")
            .or_else(|| env::var("MONGO_URI").ok())
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database = string_setting("database.mongo_database", "MONGODB_DB")
            .unwrap_or_else(|| "survey_app".to_string());

        let redis_uri = string_setting("redis.uri", "REDIS_URI")
            .unwrap_or_else(|| "redis://127.0.0.1:6379/0".to_string());

        let jwt_secret = match string_setting("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if is_prod => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let jwt_ttl_seconds = parse_setting(
            string_setting("auth.jwt_ttl_seconds", "JWT_TTL_SECONDS"),
            "JWT_TTL_SECONDS",
            DEFAULT_JWT_TTL_SECONDS,
        )?;

        let cookie_secure = match string_setting("auth.cookie_secure", "COOKIE_SECURE") {
            Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => is_prod,
        };

        let bind_addr = string_setting("server.bind_addr", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8081".to_string());

        let llm = LlmConfig {
            api_url: string_setting("llm.api_url", "LLM_API_URL")
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            api_key: string_setting("llm.api_key", "LLM_API_KEY")
                .or_else(|| env::var("GROQ_API_KEY").ok().filter(|v| !v.is_empty())),
            model: string_setting("llm.model", "LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout_seconds: parse_setting(
                string_setting("llm.timeout_seconds", "LLM_TIMEOUT_SECONDS"),
                "LLM_TIMEOUT_SECONDS",
                30,
            )?,
        };

        Ok(Config {
            app_env,
            bind_addr,
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            jwt_ttl_seconds,
            cookie_secure,
            llm,
        })
    }
}

fn parse_setting<T: std::str::FromStr>(
    raw: Option<String>,
    name: &str,
    default: T,
) -> Result<T, config::ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{} must be a number", name))),
        None => Ok(default),
    }
}
