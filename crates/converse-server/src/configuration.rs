use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use converse::models::request::InferenceConfig;
use converse::models::tool::{Tool, ToolConfig};
use converse::providers::configs::{self as provider_configs, ConverseProviderConfig};
use converse::router::{self, RouterSettings};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub retry_attempts: u32,
}

#[derive(Debug, Deserialize)]
pub struct InvocationSettings {
    pub service_name: String,
    pub default_question: String,
    pub default_topic: String,
    /// Empty disables the tool
    pub tool_name: String,
    /// Empty sends no system instruction
    pub system_instruction: String,
    pub story_max_tokens: u32,
    pub story_temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub invocation: InvocationSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", provider_configs::DEFAULT_HOST)?
            .set_default("provider.model", router::DEFAULT_MODEL_ID)?
            .set_default(
                "provider.connect_timeout_secs",
                provider_configs::DEFAULT_CONNECT_TIMEOUT.as_secs() as i64,
            )?
            .set_default(
                "provider.read_timeout_secs",
                provider_configs::DEFAULT_READ_TIMEOUT.as_secs() as i64,
            )?
            .set_default(
                "provider.retry_attempts",
                provider_configs::DEFAULT_RETRY_ATTEMPTS as i64,
            )?
            // Invocation defaults
            .set_default("invocation.service_name", router::DEFAULT_SERVICE_NAME)?
            .set_default("invocation.default_question", router::DEFAULT_QUESTION)?
            .set_default("invocation.default_topic", router::DEFAULT_TOPIC)?
            .set_default("invocation.tool_name", router::DEFAULT_TOOL_NAME)?
            .set_default(
                "invocation.system_instruction",
                router::DEFAULT_SYSTEM_INSTRUCTION,
            )?
            .set_default("invocation.story_max_tokens", 1024_i64)?
            .set_default("invocation.story_temperature", 0.7_f64)?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("CONVERSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match &err {
                config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                },
                _ => ConfigError::Other(err),
            }
        })?;

        if settings.provider.api_key.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            });
        }

        Ok(settings)
    }

    pub fn provider_config(&self) -> ConverseProviderConfig {
        let mut config =
            ConverseProviderConfig::new(self.provider.host.clone(), self.provider.api_key.clone());
        config.connect_timeout = Duration::from_secs(self.provider.connect_timeout_secs);
        config.read_timeout = Duration::from_secs(self.provider.read_timeout_secs);
        config.retry_attempts = self.provider.retry_attempts;
        config
    }

    pub fn router_settings(&self) -> RouterSettings {
        let invocation = &self.invocation;
        RouterSettings {
            service_name: invocation.service_name.clone(),
            default_model: self.provider.model.clone(),
            default_question: invocation.default_question.clone(),
            default_topic: invocation.default_topic.clone(),
            tool_config: non_empty(&invocation.tool_name)
                .map(|name| ToolConfig::single(Tool::system(name))),
            system_instruction: non_empty(&invocation.system_instruction),
            story_inference: InferenceConfig {
                max_tokens: Some(invocation.story_max_tokens),
                temperature: Some(invocation.story_temperature),
                top_p: None,
            },
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
