use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a configuration field path to the environment variable that sets it
pub fn to_env_var(field_path: &str) -> String {
    // Handle nested fields by converting dots to double underscores
    // If the field is provider.api_key, we want CONVERSE_PROVIDER__API_KEY
    format!(
        "CONVERSE_{}",
        field_path.replace('.', "__").to_uppercase()
    )
}
