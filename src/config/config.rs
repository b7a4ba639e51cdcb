use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_HOST: &str = "https://prod-1-data.ke.pinecone.io";
pub const DEFAULT_CONTROL_HOST: &str = "https://api.pinecone.io";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Credentials and hosts of the upstream assistant service.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_data_host")]
    pub data_host: String,
    #[serde(default = "default_control_host")]
    pub control_host: String,
    /// Sent as `X-Pinecone-API-Version` on chat calls when set.
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            name: String::new(),
            data_host: default_data_host(),
            control_host: default_control_host(),
            api_version: None,
            default_model: default_model(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    #[serde(default)]
    pub show_assistant_files: bool,
    #[serde(default)]
    pub show_citations: bool,
    #[serde(default)]
    pub show_models: bool,
}

/// Defaults applied to chat exchanges started from the terminal client.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_true")]
    pub include_message_history: bool,
    #[serde(default)]
    pub include_highlights: bool,
    #[serde(default)]
    pub snippet_size: Option<u32>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            include_message_history: true,
            include_highlights: false,
            snippet_size: None,
            top_k: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, ::config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(::config::Environment::with_prefix("DOCASSIST").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${PINECONE_API_KEY}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.assistant.api_key = expand_env(&app_config.assistant.api_key);
        app_config.assistant.name = expand_env(&app_config.assistant.name);

        app_config.apply_env_overrides();

        Ok(app_config)
    }

    /// The plain deployment variables win over anything read from the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            self.assistant.api_key = key;
        }
        if let Ok(name) = std::env::var("PINECONE_ASSISTANT_NAME") {
            self.assistant.name = name;
        }
        if let Some(flag) = env_flag("SHOW_ASSISTANT_FILES") {
            self.features.show_assistant_files = flag;
        }
        if let Some(flag) = env_flag("SHOW_CITATIONS") {
            self.features.show_citations = flag;
        }
        if let Some(flag) = env_flag("SHOW_MODELS") {
            self.features.show_models = flag;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| parse_flag(&v))
}

/// Only the literal `true` enables a flag.
pub fn parse_flag(value: &str) -> bool {
    value.trim() == "true"
}

fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| "".to_string())
    } else {
        val.to_string()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_host() -> String {
    DEFAULT_DATA_HOST.to_string()
}

fn default_control_host() -> String {
    DEFAULT_CONTROL_HOST.to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}
