use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::rewrite::{DEFAULT_PROMPT_TEMPLATE, TEXT_PLACEHOLDER};
use crate::transcribe::{DEFAULT_LANGUAGES, DEFAULT_MAX_WORDS};
use crate::CorrectorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint settings
    pub completion: CompletionConfig,

    /// Caption retrieval settings
    pub captions: CaptionsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible chat completions URL
    pub api_url: String,

    /// Model name sent with each request
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub temperature: f32,

    pub max_completion_tokens: u32,

    pub top_p: f32,

    /// Instructions sent with each chunk; `{text}` marks where the chunk goes
    pub prompt_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// Preferred caption languages, most preferred first
    pub languages: Vec<String>,

    /// Path to the yt-dlp executable
    pub yt_dlp_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum words per completion request
    pub max_words: usize,

    /// Copy the corrected transcript to the clipboard
    pub copy_to_clipboard: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                model: "meta-llama/llama-4-maverick-17b-128e-instruct".to_string(),
                api_key_env: "GROQ_API_KEY".to_string(),
                temperature: 1.0,
                max_completion_tokens: 1024,
                top_p: 1.0,
                prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            },
            captions: CaptionsConfig {
                languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
                yt_dlp_path: "yt-dlp".to_string(),
            },
            app: AppConfig {
                max_words: DEFAULT_MAX_WORDS,
                copy_to_clipboard: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("caption-corrector").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.app.max_words == 0 {
            anyhow::bail!("app.max_words must be at least 1");
        }

        Url::parse(&self.completion.api_url)
            .with_context(|| format!("Invalid completion.api_url: {}", self.completion.api_url))?;

        if !self.completion.prompt_template.contains(TEXT_PLACEHOLDER) {
            anyhow::bail!("completion.prompt_template must contain {}", TEXT_PLACEHOLDER);
        }

        if self.completion.api_key_env.is_empty() {
            anyhow::bail!("completion.api_key_env must name an environment variable");
        }

        Ok(())
    }

    /// Read the completion API key from the environment
    pub fn api_key(&self) -> std::result::Result<String, CorrectorError> {
        let env_var = &self.completion.api_key_env;
        std::env::var(env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CorrectorError::MissingApiKey {
                env_var: env_var.clone(),
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Completion URL: {}", self.completion.api_url);
        println!("  Model: {}", self.completion.model);
        println!(
            "  API Key: {} ({})",
            self.completion.api_key_env,
            if self.api_key().is_ok() { "set" } else { "not set" }
        );
        println!("  Caption Languages: {}", self.captions.languages.join(", "));
        println!("  yt-dlp: {}", self.captions.yt_dlp_path);
        println!("  Max Words per Chunk: {}", self.app.max_words);
        println!("  Copy to Clipboard: {}", self.app.copy_to_clipboard);
    }

    /// Where settings and the API key are edited
    pub fn setup_instructions(&self) -> Result<String> {
        Ok(format!(
            "Edit the config file:\n  {}\nPut your API key in a .env file or the environment:\n  {}=...",
            Self::config_path()?.display(),
            self.completion.api_key_env
        ))
    }
}
