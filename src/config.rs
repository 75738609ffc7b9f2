//! Loading and handling of the application's configuration.
//!
//! The configuration is a YAML file holding the chat endpoint coordinates and
//! the ingestion/retrieval knobs. `sitechat init` writes a starter file to
//! the per-platform config directory; [`load_config`] reads one from any
//! path.
//!
//! # Examples
//!
//! ```no_run
//! use sitechat::config::{SiteChatConfig, load_config};
//!
//! let config: SiteChatConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{error::Error, fs};

/// Represents the application's configuration.
///
/// Holds everything needed to talk to an OpenAI-compatible chat endpoint and
/// to shape ingestion and retrieval. Constructed by loading a YAML file with
/// [`load_config`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SiteChatConfig {
    /// The API key used to authenticate requests to the API.
    pub api_key: String,

    /// The base URL of the API.
    pub api_base: String,

    /// The name of the model to be used for generating responses.
    pub model: String,

    // Response budget for the model.
    pub context_max_tokens: u16,

    // Token budget for the retrieved context block.
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,

    // Characters per ingested chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    // Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    // Stop words
    #[serde(default)]
    pub stop_words: Vec<String>,

    // Stream responses token by token
    #[serde(default)]
    pub should_stream: Option<bool>,

    // Override for the vector store location
    #[serde(default)]
    pub store_path: Option<String>,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_top_k() -> usize {
    3
}

fn default_context_token_budget() -> usize {
    2048
}

/// Loads the application's configuration from a YAML file.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(SiteChatConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
pub fn load_config(file: &str) -> Result<SiteChatConfig, Box<dyn Error>> {
    tracing::debug!("Loading config: {file}");
    let content = fs::read_to_string(file)?;
    let config: SiteChatConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: "example_api_key"
api_base: "http://example.com/v1"
model: "example_model"
context_max_tokens: 2048
chunk_size: 500
top_k: 5
stop_words: ["<|im_end|>"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api_key, "example_api_key");
        assert_eq!(config.api_base, "http://example.com/v1");
        assert_eq!(config.model, "example_model");
        assert_eq!(config.context_max_tokens, 2048);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.stop_words, vec!["<|im_end|>".to_string()]);
        assert_eq!(config.should_stream, None);
        assert_eq!(config.store_path, None);
    }

    #[test]
    fn test_load_config_applies_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: ""
api_base: "http://localhost:5001/v1"
model: "local"
context_max_tokens: 1024
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.context_token_budget, 2048);
        assert!(config.stop_words.is_empty());
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }
}
