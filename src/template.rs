//! # Chat templates
//!
//! A template is a small YAML document that steers how questions are put to
//! the model:
//!
//! - `system_prompt` conditions the assistant (the built-in default carries
//!   the answer-from-context instructions);
//! - optional `pre_user_message_content` / `post_user_message_content` are
//!   concatenated around every user question at send time.
//!
//! Templates live under the per-platform configuration directory:
//!
//! ```text
//! <config_dir>/templates/<name>.yaml
//! ```
//!
//! `sitechat init` writes the default template there; [`default_template`]
//! returns the same content without touching the filesystem, so the tool
//! works before `init` has ever run.

use serde::{Deserialize, Serialize};
use std::{error::Error, fs};

/// A reusable chat template.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatTemplate {
    /// Global instruction used as the session's system message.
    pub system_prompt: String,

    /// Extra text automatically added **before** each user question.
    pub pre_user_message_content: Option<String>,

    /// Extra text automatically added **after** each user question.
    pub post_user_message_content: Option<String>,
}

/// The built-in question-answering template.
///
/// Instructs the model to answer strictly from the retrieved page context
/// and to admit when the context does not contain the answer.
pub fn default_template() -> ChatTemplate {
    ChatTemplate {
        system_prompt: "You are a helpful AI assistant. Use the following context to answer the question.\n\
            If the answer isn't in the context, say you don't know or the data you have searched is not relevant. Be concise and accurate.\n\
            If the user asks for brief info about the page or what the page is about, find the brief info and give it to the user."
            .to_string(),
        pre_user_message_content: None,
        post_user_message_content: None,
    }
}

/// Load a chat template by name from the user's config directory.
///
/// Resolves `<config_dir>/templates/<name>.yaml`, reads the file, and
/// deserializes into a [`ChatTemplate`].
///
/// # Errors
/// Returns an error if:
/// - the config directory cannot be determined,
/// - the template file does not exist or cannot be read,
/// - the YAML content cannot be deserialized into a `ChatTemplate`.
pub async fn load_template(name: &str) -> Result<ChatTemplate, Box<dyn Error>> {
    let path = format!("templates/{}.yaml", name);
    let config_path = crate::config_dir()?.join(&path);

    tracing::info!("Loading template: {}", config_path.display());

    let content = fs::read_to_string(config_path)?;
    let template: ChatTemplate = serde_yaml::from_str(&content)?;
    Ok(template)
}
