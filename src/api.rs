//! # API Module
//!
//! Orchestrates the two halves of the tool against the OpenAI-compatible
//! chat endpoint:
//!
//! - [`ingest`]: fetch a page, extract and chunk its text, embed every chunk,
//!   and store the batch — replacing whatever the store previously held for
//!   that URL.
//! - [`ask`]: embed the question, retrieve the most similar chunks (optionally
//!   scoped to one URL), assemble a token-bounded context block, and have the
//!   model answer from it.
//!
//! The store is shared behind a readers-writer lock: `ingest` takes the write
//! lock for the insert, `ask` takes the read lock for the search, so no
//! question ever observes a half-replaced page.

use crate::{
    config::SiteChatConfig,
    embeddings::Embedder,
    scrape,
    template::ChatTemplate,
    vector_store::{NewChunk, SearchHit, VectorStore},
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
};
use console::style;
use futures::StreamExt;
use indicatif::ProgressBar;
use std::{
    collections::HashMap,
    error::Error,
    io::{Write, stdout},
    sync::RwLock,
};
use tiktoken_rs::cl100k_base;
use tracing::{debug, error, info};

/// Answer returned when retrieval finds nothing to ground a response in.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough information to answer this question.";

/// The model's answer plus the URLs the supporting chunks came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Creates a new OpenAI API client from configuration.
fn create_client(config: &SiteChatConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());
    debug!("Client created for {}", config.api_base);
    Client::with_config(openai_config)
}

/// Scrape a URL and store its chunks, replacing any earlier ingest of the
/// same URL.
///
/// # Parameters
/// - `config`: Application configuration (chunk size).
/// - `store`: The shared vector store; the write lock is held for the insert.
/// - `embedder`: Sentence embedder for the chunk texts.
/// - `url`: The page to ingest.
///
/// # Returns
/// The number of chunks stored for this URL.
///
/// # Errors
/// Fetch failures, pages with no extractable text, embedding failures, and
/// store errors (including persistence failures) all propagate.
pub async fn ingest(
    config: &SiteChatConfig,
    store: &RwLock<VectorStore>,
    embedder: &Embedder,
    url: &str,
) -> Result<usize, Box<dyn Error>> {
    let html = scrape::fetch(url).await?;
    let text = scrape::extract_text(&html);
    if text.is_empty() {
        return Err(format!("No text content found at {url}").into());
    }

    let chunks = scrape::chunk_text(&text, config.chunk_size);
    info!("Embedding {} chunks from {url}", chunks.len());
    let bar = ProgressBar::new(chunks.len() as u64);
    let embeddings = embedder.encode_batch(&chunks, |_| bar.inc(1))?;
    bar.finish_and_clear();

    let ingested_at = chrono::Utc::now().to_rfc3339();
    let batch: Vec<NewChunk> = chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (text, embedding))| NewChunk {
            text,
            embedding,
            source: url.to_string(),
            metadata: HashMap::from([
                ("url".to_string(), url.to_string()),
                ("chunk".to_string(), i.to_string()),
                ("ingested_at".to_string(), ingested_at.clone()),
            ]),
        })
        .collect();

    let added = store.write().expect("store lock poisoned").add(batch)?;
    Ok(added)
}

/// Answer a question from the ingested pages.
///
/// Retrieval runs first: the question is embedded and the top chunks are
/// pulled from the store, scoped to `url` when one is given. If nothing comes
/// back the fixed [`NO_CONTEXT_ANSWER`] is returned without calling the
/// model.
///
/// # Parameters
/// - `config`: Application configuration (retrieval k, token budgets,
///   streaming).
/// - `store`: The shared vector store; the read lock is held for the search.
/// - `embedder`: Sentence embedder for the question.
/// - `template`: Chat template supplying the system prompt and optional
///   user-message decoration.
/// - `question`: The user's question.
/// - `url`: Restrict retrieval to this URL's chunks.
///
/// # Returns
/// The model's answer and the deduplicated source URLs behind it.
pub async fn ask(
    config: &SiteChatConfig,
    store: &RwLock<VectorStore>,
    embedder: &Embedder,
    template: &ChatTemplate,
    question: &str,
    url: Option<&str>,
) -> Result<Answer, Box<dyn Error>> {
    let query = embedder.encode(question)?;
    let hits = store
        .read()
        .expect("store lock poisoned")
        .search(&query, config.top_k, url)?;

    if hits.is_empty() {
        return Ok(Answer {
            text: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let (context, sources) = build_context(&hits, config.context_token_budget)?;

    let mut question = question.to_string();
    if let Some(prepend_content) = template.pre_user_message_content.clone() {
        question = format!("{prepend_content} {question}");
    }
    if let Some(append_content) = template.post_user_message_content.clone() {
        question = format!("{question} {append_content}");
    }

    let messages = vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(
                template.system_prompt.clone(),
            ),
            name: None,
        }),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(format!(
                "Context: {context}\n\nQuestion: {question}"
            )),
            name: None,
        }),
    ];

    let client = create_client(config);
    let text = match config.should_stream {
        Some(true) => stream_completion(&client, config, messages).await?,
        _ => fetch_completion(&client, config, messages).await?,
    };

    Ok(Answer { text, sources })
}

/// Assemble the retrieved chunks into one context block, best hits first,
/// stopping once the token budget is spent.
///
/// The first section is always included even if it alone exceeds the budget —
/// an empty context would defeat the question. Returns the block plus the
/// deduplicated source URLs in rank order.
fn build_context(
    hits: &[SearchHit],
    token_budget: usize,
) -> Result<(String, Vec<String>), Box<dyn Error>> {
    let bpe = cl100k_base().map_err(|e| e.to_string())?;

    let mut sections: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut used = 0usize;
    for hit in hits {
        let section = format!("Source: {}\nContent: {}", hit.source, hit.text);
        let tokens = bpe.encode_with_special_tokens(&section).len();
        if !sections.is_empty() && used + tokens > token_budget {
            debug!("Context budget reached after {} sections", sections.len());
            break;
        }
        used += tokens;
        if !sources.contains(&hit.source) {
            sources.push(hit.source.clone());
        }
        sections.push(section);
    }

    Ok((sections.join("\n\n"), sources))
}

fn build_request(
    config: &SiteChatConfig,
    messages: Vec<ChatCompletionRequestMessage>,
) -> Result<async_openai::types::chat::CreateChatCompletionRequest, Box<dyn Error>> {
    let mut builder = CreateChatCompletionRequestArgs::default();
    builder
        .max_tokens(config.context_max_tokens)
        .model(config.model.clone())
        .messages(messages);
    if !config.stop_words.is_empty() {
        builder.stop(config.stop_words.clone());
    }
    Ok(builder.build()?)
}

/// One-shot completion: send the request and collect the answer.
async fn fetch_completion(
    client: &Client<OpenAIConfig>,
    config: &SiteChatConfig,
    messages: Vec<ChatCompletionRequestMessage>,
) -> Result<String, Box<dyn Error>> {
    let request = build_request(config, messages)?;
    debug!("Sending request: {:?}", request);

    let response = client.chat().create(request).await?;

    let mut response_string = String::new();
    for chat_choice in response.choices {
        if let Some(message_text) = chat_choice.message.content {
            response_string.push_str(&message_text);
        }
    }
    Ok(response_string.trim().to_string())
}

/// Streaming completion: print deltas as they arrive and collect the full
/// answer.
async fn stream_completion(
    client: &Client<OpenAIConfig>,
    config: &SiteChatConfig,
    messages: Vec<ChatCompletionRequestMessage>,
) -> Result<String, Box<dyn Error>> {
    let request = build_request(config, messages)?;
    debug!("Sending streaming request: {:?}", request);

    let mut stream = client.chat().create_stream(request).await?;
    let mut response_string = String::new();
    let mut lock = stdout().lock();

    while let Some(result) = stream.next().await {
        match result {
            Ok(response) => {
                for chat_choice in &response.choices {
                    if let Some(ref content) = chat_choice.delta.content {
                        response_string.push_str(content);
                        write!(lock, "{}", style(content).cyan())?;
                        lock.flush()?;
                    }
                }
            }
            Err(err) => {
                error!("Received error: {err}");
                writeln!(lock, "error: {err}")?;
            }
        }
    }
    writeln!(lock)?;

    Ok(response_string.trim().to_string())
}
