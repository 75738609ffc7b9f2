//! # sitechat (library root)
//!
//! This crate provides the core plumbing for the **sitechat** CLI and library:
//! - Ingestion and question-answering pipelines against an OpenAI-compatible
//!   chat endpoint (`api`).
//! - The persistent, URL-scoped embedding store (`vector_store`), its flat
//!   inner-product index (`index`), and the blob storage seam it persists
//!   through (`storage`).
//! - CPU sentence embeddings (`embeddings`).
//! - Page fetching, text extraction, and chunking (`scrape`).
//! - CLI parsing & commands (`commands`).
//! - Configuration & prompt/template handling (`config`, `template`).
//!
//! In addition, this module exposes the path helpers the binary wires
//! everything together with:
//! - Discovering the per-platform configuration directory ([`config_dir`]).
//! - Resolving where the vector-store snapshot lives ([`store_path`]).
//!
//! ## On-disk layout
//! Everything sitechat persists sits under your per-platform config directory,
//! e.g.:
//!
//! - macOS: `~/Library/Application Support/com.awful-sec.sitechat`
//! - Linux (XDG): `~/.config/sitechat`
//! - Windows: `C:\Users\<you>\AppData\Roaming\sitechat`
//!
//! with `config.yaml` and `templates/` written by `sitechat init`, and
//! `store.bin` written on every ingest. The embedding model itself is fetched
//! from the Hugging Face Hub on first use and lives in the hub's own cache.
//!
//! ## Modules
//! - [`api`], [`commands`], [`config`], [`embeddings`], [`index`], [`scrape`],
//!   [`storage`], [`template`], [`vector_store`]

use directories::ProjectDirs;
use std::error::Error;
use std::path::PathBuf;

pub mod api;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod scrape;
pub mod storage;
pub mod template;
pub mod vector_store;

/// Return the per-platform configuration directory used by sitechat.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "sitechat")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/com.awful-sec.sitechat` on macOS).
///
/// The directory is **not** created by this function; callers that need it
/// should create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be
/// determined (which is rare but possible in heavily sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = sitechat::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "sitechat")
        .ok_or("Unable to determine config directory")?;
    let config_dir = proj_dirs.config_dir().to_path_buf();

    Ok(config_dir)
}

/// Resolve where the vector-store snapshot lives.
///
/// The `store_path` field of the configuration wins when set; otherwise the
/// snapshot sits at `config_dir()/store.bin`.
///
/// # Errors
/// Returns an error if no override is configured and the platform
/// configuration directory cannot be determined.
pub fn store_path(config: &config::SiteChatConfig) -> Result<PathBuf, Box<dyn Error>> {
    match &config.store_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join("store.bin")),
    }
}
