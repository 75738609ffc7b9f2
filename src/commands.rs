//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line
//! arguments, and a `Commands` enum that represents the available subcommands
//! and their options. The verbs map one-to-one onto the store operations:
//! `ingest` upserts a page, `ask` searches and answers, `reset` clears.

use clap::{Parser, Subcommand};

/// Represents the parsed command-line arguments.
///
/// This struct is constructed by parsing the command-line arguments using
/// `clap`. It contains a `command` field that holds the parsed subcommand and
/// its options.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// The 'ingest' subcommand: scrape a URL, embed its text, and store it.
    ///
    /// Ingesting a URL that was ingested before replaces its stored chunks.
    #[clap(name = "ingest", alias = "i")]
    Ingest {
        /// The page to scrape and store.
        url: String,
    },

    /// The 'ask' subcommand: answer a question from the ingested pages.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to be asked. If not provided, a default question is used.
        question: Option<String>,

        /// Restrict retrieval to this URL's chunks.
        #[arg(name = "url", short = 'u', long = "url")]
        url: Option<String>,

        #[arg(name = "template", short = 't')]
        template: Option<String>,
    },

    /// The 'reset' subcommand: discard every stored chunk.
    Reset,

    /// The 'init' subcommand: create the configuration and default template.
    Init,
}
