//! sitesearch - a site crawler with lemma-based full-text search
//!
//! This crate provides:
//! - Crawling of configured sites into a per-site inverted index of lemmas
//! - Ranked AND search with highlighted snippets
//! - A CLI and an MCP server over stdio exposing indexing control and search

pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod indexing;
pub mod lemma;
pub mod mcp;
pub mod parse;
pub mod progress;
pub mod search;
pub mod snippet;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
