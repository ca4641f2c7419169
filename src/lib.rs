#![deny(missing_docs)]
//! Treasure Hunter Bot
//!
//! A Telegram bot that forwards treasure-hunting questions, signal
//! descriptions and photos to a GPT-4o compatible API and relays the answers,
//! with per-user rate limiting and Telegram-sized message formatting.

/// Telegram transport: dispatcher, handlers and views
pub mod bot;
/// Configuration management
pub mod config;
/// Error taxonomy surfaced at the gateway boundary
pub mod error;
/// Splitting responses into Telegram-sized chunks
pub mod formatter;
/// Event processing pipeline
pub mod gateway;
/// Static treasure-hunting knowledge base
pub mod guide;
/// Inference client and providers
pub mod llm;
/// Image validation and normalization
pub mod preprocessor;
/// Per-user sliding window rate limiting
pub mod rate_limiter;
/// Mapping of chat events to request envelopes
pub mod router;
pub mod utils;
