//! AI insight generation.
//!
//! This module provides the Ollama-backed text generator and the prompt
//! helpers used to ask it for population insights and patient tips.

pub mod client;
pub mod prompt;

pub use client::{InsightError, InsightGenerator, OllamaClient, OllamaConfig};
