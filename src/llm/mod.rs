//! Language model access.
//!
//! This module provides the Ollama chat client and the prompt templates
//! used by the camera analyzer and the report synthesizer.

pub mod client;
pub mod prompts;

pub use client::{CompletionRequest, ModelSettings, OllamaClient, TextModel};
