//! Local LLM service boundary: prompt in, generated text out.
//!
//! The model is an untrusted collaborator. Nothing downstream assumes its
//! output is well-formed; the query pipeline validates structurally before
//! trusting a single byte of it.

pub mod client;
pub mod prompts;

pub use client::{Llm, OllamaClient, ScriptedLlm};
