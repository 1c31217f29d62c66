//! tooleval - Evaluate tool-calling behavior of locally served models
//!
//! Boots an inference server for a model (optionally with an adapter), sends a suite of
//! prompts through an OpenAI-compatible client, recovers the tool calls the model made
//! (structured or embedded in text), scores them, and compares reports across runs.

pub mod cli;
pub mod client;
pub mod compare;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod report;
pub mod scoring;
pub mod server;
pub mod suite;
pub mod util;
