//! sqamark-judges: bullet judges backed by external LLM APIs.
//!
//! Implements the `BulletJudge` trait for Anthropic, OpenAI, and Ollama,
//! plus a scriptable mock, and loads judge selection, grade bands and
//! mastery thresholds from `sqamark.toml`.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{create_judge, load_config, load_config_from, JudgeConfig, SqamarkConfig};
pub use sqamark_core::error::JudgeError;
