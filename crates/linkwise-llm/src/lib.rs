//! LLM collaborator for the resolvers: synonyms and translations from an
//! external chat model (OpenAI, Anthropic or Groq).
//!
//! Calls go to hosted APIs through the same rate-limited HTTP client the
//! resolvers use. Nothing here streams; each request is one completion.

pub mod config;
pub mod provider;
pub mod terms;

pub use config::LlmConfig;
pub use provider::{ChatMessage, LlmClient, LlmProvider};
pub use terms::LlmTermGenerator;
