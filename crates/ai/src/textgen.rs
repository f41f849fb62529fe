//! Text-generation collaborator boundary.
//!
//! The model is a black box behind this trait: the crate builds prompts and
//! consumes raw completions, infra supplies the HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("unusable completion response: {0}")]
    BadResponse(String),
}

/// Black-box completion function.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, TextGenError>;
}

#[async_trait]
impl<G> TextGenerator for std::sync::Arc<G>
where
    G: TextGenerator + ?Sized,
{
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, TextGenError> {
        (**self).complete(messages, temperature, max_tokens).await
    }
}
