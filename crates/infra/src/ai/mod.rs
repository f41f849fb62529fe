//! Outbound AI collaborator clients.

pub mod groq;

pub use groq::GroqTextGenerator;
