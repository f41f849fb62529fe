//! `renqing-ai` — reply recommendations.
//!
//! Two paths produce suggestions for "what to give back":
//!
//! - [`scorer`]: the deterministic rule scorer. Pure function over a stock
//!   snapshot, always available, used directly and as the fallback.
//! - [`packages`]: the generative path. Builds a prompt from the gift, the
//!   contact, the exchange history, and the stock; asks a text-generation
//!   collaborator for multi-item packages; validates the untrusted reply
//!   against inventory before accepting; falls back to the scorer otherwise.
//!
//! Deliberately decoupled from the domain aggregates (mirroring the rest of
//! the workspace): callers hand in snapshot types defined here, and nothing
//! in this crate mutates domain state.

pub mod chat;
pub mod packages;
pub mod result;
pub mod scorer;
pub mod season;
pub mod textgen;

pub use chat::{ChatIntent, FALLBACK_REPLY, analyze_intent, build_chat_messages, build_system_prompt};
pub use packages::{
    GiftPackage, HistoryEntry, PackageLine, PackageRecommender, PromptContact, ReplyPromptContext,
    build_reply_prompt, extract_json_array, fallback_packages, parse_packages, validate_packages,
};
pub use result::RecommendError;
pub use scorer::{
    CandidateItem, MAX_RESULTS, RecipientGender, RecipientProfile, ScoredCandidate,
    recommend_candidates,
};
pub use season::{Season, nearby_holidays, season_label};
pub use textgen::{ChatMessage, ChatRole, TextGenError, TextGenerator};
