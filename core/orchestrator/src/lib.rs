pub mod heuristic;
pub mod http;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod reasoning;
pub mod rules;

pub use parser::{extract_json, ParseError};
pub use pipeline::{ActionOrchestrator, ExtractError, TierOutcome};
pub use reasoning::{
    backend_from_env, OllamaBackend, OpenAiBackend, Provider, ReasoningBackend, ReasoningConfig,
    ReasoningError, ReasoningReply,
};
