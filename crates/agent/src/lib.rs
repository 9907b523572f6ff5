//! Conversational booking agent for the hotel chat.
//!
//! One guest message goes through a fixed pipeline:
//! 1. **Throttling** (`rate_limit`) - per conversation, client or the shared anonymous bucket
//! 2. **FAQ shortcut** (`faq`) - canned answers for short common questions
//! 3. **Extraction** (`extraction`, `dates`) - dates, party size, room type, guest data
//! 4. **Booking flow** - the reservation reducer from `posada_core::flows`
//! 5. **Prompt assembly** (`prompt`, `search`) - live inventory, web results, tool catalog
//! 6. **Tool loop** (`protocol`, `tools`) - `[USE_TOOL: ...]` calls against the hotel
//! 7. **Guardrails** (`guardrails`, `suggestions`) - handoff, quick replies, sanitizing
//!
//! # Key Types
//!
//! - `BookingAgent` - the orchestrator (see `runtime`)
//! - `LlmClient` - pluggable chat-completions backend
//! - `ToolRegistry` - the tools the model may call
//!
//! The model never decides prices or availability. Those come from the inventory and
//! the pricing rules in `posada_core`.

pub mod cache;
pub mod chat;
pub mod dates;
pub mod extraction;
pub mod faq;
pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod protocol;
pub mod rate_limit;
pub mod runtime;
pub mod search;
pub mod suggestions;
pub mod tools;

pub use cache::TtlCache;
pub use chat::{ChatContext, ChatMetadata, ChatRequest, ChatResponse};
pub use llm::{Completion, CompletionParams, LlmClient, LlmError, OpenAiCompatibleClient};
pub use rate_limit::{RateLimited, RateLimiter};
pub use runtime::{AgentDeps, AgentSettings, BookingAgent, TurnError};
pub use search::{SearchError, SearchProvider, SearchResponse, SearchResult, TavilyClient};
pub use tools::{Tool, ToolError, ToolOutput, ToolRegistry};
