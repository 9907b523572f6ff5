//! Request and response shapes of one chat turn. JSON keys are camelCase.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use posada_core::domain::booking::ReservationId;
use posada_core::domain::room::StayRange;
use posada_core::flows::ReservationInProgress;

use crate::rate_limit::ANONYMOUS;
use crate::search::SearchResponse;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, alias = "clienteId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_web: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn for_client(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_context(mut self, context: ChatContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_web(mut self, use_web: bool) -> Self {
        self.use_web = Some(use_web);
        self
    }

    /// Conversation id, ignoring blank values.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Key for throughput limiting: conversation, then client, then the shared bucket.
    pub fn rate_limit_identifier(&self) -> String {
        match (self.conversation_id(), self.client_id) {
            (Some(conversation_id), _) => conversation_id.to_string(),
            (None, Some(client_id)) => format!("client_{client_id}"),
            (None, None) => ANONYMOUS.to_string(),
        }
    }
}

/// What the booking widget already knows about the stay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(rename = "fechaEntrada", alias = "checkIn", default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(rename = "fechaSalida", alias = "checkOut", default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,
    #[serde(rename = "cantidadAdultos", alias = "adults", default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(rename = "cantidadNinhos", alias = "children", default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
}

impl ChatContext {
    /// Both dates when they parse as ISO and are ordered.
    pub fn stay(&self) -> Option<StayRange> {
        let check_in = parse_iso(self.check_in.as_deref()?)?;
        let check_out = parse_iso(self.check_out.as_deref()?)?;
        StayRange::ordered(check_in, check_out).ok()
    }
}

fn parse_iso(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    pub suggested_actions: Vec<String>,
    pub requires_human: bool,
    pub metadata: ChatMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_in_progress: Option<ReservationInProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_created: Option<ReservationId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    /// Set when the reply did not come from the language model (`faq`, `cancel`, `rate_limit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(default)]
    pub tools_executed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_results: Option<SearchResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_cache_hit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_reason: Option<String>,
}

impl ChatMetadata {
    pub fn shortcut(source: &str, response_time_ms: u64) -> Self {
        Self { source: Some(source.to_string()), response_time_ms, ..Self::default() }
    }
}
