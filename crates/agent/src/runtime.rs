use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use posada_core::clock::Clock;
use posada_core::config::AppConfig;
use posada_core::domain::booking::ReservationId;
use posada_core::domain::conversation::{
    ChatMessage, ConversationHistory, ConversationId, MessageLogEntry,
};
use posada_core::domain::room::{RoomType, StayRange};
use posada_core::flows::{BookingFlow, ReservationInProgress};
use posada_core::pricing::quote_stay;
use posada_db::repositories::{BookingLedger, ConversationStore, RepositoryError, RoomInventory};

use crate::cache::TtlCache;
use crate::chat::{ChatContext, ChatMetadata, ChatRequest, ChatResponse};
use crate::extraction::{is_booking_intent, Extraction, Extractor};
use crate::faq::FaqResponder;
use crate::guardrails::GuardrailPolicy;
use crate::llm::{Completion, CompletionParams, LlmClient, LlmError};
use crate::prompt::{reservation_context, HotelSnapshot, PromptBuilder};
use crate::protocol::ToolCallHandler;
use crate::rate_limit::RateLimiter;
use crate::search::{format_web_results, search_query, should_search_web, SearchProvider, SearchResponse};
use crate::suggestions::{general_actions, suggested_actions};
use crate::tools::{ToolOutput, ToolRegistry};

const THROTTLE_PREFIX: &str = "⚠️ Has enviado muchos mensajes en poco tiempo. ";
const CANCEL_ACKNOWLEDGEMENT: &str =
    "✅ He cancelado la reserva en progreso. ¿En qué más puedo ayudarte?";
const UPCOMING_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("generative backend unavailable: {0}")]
    BackendUnavailable(#[source] LlmError),
    #[error("generative backend returned an empty reply")]
    EmptyCompletion,
    #[error("conversation `{id}` could not be loaded: {source}")]
    ConversationUnavailable {
        id: String,
        #[source]
        source: RepositoryError,
    },
}

impl TurnError {
    /// Guest-facing text for a turn that could not be answered.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => {
                "❌ Error al procesar tu mensaje. El servicio está temporalmente no disponible. Por favor, intenta de nuevo en unos momentos"
            }
            Self::EmptyCompletion => {
                "❌ No se pudo generar una respuesta. Por favor, intenta reformular tu pregunta"
            }
            Self::ConversationUnavailable { .. } => {
                "❌ No se pudo recuperar la conversación. Por favor, intenta de nuevo"
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub hotel_location: String,
    pub history_window: usize,
    pub max_tool_iterations: u32,
    pub search_max_results: u32,
    pub completion: CompletionParams,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            hotel_location: config.chat.hotel_location.clone(),
            history_window: config.chat.history_window,
            max_tool_iterations: config.chat.max_tool_iterations,
            search_max_results: config.search.max_results,
            completion: CompletionParams::from_config(&config.llm),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// External collaborators of the agent. Limiter and cache are shared so the caller can
/// run their sweepers.
#[derive(Clone)]
pub struct AgentDeps {
    pub conversations: Arc<dyn ConversationStore>,
    pub inventory: Arc<dyn RoomInventory>,
    pub ledger: Arc<dyn BookingLedger>,
    pub llm: Arc<dyn LlmClient>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: Arc<RateLimiter>,
    pub web_cache: Arc<TtlCache<SearchResponse>>,
}

/// Drives one chat turn from raw guest text to a sanitized reply.
pub struct BookingAgent {
    conversations: Arc<dyn ConversationStore>,
    inventory: Arc<dyn RoomInventory>,
    llm: Arc<dyn LlmClient>,
    search: Option<Arc<dyn SearchProvider>>,
    clock: Arc<dyn Clock>,
    rate_limiter: Arc<RateLimiter>,
    web_cache: Arc<TtlCache<SearchResponse>>,
    tools: ToolCallHandler,
    extractor: Extractor,
    flow: BookingFlow,
    faq: FaqResponder,
    prompts: PromptBuilder,
    guardrails: GuardrailPolicy,
    settings: AgentSettings,
}

#[derive(Debug, Default)]
struct WebLookup {
    response: Option<SearchResponse>,
    cache_hit: bool,
}

impl BookingAgent {
    pub fn new(deps: AgentDeps, settings: AgentSettings) -> Self {
        let registry = ToolRegistry::hotel(
            Arc::clone(&deps.inventory),
            Arc::clone(&deps.ledger),
            Arc::clone(&deps.clock),
        );
        Self {
            conversations: deps.conversations,
            inventory: deps.inventory,
            llm: deps.llm,
            search: deps.search,
            clock: deps.clock,
            rate_limiter: deps.rate_limiter,
            web_cache: deps.web_cache,
            tools: ToolCallHandler::new(Arc::new(registry)),
            extractor: Extractor::new(),
            flow: BookingFlow,
            faq: FaqResponder::new(settings.hotel_location.clone()),
            prompts: PromptBuilder::new(settings.hotel_location.clone()),
            guardrails: GuardrailPolicy::default(),
            settings,
        }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub async fn conversation(
        &self,
        id: &str,
    ) -> Result<Option<ConversationHistory>, RepositoryError> {
        self.conversations.get(&ConversationId(id.to_string())).await
    }

    pub async fn client_conversations(
        &self,
        client_id: i64,
    ) -> Result<Vec<ConversationHistory>, RepositoryError> {
        self.conversations.list_for_client(client_id).await
    }

    pub async fn process_message(&self, request: ChatRequest) -> Result<ChatResponse, TurnError> {
        let started = Instant::now();
        let identifier = request.rate_limit_identifier();

        if let Err(limited) = self.rate_limiter.allow(&identifier) {
            warn!(
                event_name = "agent.rate_limit.denied",
                identifier = %identifier,
                retry_after_ms = u64::try_from(limited.retry_after.as_millis()).unwrap_or(u64::MAX),
                "message throttled"
            );
            return Ok(ChatResponse {
                message: format!("{THROTTLE_PREFIX}{limited}"),
                suggested_actions: vec!["Espera un momento".to_string(), "Intenta más tarde".to_string()],
                metadata: ChatMetadata::shortcut("rate_limit", elapsed_ms(started)),
                ..ChatResponse::default()
            });
        }

        let lowered = request.message.to_lowercase();
        if self.faq.applies_to(&request.message) && !is_booking_intent(&lowered) {
            if let Some(answer) = self.faq.answer(&request.message) {
                return Ok(self.answer_from_faq(&request, answer, started).await);
            }
        }

        let (mut conversation, is_new) = self.load_conversation(&request).await?;
        let today = self.clock.today();
        let catalog = self.catalog().await;
        let extraction = self.extractor.extract(
            &request.message,
            today,
            &catalog,
            conversation.reservation_in_progress.as_ref(),
        );

        if extraction.signals.cancel_intent && conversation.reservation_in_progress.is_some() {
            return Ok(self.cancel_reservation(&request, conversation, is_new, started).await);
        }

        self.advance_reservation(&mut conversation, &extraction).await;
        conversation.push(ChatMessage::user(request.message.clone()), self.clock.now());

        let use_web = request.use_web.unwrap_or_else(|| should_search_web(&request.message));
        let web = if use_web { self.lookup_web(&request.message).await } else { WebLookup::default() };

        let snapshot = self.hotel_snapshot(catalog, today, request.context.as_ref()).await;
        let hotel_info = self.prompts.hotel_info(&snapshot);
        let web_block = web.response.as_ref().map(format_web_results).unwrap_or_default();
        let catalog_block = self.tools.registry().catalog();
        let reservation_block = reservation_context(
            conversation.reservation_in_progress.as_ref(),
            extraction.confirmation,
        );
        let system_prompt = self.prompts.system_prompt(
            &[&hotel_info, &web_block, &catalog_block, &reservation_block],
            request.context.as_ref(),
        );

        let first = self.complete(&system_prompt, &conversation, None).await?;
        let mut tokens_used = first.total_tokens;
        let model = first.model;
        let mut reply = first.content;
        let mut tools_executed = 0_u32;
        let mut reservation_created = None;
        let mut tool_turns: Vec<String> = Vec::new();

        for _ in 0..self.settings.max_tool_iterations {
            let resolution = self.tools.resolve(&reply).await;
            if resolution.error.is_some() {
                reply = resolution.text;
                break;
            }
            let Some(executed) = resolution.executed else {
                break;
            };
            tools_executed += 1;
            if let Some(id) = apply_tool_output(&mut conversation, &executed.output) {
                reservation_created = Some(id);
            }

            let pending = ChatMessage::assistant(assistant_turn(&tool_turns, &resolution.text));
            match self.complete(&system_prompt, &conversation, Some(&pending)).await {
                Ok(next) => {
                    tokens_used += next.total_tokens;
                    tool_turns.push(resolution.text);
                    reply = next.content;
                }
                Err(failure) => {
                    warn!(
                        event_name = "agent.llm.follow_up_failed",
                        conversation_id = %conversation.id,
                        error = %failure,
                        "answering with the tool result"
                    );
                    reply = resolution.text;
                    break;
                }
            }
        }

        conversation.push(ChatMessage::assistant(assistant_turn(&tool_turns, &reply)), self.clock.now());
        self.persist(&conversation, is_new).await;
        if let Some(client_id) = request.client_id {
            self.log_client_message(client_id, &request.message).await;
        }

        let handoff = self.guardrails.evaluate_handoff(&request.message, &reply);
        let suggested = suggested_actions(
            conversation.reservation_in_progress.as_ref(),
            &request.message,
            &reply,
        );
        let mut message = self.guardrails.sanitize(&reply);
        if message.is_empty() {
            message = TurnError::EmptyCompletion.user_message().to_string();
        }

        let mut sources = vec!["hotel".to_string()];
        if use_web {
            sources.push("web".to_string());
        }
        if tools_executed > 0 {
            sources.push("tools".to_string());
        }

        let response_time_ms = elapsed_ms(started);
        info!(
            event_name = "agent.turn.completed",
            conversation_id = %conversation.id,
            tokens_used,
            tools_executed,
            response_time_ms,
            requires_human = handoff.is_some(),
            "chat turn processed"
        );

        Ok(ChatResponse {
            message,
            conversation_id: conversation.id.to_string(),
            suggested_actions: suggested,
            requires_human: handoff.is_some(),
            metadata: ChatMetadata {
                source: None,
                tokens_used: Some(tokens_used),
                sources,
                response_time_ms,
                model: Some(model),
                message_count: Some(conversation.messages.len()),
                tools_executed,
                web_cache_hit: web.response.as_ref().map(|_| web.cache_hit),
                web_results: web.response,
                rate_limit_remaining: Some(self.rate_limiter.remaining(&identifier)),
                handoff_reason: handoff.map(|trigger| trigger.reason_code().to_string()),
            },
            reservation_in_progress: conversation.reservation_in_progress,
            reservation_created,
        })
    }

    async fn answer_from_faq(
        &self,
        request: &ChatRequest,
        answer: String,
        started: Instant,
    ) -> ChatResponse {
        let existing = match request.conversation_id() {
            Some(id) => self
                .conversations
                .get(&ConversationId(id.to_string()))
                .await
                .unwrap_or_else(|error| {
                    warn!(event_name = "agent.faq.load_failed", conversation_id = id, error = %error, "starting a new conversation");
                    None
                }),
            None => None,
        };
        let is_new = existing.is_none();
        let now = self.clock.now();
        let mut conversation =
            existing.unwrap_or_else(|| ConversationHistory::start(request.client_id, now));
        conversation.push(ChatMessage::user(request.message.clone()), now);
        conversation.push(ChatMessage::assistant(answer.clone()), now);
        self.persist(&conversation, is_new).await;

        info!(event_name = "agent.faq.answered", conversation_id = %conversation.id, "answered from faq table");
        ChatResponse {
            suggested_actions: general_actions(&request.message, &answer),
            message: answer,
            conversation_id: conversation.id.to_string(),
            requires_human: false,
            metadata: ChatMetadata::shortcut("faq", elapsed_ms(started)),
            reservation_in_progress: conversation.reservation_in_progress,
            reservation_created: None,
        }
    }

    async fn cancel_reservation(
        &self,
        request: &ChatRequest,
        mut conversation: ConversationHistory,
        is_new: bool,
        started: Instant,
    ) -> ChatResponse {
        conversation.reservation_in_progress = None;
        let now = self.clock.now();
        conversation.push(ChatMessage::user(request.message.clone()), now);
        conversation.push(ChatMessage::assistant(CANCEL_ACKNOWLEDGEMENT), now);
        self.persist(&conversation, is_new).await;

        info!(event_name = "agent.booking.cancelled", conversation_id = %conversation.id, "reservation in progress discarded");
        ChatResponse {
            message: CANCEL_ACKNOWLEDGEMENT.to_string(),
            conversation_id: conversation.id.to_string(),
            suggested_actions: vec![
                "Ver habitaciones disponibles".to_string(),
                "Hacer una nueva reserva".to_string(),
            ],
            requires_human: false,
            metadata: ChatMetadata::shortcut("cancel", elapsed_ms(started)),
            reservation_in_progress: None,
            reservation_created: None,
        }
    }

    async fn load_conversation(
        &self,
        request: &ChatRequest,
    ) -> Result<(ConversationHistory, bool), TurnError> {
        if let Some(id) = request.conversation_id() {
            match self.conversations.get(&ConversationId(id.to_string())).await {
                Ok(Some(conversation)) => return Ok((conversation, false)),
                Ok(None) => {
                    debug!(event_name = "agent.conversation.unknown_id", conversation_id = id, "starting a new conversation");
                }
                Err(source) => {
                    error!(event_name = "agent.conversation.load_failed", conversation_id = id, error = %source, "conversation store failed");
                    return Err(TurnError::ConversationUnavailable { id: id.to_string(), source });
                }
            }
        }

        let conversation = ConversationHistory::start(request.client_id, self.clock.now());
        info!(event_name = "agent.conversation.created", conversation_id = %conversation.id, "new conversation");
        Ok((conversation, true))
    }

    async fn catalog(&self) -> Vec<RoomType> {
        self.inventory.room_types().await.unwrap_or_else(|error| {
            warn!(event_name = "agent.inventory.catalog_failed", error = %error, "room catalog unavailable");
            Vec::new()
        })
    }

    /// Folds the turn into the tracked reservation and prices it once it can be priced.
    async fn advance_reservation(&self, conversation: &mut ConversationHistory, extraction: &Extraction) {
        let update = self.flow.update(conversation.reservation_in_progress.take(), &extraction.signals);
        if update.started {
            info!(event_name = "agent.booking.started", conversation_id = %conversation.id, "reservation started");
        }
        for (from, to) in BookingFlow::outcome(&update) {
            info!(
                event_name = "agent.booking.transition",
                conversation_id = %conversation.id,
                from = from.as_str(),
                to = to.as_str(),
                "booking step advanced"
            );
        }

        let mut reservation = update.reservation;
        if let Some(reservation) = reservation.as_mut() {
            self.price_reservation(reservation).await;
        }
        conversation.reservation_in_progress = reservation;
    }

    async fn price_reservation(&self, reservation: &mut ReservationInProgress) {
        if !reservation.needs_price() {
            return;
        }
        let (Some(room_type_id), Some(stay)) = (reservation.room_type_id, reservation.stay()) else {
            return;
        };
        match self.inventory.room_type(room_type_id).await {
            Ok(Some(room_type)) => {
                reservation.computed_price = Some(quote_stay(&room_type, &stay).total);
            }
            Ok(None) => {
                debug!(event_name = "agent.booking.unknown_room_type", room_type_id = room_type_id.0, "cannot price");
            }
            Err(error) => {
                warn!(event_name = "agent.booking.price_failed", error = %error, "stay price unavailable");
            }
        }
    }

    async fn lookup_web(&self, message: &str) -> WebLookup {
        let query = search_query(message, &self.settings.hotel_location);
        if let Some(cached) = self.web_cache.get(&query) {
            debug!(event_name = "agent.search.cache_hit", query = %query, "web search served from cache");
            return WebLookup { response: Some(cached), cache_hit: true };
        }

        let Some(search) = &self.search else {
            return WebLookup::default();
        };
        debug!(event_name = "agent.search.cache_miss", query = %query, "performing web search");
        match search.search(&query, self.settings.search_max_results).await {
            Ok(response) => {
                self.web_cache.set(&query, response.clone());
                WebLookup { response: Some(response), cache_hit: false }
            }
            Err(error) => {
                warn!(event_name = "agent.search.failed", query = %query, error = %error, "web search failed");
                WebLookup::default()
            }
        }
    }

    async fn hotel_snapshot(
        &self,
        room_types: Vec<RoomType>,
        today: NaiveDate,
        context: Option<&ChatContext>,
    ) -> HotelSnapshot {
        let window_end = today.checked_add_days(Days::new(UPCOMING_WINDOW_DAYS)).unwrap_or(today);
        let window = StayRange::new(today, window_end);
        let upcoming = match self.inventory.available_room_types(&window).await {
            Ok(available) => {
                Some((window, available.iter().map(|entry| entry.free_rooms).sum::<u32>()))
            }
            Err(error) => {
                warn!(event_name = "agent.inventory.availability_failed", error = %error, "skipping upcoming availability");
                None
            }
        };

        let mut requested = None;
        if let Some(stay) = context.and_then(ChatContext::stay) {
            match self.inventory.available_room_types(&stay).await {
                Ok(available) => requested = Some((stay, available)),
                Err(error) => {
                    warn!(event_name = "agent.inventory.availability_failed", error = %error, "skipping requested availability");
                }
            }
        }

        HotelSnapshot { room_types, upcoming, requested }
    }

    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &ConversationHistory,
        pending: Option<&ChatMessage>,
    ) -> Result<Completion, TurnError> {
        let mut messages = Vec::with_capacity(self.settings.history_window + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend_from_slice(conversation.recent(self.settings.history_window));
        messages.extend(pending.cloned());

        let llm_started = Instant::now();
        let completion = self
            .llm
            .complete(&messages, &self.settings.completion)
            .await
            .map_err(|failure| {
                error!(
                    event_name = "agent.llm.failed",
                    conversation_id = %conversation.id,
                    latency_ms = elapsed_ms(llm_started),
                    error = %failure,
                    "generative backend call failed"
                );
                TurnError::BackendUnavailable(failure)
            })?;

        if completion.content.trim().is_empty() {
            error!(event_name = "agent.llm.empty", conversation_id = %conversation.id, "generative backend returned no content");
            return Err(TurnError::EmptyCompletion);
        }
        info!(
            event_name = "agent.llm.completed",
            conversation_id = %conversation.id,
            latency_ms = elapsed_ms(llm_started),
            tokens = completion.total_tokens,
            messages = messages.len(),
            "generative backend replied"
        );
        Ok(completion)
    }

    async fn persist(&self, conversation: &ConversationHistory, is_new: bool) {
        let result = if is_new {
            self.conversations.save(conversation).await
        } else {
            self.conversations.update(conversation).await
        };
        if let Err(error) = result {
            error!(
                event_name = "agent.conversation.persist_failed",
                conversation_id = %conversation.id,
                is_new,
                error = %error,
                "conversation not persisted"
            );
        }
    }

    async fn log_client_message(&self, client_id: i64, content: &str) {
        let entry = MessageLogEntry {
            client_id,
            content: content.to_string(),
            registered_at: self.clock.now(),
        };
        if let Err(error) = self.conversations.append_message_log(entry).await {
            warn!(event_name = "agent.message_log.failed", client_id, error = %error, "message log entry dropped");
        }
    }
}

/// Feeds tool facts back into the tracked reservation. Returns the id of a reservation
/// that was just created.
/// One stored assistant turn: tool results of this turn followed by the final reply.
fn assistant_turn(tool_turns: &[String], reply: &str) -> String {
    tool_turns.iter().map(String::as_str).chain([reply]).collect::<Vec<_>>().join("\n\n")
}

fn apply_tool_output(
    conversation: &mut ConversationHistory,
    output: &ToolOutput,
) -> Option<ReservationId> {
    if let Some(id) = output.created_reservation {
        info!(
            event_name = "agent.booking.created",
            conversation_id = %conversation.id,
            reservation_id = id.0,
            "reservation created from chat"
        );
        conversation.reservation_in_progress = None;
        return Some(id);
    }

    if let (Some((room_type_id, total)), Some(reservation)) =
        (output.computed_price, conversation.reservation_in_progress.as_mut())
    {
        if reservation.room_type_id.is_none() || reservation.room_type_id == Some(room_type_id) {
            reservation.computed_price = Some(total);
        }
    }
    None
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
