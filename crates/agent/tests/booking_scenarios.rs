use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use posada_agent::{
    AgentDeps, AgentSettings, BookingAgent, ChatRequest, Completion, CompletionParams, LlmClient,
    LlmError, RateLimiter, SearchError, SearchProvider, SearchResponse, SearchResult, TtlCache,
    TurnError,
};
use posada_core::clock::FixedClock;
use posada_core::domain::booking::ReservationId;
use posada_core::domain::conversation::{
    ChatMessage, ChatRole, ConversationHistory, ConversationId, MessageLogEntry,
};
use posada_core::domain::room::{Room, RoomId, RoomStatus, RoomType, RoomTypeId};
use posada_core::flows::BookingStep;
use posada_db::repositories::{
    ConversationStore, InMemoryConversationStore, InMemoryHotel, RepositoryError,
};

enum Script {
    Reply(&'static str),
    /// Answers with the `create_reservation` call the system prompt prepared.
    EchoPreparedCall,
    Fail,
}

#[derive(Default)]
struct ScriptedLlm {
    script: Mutex<VecDeque<Script>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn new(script: Vec<Script>) -> Self {
        Self { script: Mutex::new(script.into()), seen: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> usize {
        self.seen.lock().expect("seen lock").len()
    }

    fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.seen.lock().expect("seen lock")[index].clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, LlmError> {
        self.seen.lock().expect("seen lock").push(messages.to_vec());
        let next = self.script.lock().expect("script lock").pop_front();
        let content = match next {
            Some(Script::Reply(text)) => text.to_owned(),
            Some(Script::EchoPreparedCall) => {
                let system = &messages[0].content;
                let start = system
                    .find("[USE_TOOL: create_reservation]")
                    .ok_or_else(|| LlmError::Decode("no prepared call".to_owned()))?;
                let end = system[start..]
                    .find("[END_TOOL]")
                    .ok_or_else(|| LlmError::Decode("unterminated prepared call".to_owned()))?;
                system[start..start + end + "[END_TOOL]".len()].to_owned()
            }
            Some(Script::Fail) | None => {
                return Err(LlmError::Transport("connection refused".to_owned()))
            }
        };
        Ok(Completion { content, total_tokens: 10, model: params.model.clone() })
    }
}

#[derive(Default)]
struct CountingSearch {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for CountingSearch {
    async fn search(&self, query: &str, _max_results: u32) -> Result<SearchResponse, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchResponse {
            query: query.to_owned(),
            results: vec![SearchResult {
                title: "Parque Kennedy".to_owned(),
                content: "Gatos, artesanías y cafés en el corazón de Miraflores.".to_owned(),
                url: "https://visitalima.pe/kennedy".to_owned(),
            }],
        })
    }
}

struct BrokenStore;

#[async_trait]
impl ConversationStore for BrokenStore {
    async fn save(&self, _conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        Err(RepositoryError::Decode("store offline".to_owned()))
    }

    async fn get(
        &self,
        _id: &ConversationId,
    ) -> Result<Option<ConversationHistory>, RepositoryError> {
        Err(RepositoryError::Decode("store offline".to_owned()))
    }

    async fn update(&self, _conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        Err(RepositoryError::Decode("store offline".to_owned()))
    }

    async fn append_message_log(&self, _entry: MessageLogEntry) -> Result<(), RepositoryError> {
        Err(RepositoryError::Decode("store offline".to_owned()))
    }

    async fn list_for_client(
        &self,
        _client_id: i64,
    ) -> Result<Vec<ConversationHistory>, RepositoryError> {
        Err(RepositoryError::Decode("store offline".to_owned()))
    }
}

fn room_type(id: i64, title: &str, soles: i64, active: bool) -> RoomType {
    RoomType {
        id: RoomTypeId(id),
        title: title.to_owned(),
        description: format!("Habitación {title}"),
        adult_capacity: 2,
        child_capacity: 1,
        bed_count: 1,
        nightly_price: Decimal::new(soles, 0),
        active,
    }
}

fn room(id: i64, room_type_id: i64) -> Room {
    Room {
        id: RoomId(id),
        room_type_id: RoomTypeId(room_type_id),
        number: format!("{}", 100 + id),
        status: RoomStatus::Available,
    }
}

fn hotel() -> Arc<InMemoryHotel> {
    Arc::new(InMemoryHotel::new(
        vec![
            room_type(1, "Individual", 60, true),
            room_type(2, "Matrimonial", 80, true),
            room_type(5, "Doble", 90, true),
            room_type(6, "Suite", 180, true),
            room_type(7, "Penthouse", 350, false),
        ],
        vec![room(1, 1), room(2, 2), room(7, 5), room(8, 5), room(9, 6), room(11, 7)],
    ))
}

struct Harness {
    agent: BookingAgent,
    llm: Arc<ScriptedLlm>,
    store: Arc<InMemoryConversationStore>,
    hotel: Arc<InMemoryHotel>,
    search: Arc<CountingSearch>,
}

fn harness(script: Vec<Script>) -> Harness {
    harness_with(script, RateLimiter::new(Duration::from_secs(60), 20))
}

fn harness_with(script: Vec<Script>, limiter: RateLimiter) -> Harness {
    let llm = Arc::new(ScriptedLlm::new(script));
    let store = Arc::new(InMemoryConversationStore::default());
    let hotel = hotel();
    let search = Arc::new(CountingSearch::default());
    let today = NaiveDate::from_ymd_opt(2025, 11, 20).expect("date");

    let deps = AgentDeps {
        conversations: store.clone(),
        inventory: hotel.clone(),
        ledger: hotel.clone(),
        llm: llm.clone(),
        search: Some(search.clone()),
        clock: Arc::new(FixedClock::on(today).with_offset_minutes(-300)),
        rate_limiter: Arc::new(limiter),
        web_cache: Arc::new(TtlCache::new(Duration::from_secs(3600))),
    };
    let agent = BookingAgent::new(deps, AgentSettings::default());
    Harness { agent, llm, store, hotel, search }
}

#[tokio::test]
async fn booking_request_jumps_straight_to_room_type() {
    let h = harness(vec![Script::Reply("¡Perfecto! ¿Qué tipo de habitación prefieres?")]);

    let response = h
        .agent
        .process_message(ChatRequest::new("quiero reservar del 10 al 15 de diciembre para 2 adultos"))
        .await
        .expect("turn");

    let reservation = response.reservation_in_progress.expect("reservation in progress");
    assert_eq!(reservation.step, BookingStep::RoomType);
    assert_eq!(reservation.check_in, NaiveDate::from_ymd_opt(2025, 12, 10));
    assert_eq!(reservation.check_out, NaiveDate::from_ymd_opt(2025, 12, 15));
    assert_eq!(reservation.adults, Some(2));
    assert_eq!(response.message, "¡Perfecto! ¿Qué tipo de habitación prefieres?");
    assert!(response.suggested_actions.contains(&"Cancelar reserva".to_owned()));
    assert_eq!(response.metadata.sources, vec!["hotel".to_owned()]);
    assert_eq!(response.metadata.message_count, Some(2));

    let request = h.llm.request(0);
    assert_eq!(request[0].role, ChatRole::System);
    assert!(request[0].content.contains("=== RESERVA EN PROGRESO ==="));
    assert!(request[0].content.contains("=== HERRAMIENTAS DISPONIBLES ==="));
    assert_eq!(request.last().map(|message| message.content.as_str()), Some("quiero reservar del 10 al 15 de diciembre para 2 adultos"));

    let stored = h
        .agent
        .conversation(&response.conversation_id)
        .await
        .expect("store")
        .expect("persisted");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.reservation_in_progress.map(|reservation| reservation.step), Some(BookingStep::RoomType));
}

#[tokio::test]
async fn availability_tool_result_is_fed_back_to_the_model() {
    let h = harness(vec![
        Script::Reply(
            "Déjame revisar.\n[USE_TOOL: check_availability]\n\
             {\"fechaEntrada\": \"2025-12-10\", \"fechaSalida\": \"2025-12-15\"}\n[END_TOOL]",
        ),
        Script::Reply("Tenemos Individual, Matrimonial, Doble y Suite disponibles."),
    ]);

    let response = h
        .agent
        .process_message(ChatRequest::new("¿tienen disponibilidad en diciembre?").for_client(42))
        .await
        .expect("turn");

    assert_eq!(response.message, "Tenemos Individual, Matrimonial, Doble y Suite disponibles.");
    assert_eq!(response.metadata.tools_executed, 1);
    assert_eq!(response.metadata.sources, vec!["hotel".to_owned(), "tools".to_owned()]);
    assert_eq!(response.metadata.tokens_used, Some(20));
    assert_eq!(h.llm.calls(), 2);

    let follow_up = h.llm.request(1);
    let tool_turn = &follow_up[follow_up.len() - 1].content;
    assert!(tool_turn.contains("[RESULTADO DE CHECK_AVAILABILITY]:"));
    assert_eq!(tool_turn.matches('✅').count(), 4, "every active type is listed");
    assert!(tool_turn.contains("✅ Doble (ID: 5)"));
    assert!(!tool_turn.contains("Penthouse"));
    assert!(!tool_turn.contains("[USE_TOOL"));

    assert_eq!(h.store.message_log().await.len(), 1);
    let client_conversations = h.agent.client_conversations(42).await.expect("list");
    assert_eq!(client_conversations.len(), 1);
    let stored = &client_conversations[0].messages;
    assert_eq!(stored.len(), 2, "tool result is part of the assistant turn");
    assert_eq!(stored[1].role, ChatRole::Assistant);
    assert!(stored[1].content.contains("[RESULTADO DE CHECK_AVAILABILITY]:"));
    assert!(stored[1].content.ends_with("Tenemos Individual, Matrimonial, Doble y Suite disponibles."));
}

#[tokio::test]
async fn tool_loop_stops_after_the_iteration_limit() {
    const CALL: &str = "Reviso la lista.\n[USE_TOOL: list_room_types]\n{}\n[END_TOOL]";
    let h = harness((0..5).map(|_| Script::Reply(CALL)).collect());

    let response = h
        .agent
        .process_message(ChatRequest::new("¿qué tipos tienen?"))
        .await
        .expect("the last reply is returned as-is");

    let limit = AgentSettings::default().max_tool_iterations;
    assert_eq!(h.llm.calls(), limit as usize + 1);
    assert_eq!(response.metadata.tools_executed, limit);
    assert_eq!(response.message, "Reviso la lista.");
    assert!(!response.message.contains("[USE_TOOL"));
    assert!(!response.message.contains("[RESULTADO DE"));
}

#[tokio::test]
async fn choosing_a_room_type_prices_the_stay() {
    let h = harness(vec![
        Script::Reply("¿Qué tipo de habitación prefieres?"),
        Script::Reply("La Doble cuesta S/450.00 por 5 noches. ¿Me das tus datos?"),
    ]);

    let first = h
        .agent
        .process_message(ChatRequest::new("quiero reservar del 10 al 15 de diciembre para 2 adultos"))
        .await
        .expect("first turn");
    let second = h
        .agent
        .process_message(ChatRequest::new("prefiero la doble").in_conversation(&first.conversation_id))
        .await
        .expect("second turn");

    assert_eq!(second.conversation_id, first.conversation_id);
    let reservation = second.reservation_in_progress.expect("reservation");
    assert_eq!(reservation.room_type_id, Some(RoomTypeId(5)));
    assert_eq!(reservation.step, BookingStep::PersonalData);
    assert_eq!(reservation.computed_price, Some(Decimal::new(450, 0)));

    let prompt = &h.llm.request(1)[0].content;
    assert!(prompt.contains("S/450.00"));
}

#[tokio::test]
async fn confirmed_reservation_is_created_through_the_tool_loop() {
    let h = harness(vec![
        Script::Reply("¿Qué tipo de habitación prefieres?"),
        Script::Reply("Perfecto, la Doble. Necesito tus datos personales."),
        Script::Reply("Gracias Juan. ¿Confirmas la reserva?"),
        Script::EchoPreparedCall,
        Script::Reply("🎉 ¡Tu reserva #1 está lista!"),
    ]);

    let mut conversation_id = String::new();
    for message in [
        "quiero reservar del 10 al 15 de diciembre para 2 adultos",
        "prefiero la doble",
        "Soy Juan Perez Rojas, DNI 12345678, correo juan.perez@mail.com, celular 987654321",
    ] {
        let mut request = ChatRequest::new(message);
        if !conversation_id.is_empty() {
            request = request.in_conversation(conversation_id.clone());
        }
        conversation_id = h.agent.process_message(request).await.expect("turn").conversation_id;
    }

    let stored = h.agent.conversation(&conversation_id).await.expect("store").expect("stored");
    assert_eq!(
        stored.reservation_in_progress.as_ref().map(|reservation| reservation.step),
        Some(BookingStep::Confirmation)
    );

    let response = h
        .agent
        .process_message(ChatRequest::new("Sí, confirmo").in_conversation(conversation_id.clone()))
        .await
        .expect("confirmation turn");

    assert_eq!(response.reservation_created, Some(ReservationId(1)));
    assert_eq!(response.reservation_in_progress, None);
    assert_eq!(response.message, "🎉 ¡Tu reserva #1 está lista!");
    assert_eq!(response.metadata.tools_executed, 1);

    let reservations = h.hotel.reservations().await;
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].adults, 2);
    assert_eq!(reservations[0].subtotal, Decimal::new(450, 0));

    let stored = h.agent.conversation(&conversation_id).await.expect("store").expect("stored");
    assert!(stored.reservation_in_progress.is_none());
    assert!(stored
        .messages
        .iter()
        .any(|message| message.content.contains("✅ Reserva creada exitosamente!")));
}

#[tokio::test]
async fn concurrent_messages_over_the_limit_are_throttled() {
    let h = harness_with(
        vec![Script::Reply("¡Hola! ¿En qué puedo ayudarte?")],
        RateLimiter::new(Duration::from_secs(60), 1),
    );

    let (left, right) = tokio::join!(
        h.agent.process_message(ChatRequest::new("necesito información").in_conversation("conv-1")),
        h.agent.process_message(ChatRequest::new("necesito información").in_conversation("conv-1")),
    );
    let responses = [left.expect("left"), right.expect("right")];

    let throttled = responses
        .iter()
        .filter(|response| response.metadata.source.as_deref() == Some("rate_limit"))
        .collect::<Vec<_>>();
    assert_eq!(throttled.len(), 1);
    assert!(throttled[0].message.starts_with("⚠️ Has enviado muchos mensajes"));
    assert!(throttled[0].message.contains("Intenta de nuevo en"));
    assert_eq!(throttled[0].suggested_actions, vec!["Espera un momento".to_owned(), "Intenta más tarde".to_owned()]);
    assert_eq!(h.llm.calls(), 1);
}

#[tokio::test]
async fn cancel_discards_the_reservation_without_calling_the_model() {
    let h = harness(vec![Script::Reply("¿Qué tipo de habitación prefieres?")]);

    let first = h
        .agent
        .process_message(ChatRequest::new("quiero reservar del 10 al 15 de diciembre para 2 adultos"))
        .await
        .expect("first turn");
    let cancelled = h
        .agent
        .process_message(ChatRequest::new("cancelar reserva").in_conversation(&first.conversation_id))
        .await
        .expect("cancel turn");

    assert_eq!(cancelled.message, "✅ He cancelado la reserva en progreso. ¿En qué más puedo ayudarte?");
    assert_eq!(cancelled.metadata.source.as_deref(), Some("cancel"));
    assert_eq!(cancelled.reservation_in_progress, None);
    assert_eq!(h.llm.calls(), 1);

    let stored = h.agent.conversation(&first.conversation_id).await.expect("store").expect("stored");
    assert!(stored.reservation_in_progress.is_none());
    assert_eq!(stored.messages.len(), 4);
}

#[tokio::test]
async fn faq_questions_are_answered_without_the_model() {
    let h = harness(Vec::new());

    let response = h.agent.process_message(ChatRequest::new("tienen wifi?")).await.expect("turn");

    assert_eq!(response.metadata.source.as_deref(), Some("faq"));
    assert!(response.message.contains("WiFi gratuito"));
    assert_eq!(h.llm.calls(), 0);
    let stored = h.agent.conversation(&response.conversation_id).await.expect("store").expect("stored");
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn web_results_are_cached_between_turns() {
    let h = harness(vec![
        Script::Reply("Te recomiendo el Parque Kennedy."),
        Script::Reply("El Parque Kennedy es una buena opción."),
    ]);

    let first = h.agent.process_message(ChatRequest::new("¿qué hacer en Miraflores?")).await.expect("first");
    let second = h.agent.process_message(ChatRequest::new("¿qué hacer en Miraflores?")).await.expect("second");

    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.metadata.web_cache_hit, Some(false));
    assert_eq!(second.metadata.web_cache_hit, Some(true));
    assert!(second.metadata.sources.contains(&"web".to_owned()));
    assert_eq!(
        second.metadata.web_results.map(|results| results.query),
        Some("¿qué hacer en Miraflores? near Lima, Perú".to_owned())
    );
    assert!(h.llm.request(0)[0].content.contains("INFORMACIÓN DE LA WEB"));
}

#[tokio::test]
async fn backend_failure_surfaces_as_a_turn_error() {
    let h = harness(vec![Script::Fail]);

    let error = h
        .agent
        .process_message(ChatRequest::new("necesito información del hotel").in_conversation("conv-x"))
        .await
        .expect_err("backend down");

    assert!(matches!(error, TurnError::BackendUnavailable(_)));
    assert!(error.user_message().starts_with("❌"));
    assert!(h.agent.conversation("conv-x").await.expect("store").is_none());
}

#[tokio::test]
async fn unreadable_conversation_store_fails_the_turn() {
    let llm = Arc::new(ScriptedLlm::new(vec![Script::Reply("no debería llamarse")]));
    let hotel = hotel();
    let deps = AgentDeps {
        conversations: Arc::new(BrokenStore),
        inventory: hotel.clone(),
        ledger: hotel,
        llm: llm.clone(),
        search: None,
        clock: Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 20).expect("date"))),
        rate_limiter: Arc::new(RateLimiter::new(Duration::from_secs(60), 20)),
        web_cache: Arc::new(TtlCache::new(Duration::from_secs(60))),
    };
    let agent = BookingAgent::new(deps, AgentSettings::default());

    let error = agent
        .process_message(ChatRequest::new("necesito información").in_conversation("conv-9"))
        .await
        .expect_err("store down");

    assert!(matches!(error, TurnError::ConversationUnavailable { ref id, .. } if id == "conv-9"));
    assert_eq!(llm.calls(), 0);
}
