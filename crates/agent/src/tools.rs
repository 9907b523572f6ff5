use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use posada_core::clock::Clock;
use posada_core::domain::booking::{NewReservation, PersonalData, ReservationId};
use posada_core::domain::room::{RoomTypeId, StayRange};
use posada_core::pricing::{format_soles, quote_stay};
use posada_db::repositories::{BookingLedger, RepositoryError, RoomInventory};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("argumentos inválidos: {0}")]
    InvalidArguments(String),
    #[error("se requieren la fecha de entrada y la fecha de salida")]
    MissingDates,
    #[error("fecha inválida en {field}: `{value}` (formato esperado YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("tipo de habitación {0} no encontrado")]
    UnknownRoomType(RoomTypeId),
    #[error("tipo de habitación inválido: {0}")]
    InvalidRoomType(i64),
    #[error("no hay habitaciones disponibles del tipo {room_type_id} entre {check_in} y {check_out}")]
    NoRoomAvailable { room_type_id: RoomTypeId, check_in: NaiveDate, check_out: NaiveDate },
    #[error("la fecha de entrada {check_in} es anterior a hoy ({today})")]
    CheckInInPast { check_in: NaiveDate, today: NaiveDate },
    #[error("la cantidad de adultos debe ser al menos 1 (recibido {0})")]
    InvalidAdults(i64),
    #[error("herramienta desconocida: {0}")]
    UnknownTool(String),
    #[error("error de persistencia: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a tool hands back: guest-readable text plus the facts the booking flow tracks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub created_reservation: Option<ReservationId>,
    pub computed_price: Option<(RoomTypeId, Decimal)>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Argument object shown to the model in the tool catalog.
    fn example(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    /// The four booking tools over the given collaborators.
    pub fn hotel(
        inventory: Arc<dyn RoomInventory>,
        ledger: Arc<dyn BookingLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut registry = Self::default();
        registry.register(ListRoomTypes { inventory: Arc::clone(&inventory) });
        registry.register(CheckAvailability { inventory: Arc::clone(&inventory) });
        registry.register(CalculatePrice { inventory: Arc::clone(&inventory) });
        registry.register(CreateReservation { inventory, ledger, clock });
        registry.alias("get_room_types", "list_room_types");
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Box::new(tool));
    }

    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        let resolved = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.tools.get(resolved).map(Box::as_ref)
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input).await
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Prompt section describing every tool and the invocation syntax.
    pub fn catalog(&self) -> String {
        let mut catalog = String::from("\n=== HERRAMIENTAS DISPONIBLES ===\n\n");
        catalog.push_str("Puedes usar las siguientes herramientas para ayudar al usuario:\n\n");
        for tool in self.order.iter().filter_map(|name| self.tools.get(name)) {
            let _ = writeln!(catalog, "• {}: {}", tool.name(), tool.description());
        }

        catalog.push_str("\nPara usar una herramienta, responde EXACTAMENTE en este formato:\n");
        catalog.push_str("[USE_TOOL: nombre_herramienta]\n{\"arg1\": \"value1\"}\n[END_TOOL]\n\n");
        catalog.push_str("Ejemplos:\n");
        for tool in self.order.iter().filter_map(|name| self.tools.get(name)) {
            let _ = write!(catalog, "[USE_TOOL: {}]\n{}\n[END_TOOL]\n\n", tool.name(), tool.example());
        }
        catalog
    }
}

#[derive(Debug, Default, Deserialize)]
struct StayArgs {
    #[serde(rename = "fechaEntrada", alias = "checkIn", default)]
    check_in: Option<String>,
    #[serde(rename = "fechaSalida", alias = "checkOut", default)]
    check_out: Option<String>,
}

impl StayArgs {
    fn stay(&self) -> Result<StayRange, ToolError> {
        let (Some(check_in), Some(check_out)) = (self.check_in.as_deref(), self.check_out.as_deref())
        else {
            return Err(ToolError::MissingDates);
        };
        let check_in = parse_date("fechaEntrada", check_in)?;
        let check_out = parse_date("fechaSalida", check_out)?;
        Ok(StayRange::new(check_in, check_out))
    }
}

#[derive(Debug, Deserialize)]
struct PriceArgs {
    #[serde(rename = "tipoHabitacionId", alias = "roomTypeId")]
    room_type_id: i64,
    #[serde(flatten)]
    stay: StayArgs,
}

/// Arguments of `create_reservation`; also what the runtime prepares for the model
/// once the guest confirms.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationArgs {
    #[serde(rename = "fechaEntrada", alias = "checkIn", default)]
    pub check_in: Option<String>,
    #[serde(rename = "fechaSalida", alias = "checkOut", default)]
    pub check_out: Option<String>,
    #[serde(rename = "cantidadAdultos", alias = "adults", default)]
    pub adults: i64,
    #[serde(rename = "cantidadNinhos", alias = "children", default)]
    pub children: i64,
    #[serde(rename = "tipoHabitacionId", alias = "roomTypeId", default)]
    pub room_type_id: i64,
    #[serde(rename = "personalData", default)]
    pub personal_data: Option<PersonalData>,
}

struct ListRoomTypes {
    inventory: Arc<dyn RoomInventory>,
}

#[async_trait]
impl Tool for ListRoomTypes {
    fn name(&self) -> &'static str {
        "list_room_types"
    }

    fn description(&self) -> &'static str {
        "Obtiene todos los tipos de habitaciones del hotel con sus precios y características"
    }

    fn example(&self) -> Value {
        json!({})
    }

    async fn execute(&self, _input: Value) -> Result<ToolOutput, ToolError> {
        let room_types = self.inventory.room_types().await?;

        let mut text = String::from("Tipos de Habitaciones Disponibles:\n\n");
        for room_type in room_types {
            let _ = write!(
                text,
                "• {} (ID: {})\n  Precio: {} por noche\n  Capacidad: {} adultos, {} niños\n  Camas: {}\n  Descripción: {}\n\n",
                room_type.title,
                room_type.id,
                format_soles(room_type.nightly_price),
                room_type.adult_capacity,
                room_type.child_capacity,
                room_type.bed_count,
                room_type.description
            );
        }
        Ok(ToolOutput::text(text))
    }
}

struct CheckAvailability {
    inventory: Arc<dyn RoomInventory>,
}

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    fn description(&self) -> &'static str {
        "Verifica la disponibilidad de habitaciones para fechas específicas. Args: {\"fechaEntrada\": \"YYYY-MM-DD\", \"fechaSalida\": \"YYYY-MM-DD\"}"
    }

    fn example(&self) -> Value {
        json!({"fechaEntrada": "2025-12-01", "fechaSalida": "2025-12-05"})
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let args: StayArgs = parse_args(input)?;
        let stay = args.stay()?;
        let available = self.inventory.available_room_types(&stay).await?;

        if available.is_empty() {
            return Ok(ToolOutput::text(format!(
                "No hay habitaciones disponibles para las fechas {} a {}",
                stay.check_in, stay.check_out
            )));
        }

        let mut text =
            format!("Habitaciones disponibles para {} - {}:\n\n", stay.check_in, stay.check_out);
        for entry in available {
            let room_type = entry.room_type;
            let _ = write!(
                text,
                "✅ {} (ID: {})\n   Precio: {} por noche\n   Capacidad: {} adultos, {} niños\n\n",
                room_type.title,
                room_type.id,
                format_soles(room_type.nightly_price),
                room_type.adult_capacity,
                room_type.child_capacity
            );
        }
        Ok(ToolOutput::text(text))
    }
}

struct CalculatePrice {
    inventory: Arc<dyn RoomInventory>,
}

#[async_trait]
impl Tool for CalculatePrice {
    fn name(&self) -> &'static str {
        "calculate_price"
    }

    fn description(&self) -> &'static str {
        "Calcula el precio total de una reserva. Args: {\"tipoHabitacionId\": 1, \"fechaEntrada\": \"YYYY-MM-DD\", \"fechaSalida\": \"YYYY-MM-DD\"}"
    }

    fn example(&self) -> Value {
        json!({"tipoHabitacionId": 1, "fechaEntrada": "2025-12-01", "fechaSalida": "2025-12-05"})
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let args: PriceArgs = parse_args(input)?;
        let stay = args.stay.stay()?;
        let room_type_id = RoomTypeId(args.room_type_id);
        let room_type = self
            .inventory
            .room_type(room_type_id)
            .await?
            .ok_or(ToolError::UnknownRoomType(room_type_id))?;

        let quote = quote_stay(&room_type, &stay);
        let text = format!(
            "Cálculo de Precio:\n\nHabitación: {}\nPrecio por noche: {}\nNúmero de noches: {}\nTotal: {}\n",
            room_type.title,
            format_soles(quote.nightly_price),
            quote.nights,
            format_soles(quote.total)
        );
        Ok(ToolOutput {
            text,
            created_reservation: None,
            computed_price: Some((room_type_id, quote.total)),
        })
    }
}

struct CreateReservation {
    inventory: Arc<dyn RoomInventory>,
    ledger: Arc<dyn BookingLedger>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Tool for CreateReservation {
    fn name(&self) -> &'static str {
        "create_reservation"
    }

    fn description(&self) -> &'static str {
        "Crea una nueva reserva. Args: fechas, cantidad de adultos y niños, tipo de habitación y datos personales del cliente (personalData)"
    }

    fn example(&self) -> Value {
        json!({
            "fechaEntrada": "2025-12-01",
            "fechaSalida": "2025-12-05",
            "cantidadAdultos": 2,
            "cantidadNinhos": 0,
            "tipoHabitacionId": 1,
            "personalData": {
                "nombre": "Juan",
                "primerApellido": "Perez",
                "numeroDocumento": "12345678",
                "genero": "M",
                "correo": "juan@mail.com",
                "telefono1": "987654321"
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let args: ReservationArgs = parse_args(input)?;
        let stay =
            StayArgs { check_in: args.check_in.clone(), check_out: args.check_out.clone() }.stay()?;

        let adults = u32::try_from(args.adults)
            .ok()
            .filter(|adults| *adults >= 1)
            .ok_or(ToolError::InvalidAdults(args.adults))?;
        let children = u32::try_from(args.children).map_err(|_| {
            ToolError::InvalidArguments(format!("cantidadNinhos inválida: {}", args.children))
        })?;
        if args.room_type_id < 1 {
            return Err(ToolError::InvalidRoomType(args.room_type_id));
        }

        let today = self.clock.today();
        if stay.check_in < today {
            return Err(ToolError::CheckInInPast { check_in: stay.check_in, today });
        }

        let guest = args
            .personal_data
            .ok_or_else(|| ToolError::InvalidArguments("personalData es requerido".to_string()))?;

        let room_type_id = RoomTypeId(args.room_type_id);
        let room_type = self
            .inventory
            .room_type(room_type_id)
            .await?
            .ok_or(ToolError::UnknownRoomType(room_type_id))?;
        let room = self.inventory.find_available_room(room_type_id, &stay).await?.ok_or(
            ToolError::NoRoomAvailable {
                room_type_id,
                check_in: stay.check_in,
                check_out: stay.check_out,
            },
        )?;

        let quote = quote_stay(&room_type, &stay);
        let reservation = self
            .ledger
            .create_reservation(NewReservation {
                guest: guest.clone(),
                adults,
                children,
                room_id: room.id,
                room_type_id,
                stay,
                nightly_price: quote.nightly_price,
                subtotal: quote.total,
                requested_at: self.clock.now(),
            })
            .await?;

        let text = format!(
            "✅ Reserva creada exitosamente!\n\n\
             Número de Reserva: #{}\n\
             Cliente: {}\n\
             Email: {}\n\
             Tipo de Habitación: {}\n\
             Check-in: {}\n\
             Check-out: {}\n\
             Noches: {}\n\
             Adultos: {}\n\
             Niños: {}\n\
             Total: {}\n\
             Estado: {}",
            reservation.id,
            guest.display_name(),
            guest.email,
            room_type.title,
            stay.check_in,
            stay.check_out,
            quote.nights,
            adults,
            children,
            format_soles(reservation.subtotal),
            reservation.status.label()
        );

        Ok(ToolOutput {
            text,
            created_reservation: Some(reservation.id),
            computed_price: Some((room_type_id, quote.total)),
        })
    }
}

fn parse_args<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input).map_err(|error| ToolError::InvalidArguments(error.to_string()))
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ToolError::InvalidDate { field, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use posada_core::clock::FixedClock;
    use posada_core::domain::booking::ReservationId;
    use posada_core::domain::room::{Room, RoomId, RoomStatus, RoomType, RoomTypeId};
    use posada_db::repositories::InMemoryHotel;

    use super::{ToolError, ToolRegistry};

    fn room_type(id: i64, title: &str, price: i64) -> RoomType {
        RoomType {
            id: RoomTypeId(id),
            title: title.to_owned(),
            description: format!("Habitación {title}"),
            adult_capacity: 2,
            child_capacity: 1,
            bed_count: 1,
            nightly_price: Decimal::new(price, 2),
            active: true,
        }
    }

    fn room(id: i64, room_type_id: i64) -> Room {
        Room {
            id: RoomId(id),
            room_type_id: RoomTypeId(room_type_id),
            number: format!("{id}01"),
            status: RoomStatus::Available,
        }
    }

    fn registry() -> (ToolRegistry, Arc<InMemoryHotel>) {
        let hotel = Arc::new(InMemoryHotel::new(
            vec![room_type(1, "Individual", 6_000), room_type(5, "Doble", 9_000)],
            vec![room(1, 1), room(2, 5)],
        ));
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).expect("date");
        let registry = ToolRegistry::hotel(
            hotel.clone(),
            hotel.clone(),
            Arc::new(FixedClock::on(today)),
        );
        (registry, hotel)
    }

    fn reservation_args(check_in: &str, adults: i64) -> serde_json::Value {
        json!({
            "fechaEntrada": check_in,
            "fechaSalida": "2025-12-15",
            "cantidadAdultos": adults,
            "cantidadNinhos": 0,
            "tipoHabitacionId": 5,
            "personalData": {
                "nombre": "Juan",
                "primerApellido": "Perez",
                "numeroDocumento": "12345678",
                "genero": "M",
                "correo": "juan@mail.com",
                "telefono1": "987654321"
            }
        })
    }

    #[tokio::test]
    async fn availability_lists_every_free_type_with_a_check_mark() {
        let (registry, _) = registry();
        let output = registry
            .execute(
                "check_availability",
                json!({"fechaEntrada": "2025-12-10", "fechaSalida": "2025-12-15"}),
            )
            .await
            .expect("availability");

        assert_eq!(output.text.matches('✅').count(), 2);
        assert!(output.text.contains("✅ Doble (ID: 5)"));
        assert!(output.text.contains("Precio: S/90.00 por noche"));
    }

    #[tokio::test]
    async fn availability_accepts_english_keys_and_rejects_bad_dates() {
        let (registry, _) = registry();
        registry
            .execute("check_availability", json!({"checkIn": "2025-12-10", "checkOut": "2025-12-11"}))
            .await
            .expect("english aliases");

        let error = registry
            .execute("check_availability", json!({"fechaEntrada": "10/12/2025", "fechaSalida": "2025-12-15"}))
            .await
            .expect_err("day-first is not accepted");
        assert!(matches!(error, ToolError::InvalidDate { field: "fechaEntrada", .. }));
    }

    #[tokio::test]
    async fn price_is_nightly_rate_times_nights() {
        let (registry, _) = registry();
        let output = registry
            .execute(
                "calculate_price",
                json!({"tipoHabitacionId": 5, "fechaEntrada": "2025-12-10", "fechaSalida": "2025-12-15"}),
            )
            .await
            .expect("price");

        assert!(output.text.contains("Número de noches: 5"));
        assert!(output.text.contains("Total: S/450.00"));
        assert_eq!(output.computed_price, Some((RoomTypeId(5), Decimal::new(45_000, 2))));
    }

    #[tokio::test]
    async fn same_day_stay_is_priced_as_one_night() {
        let (registry, _) = registry();
        let output = registry
            .execute(
                "calculate_price",
                json!({"tipoHabitacionId": 5, "fechaEntrada": "2025-12-10", "fechaSalida": "2025-12-10"}),
            )
            .await
            .expect("one-night minimum");

        assert!(output.text.contains("Número de noches: 1"));
        assert!(output.text.contains("Total: S/90.00"));
        assert_eq!(output.computed_price, Some((RoomTypeId(5), Decimal::new(9_000, 2))));
    }

    #[tokio::test]
    async fn price_for_unknown_type_is_an_error() {
        let (registry, _) = registry();
        let error = registry
            .execute(
                "calculate_price",
                json!({"roomTypeId": 42, "checkIn": "2025-12-10", "checkOut": "2025-12-12"}),
            )
            .await
            .expect_err("unknown type");
        assert!(matches!(error, ToolError::UnknownRoomType(RoomTypeId(42))));
    }

    #[tokio::test]
    async fn reservation_is_created_and_reported() {
        let (registry, hotel) = registry();
        let output = registry
            .execute("create_reservation", reservation_args("2025-12-10", 2))
            .await
            .expect("reservation");

        assert_eq!(output.created_reservation, Some(ReservationId(1)));
        assert!(output.text.contains("Número de Reserva: #1"));
        assert!(output.text.contains("Cliente: Juan Perez"));
        assert!(output.text.contains("Total: S/450.00"));
        assert!(output.text.contains("Estado: Pendiente"));
        assert_eq!(hotel.reservations().await.len(), 1);

        let error = registry
            .execute("create_reservation", reservation_args("2025-12-12", 1))
            .await
            .expect_err("only Doble room is taken");
        assert!(matches!(error, ToolError::NoRoomAvailable { .. }));
    }

    #[tokio::test]
    async fn reservation_rejects_past_check_in_and_empty_party() {
        let (registry, hotel) = registry();

        let past = registry
            .execute("create_reservation", reservation_args("2025-11-19", 2))
            .await
            .expect_err("yesterday");
        assert!(matches!(past, ToolError::CheckInInPast { .. }));

        let today = registry.execute("create_reservation", reservation_args("2025-11-20", 2)).await;
        assert!(today.is_ok(), "check-in today is allowed: {today:?}");

        let nobody = registry
            .execute("create_reservation", reservation_args("2025-12-01", 0))
            .await
            .expect_err("no adults");
        assert!(matches!(nobody, ToolError::InvalidAdults(0)));
        assert_eq!(hotel.reservations().await.len(), 1);
    }

    #[tokio::test]
    async fn alias_and_unknown_names() {
        let (registry, _) = registry();
        let listed = registry.execute("get_room_types", json!({})).await.expect("alias resolves");
        assert!(listed.text.contains("• Individual (ID: 1)"));

        let error = registry.execute("book_spa", json!({})).await.expect_err("unknown");
        assert!(matches!(error, ToolError::UnknownTool(name) if name == "book_spa"));
    }

    #[test]
    fn catalog_lists_tools_in_registration_order() {
        let (registry, _) = registry();
        let catalog = registry.catalog();

        assert!(catalog.starts_with("\n=== HERRAMIENTAS DISPONIBLES ==="));
        let list = catalog.find("• list_room_types").expect("list tool");
        let create = catalog.find("• create_reservation").expect("create tool");
        assert!(list < create);
        assert!(catalog.contains("[USE_TOOL: check_availability]\n{\"fechaEntrada\":\"2025-12-01\""));
        assert_eq!(registry.len(), 4);
    }
}
