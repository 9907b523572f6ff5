//! System prompt assembly. Every figure the model sees comes from the inventory or the
//! tracked reservation; the model never prices anything itself.

use std::fmt::Write as _;

use posada_core::domain::room::{RoomType, StayRange};
use posada_core::flows::{BookingStep, ReservationInProgress};
use posada_core::pricing::format_soles;
use posada_db::repositories::RoomAvailability;

use crate::chat::ChatContext;
use crate::tools::ReservationArgs;

const BASE_PROMPT: &str = "Eres un asistente virtual amable y profesional de un hotel en Lima, Perú.

INSTRUCCIONES CRÍTICAS:
- Si te preguntan sobre información externa (clima, restaurantes, atracciones),
  usarás la información proporcionada en \"INFORMACIÓN DE LA WEB\".
- Si no hay información web disponible, indica que no tienes esos datos en tiempo real.
- Para información del hotel, usa siempre los datos reales proporcionados.
- Sé amable, profesional y conciso.
- Responde en español.
- Puedes ejecutar acciones usando las HERRAMIENTAS DISPONIBLES cuando sea necesario.

Tu objetivo es ayudar a los huéspedes con:
- Información sobre habitaciones (SOLO las que aparecen en la información real)
- Proceso de reservas COMPLETO (puedes crear reservas usando las herramientas)
- Políticas del hotel (check-in 14:00, check-out 12:00)
- Tarifas reales del sistema

FLUJO DE RESERVAS:
Cuando un usuario quiera hacer una reserva, sigue estos pasos:
1. Pregunta fechas de entrada y salida
2. Pregunta cantidad de adultos y niños
3. USA LA HERRAMIENTA 'check_availability' para verificar disponibilidad
4. Muestra las opciones disponibles usando 'list_room_types' si es necesario
5. Pregunta qué tipo de habitación prefiere
6. USA LA HERRAMIENTA 'calculate_price' para calcular el precio total
7. Solicita los datos del huésped: nombre, apellidos, número de documento, correo y teléfono
8. Resume la reserva y pide confirmación explícita
9. Tras la confirmación, USA LA HERRAMIENTA 'create_reservation' y comparte el número de reserva

POLÍTICAS DEL HOTEL:
- Check-in: 14:00 hrs
- Check-out: 12:00 hrs
- WiFi gratuito
- Desayuno buffet incluido
- Recepción 24 horas

IMPORTANTE:
- Siempre sé cortés y profesional
- Si no sabes algo, admítelo y ofrece transferir a un agente humano
- Proporciona información clara y concisa basada en los datos reales
- Cuando uses una herramienta, explica al usuario qué estás haciendo
- No pidas información que ya aparece en la reserva en progreso
- Responde en español a menos que el usuario escriba en otro idioma
- NUNCA inventes información, usa siempre las herramientas o la información proporcionada

";

/// Live inventory figures rendered into the prompt.
#[derive(Clone, Debug, Default)]
pub struct HotelSnapshot {
    pub room_types: Vec<RoomType>,
    /// Window starting today and the number of rooms free across all of it.
    pub upcoming: Option<(StayRange, u32)>,
    /// Availability for the dates the booking widget sent, if any.
    pub requested: Option<(StayRange, Vec<RoomAvailability>)>,
}

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    location: String,
}

impl PromptBuilder {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }

    pub fn hotel_info(&self, snapshot: &HotelSnapshot) -> String {
        let mut info = String::from("\n=== INFORMACIÓN REAL DEL HOTEL ===\n\n");
        info.push_str("TIPOS DE HABITACIONES DISPONIBLES:\n");
        for room_type in &snapshot.room_types {
            let _ = write!(
                info,
                "\n• {}:\n  - Precio: {} por noche\n  - Capacidad: {} adultos, {} niños\n  - Camas: {}\n  - Descripción: {}\n",
                room_type.title,
                format_soles(room_type.nightly_price),
                room_type.adult_capacity,
                room_type.child_capacity,
                room_type.bed_count,
                room_type.description
            );
        }

        if let Some((window, free_rooms)) = &snapshot.upcoming {
            let _ = write!(
                info,
                "\nDISPONIBILIDAD:\nHabitaciones disponibles para el próximo mes ({} - {}): {}\n",
                window.check_in, window.check_out, free_rooms
            );
        }

        info.push_str("\n=== INFORMACIÓN GENERAL ===\n");
        if self.location.trim().is_empty() {
            info.push_str("• Ubicación: [Definir en config]\n");
        } else {
            let _ = writeln!(info, "• Ubicación: {}", self.location);
        }
        info.push_str("• Check-in: 14:00 hrs\n");
        info.push_str("• Check-out: 12:00 hrs\n");
        info.push_str("• WiFi: Gratuito en todas las áreas\n");
        info.push_str("• Estacionamiento: Disponible\n");

        info.push_str("\n=== POLÍTICAS ===\n");
        info.push_str("• Cancelación gratuita hasta 48 horas antes\n");
        info.push_str("• Mascotas: No permitidas\n");
        info.push_str("• Métodos de pago: Efectivo, tarjeta, transferencia\n");

        if let Some((stay, available)) = &snapshot.requested {
            let _ = write!(info, "\n\nDISPONIBILIDAD PARA {} - {}:\n", stay.check_in, stay.check_out);
            if available.is_empty() {
                info.push_str("❌ No hay habitaciones disponibles para estas fechas.\n");
            }
            for entry in available {
                let _ = writeln!(
                    info,
                    "✅ {}: Disponible (Precio: {}, Capacidad: {} adultos + {} niños)",
                    entry.room_type.title,
                    format_soles(entry.room_type.nightly_price),
                    entry.room_type.adult_capacity,
                    entry.room_type.child_capacity
                );
            }
        }

        info.push_str("\n=== FIN DE INFORMACIÓN REAL ===\n");
        info
    }

    /// Base policy text, then each section in order, then the widget context.
    pub fn system_prompt(&self, sections: &[&str], context: Option<&ChatContext>) -> String {
        let mut prompt = String::from(BASE_PROMPT);
        for section in sections {
            prompt.push_str(section);
        }

        if let Some(context) = context {
            prompt.push_str("\n\nCONTEXTO DE LA CONVERSACIÓN:\n");
            if let (Some(check_in), Some(check_out)) = (&context.check_in, &context.check_out) {
                let _ = writeln!(prompt, "- El usuario está consultando para: {check_in} a {check_out}");
            }
            if let Some(adults) = context.adults {
                let _ = writeln!(prompt, "- Cantidad de adultos: {adults}");
            }
            if let Some(children) = context.children.filter(|children| *children > 0) {
                let _ = writeln!(prompt, "- Cantidad de niños: {children}");
            }
        }
        prompt
    }
}

/// Summary of the tracked reservation. Empty when nothing is in progress.
pub fn reservation_context(reservation: Option<&ReservationInProgress>, confirmed: bool) -> String {
    let Some(reservation) = reservation else {
        return String::new();
    };

    let mut block = String::from("\n=== RESERVA EN PROGRESO ===\n");
    let _ = writeln!(block, "Paso actual: {}", reservation.step.as_str());
    if let Some(check_in) = reservation.check_in {
        let _ = writeln!(block, "Fecha de entrada: {check_in}");
    }
    if let Some(check_out) = reservation.check_out {
        let _ = writeln!(block, "Fecha de salida: {check_out}");
    }
    if let Some(adults) = reservation.adults {
        let _ = writeln!(block, "Cantidad de adultos: {adults}");
    }
    if let Some(children) = reservation.children {
        let _ = writeln!(block, "Cantidad de niños: {children}");
    }
    if let Some(room_type_id) = reservation.room_type_id {
        let _ = writeln!(block, "Tipo de habitación seleccionado: ID {room_type_id}");
    }
    if let Some(price) = reservation.computed_price {
        let _ = writeln!(block, "Precio calculado: {}", format_soles(price));
    }
    if reservation.personal_data.is_some() {
        block.push_str("Datos personales proporcionados\n");
    }

    if confirmed {
        if let Some(args) = prepared_reservation(reservation) {
            block.push_str(
                "\nEl huésped CONFIRMÓ la reserva. Crea la reserva ahora con estos datos exactos:\n",
            );
            let _ = write!(
                block,
                "[USE_TOOL: create_reservation]\n{}\n[END_TOOL]\n",
                serde_json::to_string(&args).unwrap_or_default()
            );
        }
    }

    block.push_str("\nRecuerda continuar el proceso de reserva según el paso actual.\n");
    block.push_str("=== FIN RESERVA EN PROGRESO ===\n\n");
    block
}

/// Arguments for `create_reservation` once the reservation reached confirmation with
/// everything the tool needs.
pub fn prepared_reservation(reservation: &ReservationInProgress) -> Option<ReservationArgs> {
    if reservation.step != BookingStep::Confirmation {
        return None;
    }
    let stay = reservation.stay()?;
    Some(ReservationArgs {
        check_in: Some(stay.check_in.to_string()),
        check_out: Some(stay.check_out.to_string()),
        adults: i64::from(reservation.adults?),
        children: i64::from(reservation.children.unwrap_or(0)),
        room_type_id: reservation.room_type_id?.0,
        personal_data: Some(reservation.personal_data.clone()?),
    })
}
