use posada_core::flows::{BookingStep, ReservationInProgress};

/// Quick replies offered under an assistant message. An active reservation decides them
/// by its step; otherwise keywords in the guest and assistant text do.
pub fn suggested_actions(
    reservation: Option<&ReservationInProgress>,
    guest_text: &str,
    assistant_text: &str,
) -> Vec<String> {
    match reservation {
        Some(reservation) => step_actions(reservation.step),
        None => general_actions(guest_text, assistant_text),
    }
}

pub fn step_actions(step: BookingStep) -> Vec<String> {
    let actions: [&str; 3] = match step {
        BookingStep::Dates => ["Consultar disponibilidad", "Ver habitaciones", "Cancelar reserva"],
        BookingStep::Guests => ["Continuar con reserva", "Cambiar fechas", "Cancelar reserva"],
        BookingStep::RoomType => {
            ["Ver detalles de habitaciones", "Cambiar fechas", "Cancelar reserva"]
        }
        BookingStep::PersonalData => ["Confirmar datos", "Modificar reserva", "Cancelar reserva"],
        BookingStep::Confirmation => ["Confirmar reserva", "Modificar datos", "Cancelar reserva"],
    };
    actions.iter().map(|action| (*action).to_owned()).collect()
}

pub fn general_actions(guest_text: &str, assistant_text: &str) -> Vec<String> {
    let guest = guest_text.to_lowercase();
    let assistant = assistant_text.to_lowercase();
    let mut actions: Vec<&str> = Vec::new();

    if guest.contains("reserva") || assistant.contains("reserva") {
        actions.extend(["Ver habitaciones disponibles", "Consultar disponibilidad"]);
    }
    if guest.contains("precio") || guest.contains("tarifa") {
        actions.extend(["Ver todas las tarifas", "Consultar promociones"]);
    }
    if guest.contains("servicios") {
        actions.extend(["Ver servicios del hotel", "Ver instalaciones"]);
    }
    if guest.contains("disponib") {
        actions.extend(["Consultar fechas específicas", "Hacer una reserva"]);
    }
    if actions.is_empty() {
        actions.extend(["Ver habitaciones disponibles", "Hablar con un agente"]);
    }

    let mut unique: Vec<String> = Vec::with_capacity(actions.len());
    for action in actions {
        if !unique.iter().any(|existing| existing == action) {
            unique.push(action.to_owned());
        }
    }
    unique
}
