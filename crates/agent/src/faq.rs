//! Canned answers for short, common questions that never need the language model.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dates::contains_word;

const MAX_FAQ_CHARS: usize = 100;

static YEAR_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20\d{2}\b").expect("valid year regex"));

struct FaqEntry {
    keywords: &'static [&'static str],
    answer: Answer,
}

enum Answer {
    Fixed(&'static str),
    Location,
}

const FAQ_TABLE: &[FaqEntry] = &[
    FaqEntry {
        keywords: &["horario check-in", "hora de entrada", "hora check in", "check in", "check-in", "cuando puedo entrar"],
        answer: Answer::Fixed(
            "✅ El horario de check-in es a partir de las **14:00 hrs** (2:00 PM).\n\n\
             Si llegas antes, con gusto podemos guardar tu equipaje mientras preparamos tu habitación.\n\n\
             ¿Te gustaría hacer una reserva?",
        ),
    },
    FaqEntry {
        keywords: &["horario check-out", "hora de salida", "hora check out", "check out", "check-out", "cuando debo salir"],
        answer: Answer::Fixed(
            "✅ El horario de check-out es hasta las **12:00 hrs** (12:00 PM).\n\n\
             Si necesitas un late check-out, consulta disponibilidad con recepción.\n\n\
             ¿Puedo ayudarte con algo más?",
        ),
    },
    FaqEntry {
        keywords: &["wifi", "wi-fi", "internet", "conexión", "conexion a internet"],
        answer: Answer::Fixed(
            "✅ ¡Por supuesto! Contamos con **WiFi gratuito** en todas las áreas del hotel.\n\n\
             La contraseña se proporciona al momento del check-in.\n\n\
             ¿Necesitas información sobre algo más?",
        ),
    },
    FaqEntry {
        keywords: &["estacionamiento", "parking", "donde aparcar", "dónde aparcar", "parqueo"],
        answer: Answer::Fixed(
            "✅ Sí, contamos con **estacionamiento disponible** para nuestros huéspedes.\n\n\
             El servicio está incluido en tu reserva.\n\n\
             ¿Te gustaría hacer una reserva?",
        ),
    },
    FaqEntry {
        keywords: &["desayuno", "breakfast", "incluye desayuno", "comida"],
        answer: Answer::Fixed(
            "✅ Ofrecemos un delicioso **desayuno buffet** para nuestros huéspedes.\n\n\
             Horario: 7:00 AM - 10:00 AM\n\
             El desayuno está incluido en todas nuestras tarifas.\n\n\
             ¿Quieres ver nuestras habitaciones disponibles?",
        ),
    },
    FaqEntry {
        keywords: &["mascotas", "perro", "gato", "mascota", "animales", "pet"],
        answer: Answer::Fixed(
            "❌ Lo sentimos, actualmente **no permitimos mascotas** en el hotel.\n\n\
             Esta política nos ayuda a mantener la comodidad de todos nuestros huéspedes.\n\n\
             ¿Puedo ayudarte con alguna otra consulta?",
        ),
    },
    FaqEntry {
        keywords: &["ubicación", "ubicacion", "dirección", "direccion", "donde están", "dónde están", "cómo llegar", "como llegar"],
        answer: Answer::Location,
    },
    FaqEntry {
        keywords: &["cancelación", "cancelacion", "política de cancelación", "politica de cancelacion", "puedo cancelar"],
        answer: Answer::Fixed(
            "✅ Política de Cancelación:\n\n\
             • **Cancelación gratuita** hasta 48 horas antes del check-in\n\
             • Cancelaciones posteriores tienen un cargo del 50% del total\n\
             • No-show (no presentarse): cargo del 100%\n\n\
             ¿Te gustaría hacer una reserva?",
        ),
    },
    FaqEntry {
        keywords: &["métodos de pago", "metodos de pago", "formas de pago", "cómo pagar", "como pagar", "tarjeta", "efectivo"],
        answer: Answer::Fixed(
            "💳 Aceptamos los siguientes métodos de pago:\n\n\
             • Efectivo (soles y dólares)\n\
             • Tarjetas de crédito (Visa, MasterCard, American Express)\n\
             • Tarjetas de débito\n\
             • Transferencia bancaria\n\n\
             ¿Quieres proceder con una reserva?",
        ),
    },
    FaqEntry {
        keywords: &["recepción 24 horas", "recepcion 24 horas", "atencion 24", "atención 24"],
        answer: Answer::Fixed(
            "✅ Sí, contamos con **recepción 24 horas** para atenderte en cualquier momento.\n\n\
             Nuestro personal está siempre disponible para ayudarte con lo que necesites.\n\n\
             ¿Hay algo más en lo que pueda ayudarte?",
        ),
    },
    FaqEntry {
        keywords: &["servicios", "qué servicios", "que servicios", "amenidades", "facilidades"],
        answer: Answer::Fixed(
            "✨ **Servicios del Hotel:**\n\n\
             • WiFi gratuito en todas las áreas\n\
             • Desayuno buffet incluido\n\
             • Recepción 24 horas\n\
             • Estacionamiento\n\
             • Servicio de habitaciones\n\
             • Limpieza diaria\n\n\
             ¿Te gustaría conocer nuestras habitaciones disponibles?",
        ),
    },
    FaqEntry {
        keywords: &["hola", "buenos días", "buenos dias", "buenas tardes", "buenas noches", "hi", "hello"],
        answer: Answer::Fixed(
            "¡Hola! 👋 Bienvenido a nuestro hotel. Soy tu asistente virtual.\n\n\
             Estoy aquí para ayudarte con:\n\
             • Información sobre habitaciones\n\
             • Hacer reservas\n\
             • Consultar disponibilidad\n\
             • Responder tus preguntas\n\n\
             ¿En qué puedo ayudarte hoy?",
        ),
    },
    FaqEntry {
        keywords: &["gracias", "muchas gracias", "excelente"],
        answer: Answer::Fixed(
            "¡De nada! 😊 Es un placer ayudarte.\n\n\
             Si necesitas algo más, no dudes en escribirme.\n\n\
             ¿Hay algo más en lo que pueda asistirte?",
        ),
    },
    FaqEntry {
        keywords: &["precio", "tarifa", "costo", "cuánto cuesta", "cuanto cuesta", "precios"],
        answer: Answer::Fixed(
            "💰 Nuestras tarifas varían según el tipo de habitación y la temporada.\n\n\
             Para darte un precio exacto, necesito saber:\n\
             • Fechas de entrada y salida\n\
             • Cantidad de personas\n\n\
             ¿Me proporcionas esta información para consultar la disponibilidad y precio?",
        ),
    },
];

#[derive(Clone, Debug)]
pub struct FaqResponder {
    location: String,
}

impl FaqResponder {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }

    /// Short messages without anything that looks like a year.
    pub fn applies_to(&self, message: &str) -> bool {
        message.chars().count() <= MAX_FAQ_CHARS && !YEAR_LIKE.is_match(message)
    }

    pub fn answer(&self, message: &str) -> Option<String> {
        let lowered = message.to_lowercase();
        FAQ_TABLE
            .iter()
            .find(|entry| entry.keywords.iter().any(|keyword| contains_word(&lowered, keyword)))
            .map(|entry| match &entry.answer {
                Answer::Fixed(text) => (*text).to_owned(),
                Answer::Location => format!(
                    "📍 Nuestra ubicación es: **{}**\n\n\
                     Estamos en una zona céntrica con fácil acceso a las principales atracciones.\n\n\
                     ¿Necesitas información sobre transporte o te gustaría hacer una reserva?",
                    self.location
                ),
            })
    }
}
