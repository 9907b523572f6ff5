use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use posada_core::domain::booking::{Gender, PersonalData};
use posada_core::domain::room::{RoomType, RoomTypeId};
use posada_core::flows::{ReservationInProgress, ReservationPatch, TurnSignals};

use crate::dates::{contains_word, DateParser};

const BOOKING_KEYWORDS: &[&str] = &[
    "reservar",
    "reserva",
    "reservación",
    "reservacion",
    "habitación",
    "habitacion",
    "cuarto",
    "hospedarme",
    "book",
    "booking",
];

const CANCEL_KEYWORDS: &[&str] = &[
    "cancelar",
    "cancela",
    "empezar de nuevo",
    "empezar otra vez",
    "borrar",
    "eliminar",
    "deshacer",
    "no quiero",
    "ya no quiero",
    "mejor no",
    "olvídalo",
    "olvidalo",
    "reiniciar",
    "restart",
    "reset",
];

const CONFIRM_KEYWORDS: &[&str] = &[
    "sí",
    "si",
    "confirmo",
    "confirmar",
    "ok",
    "okay",
    "adelante",
    "procede",
    "proceder",
    "correcto",
    "de acuerdo",
    "acepto",
    "está bien",
    "esta bien",
];

/// Matched as whole words; as substrings they fire inside "quisiera" or "book".
const WHOLE_WORD_KEYWORDS: &[&str] = &["sí", "si", "ok"];

/// Words that contain an intent keyword without expressing the intent.
const CANCEL_EXCLUSIONS: &[&str] = &["cancelación", "cancelacion"];
const CONFIRM_EXCLUSIONS: &[&str] = &["incorrecto"];

/// Capitalized words that open a sentence rather than name a guest.
const NAME_STOPWORDS: &[&str] =
    &["soy", "mi", "me", "llamo", "nombre", "dni", "correo", "email", "teléfono", "telefono", "hola"];

static ADULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*adult[oa]s?").expect("valid adults regex"));
static CHILDREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*niñ[oa]s?").expect("valid children regex"));
static PEOPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*personas?").expect("valid people regex"));
static ROOM_SELECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:tipo|habitaci[oó]n|opci[oó]n|n[uú]mero|id)\s+(\d+)\b")
        .expect("valid room selection regex")
});
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.-]+@[\w.-]+\.\w+").expect("valid email regex"));
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{9,10}\b").expect("valid phone regex"));
static DOCUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{8}\b").expect("valid document regex"));

/// Everything one utterance says about the booking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub signals: TurnSignals,
    pub confirmation: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Extractor {
    dates: DateParser,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(
        &self,
        text: &str,
        today: NaiveDate,
        catalog: &[RoomType],
        current: Option<&ReservationInProgress>,
    ) -> Extraction {
        let lowered = text.to_lowercase();
        let mut patch = ReservationPatch::default();

        match self.dates.extract_range(text, today) {
            Ok(Some(stay)) => {
                patch.check_in = Some(stay.check_in);
                patch.check_out = Some(stay.check_out);
            }
            Ok(None) => {
                if let Some(date) = self.dates.parse_natural(text, today) {
                    assign_single_date(&mut patch, date, current);
                }
            }
            Err(error) => {
                warn!(event_name = "agent.extraction.invalid_date", error = %error, "ignoring dates for this turn");
            }
        }

        let (adults, children) = guest_counts(&lowered);
        patch.adults = adults;
        patch.children = children;
        patch.room_type_id = room_type_selection(&lowered, catalog);
        patch.personal_data = personal_data(text);

        Extraction {
            signals: TurnSignals {
                booking_intent: is_booking_intent(&lowered),
                cancel_intent: is_cancel_intent(&lowered),
                patch,
            },
            confirmation: is_confirmation(&lowered),
        }
    }
}

fn assign_single_date(
    patch: &mut ReservationPatch,
    date: NaiveDate,
    current: Option<&ReservationInProgress>,
) {
    let check_in = current.and_then(|reservation| reservation.check_in);
    let check_out = current.and_then(|reservation| reservation.check_out);
    match (check_in, check_out) {
        (None, _) => patch.check_in = Some(date),
        (Some(check_in), None) if date > check_in => patch.check_out = Some(date),
        _ => {}
    }
}

pub fn is_booking_intent(lowered: &str) -> bool {
    matches_any(lowered, BOOKING_KEYWORDS, &[])
}

pub fn is_cancel_intent(lowered: &str) -> bool {
    matches_any(lowered, CANCEL_KEYWORDS, CANCEL_EXCLUSIONS)
}

pub fn is_confirmation(lowered: &str) -> bool {
    matches_any(lowered, CONFIRM_KEYWORDS, CONFIRM_EXCLUSIONS)
}

/// Substring match, so "cancelarla" and "reservas" still count.
fn matches_any(lowered: &str, keywords: &[&str], exclusions: &[&str]) -> bool {
    let text = exclusions.iter().fold(lowered.to_owned(), |text, excluded| text.replace(excluded, " "));
    keywords.iter().any(|keyword| {
        if WHOLE_WORD_KEYWORDS.contains(keyword) {
            contains_word(&text, keyword)
        } else {
            text.contains(keyword)
        }
    })
}

fn guest_counts(lowered: &str) -> (Option<u32>, Option<u32>) {
    let adults = capture_number(&ADULTS, lowered);
    let mut children = capture_number(&CHILDREN, lowered);
    if children.is_none() && (lowered.contains("sin niños") || lowered.contains("sin ninos")) {
        children = Some(0);
    }

    if adults.is_none() && children.is_none() {
        if let Some(people) = capture_number(&PEOPLE, lowered) {
            return (Some(people), Some(0));
        }
    }
    (adults, children)
}

/// Numbers only select a room type that is active in the catalog; a phone or document
/// number after "número" must not replace the guest's choice.
fn room_type_selection(lowered: &str, catalog: &[RoomType]) -> Option<RoomTypeId> {
    let by_number = ROOM_SELECTION
        .captures_iter(lowered)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .map(RoomTypeId)
        .find(|id| catalog.iter().any(|room_type| room_type.active && room_type.id == *id));
    if by_number.is_some() {
        return by_number;
    }

    let folded = fold_accents(lowered);
    let words = folded.split(|c: char| !c.is_alphanumeric()).collect::<Vec<_>>();

    let mut candidates = catalog
        .iter()
        .filter(|room_type| room_type.active)
        .map(|room_type| {
            let title = fold_accents(&room_type.title.to_lowercase());
            let title_words = title
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>();
            (room_type.id, title_words)
        })
        .filter(|(_, title_words)| {
            !title_words.is_empty()
                && title_words.iter().all(|title_word| words.contains(&title_word.as_str()))
        })
        .collect::<Vec<_>>();

    candidates.sort_by(|left, right| right.1.len().cmp(&left.1.len()));
    candidates.first().map(|(id, _)| *id)
}

fn personal_data(text: &str) -> Option<PersonalData> {
    let lowered = text.to_lowercase();
    let email = EMAIL.find(text).map(|m| m.as_str().to_owned());
    let phone = PHONE.find(text).map(|m| m.as_str().to_owned());
    let document = DOCUMENT.find(text).map(|m| m.as_str().to_owned());

    let signals = [email.is_some(), phone.is_some(), document.is_some() || lowered.contains("dni")];
    if signals.iter().filter(|present| **present).count() < 2 {
        return None;
    }

    let names = text
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| {
            word.chars().count() > 2
                && word.chars().next().is_some_and(char::is_uppercase)
                && word.chars().all(char::is_alphabetic)
                && !NAME_STOPWORDS.contains(&word.to_lowercase().as_str())
        })
        .collect::<Vec<_>>();

    let gender = if lowered.contains("femenino") || lowered.contains(" f ") {
        Gender::Female
    } else {
        Gender::Male
    };

    match (names.as_slice(), document, email) {
        ([first_name, first_surname, rest @ ..], Some(document_number), Some(email)) => {
            Some(PersonalData {
                first_name: (*first_name).to_owned(),
                first_surname: (*first_surname).to_owned(),
                second_surname: rest.first().map(|surname| (*surname).to_owned()),
                document_number,
                gender,
                email,
                phone: phone.unwrap_or_default(),
                ..PersonalData::default()
            })
        }
        _ => None,
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

pub(crate) fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}
