use once_cell::sync::Lazy;
use regex::Regex;

const GUEST_HANDOFF_KEYWORDS: &[&str] = &[
    "queja",
    "problema",
    "insatisfecho",
    "gerente",
    "supervisor",
    "hablar con alguien",
    "hablar con persona",
    "no entiendo",
    "emergencia",
    "urgente",
    "reclamo",
    "molesto",
];

const ASSISTANT_DEFERRAL_PHRASES: &[&str] = &["no puedo", "transferir", "agente humano"];

pub const FRIENDLY_TOOL_FAILURE: &str =
    "Lo siento, no pude completar esa acción. ¿Podrías verificar los datos e intentarlo de nuevo?";

static TOOL_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[USE_TOOL:.*?(?:\[END_TOOL\]|\z)").expect("valid tool span regex")
});
static RESULT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[RESULTADO DE [^\]]*\]:?|\[FIN RESULTADO\]").expect("valid result marker regex")
});
static ERROR_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ERROR\]:[^\n]*").expect("valid error fragment regex"));
static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffTrigger {
    GuestKeyword(&'static str),
    AssistantDeferral(&'static str),
}

impl HandoffTrigger {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::GuestKeyword(_) => "guest_requested_human",
            Self::AssistantDeferral(_) => "assistant_deferred",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub handoff_enabled: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { handoff_enabled: true }
    }
}

impl GuardrailPolicy {
    /// Whether this turn should be escalated to front-desk staff.
    pub fn evaluate_handoff(&self, guest_text: &str, assistant_text: &str) -> Option<HandoffTrigger> {
        if !self.handoff_enabled {
            return None;
        }

        let guest = guest_text.to_lowercase();
        if let Some(keyword) =
            GUEST_HANDOFF_KEYWORDS.iter().copied().find(|keyword| guest.contains(*keyword))
        {
            return Some(HandoffTrigger::GuestKeyword(keyword));
        }

        let assistant = assistant_text.to_lowercase();
        ASSISTANT_DEFERRAL_PHRASES
            .iter()
            .copied()
            .find(|phrase| assistant.contains(*phrase))
            .map(HandoffTrigger::AssistantDeferral)
    }

    /// Removes tool plumbing from text shown to the guest. Result bodies stay, their
    /// markers go, and raw error annotations become one friendly sentence.
    pub fn sanitize(&self, text: &str) -> String {
        let had_error = ERROR_FRAGMENT.is_match(text);
        let without_errors = ERROR_FRAGMENT.replace_all(text, "");
        let without_calls = TOOL_SPAN.replace_all(&without_errors, "");
        let without_markers = RESULT_MARKER.replace_all(&without_calls, "");

        let mut cleaned =
            EXTRA_BLANK_LINES.replace_all(without_markers.trim(), "\n\n").into_owned();
        if had_error {
            if !cleaned.is_empty() {
                cleaned.push_str("\n\n");
            }
            cleaned.push_str(FRIENDLY_TOOL_FAILURE);
        }
        cleaned
    }
}
