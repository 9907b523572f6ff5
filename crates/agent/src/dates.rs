use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use posada_core::domain::room::StayRange;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("invalid date literal `{0}`")]
    InvalidLiteral(String),
}

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex"));
static DAY_FIRST_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").expect("valid day-first date regex")
});
static RANGE_WITH_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"del\s+(\d{1,2})\s+al\s+(\d{1,2})\s+de\s+(\p{L}+)").expect("valid month range regex")
});
static DESDE_HASTA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"desde\s+(?:el\s+)?(\d{1,2})/(\d{1,2})\s+hasta\s+(?:el\s+)?(\d{1,2})/(\d{1,2})")
        .expect("valid desde/hasta regex")
});
static NIGHTS_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+noches?\s+desde\s+(.+)").expect("valid nights regex"));
static BARE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"del\s+(\d{1,2})\s+al\s+(\d{1,2})").expect("valid bare range regex"));
static IN_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"en\s+(\d+)\s+d[íi]as?").expect("valid in-days regex"));
static IN_WEEKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:dentro de|en)\s+(\d+)\s+semanas?").expect("valid in-weeks regex")
});

const MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miércoles", Weekday::Wed),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sábado", Weekday::Sat),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

/// Spanish date expressions relative to a given "today".
#[derive(Clone, Copy, Debug, Default)]
pub struct DateParser;

impl DateParser {
    /// Finds a check-in/check-out pair. Pairs that do not end after they start are dropped
    /// and the next pattern is tried.
    pub fn extract_range(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<Option<StayRange>, DateParseError> {
        let lowered = text.to_lowercase();

        let iso = iso_dates(&lowered)?;
        if let [check_in, check_out, ..] = iso.as_slice() {
            if let Some(stay) = ordered(*check_in, *check_out) {
                return Ok(Some(stay));
            }
        }

        let day_first = DAY_FIRST_DATE
            .captures_iter(&lowered)
            .filter_map(|caps| {
                ymd(number(&caps, 3)?, number(&caps, 2)?, number(&caps, 1)?)
            })
            .collect::<Vec<_>>();
        if let [check_in, check_out, ..] = day_first.as_slice() {
            if let Some(stay) = ordered(*check_in, *check_out) {
                return Ok(Some(stay));
            }
        }

        let candidates = [
            range_with_month(&lowered, today),
            desde_hasta(&lowered, today),
            self.nights_from(&lowered, today),
            bare_range(&lowered, today),
        ];
        Ok(candidates.into_iter().flatten().next())
    }

    /// Resolves a single date: numeric literals first, then relative expressions.
    pub fn parse_natural(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        let input = text.trim().to_lowercase();

        if let Some(caps) = ISO_DATE.captures(&input) {
            if let Some(date) = ymd(number(&caps, 1)?, number(&caps, 2)?, number(&caps, 3)?) {
                return Some(date);
            }
        }
        if let Some(caps) = DAY_FIRST_DATE.captures(&input) {
            if let Some(date) = ymd(number(&caps, 3)?, number(&caps, 2)?, number(&caps, 1)?) {
                return Some(date);
            }
        }

        if input.contains("pasado mañana") || input.contains("pasado manana") {
            return today.checked_add_days(Days::new(2));
        }
        if contains_word(&input, "hoy") {
            return Some(today);
        }
        if input.contains("mañana") || input.contains("manana") {
            return today.checked_add_days(Days::new(1));
        }
        if ["próxima semana", "proxima semana", "siguiente semana", "la semana que viene"]
            .iter()
            .any(|phrase| input.contains(phrase))
        {
            let week_later = today.checked_add_days(Days::new(7))?;
            return Some(on_or_after(week_later, Weekday::Mon));
        }
        if ["próximo mes", "proximo mes", "siguiente mes", "mes que viene"]
            .iter()
            .any(|phrase| input.contains(phrase))
        {
            return today.with_day(1)?.checked_add_months(Months::new(1));
        }
        if input.contains("fin de semana") {
            return Some(on_or_after(today, Weekday::Sat));
        }
        if let Some(caps) = IN_DAYS.captures(&input) {
            return today.checked_add_days(Days::new(number(&caps, 1)?.into()));
        }
        if let Some(caps) = IN_WEEKS.captures(&input) {
            let weeks = u64::from(number(&caps, 1)?);
            return today.checked_add_days(Days::new(weeks.checked_mul(7)?));
        }

        WEEKDAYS.iter().find(|(name, _)| contains_word(&input, name)).and_then(|(_, weekday)| {
            today.checked_add_days(Days::new(1)).map(|tomorrow| on_or_after(tomorrow, *weekday))
        })
    }

    fn nights_from(&self, text: &str, today: NaiveDate) -> Option<StayRange> {
        let caps = NIGHTS_FROM.captures(text)?;
        let nights = number(&caps, 1)?;
        if nights == 0 {
            return None;
        }
        let check_in = self.parse_natural(caps.get(2)?.as_str(), today)?;
        let check_out = check_in.checked_add_days(Days::new(nights.into()))?;
        ordered(check_in, check_out)
    }
}

fn iso_dates(text: &str) -> Result<Vec<NaiveDate>, DateParseError> {
    ISO_DATE
        .captures_iter(text)
        .map(|caps| {
            let literal = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let invalid = || DateParseError::InvalidLiteral(literal.to_owned());
            let year = number(&caps, 1).ok_or_else(invalid)?;
            let month = number(&caps, 2).ok_or_else(invalid)?;
            let day = number(&caps, 3).ok_or_else(invalid)?;
            ymd(year, month, day).ok_or_else(invalid)
        })
        .collect()
}

fn range_with_month(text: &str, today: NaiveDate) -> Option<StayRange> {
    let caps = RANGE_WITH_MONTH.captures(text)?;
    let month = month_number(caps.get(3)?.as_str())?;
    let mut year = u32::try_from(today.year()).ok()?;
    if month < today.month() {
        year += 1;
    }
    ordered(ymd(year, month, number(&caps, 1)?)?, ymd(year, month, number(&caps, 2)?)?)
}

fn desde_hasta(text: &str, today: NaiveDate) -> Option<StayRange> {
    let caps = DESDE_HASTA.captures(text)?;
    let (start_day, start_month) = (number(&caps, 1)?, number(&caps, 2)?);
    let (end_day, end_month) = (number(&caps, 3)?, number(&caps, 4)?);

    let mut start_year = u32::try_from(today.year()).ok()?;
    if start_month < today.month() {
        start_year += 1;
    }
    let end_year = if end_month < start_month { start_year + 1 } else { start_year };
    ordered(ymd(start_year, start_month, start_day)?, ymd(end_year, end_month, end_day)?)
}

fn bare_range(text: &str, today: NaiveDate) -> Option<StayRange> {
    let caps = BARE_RANGE.captures(text)?;
    let start_day = number(&caps, 1)?;
    let end_day = number(&caps, 2)?;

    let mut base = today.with_day(1)?;
    if start_day < today.day() {
        base = base.checked_add_months(Months::new(1))?;
    }
    ordered(base.with_day(start_day)?, base.with_day(end_day)?)
}

fn ordered(check_in: NaiveDate, check_out: NaiveDate) -> Option<StayRange> {
    StayRange::ordered(check_in, check_out).ok()
}

fn on_or_after(mut date: NaiveDate, weekday: Weekday) -> NaiveDate {
    while date.weekday() != weekday {
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    date
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS.iter().find(|(month, _)| *month == name).map(|(_, number)| *number)
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

pub(crate) fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
