use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Source of "now" for date parsing and booking validation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn offset(&self) -> FixedOffset;

    /// Calendar day at the hotel.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Falls back to UTC when the offset is out of range.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        Self { offset: offset_from_minutes(minutes) }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now, offset: Utc.fix() }
    }

    /// Clock pinned to noon UTC on the given day.
    pub fn on(day: NaiveDate) -> Self {
        let now = day.and_hms_opt(12, 0, 0).map(|naive| naive.and_utc()).unwrap_or_else(Utc::now);
        Self::new(now)
    }

    pub fn with_offset_minutes(mut self, minutes: i32) -> Self {
        self.offset = offset_from_minutes(minutes);
        self
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}
