use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::PersonalData;
use crate::domain::room::{RoomTypeId, StayRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    Dates,
    Guests,
    RoomType,
    PersonalData,
    Confirmation,
}

impl BookingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dates => "dates",
            Self::Guests => "guests",
            Self::RoomType => "room_type",
            Self::PersonalData => "personal_data",
            Self::Confirmation => "confirmation",
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Dates => Some(Self::Guests),
            Self::Guests => Some(Self::RoomType),
            Self::RoomType => Some(Self::PersonalData),
            Self::PersonalData => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }
}

/// Partially collected reservation carried on a conversation between turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInProgress {
    pub step: BookingStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type_id: Option<RoomTypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_data: Option<PersonalData>,
}

impl ReservationInProgress {
    pub fn started() -> Self {
        Self {
            step: BookingStep::Dates,
            check_in: None,
            check_out: None,
            adults: None,
            children: None,
            room_type_id: None,
            computed_price: None,
            personal_data: None,
        }
    }

    pub fn stay(&self) -> Option<StayRange> {
        match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) => Some(StayRange::new(check_in, check_out)),
            _ => None,
        }
    }

    /// Room type and both dates are known but nothing has been priced yet.
    pub fn needs_price(&self) -> bool {
        self.room_type_id.is_some() && self.stay().is_some() && self.computed_price.is_none()
    }

    /// Field names the given step still waits on.
    pub fn missing_for(&self, step: BookingStep) -> Vec<String> {
        let mut missing = Vec::new();
        match step {
            BookingStep::Dates => {
                if self.check_in.is_none() {
                    missing.push("check_in".to_owned());
                }
                if self.check_out.is_none() {
                    missing.push("check_out".to_owned());
                }
            }
            BookingStep::Guests => {
                if self.adults.is_none() {
                    missing.push("adults".to_owned());
                }
            }
            BookingStep::RoomType => {
                if self.room_type_id.is_none() {
                    missing.push("room_type_id".to_owned());
                }
            }
            BookingStep::PersonalData => {
                if self.personal_data.is_none() {
                    missing.push("personal_data".to_owned());
                }
            }
            BookingStep::Confirmation => {}
        }
        missing
    }
}

/// Fields one utterance supplied. Absent fields leave the reservation untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationPatch {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub adults: Option<u32>,
    pub children: Option<u32>,
    pub room_type_id: Option<RoomTypeId>,
    pub computed_price: Option<Decimal>,
    pub personal_data: Option<PersonalData>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnSignals {
    pub booking_intent: bool,
    pub cancel_intent: bool,
    pub patch: ReservationPatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTransition {
    pub from: BookingStep,
    pub to: BookingStep,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingUpdate {
    pub reservation: Option<ReservationInProgress>,
    pub transitions: Vec<StepTransition>,
    pub started: bool,
    pub cancelled: bool,
}
