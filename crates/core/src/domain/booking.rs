use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::room::{RoomId, RoomTypeId, StayRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "M", alias = "m")]
    Male,
    #[serde(rename = "F", alias = "f")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Self::Male),
            "F" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Guest identity collected during a chat booking. Keys follow the booking wire format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    #[serde(rename = "nombre", alias = "firstName")]
    pub first_name: String,
    #[serde(rename = "primerApellido", alias = "firstSurname")]
    pub first_surname: String,
    #[serde(
        rename = "segundoApellido",
        alias = "secondSurname",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub second_surname: Option<String>,
    #[serde(rename = "numeroDocumento", alias = "documentNumber")]
    pub document_number: String,
    #[serde(rename = "genero", alias = "gender", default)]
    pub gender: Gender,
    #[serde(rename = "correo", alias = "email")]
    pub email: String,
    #[serde(rename = "telefono1", alias = "phone", default)]
    pub phone: String,
    #[serde(rename = "telefono2", alias = "secondaryPhone", default, skip_serializing_if = "Option::is_none")]
    pub secondary_phone: Option<String>,
    #[serde(rename = "ciudadReferencia", alias = "city", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "paisReferencia", alias = "country", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl PersonalData {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.first_surname)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Guest-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Confirmed => "Confirmada",
            Self::Cancelled => "Cancelada",
            Self::Completed => "Completada",
        }
    }

    /// Whether a reservation in this status still holds its rooms.
    pub fn holds_inventory(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRoom {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nightly_price: Decimal,
}

impl ReservationRoom {
    pub fn stay(&self) -> StayRange {
        StayRange::new(self.check_in, self.check_out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub account_id: AccountId,
    pub guest_id: GuestId,
    pub adults: u32,
    pub children: u32,
    pub status: ReservationStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub confirmed_at: DateTime<Utc>,
    pub rooms: Vec<ReservationRoom>,
}

/// Write-side request for the booking ledger: one concrete room for one stay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    pub guest: PersonalData,
    pub adults: u32,
    pub children: u32,
    pub room_id: RoomId,
    pub room_type_id: RoomTypeId,
    pub stay: StayRange,
    pub nightly_price: Decimal,
    pub subtotal: Decimal,
    pub requested_at: DateTime<Utc>,
}
