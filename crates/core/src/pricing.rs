use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::room::{RoomType, StayRange};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayQuote {
    pub nightly_price: Decimal,
    pub nights: u32,
    pub total: Decimal,
}

/// Nightly rate times nights, with the one-night minimum from [`StayRange::nights`].
pub fn quote_stay(room_type: &RoomType, stay: &StayRange) -> StayQuote {
    let nights = stay.nights();
    StayQuote {
        nightly_price: room_type.nightly_price,
        nights,
        total: room_type.nightly_price * Decimal::from(nights),
    }
}

/// Soles amount as shown to guests, e.g. `S/450.00`.
pub fn format_soles(amount: Decimal) -> String {
    format!("S/{:.2}", amount.round_dp(2))
}
