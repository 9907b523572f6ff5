pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod pricing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::booking::{
    AccountId, Gender, GuestId, NewReservation, PersonalData, Reservation, ReservationId,
    ReservationRoom, ReservationStatus,
};
pub use domain::conversation::{
    ChatMessage, ChatRole, ConversationHistory, ConversationId, MessageLogEntry,
};
pub use domain::room::{Room, RoomId, RoomStatus, RoomType, RoomTypeId, StayRange};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{BookingFlow, BookingStep, ReservationInProgress, ReservationPatch, TurnSignals};
pub use pricing::{format_soles, quote_stay, StayQuote};
