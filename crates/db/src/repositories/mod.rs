use async_trait::async_trait;
use thiserror::Error;

use posada_core::domain::booking::{NewReservation, Reservation};
use posada_core::domain::conversation::{ConversationHistory, ConversationId, MessageLogEntry};
use posada_core::domain::room::{Room, RoomType, RoomTypeId, StayRange};

pub mod booking;
pub mod conversation;
pub mod inventory;
pub mod memory;

pub use booking::SqlBookingLedger;
pub use conversation::SqlConversationStore;
pub use inventory::SqlRoomInventory;
pub use memory::{InMemoryConversationStore, InMemoryHotel};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// A room type together with how many of its rooms are free for a stay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomAvailability {
    pub room_type: RoomType,
    pub free_rooms: u32,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError>;
    async fn get(&self, id: &ConversationId)
        -> Result<Option<ConversationHistory>, RepositoryError>;
    async fn update(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError>;
    async fn append_message_log(&self, entry: MessageLogEntry) -> Result<(), RepositoryError>;
    /// Most recently updated first.
    async fn list_for_client(
        &self,
        client_id: i64,
    ) -> Result<Vec<ConversationHistory>, RepositoryError>;
}

#[async_trait]
pub trait RoomInventory: Send + Sync {
    /// Active room types ordered by id.
    async fn room_types(&self) -> Result<Vec<RoomType>, RepositoryError>;
    /// `None` for unknown and inactive types.
    async fn room_type(&self, id: RoomTypeId) -> Result<Option<RoomType>, RepositoryError>;
    /// Active room types with at least one room free for the whole stay.
    async fn available_room_types(
        &self,
        stay: &StayRange,
    ) -> Result<Vec<RoomAvailability>, RepositoryError>;
    async fn find_available_room(
        &self,
        room_type_id: RoomTypeId,
        stay: &StayRange,
    ) -> Result<Option<Room>, RepositoryError>;
}

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Resolves the guest by document number, then its account, then books the room.
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<Reservation, RepositoryError>;
}
