use std::collections::HashMap;

use tokio::sync::RwLock;

use posada_core::domain::booking::{
    AccountId, GuestId, NewReservation, Reservation, ReservationId, ReservationRoom,
    ReservationStatus,
};
use posada_core::domain::conversation::{ConversationHistory, ConversationId, MessageLogEntry};
use posada_core::domain::room::{Room, RoomStatus, RoomType, RoomTypeId, StayRange};
use rust_decimal::Decimal;

use super::{
    BookingLedger, ConversationStore, RepositoryError, RoomAvailability, RoomInventory,
};

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, ConversationHistory>>,
    message_log: RwLock<Vec<MessageLogEntry>>,
}

impl InMemoryConversationStore {
    pub async fn message_log(&self) -> Vec<MessageLogEntry> {
        self.message_log.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationHistory>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn update(&self, conversation: &ConversationHistory) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        match conversations.get_mut(&conversation.id.0) {
            Some(existing) => {
                *existing = conversation.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("conversation `{}`", conversation.id))),
        }
    }

    async fn append_message_log(&self, entry: MessageLogEntry) -> Result<(), RepositoryError> {
        self.message_log.write().await.push(entry);
        Ok(())
    }

    async fn list_for_client(
        &self,
        client_id: i64,
    ) -> Result<Vec<ConversationHistory>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let mut listed = conversations
            .values()
            .filter(|conversation| conversation.client_id == Some(client_id))
            .cloned()
            .collect::<Vec<_>>();
        listed.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        Ok(listed)
    }
}

/// Inventory and ledger over plain collections, with the same availability rules as SQL.
#[derive(Default)]
pub struct InMemoryHotel {
    room_types: RwLock<Vec<RoomType>>,
    rooms: RwLock<Vec<Room>>,
    ledger: RwLock<Ledger>,
}

#[derive(Default)]
struct Ledger {
    guests: HashMap<String, GuestId>,
    accounts: HashMap<GuestId, AccountId>,
    reservations: Vec<Reservation>,
}

impl InMemoryHotel {
    pub fn new(room_types: Vec<RoomType>, rooms: Vec<Room>) -> Self {
        Self {
            room_types: RwLock::new(room_types),
            rooms: RwLock::new(rooms),
            ledger: RwLock::new(Ledger::default()),
        }
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.ledger.read().await.reservations.clone()
    }

    /// Inserts a reservation as-is, bypassing guest resolution.
    pub async fn insert_reservation(&self, reservation: Reservation) {
        self.ledger.write().await.reservations.push(reservation);
    }

    async fn free_rooms(&self, room_type_id: RoomTypeId, stay: &StayRange) -> Vec<Room> {
        let rooms = self.rooms.read().await;
        let ledger = self.ledger.read().await;
        rooms
            .iter()
            .filter(|room| room.room_type_id == room_type_id && room.status == RoomStatus::Available)
            .filter(|room| !ledger.is_booked(room, stay))
            .cloned()
            .collect()
    }
}

impl Ledger {
    fn is_booked(&self, room: &Room, stay: &StayRange) -> bool {
        self.reservations
            .iter()
            .filter(|reservation| reservation.status.holds_inventory())
            .flat_map(|reservation| reservation.rooms.iter())
            .any(|booked| booked.room_id == room.id && booked.stay().overlaps(stay))
    }
}

#[async_trait::async_trait]
impl RoomInventory for InMemoryHotel {
    async fn room_types(&self) -> Result<Vec<RoomType>, RepositoryError> {
        let mut active = self
            .room_types
            .read()
            .await
            .iter()
            .filter(|room_type| room_type.active)
            .cloned()
            .collect::<Vec<_>>();
        active.sort_by_key(|room_type| room_type.id);
        Ok(active)
    }

    async fn room_type(&self, id: RoomTypeId) -> Result<Option<RoomType>, RepositoryError> {
        let room_types = self.room_types.read().await;
        Ok(room_types.iter().find(|room_type| room_type.id == id && room_type.active).cloned())
    }

    async fn available_room_types(
        &self,
        stay: &StayRange,
    ) -> Result<Vec<RoomAvailability>, RepositoryError> {
        let mut available = Vec::new();
        for room_type in self.room_types().await? {
            let free_rooms = self.free_rooms(room_type.id, stay).await.len();
            if free_rooms > 0 {
                available.push(RoomAvailability {
                    room_type,
                    free_rooms: u32::try_from(free_rooms).unwrap_or(u32::MAX),
                });
            }
        }
        Ok(available)
    }

    async fn find_available_room(
        &self,
        room_type_id: RoomTypeId,
        stay: &StayRange,
    ) -> Result<Option<Room>, RepositoryError> {
        if self.room_type(room_type_id).await?.is_none() {
            return Ok(None);
        }
        let mut free = self.free_rooms(room_type_id, stay).await;
        free.sort_by_key(|room| room.id);
        Ok(free.into_iter().next())
    }
}

#[async_trait::async_trait]
impl BookingLedger for InMemoryHotel {
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<Reservation, RepositoryError> {
        let rooms = self.rooms.read().await;
        let room = rooms
            .iter()
            .find(|room| room.id == request.room_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("room {}", request.room_id.0)))?;

        let mut ledger = self.ledger.write().await;
        if ledger.is_booked(room, &request.stay) {
            return Err(RepositoryError::Conflict(format!(
                "room {} is already booked between {} and {}",
                request.room_id.0, request.stay.check_in, request.stay.check_out
            )));
        }

        let next_guest = GuestId(next_id(ledger.guests.len()));
        let guest_id =
            *ledger.guests.entry(request.guest.document_number.clone()).or_insert(next_guest);
        let next_account = AccountId(next_id(ledger.accounts.len()));
        let account_id = *ledger.accounts.entry(guest_id).or_insert(next_account);

        let reservation = Reservation {
            id: ReservationId(next_id(ledger.reservations.len())),
            account_id,
            guest_id,
            adults: request.adults,
            children: request.children,
            status: ReservationStatus::Pending,
            subtotal: request.subtotal,
            discount: Decimal::ZERO,
            confirmed_at: request.requested_at,
            rooms: vec![ReservationRoom {
                room_id: request.room_id,
                check_in: request.stay.check_in,
                check_out: request.stay.check_out,
                nightly_price: request.nightly_price,
            }],
        };
        ledger.reservations.push(reservation.clone());
        Ok(reservation)
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX - 1) + 1
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use posada_core::domain::booking::{NewReservation, PersonalData};
    use posada_core::domain::conversation::{ChatMessage, ConversationHistory};
    use posada_core::domain::room::{Room, RoomId, RoomStatus, RoomType, RoomTypeId, StayRange};

    use crate::repositories::{
        BookingLedger, ConversationStore, InMemoryConversationStore, InMemoryHotel,
        RepositoryError, RoomInventory,
    };

    fn room_type(id: i64, price: i64) -> RoomType {
        RoomType {
            id: RoomTypeId(id),
            title: format!("Tipo {id}"),
            description: String::new(),
            adult_capacity: 2,
            child_capacity: 1,
            bed_count: 1,
            nightly_price: Decimal::new(price, 0),
            active: true,
        }
    }

    fn room(id: i64, room_type_id: i64, status: RoomStatus) -> Room {
        Room { id: RoomId(id), room_type_id: RoomTypeId(room_type_id), number: format!("{id}0"), status }
    }

    fn stay(from: u32, to: u32) -> StayRange {
        StayRange::new(
            NaiveDate::from_ymd_opt(2025, 12, from).expect("date"),
            NaiveDate::from_ymd_opt(2025, 12, to).expect("date"),
        )
    }

    #[tokio::test]
    async fn in_memory_store_requires_save_before_update() {
        let store = InMemoryConversationStore::default();
        let mut conversation = ConversationHistory::start(Some(3), Utc::now());

        let error = store.update(&conversation).await.expect_err("not saved yet");
        assert!(matches!(error, RepositoryError::NotFound(_)));

        store.save(&conversation).await.expect("save");
        conversation.push(ChatMessage::user("hola"), Utc::now());
        store.update(&conversation).await.expect("update");

        let found = store.get(&conversation.id).await.expect("get").expect("present");
        assert_eq!(found.messages.len(), 1);
        assert_eq!(store.list_for_client(3).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn inactive_types_are_not_looked_up() {
        let retired = RoomType { active: false, ..room_type(7, 350) };
        let hotel = InMemoryHotel::new(
            vec![room_type(1, 100), retired],
            vec![room(1, 1, RoomStatus::Available), room(7, 7, RoomStatus::Available)],
        );

        assert!(hotel.room_type(RoomTypeId(1)).await.expect("lookup").is_some());
        assert!(hotel.room_type(RoomTypeId(7)).await.expect("lookup").is_none());
        assert!(hotel.find_available_room(RoomTypeId(7), &stay(10, 12)).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn in_memory_hotel_matches_sql_availability_rules() {
        let hotel = InMemoryHotel::new(
            vec![room_type(1, 100), room_type(2, 200)],
            vec![room(1, 1, RoomStatus::Available), room(2, 2, RoomStatus::Maintenance)],
        );

        let available = hotel.available_room_types(&stay(10, 12)).await.expect("availability");
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].room_type.id, RoomTypeId(1));

        let request = NewReservation {
            guest: PersonalData { document_number: "12345678".to_owned(), ..PersonalData::default() },
            adults: 1,
            children: 0,
            room_id: RoomId(1),
            room_type_id: RoomTypeId(1),
            stay: stay(10, 12),
            nightly_price: Decimal::new(100, 0),
            subtotal: Decimal::new(200, 0),
            requested_at: Utc::now(),
        };
        hotel.create_reservation(request.clone()).await.expect("book");

        assert!(hotel.available_room_types(&stay(11, 13)).await.expect("availability").is_empty());
        assert!(hotel.find_available_room(RoomTypeId(1), &stay(12, 13)).await.expect("find").is_some());
        assert!(matches!(
            hotel.create_reservation(request).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
