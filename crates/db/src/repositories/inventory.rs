use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use posada_core::domain::room::{Room, RoomId, RoomStatus, RoomType, RoomTypeId, StayRange};

use super::{RepositoryError, RoomAvailability, RoomInventory};
use crate::DbPool;

/// Rooms with an overlapping stay on a reservation that still holds inventory.
const BOOKED_ROOMS: &str = "SELECT rr.room_id
     FROM reservation_room rr
     JOIN reservation r ON r.id = rr.reservation_id
     WHERE r.status IN ('pending', 'confirmed')
       AND rr.check_in < ?
       AND rr.check_out > ?";

pub struct SqlRoomInventory {
    pool: DbPool,
}

impl SqlRoomInventory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RoomInventory for SqlRoomInventory {
    async fn room_types(&self) -> Result<Vec<RoomType>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, description, adult_capacity, child_capacity, bed_count,
                    nightly_price, active
             FROM room_type
             WHERE active = 1
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(room_type_from_row).collect()
    }

    async fn room_type(&self, id: RoomTypeId) -> Result<Option<RoomType>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, description, adult_capacity, child_capacity, bed_count,
                    nightly_price, active
             FROM room_type
             WHERE id = ? AND active = 1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(room_type_from_row).transpose()
    }

    async fn available_room_types(
        &self,
        stay: &StayRange,
    ) -> Result<Vec<RoomAvailability>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT t.id, t.title, t.description, t.adult_capacity, t.child_capacity,
                    t.bed_count, t.nightly_price, t.active, COUNT(room.id) AS free_rooms
             FROM room_type t
             JOIN room ON room.room_type_id = t.id
             WHERE t.active = 1
               AND room.status = 'available'
               AND room.id NOT IN ({BOOKED_ROOMS})
             GROUP BY t.id
             HAVING COUNT(room.id) > 0
             ORDER BY t.id ASC"
        ))
        .bind(stay.check_out.to_string())
        .bind(stay.check_in.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let free_rooms = parse_u32("free_rooms", row.try_get("free_rooms")?)?;
                Ok(RoomAvailability { room_type: room_type_from_row(row)?, free_rooms })
            })
            .collect()
    }

    async fn find_available_room(
        &self,
        room_type_id: RoomTypeId,
        stay: &StayRange,
    ) -> Result<Option<Room>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT room.id, room.room_type_id, room.number, room.status
             FROM room
             JOIN room_type t ON t.id = room.room_type_id
             WHERE room.room_type_id = ?
               AND t.active = 1
               AND room.status = 'available'
               AND room.id NOT IN ({BOOKED_ROOMS})
             ORDER BY room.id ASC
             LIMIT 1"
        ))
        .bind(room_type_id.0)
        .bind(stay.check_out.to_string())
        .bind(stay.check_in.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(room_from_row).transpose()
    }
}

pub(crate) fn room_type_from_row(row: SqliteRow) -> Result<RoomType, RepositoryError> {
    Ok(RoomType {
        id: RoomTypeId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        adult_capacity: parse_u32("adult_capacity", row.try_get("adult_capacity")?)?,
        child_capacity: parse_u32("child_capacity", row.try_get("child_capacity")?)?,
        bed_count: parse_u32("bed_count", row.try_get("bed_count")?)?,
        nightly_price: parse_decimal("nightly_price", row.try_get("nightly_price")?)?,
        active: row.try_get::<i64, _>("active")? != 0,
    })
}

pub(crate) fn room_from_row(row: SqliteRow) -> Result<Room, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = RoomStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown room status `{status_raw}`")))?;

    Ok(Room {
        id: RoomId(row.try_get("id")?),
        room_type_id: RoomTypeId(row.try_get("room_type_id")?),
        number: row.try_get("number")?,
        status,
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim()).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use posada_core::domain::room::{RoomId, RoomTypeId, StayRange};

    use super::SqlRoomInventory;
    use crate::fixtures::DemoHotelSeed;
    use crate::migrations;
    use crate::repositories::RoomInventory;
    use crate::{connect_with_settings, DbPool};

    fn stay(from: u32, to: u32) -> StayRange {
        StayRange::new(
            NaiveDate::from_ymd_opt(2025, 12, from).expect("date"),
            NaiveDate::from_ymd_opt(2025, 12, to).expect("date"),
        )
    }

    #[tokio::test]
    async fn lists_only_active_room_types() {
        let pool = setup_pool().await;
        let inventory = SqlRoomInventory::new(pool.clone());

        let types = inventory.room_types().await.expect("room types");
        assert_eq!(types.len(), 6);
        assert!(types.iter().all(|room_type| room_type.active));

        let doble = inventory.room_type(RoomTypeId(5)).await.expect("lookup").expect("present");
        assert_eq!(doble.title, "Doble");
        assert_eq!(doble.nightly_price, Decimal::new(9_000, 2));
        assert!(
            inventory.room_type(RoomTypeId(7)).await.expect("lookup").is_none(),
            "retired type is not quoted"
        );

        pool.close().await;
    }

    #[tokio::test]
    async fn every_active_type_is_available_without_bookings() {
        let pool = setup_pool().await;
        let inventory = SqlRoomInventory::new(pool.clone());

        let available = inventory.available_room_types(&stay(10, 15)).await.expect("availability");
        assert_eq!(available.len(), 6);
        let suite = available
            .iter()
            .find(|entry| entry.room_type.id == RoomTypeId(6))
            .expect("suite listed");
        assert_eq!(suite.free_rooms, 1, "room under maintenance is not offered");

        pool.close().await;
    }

    #[tokio::test]
    async fn overlapping_live_reservation_blocks_the_room() {
        let pool = setup_pool().await;
        let inventory = SqlRoomInventory::new(pool.clone());
        book_room(&pool, 6, "2025-12-12", "2025-12-14", "confirmed").await;

        let available = inventory.available_room_types(&stay(10, 15)).await.expect("availability");
        assert!(available.iter().all(|entry| entry.room_type.id != RoomTypeId(4)));
        assert_eq!(
            inventory.find_available_room(RoomTypeId(4), &stay(10, 15)).await.expect("find"),
            None
        );

        let after = inventory.find_available_room(RoomTypeId(4), &stay(14, 16)).await.expect("find");
        assert_eq!(after.map(|room| room.id), Some(RoomId(6)), "check-out day is free again");

        pool.close().await;
    }

    #[tokio::test]
    async fn cancelled_reservation_releases_the_room() {
        let pool = setup_pool().await;
        let inventory = SqlRoomInventory::new(pool.clone());
        book_room(&pool, 6, "2025-12-12", "2025-12-14", "cancelled").await;

        let room = inventory.find_available_room(RoomTypeId(4), &stay(10, 15)).await.expect("find");
        assert_eq!(room.map(|room| room.id), Some(RoomId(6)));

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoHotelSeed::load(&pool).await.expect("seed demo hotel");
        pool
    }

    async fn book_room(pool: &DbPool, room_id: i64, check_in: &str, check_out: &str, status: &str) {
        sqlx::query(
            "INSERT INTO person (id, first_name, first_surname, document_number, email, created_at)
             VALUES (1, 'Ana', 'Quispe', '45678912', 'ana@example.com', '2025-11-01T00:00:00Z')",
        )
        .execute(pool)
        .await
        .expect("insert person");
        sqlx::query("INSERT INTO client (id, person_id, created_at) VALUES (1, 1, '2025-11-01T00:00:00Z')")
            .execute(pool)
            .await
            .expect("insert client");
        sqlx::query(
            "INSERT INTO reservation
                (id, client_id, adults, children, status, subtotal, discount, confirmed_at, created_at)
             VALUES (1, 1, 2, 0, ?, '300.00', '0', '2025-11-01T00:00:00Z', '2025-11-01T00:00:00Z')",
        )
        .bind(status)
        .execute(pool)
        .await
        .expect("insert reservation");
        sqlx::query(
            "INSERT INTO reservation_room (reservation_id, room_id, check_in, check_out, nightly_price)
             VALUES (1, ?, ?, ?, '150.00')",
        )
        .bind(room_id)
        .bind(check_in)
        .bind(check_out)
        .execute(pool)
        .await
        .expect("insert reservation room");
    }
}
