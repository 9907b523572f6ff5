use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};

use posada_core::domain::booking::{
    AccountId, GuestId, NewReservation, PersonalData, Reservation, ReservationId,
    ReservationRoom, ReservationStatus,
};

use super::{BookingLedger, RepositoryError};
use crate::DbPool;

pub struct SqlBookingLedger {
    pool: DbPool,
}

impl SqlBookingLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BookingLedger for SqlBookingLedger {
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<Reservation, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let created_at = request.requested_at.to_rfc3339();

        let guest_id = find_or_create_guest(&mut tx, &request.guest, &created_at).await?;
        let account_id = find_or_create_account(&mut tx, guest_id, &created_at).await?;

        let overlapping: i64 = sqlx::query_scalar(
            "SELECT COUNT(1)
             FROM reservation_room rr
             JOIN reservation r ON r.id = rr.reservation_id
             WHERE rr.room_id = ?
               AND r.status IN ('pending', 'confirmed')
               AND rr.check_in < ?
               AND rr.check_out > ?",
        )
        .bind(request.room_id.0)
        .bind(request.stay.check_out.to_string())
        .bind(request.stay.check_in.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if overlapping > 0 {
            return Err(RepositoryError::Conflict(format!(
                "room {} is already booked between {} and {}",
                request.room_id.0, request.stay.check_in, request.stay.check_out
            )));
        }

        let status = ReservationStatus::Pending;
        let discount = Decimal::ZERO;
        let reservation_id = sqlx::query(
            "INSERT INTO reservation (
                client_id,
                adults,
                children,
                status,
                subtotal,
                discount,
                confirmed_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account_id.0)
        .bind(i64::from(request.adults))
        .bind(i64::from(request.children))
        .bind(status.as_str())
        .bind(request.subtotal.to_string())
        .bind(discount.to_string())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO reservation_room (reservation_id, room_id, check_in, check_out, nightly_price)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(reservation_id)
        .bind(request.room_id.0)
        .bind(request.stay.check_in.to_string())
        .bind(request.stay.check_out.to_string())
        .bind(request.nightly_price.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Reservation {
            id: ReservationId(reservation_id),
            account_id,
            guest_id,
            adults: request.adults,
            children: request.children,
            status,
            subtotal: request.subtotal,
            discount,
            confirmed_at: request.requested_at,
            rooms: vec![ReservationRoom {
                room_id: request.room_id,
                check_in: request.stay.check_in,
                check_out: request.stay.check_out,
                nightly_price: request.nightly_price,
            }],
        })
    }
}

async fn find_or_create_guest(
    tx: &mut Transaction<'_, Sqlite>,
    guest: &PersonalData,
    created_at: &str,
) -> Result<GuestId, RepositoryError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM person WHERE document_number = ?")
        .bind(&guest.document_number)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(GuestId(id));
    }

    let id = sqlx::query(
        "INSERT INTO person (
            first_name,
            first_surname,
            second_surname,
            document_number,
            gender,
            email,
            phone,
            secondary_phone,
            city,
            country,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&guest.first_name)
    .bind(&guest.first_surname)
    .bind(guest.second_surname.as_deref())
    .bind(&guest.document_number)
    .bind(guest.gender.as_str())
    .bind(&guest.email)
    .bind(&guest.phone)
    .bind(guest.secondary_phone.as_deref())
    .bind(guest.city.as_deref())
    .bind(guest.country.as_deref())
    .bind(created_at)
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    Ok(GuestId(id))
}

async fn find_or_create_account(
    tx: &mut Transaction<'_, Sqlite>,
    guest_id: GuestId,
    created_at: &str,
) -> Result<AccountId, RepositoryError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM client WHERE person_id = ?")
        .bind(guest_id.0)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(AccountId(id));
    }

    let id = sqlx::query("INSERT INTO client (person_id, created_at) VALUES (?, ?)")
        .bind(guest_id.0)
        .bind(created_at)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

    Ok(AccountId(id))
}
