use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Room types the demo hotel ships with: (id, title, nightly price).
const DEMO_ROOM_TYPES: &[(i64, &str, &str)] = &[
    (1, "Individual", "60.00"),
    (2, "Matrimonial", "80.00"),
    (3, "Triple", "120.00"),
    (4, "Familiar", "150.00"),
    (5, "Doble", "90.00"),
    (6, "Suite", "180.00"),
];

const DEMO_ROOM_COUNT: i64 = 11;

/// Deterministic inventory for local runs and tests.
pub struct DemoHotelSeed;

impl DemoHotelSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_hotel.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            room_types: DEMO_ROOM_TYPES.iter().map(|(_, title, _)| *title).collect(),
            rooms: DEMO_ROOM_COUNT,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (id, title, price) in DEMO_ROOM_TYPES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM room_type
                    WHERE id = ?1 AND title = ?2 AND nightly_price = ?3 AND active = 1
                 )",
            )
            .bind(id)
            .bind(title)
            .bind(price)
            .fetch_one(pool)
            .await?;
            checks.push((*title, present == 1));
        }

        let rooms: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM room WHERE id <= ?1")
            .bind(DEMO_ROOM_COUNT)
            .fetch_one(pool)
            .await?;
        checks.push(("rooms", rooms == DEMO_ROOM_COUNT));

        let inactive: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM room_type WHERE id = 7 AND active = 0")
                .fetch_one(pool)
                .await?;
        checks.push(("inactive-type", inactive == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub room_types: Vec<&'static str>,
    pub rooms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
