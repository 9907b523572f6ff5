use posada_db::{migrations, DemoHotelSeed, SeedResult};

use crate::commands::{open_pool, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let outcome = load_and_verify(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn load_and_verify(pool: &posada_db::DbPool) -> Result<SeedResult, StepFailure> {
    migrations::run_pending(pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let seeded = DemoHotelSeed::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoHotelSeed::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        Ok(seeded)
    } else {
        Err(("seed_verification", failed_checks_message(&verification.checks), 6u8))
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "demo hotel loaded: {} rooms across room types {}",
        seeded.rooms,
        seeded.room_types.join(", ")
    )
}

fn failed_checks_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "some demo data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
