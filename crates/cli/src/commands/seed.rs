use carebook_db::{DemoClinicDataset, SeedResult};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let outcome = with_migrated_pool("seed", |pool| async move {
        let seeded = DemoClinicDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoClinicDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_failure_message(&failed), 6u8));
        }

        Ok(seeded)
    });

    match outcome {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err(failure) => failure,
    }
}

fn summary(seeded: &SeedResult) -> String {
    let doctors = seeded
        .doctors_seeded
        .iter()
        .map(|doctor| format!("  - {}: {}", doctor.doctor_id, doctor.name))
        .collect::<Vec<_>>();
    format!(
        "demo clinic loaded with {} doctors and patient `{}`:\n{}",
        doctors.len(),
        seeded.patient_id,
        doctors.join("\n")
    )
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_failure_message(&["doc-patel", "pat-demo"]),
            "Seed verification failed for checks: doc-patel, pat-demo"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "Some seed data failed to load");
    }
}
