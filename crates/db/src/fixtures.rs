use chrono::Weekday;
use sqlx::Executor;

use carebook_core::domain::doctor::WeeklyAvailability;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_DOCTORS: &[SeedDoctor] = &[
    SeedDoctor {
        doctor_id: "doc-ahuja",
        user_id: "user-dr-ahuja",
        name: "Dr. Rahul Ahuja",
        specialty: "General Medicine",
        working_days: &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
    },
    SeedDoctor {
        doctor_id: "doc-sharma",
        user_id: "user-dr-sharma",
        name: "Dr. Priya Sharma",
        specialty: "Pediatrics",
        working_days: &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
    },
    SeedDoctor {
        doctor_id: "doc-patel",
        user_id: "user-dr-patel",
        name: "Dr. Amit Patel",
        specialty: "Cardiology",
        working_days: &[Weekday::Mon, Weekday::Wed, Weekday::Fri],
    },
];

const SEED_PATIENT_ID: &str = "pat-demo";
const SEED_PATIENT_USER_ID: &str = "user-demo-patient";

/// Demo clinic: three doctors with weekly patterns plus one patient account.
///
/// Loading is idempotent, so `carebook seed` can run against a live database.
pub struct DemoClinicDataset;

impl DemoClinicDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_clinic.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            doctors_seeded: SEED_DOCTORS
                .iter()
                .map(|doctor| SeededDoctor { doctor_id: doctor.doctor_id, name: doctor.name })
                .collect(),
            patient_id: SEED_PATIENT_ID,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for doctor in SEED_DOCTORS {
            let row = sqlx::query_as::<_, (String, String, Option<String>, String)>(
                "SELECT name, specialty, user_id, availability_json FROM doctors WHERE id = ?",
            )
            .bind(doctor.doctor_id)
            .fetch_optional(pool)
            .await?;

            let Some((name, specialty, user_id, availability_json)) = row else {
                checks.push((doctor.doctor_id, false));
                continue;
            };
            checks.push((
                doctor.doctor_id,
                name == doctor.name
                    && specialty == doctor.specialty
                    && user_id.as_deref() == Some(doctor.user_id),
            ));

            let availability: WeeklyAvailability = serde_json::from_str(&availability_json)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            checks.push((doctor.availability_label(), doctor.matches_working_days(&availability)));
        }

        let patient_linked: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM patients p JOIN users u ON u.id = p.user_id
                 WHERE p.id = ?1 AND u.id = ?2 AND u.role = 'patient'
             )",
        )
        .bind(SEED_PATIENT_ID)
        .bind(SEED_PATIENT_USER_ID)
        .fetch_one(pool)
        .await?;
        checks.push((SEED_PATIENT_ID, patient_linked == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedDoctor {
    doctor_id: &'static str,
    user_id: &'static str,
    name: &'static str,
    specialty: &'static str,
    working_days: &'static [Weekday],
}

impl SeedDoctor {
    fn availability_label(&self) -> &'static str {
        match self.doctor_id {
            "doc-ahuja" => "doc-ahuja-availability",
            "doc-sharma" => "doc-sharma-availability",
            _ => "doc-patel-availability",
        }
    }

    fn matches_working_days(&self, availability: &WeeklyAvailability) -> bool {
        let all_days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        all_days.iter().all(|day| {
            self.working_days.contains(day) != availability.windows_for(*day).is_empty()
        })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub doctors_seeded: Vec<SeededDoctor>,
    pub patient_id: &'static str,
}

#[derive(Debug)]
pub struct SeededDoctor {
    pub doctor_id: &'static str,
    pub name: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, NaiveTime};

    use carebook_core::domain::doctor::DoctorId;
    use carebook_core::scheduling::slots::available_slots;

    use super::*;
    use crate::repositories::{DoctorRepository, SqlDoctorRepository};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoClinicDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoClinicDataset::load(&pool).await.expect("load");
        let first_verification = DemoClinicDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.doctors_seeded.len(), 3);

        DemoClinicDataset::load(&pool).await.expect("reload");
        let second_verification = DemoClinicDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let doctors: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM doctors")
            .fetch_one(&pool)
            .await
            .expect("count doctors");
        assert_eq!(doctors, 3);
    }

    #[tokio::test]
    async fn verify_reports_missing_rows_on_empty_database() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let verification = DemoClinicDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, ok)| !ok));
    }

    #[tokio::test]
    async fn seeded_wednesday_for_general_medicine_is_morning_only() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoClinicDataset::load(&pool).await.expect("load");

        let doctor = SqlDoctorRepository::new(pool)
            .find_by_id(&DoctorId("doc-ahuja".to_string()))
            .await
            .expect("find")
            .expect("seeded doctor");
        let wednesday = NaiveDate::from_ymd_opt(2026, 3, 4).expect("date");
        let slots = available_slots(
            doctor.availability.windows_for(wednesday.weekday()),
            doctor.consultation_minutes,
            &[],
        );

        assert_eq!(slots.len(), 6);
        assert_eq!(slots.last().copied(), NaiveTime::from_hms_opt(11, 30, 0));
    }
}
