use carebook_core::domain::doctor::{Doctor, DoctorId, WeeklyAvailability};
use carebook_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_err, parse_timestamp, DoctorRepository, RepositoryError};
use crate::DbPool;

const DOCTOR_COLUMNS: &str = "id, user_id, name, specialty, phone, bio, availability_json, \
                              consultation_minutes, created_at, updated_at";

pub struct SqlDoctorRepository {
    pool: DbPool,
}

impl SqlDoctorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DoctorRepository for SqlDoctorRepository {
    async fn find_by_id(&self, id: &DoctorId) -> Result<Option<Doctor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Doctor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE user_id = ?"))
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn find_by_name_fragment(
        &self,
        fragment: &str,
    ) -> Result<Option<Doctor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors
             WHERE instr(lower(name), lower(?)) > 0
             ORDER BY name ASC, id ASC
             LIMIT 1"
        ))
        .bind(fragment.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Doctor>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(doctor_from_row).collect()
    }

    async fn save(&self, doctor: Doctor) -> Result<(), RepositoryError> {
        let availability_json = serde_json::to_string(&doctor.availability).map_err(decode_err)?;

        sqlx::query(
            r#"
            INSERT INTO doctors (
                id, user_id, name, specialty, phone, bio, availability_json,
                consultation_minutes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                specialty = excluded.specialty,
                phone = excluded.phone,
                bio = excluded.bio,
                availability_json = excluded.availability_json,
                consultation_minutes = excluded.consultation_minutes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doctor.id.0)
        .bind(doctor.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(&doctor.name)
        .bind(&doctor.specialty)
        .bind(&doctor.phone)
        .bind(&doctor.bio)
        .bind(availability_json)
        .bind(i64::from(doctor.consultation_minutes))
        .bind(doctor.created_at.to_rfc3339())
        .bind(doctor.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn doctor_from_row(row: &SqliteRow) -> Result<Doctor, RepositoryError> {
    let availability_json: String = row.try_get("availability_json")?;
    let consultation_minutes: i64 = row.try_get("consultation_minutes")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Doctor {
        id: DoctorId(row.try_get("id")?),
        user_id: row.try_get::<Option<String>, _>("user_id")?.map(UserId),
        name: row.try_get("name")?,
        specialty: row.try_get("specialty")?,
        phone: row.try_get("phone")?,
        bio: row.try_get("bio")?,
        availability: serde_json::from_str::<WeeklyAvailability>(&availability_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid availability_json: {e}")))?,
        consultation_minutes: u32::try_from(consultation_minutes).map_err(decode_err)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc, Weekday};

    use carebook_core::domain::doctor::{Doctor, DoctorId, TimeWindow, WeeklyAvailability};

    use super::SqlDoctorRepository;
    use crate::repositories::DoctorRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn doctor(id: &str, name: &str) -> Doctor {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().expect("ts");
        let at = |h| NaiveTime::from_hms_opt(h, 0, 0).expect("time");
        Doctor {
            id: DoctorId(id.to_string()),
            user_id: None,
            name: name.to_string(),
            specialty: "General Practice".to_string(),
            phone: None,
            bio: None,
            availability: WeeklyAvailability::default()
                .with_day(Weekday::Mon, vec![TimeWindow::new(at(9), at(12))]),
            consultation_minutes: 30,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn availability_pattern_survives_round_trip() {
        let repo = SqlDoctorRepository::new(setup().await);
        let doc = doctor("doc-1", "Dr. Sarah Smith");

        repo.save(doc.clone()).await.expect("save");
        let found = repo.find_by_id(&doc.id).await.expect("find").expect("exists");

        assert_eq!(found, doc);
        assert_eq!(found.availability.windows_for(Weekday::Mon).len(), 1);
        assert!(found.availability.windows_for(Weekday::Tue).is_empty());
    }

    #[tokio::test]
    async fn name_fragment_matches_case_insensitively_first_by_name() {
        let repo = SqlDoctorRepository::new(setup().await);
        repo.save(doctor("doc-2", "Dr. Smithers")).await.expect("save");
        repo.save(doctor("doc-1", "Dr. Sarah Smith")).await.expect("save");
        repo.save(doctor("doc-3", "Dr. Ahmed Khan")).await.expect("save");

        let found = repo.find_by_name_fragment("SMITH").await.expect("find").expect("match");
        assert_eq!(found.id.0, "doc-1");

        assert!(repo.find_by_name_fragment("jones").await.expect("find").is_none());
        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Dr. Ahmed Khan");
    }
}
