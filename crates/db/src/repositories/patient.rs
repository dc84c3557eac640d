use carebook_core::domain::patient::{Patient, PatientId};
use carebook_core::domain::user::UserId;
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, PatientRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPatientRepository {
    pool: DbPool,
}

impl SqlPatientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PatientRepository for SqlPatientRepository {
    async fn find_by_id(&self, id: &PatientId) -> Result<Option<Patient>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, phone, date_of_birth, created_at, updated_at
             FROM patients WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Patient>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, phone, date_of_birth, created_at, updated_at
             FROM patients WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    async fn save(&self, patient: Patient) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO patients (id, user_id, name, phone, date_of_birth, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                phone = excluded.phone,
                date_of_birth = excluded.date_of_birth,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&patient.id.0)
        .bind(&patient.user_id.0)
        .bind(&patient.name)
        .bind(&patient.phone)
        .bind(patient.date_of_birth.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(patient.created_at.to_rfc3339())
        .bind(patient.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn patient_from_row(row: &SqliteRow) -> Result<Patient, RepositoryError> {
    let date_of_birth: Option<String> = row.try_get("date_of_birth")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Patient {
        id: PatientId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        date_of_birth: date_of_birth
            .map(|value| {
                NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| {
                    RepositoryError::Decode(format!("invalid date in `date_of_birth`: {e}"))
                })
            })
            .transpose()?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
