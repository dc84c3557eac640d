use carebook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
use carebook_core::domain::doctor::DoctorId;
use carebook_core::domain::patient::PatientId;
use carebook_core::scheduling::DateSpan;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{
    decode_err, format_scheduled_at, parse_scheduled_at, parse_timestamp, AppointmentQuery,
    AppointmentRepository, RepositoryError,
};
use crate::DbPool;

const APPOINTMENT_COLUMNS: &str = "id, doctor_id, patient_id, scheduled_at, duration_minutes, \
                                   status, symptoms, diagnosis, notes, calendar_event_id, \
                                   confirmation_sent, reminder_sent, created_at, updated_at";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AppointmentQuery) {
    builder.push(" WHERE 1=1");

    if let Some(id) = &query.appointment_id {
        builder.push(" AND id = ").push_bind(id.0.clone());
    }
    if let Some(doctor_id) = &query.doctor_id {
        builder.push(" AND doctor_id = ").push_bind(doctor_id.0.clone());
    }
    if let Some(patient_id) = &query.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id.0.clone());
    }
    if let Some(span) = query.span {
        builder
            .push(" AND scheduled_at >= ")
            .push_bind(format_scheduled_at(span.start_at()))
            .push(" AND scheduled_at < ")
            .push_bind(format_scheduled_at(span.end_at()));
    }
    if !query.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &query.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(symptom) = &query.symptom {
        builder
            .push(" AND instr(lower(COALESCE(symptoms, '')), lower(")
            .push_bind(symptom.clone())
            .push(")) > 0");
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, doctor_id, patient_id, scheduled_at, duration_minutes, status,
                symptoms, diagnosis, notes, calendar_event_id, confirmation_sent,
                reminder_sent, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                scheduled_at = excluded.scheduled_at,
                duration_minutes = excluded.duration_minutes,
                status = excluded.status,
                symptoms = excluded.symptoms,
                diagnosis = excluded.diagnosis,
                notes = excluded.notes,
                calendar_event_id = excluded.calendar_event_id,
                confirmation_sent = excluded.confirmation_sent,
                reminder_sent = excluded.reminder_sent,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&appointment.id.0)
        .bind(&appointment.doctor_id.0)
        .bind(&appointment.patient_id.0)
        .bind(format_scheduled_at(appointment.scheduled_at))
        .bind(i64::from(appointment.duration_minutes))
        .bind(appointment.status.as_str())
        .bind(&appointment.symptoms)
        .bind(&appointment.diagnosis)
        .bind(&appointment.notes)
        .bind(&appointment.calendar_event_id)
        .bind(appointment.confirmation_sent)
        .bind(appointment.reminder_sent)
        .bind(appointment.created_at.to_rfc3339())
        .bind(appointment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_booked_at(
        &self,
        doctor_id: &DoctorId,
        at: NaiveDateTime,
    ) -> Result<bool, RepositoryError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM appointments
                WHERE doctor_id = ?1 AND scheduled_at = ?2 AND status IN (?3, ?4)
             )",
        )
        .bind(&doctor_id.0)
        .bind(format_scheduled_at(at))
        .bind(AppointmentStatus::BOOKED[0].as_str())
        .bind(AppointmentStatus::BOOKED[1].as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists == 1)
    }

    async fn booked_times_on(
        &self,
        doctor_id: &DoctorId,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, RepositoryError> {
        let span = DateSpan::day(date);
        let rows = sqlx::query(
            "SELECT scheduled_at FROM appointments
             WHERE doctor_id = ?1 AND scheduled_at >= ?2 AND scheduled_at < ?3
               AND status IN (?4, ?5)
             ORDER BY scheduled_at ASC",
        )
        .bind(&doctor_id.0)
        .bind(format_scheduled_at(span.start_at()))
        .bind(format_scheduled_at(span.end_at()))
        .bind(AppointmentStatus::BOOKED[0].as_str())
        .bind(AppointmentStatus::BOOKED[1].as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let value: String = row.try_get("scheduled_at")?;
                Ok(parse_scheduled_at(&value)?.time())
            })
            .collect()
    }

    async fn count(&self, query: &AppointmentQuery) -> Result<u64, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM appointments");
        push_filters(&mut builder, query);

        let count = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        u64::try_from(count).map_err(decode_err)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments"));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY scheduled_at ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(appointment_from_row).collect()
    }
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, RepositoryError> {
    let scheduled_at: String = row.try_get("scheduled_at")?;
    let duration_minutes: i64 = row.try_get("duration_minutes")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        doctor_id: DoctorId(row.try_get("doctor_id")?),
        patient_id: PatientId(row.try_get("patient_id")?),
        scheduled_at: parse_scheduled_at(&scheduled_at)?,
        duration_minutes: u32::try_from(duration_minutes).map_err(decode_err)?,
        status: status.parse::<AppointmentStatus>().map_err(decode_err)?,
        symptoms: row.try_get("symptoms")?,
        diagnosis: row.try_get("diagnosis")?,
        notes: row.try_get("notes")?,
        calendar_event_id: row.try_get("calendar_event_id")?,
        confirmation_sent: row.try_get("confirmation_sent")?,
        reminder_sent: row.try_get("reminder_sent")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
