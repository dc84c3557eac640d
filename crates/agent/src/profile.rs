use serde_json::json;

use carebook_core::domain::doctor::Doctor;
use carebook_core::domain::patient::Patient;
use carebook_core::domain::session::ContextMap;
use carebook_core::domain::user::{User, UserId, UserRole};
use carebook_db::repositories::RepositoryError;

use crate::tools::handlers::{display_name, ClinicRepositories};

/// The caller of one chat request, with whichever clinic profile matches their role.
#[derive(Clone, Debug)]
pub struct CallerProfile {
    pub user: User,
    pub doctor: Option<Doctor>,
    pub patient: Option<Patient>,
}

impl CallerProfile {
    pub fn role(&self) -> UserRole {
        self.user.role
    }

    /// Facts about the caller surfaced in the system prompt.
    pub fn prompt_context(&self) -> ContextMap {
        let mut context = ContextMap::new();
        context.insert("user_email".to_string(), json!(self.user.email));
        if let Some(patient) = &self.patient {
            context.insert("patient_name".to_string(), json!(patient.name));
            context.insert("patient_id".to_string(), json!(patient.id.0));
        }
        if let Some(doctor) = &self.doctor {
            context.insert("doctor_name".to_string(), json!(display_name(&doctor.name)));
            context.insert("doctor_id".to_string(), json!(doctor.id.0));
            context.insert("specialty".to_string(), json!(doctor.specialty));
        }
        context
    }
}

#[derive(Clone)]
pub struct ProfileResolver {
    repos: ClinicRepositories,
}

impl ProfileResolver {
    pub fn new(repos: ClinicRepositories) -> Self {
        Self { repos }
    }

    /// `None` for unknown or deactivated users.
    pub async fn resolve(&self, user_id: &UserId) -> Result<Option<CallerProfile>, RepositoryError> {
        let Some(user) = self.repos.users.find_by_id(user_id).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let (doctor, patient) = match user.role {
            UserRole::Doctor => (self.repos.doctors.find_by_user_id(&user.id).await?, None),
            UserRole::Patient => (None, self.repos.patients.find_by_user_id(&user.id).await?),
            UserRole::Admin => (None, None),
        };

        Ok(Some(CallerProfile { user, doctor, patient }))
    }
}
