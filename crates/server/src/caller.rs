use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};

use carebook_core::domain::user::UserId;

use crate::error::{reject, ApiRejection};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, taken from the `x-user-id` header set by the
/// upstream gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(UserId(value.to_string())))
            .ok_or_else(|| {
                reject(
                    StatusCode::UNAUTHORIZED,
                    "missing_caller",
                    format!("the `{USER_ID_HEADER}` header is required"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::{Request, StatusCode};

    use super::Caller;

    #[tokio::test]
    async fn header_value_is_trimmed_into_a_user_id() {
        let (mut parts, _) =
            Request::builder().header("x-user-id", " user-demo-patient ").body(()).expect("request").into_parts();

        let Caller(user_id) = Caller::from_request_parts(&mut parts, &()).await.expect("caller");
        assert_eq!(user_id.0, "user-demo-patient");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let (mut parts, _) = Request::builder().body(()).expect("request").into_parts();

        let (status, body) = Caller::from_request_parts(&mut parts, &()).await.expect_err("rejected");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error_class, "missing_caller");
    }
}
