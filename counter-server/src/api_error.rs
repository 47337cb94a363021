//! Maps [`CounterError`] onto HTTP responses: `{"detail": "<message>"}`,
//! 400 for a rejected page id, 500 for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use counter_common::CounterError;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

pub struct ApiError(CounterError);

impl From<CounterError> for ApiError {
    fn from(err: CounterError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CounterError::InvalidPageId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                detail: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn invalid_page_id_maps_to_bad_request() {
        let err: ApiError = CounterError::InvalidPageId("page id must not be empty".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_unavailable_maps_to_internal_server_error() {
        let err: ApiError = CounterError::BackendUnavailable {
            shard: counter_common::ShardId::new("redis1:6379"),
            reason: "connection refused".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
