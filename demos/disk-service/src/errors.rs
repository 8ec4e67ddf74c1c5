use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

#[derive(Debug, derive_more::Error, derive_more::Display)]
pub(crate) enum ServiceError {
    #[display("No disk named '{name}'")]
    DiskNotFound { name: String },

    #[display("No operation with id '{id}'")]
    OperationNotFound { id: String },

    #[display("No animal of kind '{kind}'")]
    AnimalNotFound { kind: String },
}

impl ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::DiskNotFound { .. } => "DiskNotFound",
            Self::OperationNotFound { .. } => "OperationNotFound",
            Self::AnimalNotFound { .. } => "AnimalNotFound",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}
