//! Error types shared across the Guardpost crates.
//!
//! One enum covers the whole taxonomy: input validation errors map to 4xx
//! responses, collaborator conflicts get their own variants so callers can
//! react to them specifically, everything else is a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type GpResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	/// Review code does not match any known alarm report
	ConfirmationKeyNotFound,
	/// Reviewer identification (e-mail or user ID) is empty / non-positive
	MissingReviewerIdentity,
	/// The ban store already holds an overlapping ban for this user
	UserAlreadyBanned,
	ValidationError(String),
	/// A deadline expired before the guarded operation finished
	Timeout,
	Internal(String),

	// externals
	Io(std::io::Error),
	Serialization(String),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::ConfirmationKeyNotFound => write!(f, "confirmation key not found"),
			Error::MissingReviewerIdentity => write!(f, "missing reviewer identification"),
			Error::UserAlreadyBanned => write!(f, "user already banned"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::Timeout => write!(f, "operation deadline expired"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
			Error::Serialization(msg) => write!(f, "serialization error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

fn error_body(code: &str, message: &str) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"error": {
			"code": code,
			"message": message,
		}
	}))
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let message = self.to_string();
		match self {
			Error::NotFound => {
				(StatusCode::NOT_FOUND, error_body("E-NOT-FOUND", &message)).into_response()
			}
			Error::ConfirmationKeyNotFound => {
				(StatusCode::NOT_FOUND, error_body("E-ALARM-NOT-FOUND", &message)).into_response()
			}
			Error::MissingReviewerIdentity => {
				(StatusCode::BAD_REQUEST, error_body("E-MISSING-REVIEWER", &message))
					.into_response()
			}
			Error::UserAlreadyBanned => {
				(StatusCode::CONFLICT, error_body("E-ALREADY-BANNED", &message)).into_response()
			}
			Error::ValidationError(_) => {
				(StatusCode::BAD_REQUEST, error_body("E-VALIDATION", &message)).into_response()
			}
			_ => (StatusCode::INTERNAL_SERVER_ERROR, error_body("E-INTERNAL", "internal error"))
				.into_response(),
		}
	}
}


// vim: ts=4
