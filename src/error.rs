use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
	#[error("Insufficient or unknown organ stock for '{organ}'. Current stock: {available}")]
	InsufficientOrgan { organ: String, available: i32 },
}

/// Failures coming out of a [`crate::store::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database connection failed: {0}")]
	Connection(String),
	#[error("{0}")]
	Database(String),
	#[error(transparent)]
	Stock(#[from] StockError),
}

impl From<sqlx::Error> for StoreError {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::Database(db) => StoreError::Database(db.message().to_string()),
			sqlx::Error::Io(_)
			| sqlx::Error::Tls(_)
			| sqlx::Error::Configuration(_)
			| sqlx::Error::PoolTimedOut
			| sqlx::Error::PoolClosed
			| sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
			other => StoreError::Database(other.to_string()),
		}
	}
}

impl StoreError {
	/// Failure of a read-only endpoint: 500 with `context` prefixed.
	pub fn failed(self, context: &str) -> ApiError {
		match self {
			StoreError::Connection(detail) => connection_lost(&detail),
			other => {
				warn!(%context, error = %other, "query failed");
				ApiError::Query(format!("{context}: {other}"))
			}
		}
	}

	/// Failure of a write: the transaction was rolled back, 400 with `context` prefixed.
	pub fn rejected(self, context: &str) -> ApiError {
		match self {
			StoreError::Connection(detail) => connection_lost(&detail),
			other => {
				warn!(%context, error = %other, "transaction rolled back");
				ApiError::Transaction(format!("{context}: {other}"))
			}
		}
	}
}

fn connection_lost(detail: &str) -> ApiError {
	warn!(%detail, "database connection failed");
	ApiError::Connection
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can answer with besides success.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("Database connection failed.")]
	Connection,
	#[error("{0}")]
	Validation(String),
	#[error("{0}")]
	Query(String),
	#[error("{0}")]
	Transaction(String),
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	Forbidden(String),
}

impl ApiError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::Connection | ApiError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Validation(_) | ApiError::Transaction(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
		}
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		(status, Json(ErrorBody { error: self.to_string() })).into_response()
	}
}
