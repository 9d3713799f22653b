use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

const CONFIG: i32 = 1;
const PERSISTENCE_FAILURE: i32 = 2;
const ROUTING_UNAVAILABLE: i32 = 3;
const PUBLISH_FAILURE: i32 = 4;
const UNEXPECTED: i32 = 5;

const INVALID_INVOCATION: i32 = 100;
const INVALID_INPUT: i32 = 101;
const NO_ROUTE_FOUND: i32 = 102;
const FARE_NOT_FOUND: i32 = 103;
const FARE_EXPIRED: i32 = 104;
const TRIP_NOT_FOUND: i32 = 105;

/// Codes below 100 are infrastructure failures, everything above is the
/// caller's fault.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(CONFIG, message)
    }

    pub fn persistence_failure_error(message: impl Into<String>) -> Self {
        Self::new(PERSISTENCE_FAILURE, message)
    }

    pub fn routing_unavailable_error(message: impl Into<String>) -> Self {
        Self::new(ROUTING_UNAVAILABLE, message)
    }

    pub fn publish_failure_error(message: impl Into<String>) -> Self {
        Self::new(PUBLISH_FAILURE, message)
    }

    pub fn unexpected_error(message: impl Into<String>) -> Self {
        Self::new(UNEXPECTED, message)
    }

    pub fn invalid_invocation_error() -> Self {
        Self::new(INVALID_INVOCATION, "invalid invocation")
    }

    pub fn invalid_input_error(message: impl Into<String>) -> Self {
        Self::new(INVALID_INPUT, message)
    }

    pub fn no_route_found_error() -> Self {
        Self::new(NO_ROUTE_FOUND, "no route found")
    }

    pub fn fare_not_found_error() -> Self {
        Self::new(FARE_NOT_FOUND, "fare not found")
    }

    pub fn fare_expired_error() -> Self {
        Self::new(FARE_EXPIRED, "fare has expired")
    }

    pub fn trip_not_found_error() -> Self {
        Self::new(TRIP_NOT_FOUND, "trip not found")
    }

    pub fn is_persistence_failure_error(&self) -> bool {
        self.code == PERSISTENCE_FAILURE
    }

    pub fn is_routing_unavailable_error(&self) -> bool {
        self.code == ROUTING_UNAVAILABLE
    }

    pub fn is_publish_failure_error(&self) -> bool {
        self.code == PUBLISH_FAILURE
    }

    pub fn is_invalid_invocation_error(&self) -> bool {
        self.code == INVALID_INVOCATION
    }

    pub fn is_invalid_input_error(&self) -> bool {
        self.code == INVALID_INPUT
    }

    pub fn is_no_route_found_error(&self) -> bool {
        self.code == NO_ROUTE_FOUND
    }

    pub fn is_fare_not_found_error(&self) -> bool {
        self.code == FARE_NOT_FOUND
    }

    pub fn is_fare_expired_error(&self) -> bool {
        self.code == FARE_EXPIRED
    }

    pub fn is_trip_not_found_error(&self) -> bool {
        self.code == TRIP_NOT_FOUND
    }

    /// Infrastructure failures may succeed when attempted again; caller
    /// errors never will.
    pub fn is_retryable(&self) -> bool {
        (1..=99).contains(&self.code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::persistence_failure_error(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::routing_unavailable_error(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            ROUTING_UNAVAILABLE => (StatusCode::SERVICE_UNAVAILABLE, "Routing Unavailable"),
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            INVALID_INVOCATION => (StatusCode::CONFLICT, self.message.as_str()),
            NO_ROUTE_FOUND => (StatusCode::UNPROCESSABLE_ENTITY, self.message.as_str()),
            FARE_NOT_FOUND | TRIP_NOT_FOUND => (StatusCode::NOT_FOUND, self.message.as_str()),
            FARE_EXPIRED => (StatusCode::GONE, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[test]
fn retryable_codes() {
    assert!(Error::persistence_failure_error("down").is_retryable());
    assert!(Error::publish_failure_error("down").is_retryable());
    assert!(Error::routing_unavailable_error("down").is_retryable());
    assert!(!Error::trip_not_found_error().is_retryable());
    assert!(!Error::fare_expired_error().is_retryable());
    assert!(!Error::invalid_invocation_error().is_retryable());
}

#[test]
fn caller_errors_map_to_client_statuses() {
    let status = |err: Error| err.into_response().status();

    assert_eq!(status(Error::fare_not_found_error()), StatusCode::NOT_FOUND);
    assert_eq!(status(Error::fare_expired_error()), StatusCode::GONE);
    assert_eq!(status(Error::trip_not_found_error()), StatusCode::NOT_FOUND);
    assert_eq!(
        status(Error::invalid_input_error("bad latitude")),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status(Error::routing_unavailable_error("timeout")),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status(Error::persistence_failure_error("down")),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
