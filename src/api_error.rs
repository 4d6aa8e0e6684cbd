use reqwest::StatusCode;
use std::collections::HashMap;
use std::{error::Error, fmt};

#[derive(Debug, thiserror::Error)]
pub enum ApiErrorType {
    /// A success response that did not decode, or request data that
    /// would not encode
    #[error("Bad JSON: {0}")]
    BadJson(String),

    /// The transport failed.  Network unreachable, DNS, timeout
    #[error("Failed Request: {0}")]
    FailedRequest(#[source] reqwest::Error),

    /// The server answered 401.  The session is gone by the time the
    /// caller sees this
    #[error("{0}")]
    Unauthorized(String),

    // When a bad status is returned from a network connection.
    // Includes the failing code and the server's `detail`, or a
    // generic message
    #[error("HTTP Status({0}) Reason: {1}")]
    Status(StatusCode, String),

    /// The token endpoint refused the credentials
    #[error("{0}")]
    Login(String),

    /// An identity check was made with no token set
    #[error("{0}")]
    NoToken(String),

    /// The token cannot be carried in an `Authorization` header
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token persistence failed
    #[error("Storage: {0}")]
    Storage(String),

    /// A file to upload could not be read
    #[error("File: {0}")]
    File(String),
}

#[derive(Debug)]
pub struct ApiError {
    pub error_type: ApiErrorType,
    /// Response headers, when there was a response
    pub headers: HashMap<String, String>,
}

impl ApiError {
    pub fn new(error_type: ApiErrorType, headers: HashMap<String, String>) -> Self {
        Self {
            error_type,
            headers,
        }
    }

    /// An error with no response attached
    pub fn bare(error_type: ApiErrorType) -> Self {
        Self::new(error_type, HashMap::new())
    }

    /// The HTTP status, for errors that came from a response
    pub fn status(&self) -> Option<StatusCode> {
        match self.error_type {
            ApiErrorType::Status(status, _) => Some(status),
            ApiErrorType::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.error_type, ApiErrorType::Unauthorized(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        let header_report: String = names
            .into_iter()
            .fold(String::new(), |a, b| format!("{a}{b}:{}\n", self.headers[b]));
        write!(f, "{header_report}{}", self.error_type)
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.error_type.source()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::bare(ApiErrorType::FailedRequest(err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bare(ApiErrorType::BadJson(err.to_string()))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::bare(ApiErrorType::Storage(err.to_string()))
    }
}
