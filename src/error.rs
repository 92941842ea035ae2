use actix_web::error::{BlockingError, ResponseError};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use derive_more::Display;
use diesel::r2d2;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::convert::From;

use super::api::ApiResponse;

pub type Result<T> = ::std::result::Result<T, Error>;

/// The broad class an `Error` belongs to.
///
/// Everything except `Timeout` and `Infrastructure` is an expected,
/// recoverable condition caused by the request itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Authentication,
    Timeout,
    Infrastructure,
}

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "Missing {}", _0)]
    MissingField(&'static str),

    #[display(fmt = "Usernames must be 1-64 letters, digits, '.', '_' or '-'")]
    InvalidUsername,

    #[display(fmt = "Rating must be between 1 and 5, got {}", _0)]
    InvalidRating(i16),

    #[display(fmt = "Page must be at least 1 and per_page between 1 and 100")]
    InvalidPage,

    #[display(fmt = "Malformed request: {}", _0)]
    MalformedPayload(String),

    #[display(fmt = "User {} not found", _0)]
    UserNotFound(String),

    #[display(fmt = "Beer {} not found", _0)]
    BeerNotFound(String),

    #[display(fmt = "Review {} not found", _0)]
    ReviewNotFound(String),

    #[display(fmt = "Beer {} is not in favourites", _0)]
    NotFavorite(String),

    #[display(fmt = "Username {} already exists", _0)]
    DuplicateUser(String),

    #[display(fmt = "Beer {} already in favourites", _0)]
    AlreadyFavorite(String),

    #[display(fmt = "Beer {} has already been reviewed", _0)]
    DuplicateReview(String),

    #[display(fmt = "You can only delete your own reviews")]
    Forbidden,

    #[display(fmt = "Invalid username or password")]
    InvalidCredentials,

    #[display(fmt = "Session not found!")]
    SessionNotFound,

    #[display(fmt = "Review {} references missing user {}", review_id, user_id)]
    DanglingReviewer { review_id: String, user_id: String },

    #[display(fmt = "Store call timed out")]
    Timeout,

    #[display(fmt = "Database error: {}", _0)]
    DieselError(DieselError),

    #[display(fmt = "Connection pool error: {}", _0)]
    PoolError(r2d2::PoolError),

    #[display(fmt = "Blocking task failed")]
    BlockingError,

    #[display(fmt = "Malformed document: {}", _0)]
    JsonError(serde_json::Error),

    #[display(fmt = "Password hashing failed: {}", _0)]
    PasswordHash(String),

    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),

    #[display(fmt = "Configuration error: {}", _0)]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_)
            | Self::InvalidUsername
            | Self::InvalidRating(_)
            | Self::InvalidPage
            | Self::MalformedPayload(_) => ErrorKind::Validation,
            Self::UserNotFound(_)
            | Self::BeerNotFound(_)
            | Self::ReviewNotFound(_)
            | Self::NotFavorite(_) => ErrorKind::NotFound,
            Self::DuplicateUser(_) | Self::AlreadyFavorite(_) | Self::DuplicateReview(_) => {
                ErrorKind::Conflict
            }
            Self::Forbidden => ErrorKind::Authorization,
            Self::InvalidCredentials | Self::SessionNotFound => ErrorKind::Authentication,
            Self::Timeout | Self::PoolError(_) => ErrorKind::Timeout,
            Self::DanglingReviewer { .. }
            | Self::DieselError(_)
            | Self::BlockingError
            | Self::JsonError(_)
            | Self::PasswordHash(_)
            | Self::Io(_)
            | Self::Config(_) => ErrorKind::Infrastructure,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DieselError(e) => Some(e),
            Self::PoolError(e) => Some(e),
            Self::JsonError(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self.kind() {
            ErrorKind::Infrastructure => {
                error!("{}", self);
                ApiResponse::<()>::error("Internal server error".to_owned())
            }
            ErrorKind::Timeout => {
                warn!("{}", self);
                ApiResponse::<()>::error(self.to_string())
            }
            _ => ApiResponse::<()>::fail(self.to_string()),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Error {
        match e {
            // SQLite reports an expired busy_timeout as a generic "database is locked".
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, ref info)
                if info.message().contains("database is locked") =>
            {
                Error::Timeout
            }
            e => Error::DieselError(e),
        }
    }
}

impl From<r2d2::PoolError> for Error {
    fn from(e: r2d2::PoolError) -> Error {
        Error::PoolError(e)
    }
}

impl From<BlockingError> for Error {
    fn from(_: BlockingError) -> Error {
        Error::BlockingError
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::JsonError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}
