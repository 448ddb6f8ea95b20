use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::{StatusCode, header};
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(r) = err.find::<ApiRejection>() {
        (r.code, r.message.clone())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, ApiErrorCode::NotFound.to_string())
    } else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        if e.name() == header::AUTHORIZATION.as_str() {
            (ApiErrorCode::InvalidToken, "missing bearer token".to_string())
        } else {
            (ApiErrorCode::InvalidRequest, e.to_string())
        }
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        (ApiErrorCode::InvalidRequest, e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::InvalidRequest, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (ApiErrorCode::InvalidRequest, "request body too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (ApiErrorCode::InvalidRequest, "expected a JSON body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::MethodNotAllowed, ApiErrorCode::MethodNotAllowed.to_string())
    } else {
        error!("unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, ApiErrorCode::InternalError.to_string())
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Refresh token is not valid")]
    InvalidRefreshToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Email already taken")]
    EmailTaken,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A failed request, carried through warp as a custom rejection.
#[derive(Debug)]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub message: String,
}

impl reject::Reject for ApiRejection {}

impl From<ApiErrorCode> for ApiRejection {
    fn from(code: ApiErrorCode) -> Self {
        ApiRejection {
            code,
            message: code.to_string(),
        }
    }
}

impl ApiRejection {
    fn internal<E: std::fmt::Display>(code: ApiErrorCode, error: E) -> ApiRejection {
        warn!("Internal error: {}", error);
        ApiRejection::from(code)
    }
}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials.into(),
            // indistinguishable from a wrong password on the wire
            AuthError::LockedOut => ApiErrorCode::InvalidCredentials.into(),
            AuthError::InvalidRefreshToken => ApiErrorCode::InvalidRefreshToken.into(),
            AuthError::TokenInvalid => ApiErrorCode::InvalidToken.into(),
            AuthError::TokenExpired => ApiErrorCode::TokenExpired.into(),
            AuthError::UserExists => ApiErrorCode::EmailTaken.into(),
            AuthError::InvalidRequest(message) => ApiRejection {
                code: ApiErrorCode::InvalidRequest,
                message,
            },
            AuthError::SessionStoreUnavailable(e) => {
                ApiRejection::internal(ApiErrorCode::ServiceUnavailable, e)
            }
            AuthError::InternalError(e) => ApiRejection::internal(ApiErrorCode::InternalError, e),
        }
    }
}
