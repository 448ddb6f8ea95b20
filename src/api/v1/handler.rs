use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::server::RefreshCookie;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::header::SET_COOKIE;
use warp::{self, reject};

pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn set_refresh_cookie(cookie: &RefreshCookie, value: &str, max_age_secs: i64) -> String {
    let mut header = format!(
        "{}={}; HttpOnly; SameSite={}; Path={}; Max-Age={}",
        REFRESH_COOKIE, value, cookie.same_site, cookie.path, max_age_secs
    );
    if cookie.secure {
        header.push_str("; Secure");
    }
    header
}

/// The refresh token only travels in the cookie, never in the body.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user_id: UserId,
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

fn token_reply(
    tokens: AuthTokens,
    cookie: &RefreshCookie,
) -> warp::reply::WithHeader<warp::reply::Json> {
    let max_age = (tokens.refresh_token_expires_at - Utc::now())
        .num_seconds()
        .max(0);
    let header = set_refresh_cookie(cookie, &tokens.refresh_token.0, max_age);
    let body = TokenResponse {
        user_id: tokens.user_id,
        access_token: tokens.access_token,
        access_token_expires_at: tokens.access_token_expires_at,
        refresh_token_expires_at: tokens.refresh_token_expires_at,
    };
    warp::reply::with_header(warp::reply::json(&ApiResponse::ok(body)), SET_COOKIE, header)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let register_input = RegisterInput {
        email: body.email,
        password: body.password,
        display_name: body.display_name,
    };
    let user_id = auth_service
        .register(register_input)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RegisterResponse {
        user_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
        device_id: body.device_id,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(token_reply(login_result.tokens, &cookie))
}

pub async fn refresh(
    refresh_token: Option<String>,
    device_id: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh(RefreshInput {
            refresh_token,
            device_id,
        })
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(token_reply(tokens, &cookie))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn logout(
    identity: AccessIdentity,
    device_id: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(identity.user_id, device_id.as_deref())
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    let response = ApiResponse::ok(MessageResponse {
        message: "logged out".to_string(),
    });
    Ok(warp::reply::with_header(
        warp::reply::json(&response),
        SET_COOKIE,
        set_refresh_cookie(&cookie, "", 0),
    ))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub email: Option<String>,
}

pub async fn me(identity: AccessIdentity) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(MeResponse {
        user_id: identity.user_id,
        email: identity.email,
    })))
}
