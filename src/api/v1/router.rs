use super::error::*;
use super::handler::{self, REFRESH_COOKIE};
use crate::application_port::{AccessIdentity, AuthService};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

const AUTHORIZATION_HEADER: &str = "authorization";
const DEVICE_ID_HEADER: &str = "x-device-id";
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let refresh_cookie = Arc::new(server.refresh_cookie.clone());

    let register = warp::path("auth")
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path("auth")
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and(with(refresh_cookie.clone()))
        .and_then(handler::login);

    let refresh = warp::path("auth")
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional(REFRESH_COOKIE))
        .and(warp::header::optional::<String>(DEVICE_ID_HEADER))
        .and(with(server.auth_service.clone()))
        .and(with(refresh_cookie.clone()))
        .and_then(handler::refresh);

    let logout = warp::path("auth")
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_verification(server.auth_service.clone()))
        .and(warp::header::optional::<String>(DEVICE_ID_HEADER))
        .and(with(server.auth_service.clone()))
        .and(with(refresh_cookie))
        .and_then(handler::logout);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    register.or(login).or(refresh).or(logout).or(me)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AccessIdentity,), Error = warp::Rejection> + Clone {
    warp::header::<String>(AUTHORIZATION_HEADER).and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let identity = auth_service
                    .verify_token(token)
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)?;
                Ok(identity)
            } else {
                Err(reject::custom(ApiRejection::from(ApiErrorCode::InvalidToken)))
            }
        }
    })
}
