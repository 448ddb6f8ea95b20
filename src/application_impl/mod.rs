mod auth_service_impl;
mod brute_force_guard;
mod credential_hasher_argon2;
mod secret_hasher_sha256;
mod session_manager;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use brute_force_guard::*;
pub use credential_hasher_argon2::*;
pub use secret_hasher_sha256::*;
pub use session_manager::*;
pub use token_codec_jwt::*;
