mod auth_service;
mod hasher;
mod token_codec;

pub use auth_service::*;
pub use hasher::*;
pub use token_codec::*;
