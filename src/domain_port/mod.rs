// store

mod lockout_store;
mod session_store;

pub use lockout_store::*;
pub use session_store::*;

// repo

mod credential_repo;

pub use credential_repo::*;
