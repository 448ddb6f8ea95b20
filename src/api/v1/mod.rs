mod error;
mod handler;
mod router;

pub use error::{ApiError, ApiErrorCode, ApiRejection, recover_error};
pub use handler::{ApiResponse, REFRESH_COOKIE};
pub use router::routes;
