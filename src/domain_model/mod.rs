mod device;
mod session;
mod user;

pub use device::*;
pub use session::*;
pub use user::*;
