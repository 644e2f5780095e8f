pub mod error;
pub mod types;
pub mod user;

pub use error::ServiceError;
pub use types::{new_id, now_rfc3339, now_unix};
pub use user::{AuthMethod, CurrentUser};
