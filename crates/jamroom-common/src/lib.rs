pub mod errors;
pub mod id;

pub use errors::{ConfigError, JamroomError};
pub use id::{new_id, new_message_id, now_millis};
