pub mod status;
pub mod topics;

pub use status::*;
pub use topics::TopicError;
