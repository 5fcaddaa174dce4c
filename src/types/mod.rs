pub mod frame;
pub mod keys;
pub mod metadata;

pub use frame::{Frame, FRAME_DELIMITER};
pub use keys::{coordination_key, InstanceKey};
pub use metadata::{Metadata, NO_RETRY_KEY, RETRY_COUNT_KEY};
