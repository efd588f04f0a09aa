pub mod error;
pub mod lcnet;
pub mod session_pool;

pub use error::InferenceError;
pub use lcnet::{LcNetConfig, LcNetOrientationDetector};
pub use session_pool::SessionPool;
