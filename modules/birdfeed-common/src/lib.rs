pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::BirdfeedError;
pub use types::{CanonicalPost, Classification, Handle, Tier};
