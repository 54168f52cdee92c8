pub mod config;
pub mod error;
pub mod layout;

pub use config::Config;
pub use error::*;
pub use layout::{join_path, Layout};
