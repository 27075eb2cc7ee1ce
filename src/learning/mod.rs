pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod scheduler;
pub mod session;
pub mod tracker;
pub mod types;

pub use engine::SessionEngine;
pub use error::SessionError;
