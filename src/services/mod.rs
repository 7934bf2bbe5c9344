pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod loader;
pub mod preview;
