#![warn(clippy::unwrap_used)]

pub mod payload;
pub mod rest;
pub mod server;

pub use rest::AppState;
pub use server::{router, ApiServer};
