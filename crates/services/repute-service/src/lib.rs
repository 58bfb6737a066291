pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

pub use app::{create_app, AppState};
