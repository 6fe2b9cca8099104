use crate::state::AppState;
use axum::Router;

pub mod email;
pub mod handlers;
pub mod render;
pub mod repo;
pub mod service;
pub mod templates;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
