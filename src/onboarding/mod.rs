use crate::state::AppState;
use axum::Router;

pub mod command;
pub mod dto;
pub mod handlers;
pub mod machine;
pub mod review;
pub mod steps;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
