use crate::state::AppState;
use axum::Router;

pub mod certificate;
mod dto;
pub mod handlers;
pub mod repo;
pub mod services;
pub mod ticket;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
