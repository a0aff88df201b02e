use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::auth::jwt::AuthUser;
use crate::auth::repo::Role;
use crate::error::AppError;
use crate::events::dto::{CreateEventRequest, EventResponse, RegistrationResponse};
use crate::events::repo::{Event, NewEvent};
use crate::events::services;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/:id/register", post(register_for_event))
        .route("/events/:id/certificate", get(event_certificate))
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = Event::list_with_organizer(&state.db).await.map_err(|e| {
        error!(error = %e, "list events failed");
        AppError::Internal(e)
    })?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    if user.role != Role::Organizer {
        return Err(AppError::Forbidden(
            "Only organizers can create events".into(),
        ));
    }

    let (Some(title), Some(description), Some(date), Some(capacity), Some(event_type), Some(location)) = (
        payload.title,
        payload.description,
        payload.date,
        payload.capacity,
        payload.event_type,
        payload.location,
    ) else {
        return Err(AppError::BadRequest(
            "title, description, date, capacity, type and location are required".into(),
        ));
    };

    let price = payload.price.unwrap_or(0.0);
    if price < 0.0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if capacity < 1 {
        return Err(AppError::BadRequest(
            "capacity must be a positive integer".into(),
        ));
    }

    // Ownership comes from the verified identity, never the payload.
    let event = Event::create(
        &state.db,
        NewEvent {
            title,
            description,
            date,
            price,
            capacity,
            event_type,
            location,
            has_certificate: payload.has_certificate.unwrap_or(false),
            owner_id: user.id,
        },
    )
    .await?;

    info!(event_id = event.id, owner_id = user.id, "event created");
    Ok((StatusCode::CREATED, Json(event.into())))
}

#[instrument(skip(state))]
pub async fn register_for_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let registration = services::register_for_event(&state, user.id, event_id).await?;
    Ok((StatusCode::CREATED, Json(registration.into())))
}

#[instrument(skip(state))]
pub async fn event_certificate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let pdf = services::issue_certificate(&state, user.id, event_id).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=certificate.pdf",
        ),
    ];
    Ok((headers, pdf).into_response())
}
