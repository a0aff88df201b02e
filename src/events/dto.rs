use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::events::repo::{Event, EventType, EventWithOrganizer, PaymentStatus, Registration};

/// Request body for event creation. Mandatory fields are modelled as
/// `Option` so their absence maps to a 400 with an error body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    pub price: Option<f64>,
    pub capacity: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub location: Option<String>,
    pub has_certificate: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub price: f64,
    pub capacity: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub location: String,
    pub has_certificate: bool,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
}

impl From<Event> for EventResponse {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            date: e.date,
            price: e.price,
            capacity: e.capacity,
            event_type: e.event_type,
            location: e.location,
            has_certificate: e.has_certificate,
            owner_id: e.owner_id,
            organizer: None,
        }
    }
}

impl From<EventWithOrganizer> for EventResponse {
    fn from(row: EventWithOrganizer) -> Self {
        let mut response = Self::from(row.event);
        response.organizer = Some(row.organizer);
        response
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: i64,
    pub ticket_code: String,
    pub payment_status: PaymentStatus,
    pub user_id: i64,
    pub event_id: i64,
}

impl From<Registration> for RegistrationResponse {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            ticket_code: r.ticket_code,
            payment_status: r.payment_status,
            user_id: r.user_id,
            event_id: r.event_id,
        }
    }
}
