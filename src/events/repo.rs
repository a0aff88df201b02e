use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum EventType {
    Online,
    Presential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Free,
}

#[derive(Debug, Clone, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub price: f64,
    pub capacity: i64,
    #[sqlx(rename = "type")]
    pub event_type: EventType,
    pub location: String,
    pub has_certificate: bool,
    pub owner_id: i64,
    pub created_at: OffsetDateTime,
}

/// Event joined with its organizer's display name for listings.
#[derive(Debug, Clone, FromRow)]
pub struct EventWithOrganizer {
    #[sqlx(flatten)]
    pub event: Event,
    pub organizer: String,
}

pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub price: f64,
    pub capacity: i64,
    pub event_type: EventType,
    pub location: String,
    pub has_certificate: bool,
    pub owner_id: i64,
}

impl Event {
    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, description, date, price, capacity, type,
                   location, has_certificate, owner_id, created_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(event)
    }

    pub async fn list_with_organizer(db: &SqlitePool) -> anyhow::Result<Vec<EventWithOrganizer>> {
        let rows = sqlx::query_as::<_, EventWithOrganizer>(
            r#"
            SELECT e.id, e.title, e.description, e.date, e.price, e.capacity,
                   e.type, e.location, e.has_certificate, e.owner_id, e.created_at,
                   u.name AS organizer
            FROM events e
            JOIN users u ON u.id = e.owner_id
            ORDER BY e.date ASC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn create(db: &SqlitePool, new: NewEvent) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events
                (title, description, date, price, capacity, type,
                 location, has_certificate, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, title, description, date, price, capacity, type,
                      location, has_certificate, owner_id, created_at
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.date)
        .bind(new.price)
        .bind(new.capacity)
        .bind(new.event_type)
        .bind(&new.location)
        .bind(new.has_certificate)
        .bind(new.owner_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await?;
        Ok(event)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Registration {
    pub id: i64,
    pub ticket_code: String,
    pub payment_status: PaymentStatus,
    pub user_id: i64,
    pub event_id: i64,
    pub created_at: OffsetDateTime,
}

impl Registration {
    pub async fn find_for(
        db: &SqlitePool,
        user_id: i64,
        event_id: i64,
    ) -> anyhow::Result<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            SELECT id, ticket_code, payment_status, user_id, event_id, created_at
            FROM registrations
            WHERE user_id = $1 AND event_id = $2
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(db)
        .await?;
        Ok(registration)
    }

    pub async fn count_for_event(db: &SqlitePool, event_id: i64) -> anyhow::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM registrations WHERE event_id = $1"#)
                .bind(event_id)
                .fetch_one(db)
                .await?;
        Ok(count)
    }

    /// Capacity check and insert as one atomic statement: the row is only
    /// written while the event still has a free slot, so concurrent
    /// registrations cannot overshoot capacity. Returns `None` when the
    /// event is full. A duplicate (user, event) pair trips the unique
    /// constraint and surfaces as the raw sqlx error.
    pub async fn insert_within_capacity(
        db: &SqlitePool,
        ticket_code: &str,
        payment_status: PaymentStatus,
        user_id: i64,
        event_id: i64,
        capacity: i64,
    ) -> Result<Option<Registration>, sqlx::Error> {
        sqlx::query_as::<_, Registration>(
            r#"
            INSERT INTO registrations (ticket_code, payment_status, user_id, event_id, created_at)
            SELECT $1, $2, $3, $4, $5
            WHERE (SELECT COUNT(*) FROM registrations WHERE event_id = $4) < $6
            RETURNING id, ticket_code, payment_status, user_id, event_id, created_at
            "#,
        )
        .bind(ticket_code)
        .bind(payment_status)
        .bind(user_id)
        .bind(event_id)
        .bind(OffsetDateTime::now_utc())
        .bind(capacity)
        .fetch_optional(db)
        .await
    }
}
