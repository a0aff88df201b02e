use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::auth::repo::User;
use crate::error::AppError;
use crate::events::repo::{Event, PaymentStatus, Registration};
use crate::events::{certificate, ticket};
use crate::state::AppState;

/// Registers the caller for an event: eligibility checks, ticket minting,
/// ledger write, best-effort confirmation email.
pub async fn register_for_event(
    state: &AppState,
    user_id: i64,
    event_id: i64,
) -> Result<Registration, AppError> {
    let event = Event::find_by_id(&state.db, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    if Registration::find_for(&state.db, user_id, event_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Already registered for this event".into(),
        ));
    }

    let payment_status = if event.price > 0.0 {
        PaymentStatus::Pending
    } else {
        PaymentStatus::Free
    };

    // The guarded insert re-checks capacity atomically; the unique
    // constraints catch a concurrent duplicate that slipped past the
    // precheck above, and the rare ticket-code collision, which simply
    // gets a fresh code.
    let mut registration = None;
    for _ in 0..3 {
        let ticket_code = ticket::mint();
        match Registration::insert_within_capacity(
            &state.db,
            &ticket_code,
            payment_status,
            user_id,
            event_id,
            event.capacity,
        )
        .await
        {
            Ok(Some(created)) => {
                registration = Some(created);
                break;
            }
            Ok(None) => return Err(AppError::CapacityExceeded),
            Err(e) if violates_ticket_code(&e) => {
                warn!(event_id, ticket = %ticket_code, "ticket code collision; reminting");
                continue;
            }
            Err(e) if violates_unique(&e) => {
                return Err(AppError::Conflict(
                    "Already registered for this event".into(),
                ));
            }
            Err(e) => return Err(AppError::Internal(e.into())),
        }
    }
    let registration = registration
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("ticket code collision persisted")))?;

    notify_registrant(state, user_id, &event, &registration).await;

    info!(
        user_id,
        event_id,
        ticket = %registration.ticket_code,
        status = ?registration.payment_status,
        "registration created"
    );
    Ok(registration)
}

fn violates_unique(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation())
}

/// SQLite names the violated columns in the message, e.g.
/// "UNIQUE constraint failed: registrations.ticket_code".
fn violates_ticket_code(e: &sqlx::Error) -> bool {
    violates_unique(e)
        && e.as_database_error()
            .is_some_and(|d| d.message().contains("ticket_code"))
}

/// Confirmation email; failures are logged and swallowed so ticket
/// issuance never depends on delivery.
async fn notify_registrant(
    state: &AppState,
    user_id: i64,
    event: &Event,
    registration: &Registration,
) {
    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user_id, "registrant not found for confirmation email");
            return;
        }
        Err(e) => {
            error!(error = %e, user_id, "load registrant for confirmation email failed");
            return;
        }
    };

    let text = format!(
        "Your ticket for the event {} is: {}",
        event.title, registration.ticket_code
    );
    if let Err(e) = state
        .mailer
        .send(&user.email, "Registration confirmed", &text)
        .await
    {
        error!(error = %e, user_id, event_id = event.id, "confirmation email failed");
    }
}

/// Checks certificate eligibility and renders the PDF for the caller.
pub async fn issue_certificate(
    state: &AppState,
    user_id: i64,
    event_id: i64,
) -> Result<Vec<u8>, AppError> {
    let event = Event::find_by_id(&state.db, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    if !event.has_certificate {
        return Err(AppError::InvalidState(
            "This event does not offer a certificate".into(),
        ));
    }
    if event.date > OffsetDateTime::now_utc() {
        return Err(AppError::InvalidState(
            "The event has not occurred yet".into(),
        ));
    }
    if Registration::find_for(&state.db, user_id, event_id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden(
            "Not registered for this event".into(),
        ));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Unknown user".into()))?;

    let pdf = certificate::render(&user.name, &event.title, event.date)?;
    info!(user_id, event_id, bytes = pdf.len(), "certificate issued");
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::Role;
    use crate::events::repo::{EventType, NewEvent};
    use crate::mailer::Mailer;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use time::Duration;

    async fn seed_user(state: &AppState, email: &str, role: Role) -> User {
        User::create(&state.db, "Test User", email, "fake-hash", role)
            .await
            .expect("seed user")
    }

    async fn seed_event(
        state: &AppState,
        owner_id: i64,
        price: f64,
        capacity: i64,
        has_certificate: bool,
        date: OffsetDateTime,
    ) -> Event {
        Event::create(
            &state.db,
            NewEvent {
                title: "Rust Meetup".into(),
                description: "Talks and pizza".into(),
                date,
                price,
                capacity,
                event_type: EventType::Presential,
                location: "Main Hall".into(),
                has_certificate,
                owner_id,
            },
        )
        .await
        .expect("seed event")
    }

    fn past() -> OffsetDateTime {
        OffsetDateTime::now_utc() - Duration::days(1)
    }

    fn future() -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::days(1)
    }

    #[tokio::test]
    async fn free_event_registration_is_free() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, future()).await;

        let registration = register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");
        assert_eq!(registration.payment_status, PaymentStatus::Free);
        assert!(registration.ticket_code.starts_with("TICKET-"));
    }

    #[tokio::test]
    async fn paid_event_registration_is_pending() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 25.0, 10, false, future()).await;

        let registration = register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");
        assert_eq!(registration.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let state = AppState::fake().await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let err = register_for_event(&state, participant.id, 9999)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_registration_conflicts() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, future()).await;

        register_for_event(&state, participant.id, event.id)
            .await
            .expect("first register");
        let err = register_for_event(&state, participant.id, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn full_event_rejects_registration_and_count_holds() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let first = seed_user(&state, "p1@example.com", Role::Participant).await;
        let second = seed_user(&state, "p2@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 1, false, future()).await;

        register_for_event(&state, first.id, event.id)
            .await
            .expect("fills the event");
        let err = register_for_event(&state, second.id, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded));

        let count = Registration::count_for_event(&state.db, event.id)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unique_violations_are_told_apart_by_constraint() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let first = seed_user(&state, "p1@example.com", Role::Participant).await;
        let second = seed_user(&state, "p2@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, future()).await;

        Registration::insert_within_capacity(
            &state.db,
            "TICKET-1-aaaaa",
            PaymentStatus::Free,
            first.id,
            event.id,
            event.capacity,
        )
        .await
        .expect("insert")
        .expect("free slot");

        // Same ticket code, different user: the ticket_code constraint trips.
        let err = Registration::insert_within_capacity(
            &state.db,
            "TICKET-1-aaaaa",
            PaymentStatus::Free,
            second.id,
            event.id,
            event.capacity,
        )
        .await
        .unwrap_err();
        assert!(violates_ticket_code(&err));

        // Same user, fresh code: the (user, event) constraint trips.
        let err = Registration::insert_within_capacity(
            &state.db,
            "TICKET-2-bbbbb",
            PaymentStatus::Free,
            first.id,
            event.id,
            event.capacity,
        )
        .await
        .unwrap_err();
        assert!(violates_unique(&err));
        assert!(!violates_ticket_code(&err));
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    #[tokio::test]
    async fn mailer_failure_does_not_fail_registration() {
        let state = AppState::fake_with_mailer(Arc::new(FailingMailer)).await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, future()).await;

        register_for_event(&state, participant.id, event.id)
            .await
            .expect("registration survives mailer failure");
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), text.into()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn confirmation_email_names_event_and_ticket() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with_mailer(mailer.clone()).await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, future()).await;

        let registration = register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, _subject, text) = &sent[0];
        assert_eq!(to, "p@example.com");
        assert!(text.contains("Rust Meetup"));
        assert!(text.contains(&registration.ticket_code));
    }

    #[tokio::test]
    async fn certificate_requires_certificate_enabled() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, false, past()).await;
        register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");

        let err = issue_certificate(&state, participant.id, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn certificate_requires_event_to_have_occurred() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, true, future()).await;
        register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");

        let err = issue_certificate(&state, participant.id, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn certificate_requires_registration() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let stranger = seed_user(&state, "s@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, true, past()).await;

        let err = issue_certificate(&state, stranger.id, event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn certificate_for_unknown_event_is_not_found() {
        let state = AppState::fake().await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let err = issue_certificate(&state, participant.id, 424242)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn certificate_happy_path_renders_pdf() {
        let state = AppState::fake().await;
        let organizer = seed_user(&state, "org@example.com", Role::Organizer).await;
        let participant = seed_user(&state, "p@example.com", Role::Participant).await;
        let event = seed_event(&state, organizer.id, 0.0, 10, true, past()).await;
        register_for_event(&state, participant.id, event.id)
            .await
            .expect("register");

        let pdf = issue_certificate(&state, participant.id, event.id)
            .await
            .expect("issue certificate");
        assert!(pdf.starts_with(b"%PDF"));
    }
}
