use std::sync::Arc;

use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::config::AppConfig;
use crate::mailer::{Mailer, NoopMailer, SmtpMailer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(SmtpMailer::new(mail)?),
            None => {
                tracing::warn!("SMTP not configured; registration emails will be dropped");
                Arc::new(NoopMailer)
            }
        };

        Ok(Self { db, config, mailer })
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, config, mailer }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory database with migrations applied and a no-op mailer.
    pub async fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(NoopMailer)).await
    }

    pub async fn fake_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        use crate::config::JwtConfig;

        // A single long-lived connection so every query sees the same
        // in-memory database.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("apply migrations");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            mail: None,
        });

        Self { db, config, mailer }
    }
}
