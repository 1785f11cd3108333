use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::{
    datastore::DataStore, BotSession, BotStatus, CalendarConnection, NewScheduledBot, ScheduledBot,
};

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone)]
pub struct PgDataStore {
    pub pool: PgPool,
}

impl PgDataStore {
    /// Establish connection to database and run pending migrations
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .inspect_err(
                |e| tracing::error!(error = ?e, "Failed to establish connection to database"),
            )
            .context("Failed to connect to postgres database")?;

        MIGRATOR
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to run database migrations"))
            .context("Failed to run database migrations")?;

        Ok(PgDataStore { pool })
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: i64,
    user_id: String,
    email: String,
    access_token: String,
    refresh_token: String,
    token_expires_at: DateTime<Utc>,
    status: String,
    auto_record: bool,
}

impl TryFrom<ConnectionRow> for CalendarConnection {
    type Error = anyhow::Error;

    fn try_from(row: ConnectionRow) -> anyhow::Result<Self> {
        Ok(CalendarConnection {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            token_expires_at: row.token_expires_at,
            status: row.status.parse()?,
            auto_record: row.auto_record,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScheduledBotRow {
    id: i64,
    user_id: String,
    event_id: String,
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    meeting_url: String,
    attendees: Vec<String>,
    bot_enabled: bool,
    status: String,
    provider_bot_id: Option<String>,
    evaluation_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduledBotRow> for ScheduledBot {
    type Error = anyhow::Error;

    fn try_from(row: ScheduledBotRow) -> anyhow::Result<Self> {
        Ok(ScheduledBot {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            meeting_url: row.meeting_url,
            attendees: row.attendees,
            bot_enabled: row.bot_enabled,
            status: row.status.parse()?,
            provider_bot_id: row.provider_bot_id,
            evaluation_id: row.evaluation_id,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BotSessionRow {
    provider_bot_id: String,
    status: String,
    error_message: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BotSessionRow> for BotSession {
    type Error = anyhow::Error;

    fn try_from(row: BotSessionRow) -> anyhow::Result<Self> {
        Ok(BotSession {
            provider_bot_id: row.provider_bot_id,
            status: row.status.parse()?,
            error_message: row.error_message,
            updated_at: row.updated_at,
        })
    }
}

impl DataStore for PgDataStore {
    async fn get_connection(&self, user_id: &str) -> anyhow::Result<Option<CalendarConnection>> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT id, user_id, email, access_token, refresh_token,
                   token_expires_at, status, auto_record
            FROM calendar_connections
            WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, %user_id, "Failed to fetch connection"))
        .context("Failed to fetch calendar connection")?;

        row.map(CalendarConnection::try_from).transpose()
    }

    async fn list_autorecord_connections(&self) -> anyhow::Result<Vec<CalendarConnection>> {
        let rows = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT id, user_id, email, access_token, refresh_token,
                   token_expires_at, status, auto_record
            FROM calendar_connections
            WHERE status = 'active' AND auto_record
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to list connections"))
        .context("Failed to list auto-record connections")?;

        rows.into_iter()
            .map(CalendarConnection::try_from)
            .collect()
    }

    async fn update_connection_token(
        &self,
        connection_id: i64,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE calendar_connections
            SET access_token = $2, token_expires_at = $3, status = 'active',
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(connection_id)
        .bind(access_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, connection_id, "Failed to update token"))
        .context("Failed to update connection token")?;

        Ok(())
    }

    async fn mark_connection_expired(&self, connection_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE calendar_connections SET status = 'expired', updated_at = now() WHERE id = $1",
        )
        .bind(connection_id)
        .execute(&self.pool)
        .await
        .inspect_err(
            |e| tracing::error!(error = ?e, connection_id, "Failed to mark connection expired"),
        )
        .context("Failed to mark connection expired")?;

        Ok(())
    }

    async fn upsert_scheduled_bot(&self, bot: &NewScheduledBot) -> anyhow::Result<()> {
        // ON CONFLICT refreshes descriptive fields only; bot_enabled and
        // the status fields belong to the scheduler and webhook processor.
        sqlx::query(
            r#"
            INSERT INTO scheduled_bots
                (user_id, event_id, title, start_time, end_time, meeting_url, attendees)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, event_id) DO UPDATE SET
                title = EXCLUDED.title,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                meeting_url = EXCLUDED.meeting_url,
                attendees = EXCLUDED.attendees,
                updated_at = now()
            "#,
        )
        .bind(&bot.user_id)
        .bind(&bot.event_id)
        .bind(&bot.title)
        .bind(bot.start_time)
        .bind(bot.end_time)
        .bind(&bot.meeting_url)
        .bind(&bot.attendees)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(
                error = ?e,
                event_id = %bot.event_id,
                "Failed to upsert scheduled bot"
            )
        })
        .context("Failed to upsert scheduled bot")?;

        Ok(())
    }

    async fn due_scheduled_bots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ScheduledBot>> {
        let rows = sqlx::query_as::<_, ScheduledBotRow>(
            r#"
            SELECT id, user_id, event_id, title, start_time, end_time,
                   meeting_url, attendees, bot_enabled, status,
                   provider_bot_id, evaluation_id, error_message,
                   created_at, updated_at
            FROM scheduled_bots
            WHERE bot_enabled AND status = 'pending'
              AND start_time >= $1 AND start_time <= $2
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to fetch due scheduled bots"))
        .context("Failed to fetch due scheduled bots")?;

        rows.into_iter().map(ScheduledBot::try_from).collect()
    }

    async fn mark_bot_scheduled(&self, id: i64, provider_bot_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_bots
            SET status = 'scheduled', provider_bot_id = $2, error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(provider_bot_id)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, id, "Failed to mark bot scheduled"))
        .context("Failed to mark bot scheduled")?;

        Ok(())
    }

    async fn mark_bot_error(&self, id: i64, message: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_bots
            SET status = 'error', error_message = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, id, "Failed to mark bot errored"))
        .context("Failed to mark bot errored")?;

        Ok(())
    }

    async fn expire_stuck_bots(&self, cutoff: DateTime<Utc>, message: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_bots
            SET status = 'error', error_message = $2, updated_at = now()
            WHERE status = 'scheduled' AND start_time < $1
            "#,
        )
        .bind(cutoff)
        .bind(message)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to expire stuck bots"))
        .context("Failed to expire stuck bots")?;

        Ok(result.rows_affected())
    }

    async fn upsert_bot_session(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_sessions (provider_bot_id, status, error_message)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider_bot_id) DO UPDATE SET
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                updated_at = now()
            "#,
        )
        .bind(provider_bot_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, %provider_bot_id, "Failed to upsert bot session")
        })
        .context("Failed to upsert bot session")?;

        Ok(())
    }

    async fn get_bot_session(&self, provider_bot_id: &str) -> anyhow::Result<Option<BotSession>> {
        let row = sqlx::query_as::<_, BotSessionRow>(
            r#"
            SELECT provider_bot_id, status, error_message, updated_at
            FROM bot_sessions
            WHERE provider_bot_id = $1
            "#,
        )
        .bind(provider_bot_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, %provider_bot_id, "Failed to fetch session"))
        .context("Failed to fetch bot session")?;

        row.map(BotSession::try_from).transpose()
    }

    async fn mirror_scheduled_status(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_bots
            SET status = $2, error_message = COALESCE($3, error_message),
                updated_at = now()
            WHERE provider_bot_id = $1
            "#,
        )
        .bind(provider_bot_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, %provider_bot_id, "Failed to mirror scheduled status")
        })
        .context("Failed to mirror scheduled status")?;

        Ok(())
    }

    async fn link_evaluation(
        &self,
        provider_bot_id: &str,
        evaluation_id: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_bots
            SET evaluation_id = $2, updated_at = now()
            WHERE provider_bot_id = $1 AND evaluation_id IS NULL
            "#,
        )
        .bind(provider_bot_id)
        .bind(evaluation_id)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, %provider_bot_id, "Failed to link evaluation")
        })
        .context("Failed to link evaluation")?;

        Ok(())
    }
}
