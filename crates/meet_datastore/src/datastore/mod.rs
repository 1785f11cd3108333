use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{BotSession, BotStatus, CalendarConnection, NewScheduledBot, ScheduledBot};

pub mod postgres;

pub trait DataStore {
    // ── calendar connections ──

    fn get_connection(
        &self,
        user_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<CalendarConnection>>> + Send;

    fn list_autorecord_connections(
        &self,
    ) -> impl Future<Output = anyhow::Result<Vec<CalendarConnection>>> + Send;

    fn update_connection_token(
        &self,
        connection_id: i64,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn mark_connection_expired(
        &self,
        connection_id: i64,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    // ── scheduled bots ──

    /// Insert the row on first sight of an event, or refresh its
    /// descriptive fields. Must never touch `bot_enabled` or the status
    /// fields of an existing row.
    fn upsert_scheduled_bot(
        &self,
        bot: &NewScheduledBot,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Bot-enabled, `pending` rows whose event starts within `[from, until]`.
    fn due_scheduled_bots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<Vec<ScheduledBot>>> + Send;

    fn mark_bot_scheduled(
        &self,
        id: i64,
        provider_bot_id: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn mark_bot_error(
        &self,
        id: i64,
        message: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Force `scheduled` rows whose event started before `cutoff` into
    /// `error`. Returns the number of reclaimed rows.
    fn expire_stuck_bots(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    // ── bot sessions ──

    fn upsert_bot_session(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn get_bot_session(
        &self,
        provider_bot_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<BotSession>>> + Send;

    /// Best-effort copy of a session status onto the matching scheduled
    /// bot row, if any.
    fn mirror_scheduled_status(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn link_evaluation(
        &self,
        provider_bot_id: &str,
        evaluation_id: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: DataStore + Send + Sync> DataStore for &T {
    async fn get_connection(&self, user_id: &str) -> anyhow::Result<Option<CalendarConnection>> {
        (**self).get_connection(user_id).await
    }

    async fn list_autorecord_connections(&self) -> anyhow::Result<Vec<CalendarConnection>> {
        (**self).list_autorecord_connections().await
    }

    async fn update_connection_token(
        &self,
        connection_id: i64,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        (**self)
            .update_connection_token(connection_id, access_token, expires_at)
            .await
    }

    async fn mark_connection_expired(&self, connection_id: i64) -> anyhow::Result<()> {
        (**self).mark_connection_expired(connection_id).await
    }

    async fn upsert_scheduled_bot(&self, bot: &NewScheduledBot) -> anyhow::Result<()> {
        (**self).upsert_scheduled_bot(bot).await
    }

    async fn due_scheduled_bots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ScheduledBot>> {
        (**self).due_scheduled_bots(from, until).await
    }

    async fn mark_bot_scheduled(&self, id: i64, provider_bot_id: &str) -> anyhow::Result<()> {
        (**self).mark_bot_scheduled(id, provider_bot_id).await
    }

    async fn mark_bot_error(&self, id: i64, message: &str) -> anyhow::Result<()> {
        (**self).mark_bot_error(id, message).await
    }

    async fn expire_stuck_bots(&self, cutoff: DateTime<Utc>, message: &str) -> anyhow::Result<u64> {
        (**self).expire_stuck_bots(cutoff, message).await
    }

    async fn upsert_bot_session(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        (**self)
            .upsert_bot_session(provider_bot_id, status, error_message)
            .await
    }

    async fn get_bot_session(&self, provider_bot_id: &str) -> anyhow::Result<Option<BotSession>> {
        (**self).get_bot_session(provider_bot_id).await
    }

    async fn mirror_scheduled_status(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        (**self)
            .mirror_scheduled_status(provider_bot_id, status, error_message)
            .await
    }

    async fn link_evaluation(
        &self,
        provider_bot_id: &str,
        evaluation_id: &str,
    ) -> anyhow::Result<()> {
        (**self).link_evaluation(provider_bot_id, evaluation_id).await
    }
}
