pub mod builder;

use chrono::{Duration, Utc};
use itertools::Itertools;
use meet_datastore::{CalendarConnection, DataStore, NewScheduledBot};

use crate::{
    calendar::{CalendarAccess, CalendarApi},
    provider::{BotProvider, BotRequest},
};

// The periodic calendar sync and bot scheduling job
pub struct BotScheduler<D, C, P>
where
    D: DataStore + Clone + Send + Sync + 'static,
    C: CalendarApi + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
{
    pub(crate) store: D,
    pub(crate) calendar: CalendarAccess<D, C>,
    pub(crate) provider: P,
    pub(crate) webhook_url: String,
    pub(crate) sync_horizon_days: i64,
}

impl<D, C, P> BotScheduler<D, C, P>
where
    D: DataStore + Clone + Send + Sync + 'static,
    C: CalendarApi + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
{
    /// Bots are created no earlier than this before the meeting starts;
    /// creating earlier burns provider quota on meetings that still get
    /// rescheduled or cancelled.
    const SCHEDULE_WINDOW_MINUTES: i64 = 5;

    /// A bot still in `scheduled` this long after its meeting started
    /// silently failed to join and is reclaimed.
    const STUCK_TIMEOUT_MINUTES: i64 = 30;

    const TIMEOUT_MESSAGE: &'static str = "Bot timed out (never joined)";

    /// One full pass: refresh calendar state, then create due bots and
    /// reclaim stuck ones. Safe to re-run at any interval.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> anyhow::Result<()> {
        self.sync().await?;
        self.schedule().await?;
        Ok(())
    }

    /// Upserts a scheduled-bot row for every upcoming event with a
    /// meeting link, across all active auto-record connections. A
    /// failing user never blocks the rest.
    #[tracing::instrument(skip(self))]
    pub async fn sync(&self) -> anyhow::Result<()> {
        let connections = self.store.list_autorecord_connections().await?;
        tracing::info!(count = connections.len(), "Syncing calendars");

        for connection in connections {
            if let Err(e) = self.sync_user(&connection).await {
                tracing::error!(
                    error = ?e,
                    user_id = %connection.user_id,
                    "Failed to sync user calendar"
                );
            }
        }

        Ok(())
    }

    async fn sync_user(&self, connection: &CalendarConnection) -> anyhow::Result<()> {
        // re-resolve through the access client so the token is fresh
        let Some(connection) = self.calendar.get(&connection.user_id).await? else {
            tracing::debug!(user_id = %connection.user_id, "No usable connection, skipping");
            return Ok(());
        };

        let events = self
            .calendar
            .list_events(&connection, self.sync_horizon_days)
            .await?;

        let mut upserted = 0usize;
        for event in events {
            let Some(meeting_url) = event.meeting_url else {
                continue;
            };
            self.store
                .upsert_scheduled_bot(&NewScheduledBot {
                    user_id: connection.user_id.clone(),
                    event_id: event.id,
                    title: event.title,
                    start_time: event.start_time,
                    end_time: event.end_time,
                    meeting_url,
                    attendees: event.attendees,
                })
                .await?;
            upserted += 1;
        }

        tracing::info!(user_id = %connection.user_id, upserted, "Synced calendar events");
        Ok(())
    }

    /// Creates bots for pending rows whose meeting starts within the
    /// window, then reclaims `scheduled` rows that never reported back.
    #[tracing::instrument(skip(self))]
    pub async fn schedule(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let until = now + Duration::minutes(Self::SCHEDULE_WINDOW_MINUTES);

        let due = self
            .store
            .due_scheduled_bots(now, until)
            .await?
            .into_iter()
            // soonest meetings first, in case a pass gets cut short
            .sorted_by_key(|bot| bot.start_time)
            .collect::<Vec<_>>();

        tracing::info!(count = due.len(), "Scheduling due bots");

        for bot in due {
            // the user may have disconnected or disabled auto-record
            // since sync; skip without consuming the pending row
            match self.store.get_connection(&bot.user_id).await {
                Ok(Some(connection)) if connection.auto_record => {}
                Ok(_) => {
                    tracing::debug!(
                        id = bot.id,
                        user_id = %bot.user_id,
                        "Connection gone or auto-record disabled, leaving pending"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = ?e, id = bot.id, "Failed to verify connection");
                    continue;
                }
            }

            // a store write failing for one bot never blocks the rest
            // of the pass; the row stays pending and is retried next time
            let request = BotRequest::new(&bot.meeting_url, &self.webhook_url);
            match self.provider.create_bot(&request).await {
                Ok(provider_bot_id) => {
                    tracing::info!(id = bot.id, %provider_bot_id, "Bot created");
                    if let Err(e) = self.store.mark_bot_scheduled(bot.id, &provider_bot_id).await {
                        tracing::error!(error = ?e, id = bot.id, "Failed to persist scheduled status");
                    }
                }
                Err(e) => {
                    // terminal; surfaced on the row, never retried
                    tracing::error!(error = ?e, id = bot.id, "Bot creation failed");
                    let message = format!("Bot creation failed: {e:?}");
                    if let Err(e) = self.store.mark_bot_error(bot.id, &message).await {
                        tracing::error!(error = ?e, id = bot.id, "Failed to persist error status");
                    }
                }
            }
        }

        let cutoff = now - Duration::minutes(Self::STUCK_TIMEOUT_MINUTES);
        let reclaimed = self
            .store
            .expire_stuck_bots(cutoff, Self::TIMEOUT_MESSAGE)
            .await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Reclaimed bots that never joined");
        }

        Ok(())
    }
}
