use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use meet_datastore::{
    BotSession, BotStatus, CalendarConnection, ConnectionStatus, DataStore, NewScheduledBot,
    ScheduledBot,
};

#[derive(Clone, Default)]
pub struct MockDataStore {
    pub connections: Arc<Mutex<Vec<CalendarConnection>>>,
    pub scheduled: Arc<Mutex<Vec<ScheduledBot>>>,
    pub sessions: Arc<Mutex<Vec<BotSession>>>,
    pub fail_with: Option<String>,
    pub failing_status_ids: Arc<Mutex<Vec<i64>>>,
}

impl MockDataStore {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    /// Make status writes (`mark_bot_scheduled` / `mark_bot_error`) fail
    /// for the given scheduled-bot row.
    pub fn fail_status_writes_for(&self, id: i64) {
        self.failing_status_ids.lock().unwrap().push(id);
    }

    pub fn add_connection(&self, connection: CalendarConnection) {
        self.connections.lock().unwrap().push(connection);
    }

    pub fn add_scheduled(&self, bot: ScheduledBot) {
        self.scheduled.lock().unwrap().push(bot);
    }

    pub fn scheduled_by_event(&self, user_id: &str, event_id: &str) -> Option<ScheduledBot> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.user_id == user_id && b.event_id == event_id)
            .cloned()
    }

    pub fn session(&self, provider_bot_id: &str) -> Option<BotSession> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.provider_bot_id == provider_bot_id)
            .cloned()
    }
}

/// An active connection expiring `expires_in_minutes` from now.
pub fn connection(user_id: &str, expires_in_minutes: i64) -> CalendarConnection {
    CalendarConnection {
        id: 1,
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        access_token: "stored-token".into(),
        refresh_token: "stored-refresh".into(),
        token_expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        status: ConnectionStatus::Active,
        auto_record: true,
    }
}

/// A scheduled-bot row starting `start_offset_minutes` from now.
pub fn scheduled_bot(
    id: i64,
    user_id: &str,
    event_id: &str,
    start_offset_minutes: i64,
    status: BotStatus,
) -> ScheduledBot {
    let start_time = Utc::now() + Duration::minutes(start_offset_minutes);
    ScheduledBot {
        id,
        user_id: user_id.to_string(),
        event_id: event_id.to_string(),
        title: "Weekly sync".into(),
        start_time,
        end_time: start_time + Duration::minutes(30),
        meeting_url: "https://meet.example.com/abc-defg-hij".into(),
        attendees: vec!["alice@example.com".into()],
        bot_enabled: true,
        status,
        provider_bot_id: if status == BotStatus::Pending {
            None
        } else {
            Some(format!("bot-{id}"))
        },
        evaluation_id: None,
        error_message: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

impl DataStore for MockDataStore {
    async fn get_connection(&self, user_id: &str) -> anyhow::Result<Option<CalendarConnection>> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user_id == user_id && c.status == ConnectionStatus::Active)
            .cloned())
    }

    async fn list_autorecord_connections(&self) -> anyhow::Result<Vec<CalendarConnection>> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.status == ConnectionStatus::Active && c.auto_record)
            .cloned()
            .collect())
    }

    async fn update_connection_token(
        &self,
        connection_id: i64,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut connections = self.connections.lock().unwrap();
        if let Some(c) = connections.iter_mut().find(|c| c.id == connection_id) {
            c.access_token = access_token.to_string();
            c.token_expires_at = expires_at;
            c.status = ConnectionStatus::Active;
        }
        Ok(())
    }

    async fn mark_connection_expired(&self, connection_id: i64) -> anyhow::Result<()> {
        let mut connections = self.connections.lock().unwrap();
        if let Some(c) = connections.iter_mut().find(|c| c.id == connection_id) {
            c.status = ConnectionStatus::Expired;
        }
        Ok(())
    }

    async fn upsert_scheduled_bot(&self, bot: &NewScheduledBot) -> anyhow::Result<()> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        let mut scheduled = self.scheduled.lock().unwrap();
        if let Some(existing) = scheduled
            .iter_mut()
            .find(|b| b.user_id == bot.user_id && b.event_id == bot.event_id)
        {
            // descriptive fields only, like the SQL upsert
            existing.title = bot.title.clone();
            existing.start_time = bot.start_time;
            existing.end_time = bot.end_time;
            existing.meeting_url = bot.meeting_url.clone();
            existing.attendees = bot.attendees.clone();
            existing.updated_at = Utc::now();
        } else {
            let id = scheduled.iter().map(|b| b.id).max().unwrap_or(0) + 1;
            scheduled.push(ScheduledBot {
                id,
                user_id: bot.user_id.clone(),
                event_id: bot.event_id.clone(),
                title: bot.title.clone(),
                start_time: bot.start_time,
                end_time: bot.end_time,
                meeting_url: bot.meeting_url.clone(),
                attendees: bot.attendees.clone(),
                bot_enabled: true,
                status: BotStatus::Pending,
                provider_bot_id: None,
                evaluation_id: None,
                error_message: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn due_scheduled_bots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ScheduledBot>> {
        Ok(self
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                b.bot_enabled
                    && b.status == BotStatus::Pending
                    && b.start_time >= from
                    && b.start_time <= until
            })
            .cloned()
            .collect())
    }

    async fn mark_bot_scheduled(&self, id: i64, provider_bot_id: &str) -> anyhow::Result<()> {
        if self.failing_status_ids.lock().unwrap().contains(&id) {
            anyhow::bail!("status write failed for bot {id}");
        }

        let mut scheduled = self.scheduled.lock().unwrap();
        if let Some(b) = scheduled.iter_mut().find(|b| b.id == id) {
            b.status = BotStatus::Scheduled;
            b.provider_bot_id = Some(provider_bot_id.to_string());
            b.error_message = None;
        }
        Ok(())
    }

    async fn mark_bot_error(&self, id: i64, message: &str) -> anyhow::Result<()> {
        if self.failing_status_ids.lock().unwrap().contains(&id) {
            anyhow::bail!("status write failed for bot {id}");
        }

        let mut scheduled = self.scheduled.lock().unwrap();
        if let Some(b) = scheduled.iter_mut().find(|b| b.id == id) {
            b.status = BotStatus::Error;
            b.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn expire_stuck_bots(&self, cutoff: DateTime<Utc>, message: &str) -> anyhow::Result<u64> {
        let mut scheduled = self.scheduled.lock().unwrap();
        let mut reclaimed = 0;
        for b in scheduled
            .iter_mut()
            .filter(|b| b.status == BotStatus::Scheduled && b.start_time < cutoff)
        {
            b.status = BotStatus::Error;
            b.error_message = Some(message.to_string());
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    async fn upsert_bot_session(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        let mut sessions = self.sessions.lock().unwrap();
        if let Some(s) = sessions
            .iter_mut()
            .find(|s| s.provider_bot_id == provider_bot_id)
        {
            s.status = status;
            s.error_message = error_message.map(str::to_string);
            s.updated_at = Utc::now();
        } else {
            sessions.push(BotSession {
                provider_bot_id: provider_bot_id.to_string(),
                status,
                error_message: error_message.map(str::to_string),
                updated_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn get_bot_session(&self, provider_bot_id: &str) -> anyhow::Result<Option<BotSession>> {
        Ok(self.session(provider_bot_id))
    }

    async fn mirror_scheduled_status(
        &self,
        provider_bot_id: &str,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut scheduled = self.scheduled.lock().unwrap();
        if let Some(b) = scheduled
            .iter_mut()
            .find(|b| b.provider_bot_id.as_deref() == Some(provider_bot_id))
        {
            b.status = status;
            if let Some(message) = error_message {
                b.error_message = Some(message.to_string());
            }
        }
        Ok(())
    }

    async fn link_evaluation(
        &self,
        provider_bot_id: &str,
        evaluation_id: &str,
    ) -> anyhow::Result<()> {
        let mut scheduled = self.scheduled.lock().unwrap();
        if let Some(b) = scheduled.iter_mut().find(|b| {
            b.provider_bot_id.as_deref() == Some(provider_bot_id) && b.evaluation_id.is_none()
        }) {
            b.evaluation_id = Some(evaluation_id.to_string());
        }
        Ok(())
    }
}
