pub mod google;

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use meet_datastore::{CalendarConnection, DataStore};
use serde::Deserialize;

/// A calendar event as listed from the provider. `meeting_url` is only
/// set when the event carries a video-conferencing entry point.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_url: Option<String>,
    pub attendees: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarApiError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl CalendarApiError {
    /// True for token-rejection responses, which mean the stored token
    /// is dead and the connection should be re-consented.
    pub fn is_auth(&self) -> bool {
        matches!(self, CalendarApiError::Api { status: 401 | 403, .. })
    }
}

pub trait CalendarApi {
    fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse, CalendarApiError>> + Send;

    fn list_events(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>, CalendarApiError>> + Send;
}

/// Hands out calendar connections with a token that is guaranteed fresh
/// for at least [`Self::REFRESH_BUFFER`], refreshing through the
/// provider when needed. Refresh failures and token rejections both
/// flip the stored connection to `expired` so later passes short-circuit
/// instead of retrying with a dead token.
pub struct CalendarAccess<D, C> {
    store: D,
    api: C,
}

impl<D, C> CalendarAccess<D, C>
where
    D: DataStore + Send + Sync,
    C: CalendarApi + Send + Sync,
{
    const REFRESH_BUFFER_MINUTES: i64 = 5;

    pub fn new(store: D, api: C) -> Self {
        Self { store, api }
    }

    /// Loads the user's active connection, refreshing its access token
    /// when it expires within the buffer. Returns `None` when the user
    /// has no usable connection.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> anyhow::Result<Option<CalendarConnection>> {
        let Some(mut connection) = self.store.get_connection(user_id).await? else {
            return Ok(None);
        };

        let refresh_deadline = Utc::now() + Duration::minutes(Self::REFRESH_BUFFER_MINUTES);
        if connection.token_expires_at > refresh_deadline {
            return Ok(Some(connection));
        }

        match self.api.refresh_access_token(&connection.refresh_token).await {
            Ok(token) => {
                let expires_at = Utc::now() + Duration::seconds(token.expires_in);
                self.store
                    .update_connection_token(connection.id, &token.access_token, expires_at)
                    .await?;
                connection.access_token = token.access_token;
                connection.token_expires_at = expires_at;
                Ok(Some(connection))
            }
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "Token refresh failed, expiring connection");
                self.store.mark_connection_expired(connection.id).await?;
                Ok(None)
            }
        }
    }

    /// Lists events in `[now, now + horizon_days]` for a connection
    /// obtained from [`Self::get`]. A 401/403 from the provider expires
    /// the connection before the error is propagated.
    #[tracing::instrument(skip_all, fields(user_id = %connection.user_id))]
    pub async fn list_events(
        &self,
        connection: &CalendarConnection,
        horizon_days: i64,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        let now = Utc::now();
        let until = now + Duration::days(horizon_days);

        match self.api.list_events(&connection.access_token, now, until).await {
            Ok(events) => Ok(events),
            Err(e) if e.is_auth() => {
                tracing::warn!(
                    user_id = %connection.user_id,
                    "Calendar API rejected token, expiring connection"
                );
                self.store.mark_connection_expired(connection.id).await?;
                Err(anyhow::anyhow!(e).context("Calendar token rejected"))
            }
            Err(e) => Err(anyhow::anyhow!(e).context("Failed to list calendar events")),
        }
    }
}
