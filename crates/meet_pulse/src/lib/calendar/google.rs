use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{CalendarApi, CalendarApiError, CalendarEvent, TokenResponse};

/// Google Calendar v3 client. Lists the primary calendar and exchanges
/// refresh tokens for access tokens through the standard OAuth endpoint.
pub struct GoogleCalendar {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
}

impl GoogleCalendar {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: "https://www.googleapis.com/calendar/v3".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventItem {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: EventTime,
    end: EventTime,
    #[serde(default)]
    hangout_link: Option<String>,
    #[serde(default)]
    conference_data: Option<ConferenceData>,
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    // absent for all-day events, which carry a bare `date` instead
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryPoint {
    entry_point_type: Option<String>,
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attendee {
    email: Option<String>,
}

impl EventItem {
    fn meeting_url(&self) -> Option<String> {
        if let Some(link) = &self.hangout_link {
            return Some(link.clone());
        }
        self.conference_data
            .as_ref()?
            .entry_points
            .iter()
            .find(|ep| ep.entry_point_type.as_deref() == Some("video"))
            .and_then(|ep| ep.uri.clone())
    }
}

impl CalendarApi for GoogleCalendar {
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, CalendarApiError> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make token refresh request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(CalendarApiError::Api { status, message });
        }

        Ok(resp.json::<TokenResponse>().await?)
    }

    async fn list_events(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarApiError> {
        let resp = self
            .client
            .get(format!("{}/calendars/primary/events", self.api_base))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", from.to_rfc3339()),
                ("timeMax", until.to_rfc3339()),
                ("singleEvents", "true".into()),
                ("orderBy", "startTime".into()),
                ("maxResults", "250".into()),
            ])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make list events request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(CalendarApiError::Api { status, message });
        }

        let list = resp.json::<EventList>().await?;

        let events = list
            .items
            .into_iter()
            .filter_map(|item| {
                // skip all-day events, they have no joinable meeting time
                let start_time = item.start.date_time?;
                let end_time = item.end.date_time?;
                let meeting_url = item.meeting_url();
                Some(CalendarEvent {
                    title: item.summary.clone().unwrap_or_default(),
                    attendees: item
                        .attendees
                        .iter()
                        .filter_map(|a| a.email.clone())
                        .collect(),
                    id: item.id,
                    start_time,
                    end_time,
                    meeting_url,
                })
            })
            .collect();

        Ok(events)
    }
}
