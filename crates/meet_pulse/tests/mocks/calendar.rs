use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use meet_pulse::{CalendarApi, CalendarApiError, CalendarEvent, TokenResponse};

#[derive(Clone, Default)]
pub struct MockCalendarApi {
    pub events: Arc<Mutex<Vec<CalendarEvent>>>,
    pub list_calls: Arc<Mutex<usize>>,
    pub refresh_calls: Arc<Mutex<usize>>,
    pub fail_refresh: bool,
    pub reject_token: bool,
}

impl MockCalendarApi {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
            ..Default::default()
        }
    }

    pub fn failing_refresh() -> Self {
        Self {
            fail_refresh: true,
            ..Default::default()
        }
    }

    pub fn rejecting_token() -> Self {
        Self {
            reject_token: true,
            ..Default::default()
        }
    }
}

/// An event with a meeting link starting `start_offset_minutes` from now.
pub fn event(id: &str, title: &str, start_offset_minutes: i64) -> CalendarEvent {
    let start_time = Utc::now() + Duration::minutes(start_offset_minutes);
    CalendarEvent {
        id: id.to_string(),
        title: title.to_string(),
        start_time,
        end_time: start_time + Duration::minutes(30),
        meeting_url: Some("https://meet.example.com/abc-defg-hij".into()),
        attendees: vec!["alice@example.com".into(), "bob@example.com".into()],
    }
}

impl CalendarApi for MockCalendarApi {
    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<TokenResponse, CalendarApiError> {
        *self.refresh_calls.lock().unwrap() += 1;
        if self.fail_refresh {
            return Err(CalendarApiError::Api {
                status: 400,
                message: "invalid_grant".into(),
            });
        }
        Ok(TokenResponse {
            access_token: "fresh-token".into(),
            expires_in: 3600,
        })
    }

    async fn list_events(
        &self,
        _access_token: &str,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarApiError> {
        *self.list_calls.lock().unwrap() += 1;
        if self.reject_token {
            return Err(CalendarApiError::Api {
                status: 401,
                message: "Invalid Credentials".into(),
            });
        }
        Ok(self.events.lock().unwrap().clone())
    }
}
