use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's linked calendar account. At most one `active` connection
/// exists per user; revocation is owned elsewhere, this subsystem only
/// refreshes tokens and flips the status to `expired`.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarConnection {
    pub id: i64,
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub status: ConnectionStatus,
    pub auto_record: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Expired,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::Expired => "expired",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConnectionStatus::Active),
            "expired" => Ok(ConnectionStatus::Expired),
            other => anyhow::bail!("unknown connection status: {other}"),
        }
    }
}

/// The persisted decision of whether a recording bot should attend a
/// calendar event, plus where that bot currently is in its lifecycle.
///
/// Descriptive fields (title, times, url, attendees) are refreshed on
/// every calendar sync; `bot_enabled` and the status fields are owned
/// by the scheduler and the webhook processor and are never touched by
/// sync.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledBot {
    pub id: i64,
    pub user_id: String,
    pub event_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_url: String,
    pub attendees: Vec<String>,
    pub bot_enabled: bool,
    pub status: BotStatus,
    pub provider_bot_id: Option<String>,
    pub evaluation_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive event fields used to create or refresh a [`ScheduledBot`] row.
#[derive(Debug, Clone)]
pub struct NewScheduledBot {
    pub user_id: String,
    pub event_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_url: String,
    pub attendees: Vec<String>,
}

/// Raw provider-side bot record, keyed by the provider's bot id. This is
/// the authoritative record for webhook bookkeeping; the matching
/// [`ScheduledBot`] status is a best-effort mirror.
#[derive(Debug, Clone, Serialize)]
pub struct BotSession {
    pub provider_bot_id: String,
    pub status: BotStatus,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Bot lifecycle state machine.
///
/// `pending -> scheduled` is owned by the scheduler; everything after
/// `scheduled` is driven by provider webhooks. `error` is terminal and
/// reachable from any state. `completed` is set by the downstream
/// evaluation pipeline, never by this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Pending,
    Scheduled,
    Created,
    Joining,
    Recording,
    Processing,
    Completed,
    Error,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Pending => "pending",
            BotStatus::Scheduled => "scheduled",
            BotStatus::Created => "created",
            BotStatus::Joining => "joining",
            BotStatus::Recording => "recording",
            BotStatus::Processing => "processing",
            BotStatus::Completed => "completed",
            BotStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BotStatus::Completed | BotStatus::Error)
    }
}

impl FromStr for BotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BotStatus::Pending),
            "scheduled" => Ok(BotStatus::Scheduled),
            "created" => Ok(BotStatus::Created),
            "joining" => Ok(BotStatus::Joining),
            "recording" => Ok(BotStatus::Recording),
            "processing" => Ok(BotStatus::Processing),
            "completed" => Ok(BotStatus::Completed),
            "error" => Ok(BotStatus::Error),
            other => anyhow::bail!("unknown bot status: {other}"),
        }
    }
}
