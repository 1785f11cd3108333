pub mod calendar;
pub mod dispatch;
pub mod http;
pub mod provider;
mod scheduler;
pub mod tracing;
pub mod transcript;
pub mod webhook;

pub use calendar::{CalendarAccess, CalendarApi, CalendarApiError, CalendarEvent, TokenResponse};
pub use dispatch::{ChannelDispatcher, EvaluationDispatcher, EvaluationJob};
pub use provider::{BotProvider, BotRequest};
pub use scheduler::{builder::BotSchedulerBuilder, BotScheduler};
pub use transcript::{TranscriptBuffer, TranscriptSegment};
pub use webhook::{DispatchGuard, ProviderEvent, WebhookProcessor};
