//! # DataStore Module
//!
//! This module provides functionality for interacting with a Postgres
//! database to store and retrieve calendar connections, scheduled
//! recording bots and raw provider bot sessions.
//!
//! The module uses sqlx for database operations and provides an
//! abstraction layer for the queries the scheduler and the webhook
//! processor need.

mod datastore;
mod domain;

pub use datastore::postgres::PgDataStore;
pub use datastore::DataStore;
pub use domain::{
    BotSession, BotStatus, CalendarConnection, ConnectionStatus, NewScheduledBot, ScheduledBot,
};
