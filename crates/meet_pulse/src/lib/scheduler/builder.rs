use meet_datastore::DataStore;

use crate::{calendar::CalendarAccess, provider::BotProvider, BotScheduler, CalendarApi};

pub struct BotSchedulerBuilder<D = (), C = (), P = ()> {
    webhook_url: String,
    store: D,
    calendar_api: C,
    provider: P,
    sync_horizon_days: i64,
}

impl BotSchedulerBuilder {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            store: (),
            calendar_api: (),
            provider: (),
            sync_horizon_days: 7,
        }
    }
}

impl<D, C, P> BotSchedulerBuilder<D, C, P> {
    pub fn store<D2: DataStore + Clone + Send + Sync + 'static>(
        self,
        store: D2,
    ) -> BotSchedulerBuilder<D2, C, P> {
        BotSchedulerBuilder {
            webhook_url: self.webhook_url,
            store,
            calendar_api: self.calendar_api,
            provider: self.provider,
            sync_horizon_days: self.sync_horizon_days,
        }
    }

    pub fn calendar_api<C2: CalendarApi + Send + Sync + 'static>(
        self,
        calendar_api: C2,
    ) -> BotSchedulerBuilder<D, C2, P> {
        BotSchedulerBuilder {
            webhook_url: self.webhook_url,
            store: self.store,
            calendar_api,
            provider: self.provider,
            sync_horizon_days: self.sync_horizon_days,
        }
    }

    pub fn provider<P2: BotProvider + Send + Sync + 'static>(
        self,
        provider: P2,
    ) -> BotSchedulerBuilder<D, C, P2> {
        BotSchedulerBuilder {
            webhook_url: self.webhook_url,
            store: self.store,
            calendar_api: self.calendar_api,
            provider,
            sync_horizon_days: self.sync_horizon_days,
        }
    }

    pub fn sync_horizon_days(mut self, days: i64) -> Self {
        self.sync_horizon_days = days;
        self
    }
}

impl<D, C, P> BotSchedulerBuilder<D, C, P>
where
    D: DataStore + Clone + Send + Sync + 'static,
    C: CalendarApi + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
{
    pub fn build(self) -> BotScheduler<D, C, P> {
        BotScheduler {
            calendar: CalendarAccess::new(self.store.clone(), self.calendar_api),
            store: self.store,
            provider: self.provider,
            webhook_url: self.webhook_url,
            sync_horizon_days: self.sync_horizon_days,
        }
    }
}
