pub mod calendar;
pub mod datastore;
pub mod dispatcher;
pub mod provider;
