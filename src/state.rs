//! Application state shared across the web surface, scheduler, and fan-out.
//!
//! Constructed once at startup and passed explicitly to request handlers;
//! there are no ambient singletons.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::Config;
use crate::db::DbContext;
use crate::events::ObserverRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: DbContext,
    pub broker: Arc<Broker>,
    pub observers: Arc<ObserverRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: DbContext,
        broker: Arc<Broker>,
        observers: Arc<ObserverRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            broker,
            observers,
            config,
        }
    }
}
