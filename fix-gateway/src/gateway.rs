use actix::prelude::*;
use thiserror::Error;

use crate::hub::MarketDataHub;
use crate::journal::{Journal, JournalError};
use crate::market_maker::MarketMaker;
use crate::session::ClientSession;
use crate::settings::{OrderDefaults, PricingSettings, Settings};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Shared state handed to every HTTP handler.
pub struct Gateway {
    pub session: Addr<ClientSession>,
    pub hub: Addr<MarketDataHub>,
    pub orders: OrderDefaults,
    pub pricing: PricingSettings,
}

impl Gateway {
    /// Start the hub, market maker and session actors on the current system.
    pub fn start(settings: &Settings) -> Result<Self, GatewayError> {
        let journal = match settings.journal.path() {
            Some(path) => {
                info!("Journaling application messages to {}", path.display());
                Some(Journal::create(path)?)
            }
            None => None,
        };

        let hub = MarketDataHub::default().start();
        let venue = MarketMaker::new(&settings.market_maker).start();
        let session = ClientSession::new(
            settings.session.session_id(),
            venue,
            hub.clone(),
            journal,
        )
        .start();

        Ok(Self {
            session,
            hub,
            orders: settings.orders.clone(),
            pricing: settings.pricing.clone(),
        })
    }
}
