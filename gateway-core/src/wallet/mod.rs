//! Futures wallet snapshot cache.
//!
//! Wallet balances back the margin check during execution, so lookups
//! must distinguish "no wallet for that currency" from "we could not
//! reach the venue". A missing wallet blocks an order outright; an
//! unreachable venue serves the previous snapshot as long as one
//! exists.

use crate::config::GatewayConfig;
use crate::exchange::{ExchangeError, WalletSource};
use crate::model::Wallet;
use log::{debug, warn};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a wallet lookup.
#[derive(Debug, Clone)]
pub enum WalletLookup {
    Found(Wallet),
    /// A snapshot exists but holds no wallet for the currency.
    Missing,
    /// No snapshot has ever been taken and the venue is unreachable
    /// (or credentials are not configured).
    Unavailable,
}

struct Snapshot {
    wallets: Vec<Wallet>,
    at: Instant,
}

pub struct WalletCache {
    source: Arc<dyn WalletSource>,
    snapshot: RwLock<Option<Snapshot>>,
    ttl: Duration,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl WalletCache {
    pub fn new(source: Arc<dyn WalletSource>, config: &GatewayConfig) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            ttl: Duration::from_secs_f64(config.wallet_ttl_secs),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the snapshot with a live fetch. Returns false when the
    /// fetch failed; the previous snapshot stays in place.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        match self.source.fetch_wallets().await {
            Ok(wallets) => {
                debug!("wallet snapshot refreshed ({} wallets)", wallets.len());
                *self.snapshot.write().unwrap() = Some(Snapshot {
                    wallets,
                    at: Instant::now(),
                });
                true
            }
            Err(ExchangeError::MissingCredentials) => {
                debug!("wallet refresh skipped: credentials not configured");
                false
            }
            Err(e) => {
                warn!("wallet refresh failed, serving previous snapshot: {e}");
                false
            }
        }
    }

    /// Looks up the wallet for one currency, refreshing first when the
    /// snapshot is stale or absent.
    pub async fn wallet(&self, currency: &str) -> WalletLookup {
        let currency = currency.trim().to_uppercase();
        if self.snapshot_fresh() {
            return self.lookup(&currency);
        }
        let _gate = self.refresh_gate.lock().await;
        if !self.snapshot_fresh() {
            self.refresh_locked().await;
        }
        self.lookup(&currency)
    }

    /// Live fetch for the wallets listing; also renews the snapshot.
    pub async fn refresh_and_list(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let _gate = self.refresh_gate.lock().await;
        let wallets = self.source.fetch_wallets().await?;
        *self.snapshot.write().unwrap() = Some(Snapshot {
            wallets: wallets.clone(),
            at: Instant::now(),
        });
        Ok(wallets)
    }

    fn snapshot_fresh(&self) -> bool {
        let snap = self.snapshot.read().unwrap();
        matches!(snap.as_ref(), Some(s) if s.at.elapsed() <= self.ttl)
    }

    fn lookup(&self, currency: &str) -> WalletLookup {
        let snap = self.snapshot.read().unwrap();
        match snap.as_ref() {
            Some(s) => match s.wallets.iter().find(|w| w.currency == currency) {
                Some(w) => WalletLookup::Found(w.clone()),
                None => WalletLookup::Missing,
            },
            None => WalletLookup::Unavailable,
        }
    }
}
