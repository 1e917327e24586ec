//! Fan-out of price ticks to live stream subscribers.
//!
//! The hub owns the registry of connections. Each connection gets an
//! unbounded channel; the transport layer drains it onto the socket.
//! Filtering happens here, centrally: a subscriber only receives ticks
//! for symbols it asked for.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle for one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One price update for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub ts: i64,
}

/// Control messages a stream client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { symbol: String },
    Unsubscribe { symbol: String },
}

struct Subscriber {
    sender: mpsc::UnboundedSender<PriceTick>,
    symbols: HashSet<String>,
}

#[derive(Default)]
pub struct PriceHub {
    connections: RwLock<HashMap<ConnectionId, Subscriber>>,
}

impl PriceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection with an empty symbol set and hands back the
    /// receiving end of its tick channel.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<PriceTick>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let total = {
            let mut connections = self.connections.write().unwrap();
            connections.insert(
                id,
                Subscriber {
                    sender: tx,
                    symbols: HashSet::new(),
                },
            );
            connections.len()
        };
        info!("price stream client {id} connected ({total} active)");
        (id, rx)
    }

    /// Removes a connection. Safe to call twice; the second call is a
    /// no-op so transport teardown and broadcast cleanup cannot race
    /// into an error.
    pub fn unregister(&self, id: ConnectionId) {
        let removed = self.connections.write().unwrap().remove(&id).is_some();
        if removed {
            info!("price stream client {id} disconnected");
        }
    }

    /// Adds a symbol to the connection's filter. Returns true when the
    /// symbol was newly added.
    pub fn subscribe(&self, id: ConnectionId, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return false;
        }
        let mut connections = self.connections.write().unwrap();
        match connections.get_mut(&id) {
            Some(sub) => {
                let added = sub.symbols.insert(symbol.clone());
                if added {
                    debug!("client {id} subscribed to {symbol}");
                }
                added
            }
            None => false,
        }
    }

    /// Drops a symbol from the filter. Unknown symbols are a no-op.
    pub fn unsubscribe(&self, id: ConnectionId, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        let mut connections = self.connections.write().unwrap();
        match connections.get_mut(&id) {
            Some(sub) => {
                let removed = sub.symbols.remove(&symbol);
                if removed {
                    debug!("client {id} unsubscribed from {symbol}");
                }
                removed
            }
            None => false,
        }
    }

    pub fn apply(&self, id: ConnectionId, message: &ClientMessage) {
        match message {
            ClientMessage::Subscribe { symbol } => {
                self.subscribe(id, symbol);
            }
            ClientMessage::Unsubscribe { symbol } => {
                self.unsubscribe(id, symbol);
            }
        }
    }

    /// Pushes one tick per subscribed symbol present in the snapshot to
    /// every live connection. Connections whose channel is gone are
    /// collected during the pass and removed afterwards, never while
    /// the registry is being iterated. Returns the number of ticks
    /// delivered.
    pub fn broadcast(&self, prices: &HashMap<String, f64>) -> usize {
        let ts = Utc::now().timestamp_millis();
        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();
        {
            let connections = self.connections.read().unwrap();
            for (id, sub) in connections.iter() {
                for symbol in &sub.symbols {
                    let Some(&price) = prices.get(symbol) else {
                        continue;
                    };
                    let tick = PriceTick {
                        symbol: symbol.clone(),
                        price,
                        ts,
                    };
                    if sub.sender.send(tick).is_err() {
                        dead.push(*id);
                        break;
                    }
                    delivered += 1;
                }
            }
        }
        if !dead.is_empty() {
            let mut connections = self.connections.write().unwrap();
            for id in dead {
                if connections.remove(&id).is_some() {
                    info!("price stream client {id} dropped (receiver gone)");
                }
            }
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    /// Sorted snapshot of one connection's filter, mainly for tests and
    /// diagnostics.
    pub fn subscriptions(&self, id: ConnectionId) -> Option<Vec<String>> {
        let connections = self.connections.read().unwrap();
        connections.get(&id).map(|sub| {
            let mut symbols: Vec<String> = sub.symbols.iter().cloned().collect();
            symbols.sort();
            symbols
        })
    }
}
