//! In-memory order queue.
//!
//! Orders accumulate here until an execution pass claims them. The
//! queue is the single owner of order state: every transition happens
//! under its lock, which is what makes "claim exactly once" hold when
//! two execution requests race over the same identifiers.

use crate::model::{OrderDraft, OrderStatus, QueuedOrder};
use log::info;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("order {id} not found")]
    NotFound { id: u64 },
    #[error("order {id} is {status}; only queued orders can be modified")]
    NotEditable { id: u64, status: OrderStatus },
    #[error("bulk request of {given} orders exceeds the limit of {max}")]
    BulkTooLarge { given: usize, max: usize },
}

/// Result of claiming a set of identifiers for execution.
#[derive(Debug, Default)]
pub struct ClaimedBatch {
    /// Snapshots of the claimed orders, now marked pending.
    pub claimed: Vec<QueuedOrder>,
    pub not_found: Vec<u64>,
    /// Identifiers that exist but are not in the queued state, e.g.
    /// already claimed by a concurrent execution pass.
    pub not_executable: Vec<u64>,
}

/// How a claimed order's execution ended.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Submitted { client_order_id: String },
    Failed { error: String },
}

struct QueueInner {
    orders: BTreeMap<u64, QueuedOrder>,
    next_id: u64,
}

pub struct OrderQueue {
    inner: Mutex<QueueInner>,
    max_bulk: usize,
}

impl OrderQueue {
    pub fn new(max_bulk: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                orders: BTreeMap::new(),
                next_id: 1,
            }),
            max_bulk,
        }
    }

    /// Accepts one validated draft and assigns it the next identifier.
    pub fn create(&self, draft: &OrderDraft) -> QueuedOrder {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let order = QueuedOrder::new(id, draft);
        inner.orders.insert(id, order.clone());
        info!(
            "queued order {id}: {} {} qty {} lev {}x",
            order.side(),
            order.symbol(),
            order.qty(),
            order.leverage()
        );
        order
    }

    /// Accepts a batch atomically. Nothing is queued when the batch
    /// exceeds the bulk cap.
    pub fn bulk_create(&self, drafts: &[OrderDraft]) -> Result<Vec<QueuedOrder>, QueueError> {
        if drafts.len() > self.max_bulk {
            return Err(QueueError::BulkTooLarge {
                given: drafts.len(),
                max: self.max_bulk,
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = inner.next_id;
            inner.next_id += 1;
            let order = QueuedOrder::new(id, draft);
            inner.orders.insert(id, order.clone());
            out.push(order);
        }
        info!("queued {} orders in bulk", out.len());
        Ok(out)
    }

    /// Replaces the fields of a still-queued order with a new draft.
    pub fn update(&self, id: u64, draft: &OrderDraft) -> Result<QueuedOrder, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(QueueError::NotFound { id })?;
        if order.status() != OrderStatus::Queued {
            return Err(QueueError::NotEditable {
                id,
                status: order.status(),
            });
        }
        order.apply_draft(draft);
        Ok(order.clone())
    }

    /// Removes a still-queued order. The returned snapshot is stamped
    /// cancelled so callers see a terminal state.
    pub fn delete(&self, id: u64) -> Result<QueuedOrder, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let status = inner
            .orders
            .get(&id)
            .map(QueuedOrder::status)
            .ok_or(QueueError::NotFound { id })?;
        if status != OrderStatus::Queued {
            return Err(QueueError::NotEditable { id, status });
        }
        let mut order = inner.orders.remove(&id).ok_or(QueueError::NotFound { id })?;
        order.set_status(OrderStatus::Cancelled);
        info!("cancelled queued order {id}");
        Ok(order)
    }

    /// Drops every order still in the queued state, leaving terminal
    /// records untouched. Returns how many were removed.
    pub fn clear_queued(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.orders.len();
        inner
            .orders
            .retain(|_, order| order.status() != OrderStatus::Queued);
        let removed = before - inner.orders.len();
        if removed > 0 {
            info!("cleared {removed} queued orders");
        }
        removed
    }

    /// All orders, newest first, optionally narrowed to one status.
    pub fn list(&self, status: Option<OrderStatus>) -> Vec<QueuedOrder> {
        let inner = self.inner.lock().unwrap();
        inner
            .orders
            .values()
            .rev()
            .filter(|order| status.map_or(true, |s| order.status() == s))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<QueuedOrder> {
        self.inner.lock().unwrap().orders.get(&id).cloned()
    }

    /// Number of records held, terminal ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().orders.is_empty()
    }

    pub fn queued_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .orders
            .values()
            .filter(|o| o.status() == OrderStatus::Queued)
            .count()
    }

    /// Claims the queued orders among `ids` by flipping them to pending
    /// inside one lock hold. A given identifier can only ever be
    /// claimed by one caller; duplicates within `ids` are claimed once
    /// and then reported as not executable.
    pub fn take_for_execution(&self, ids: &[u64]) -> ClaimedBatch {
        let mut inner = self.inner.lock().unwrap();
        let mut batch = ClaimedBatch::default();
        for &id in ids {
            match inner.orders.get_mut(&id) {
                None => batch.not_found.push(id),
                Some(order) if order.status() != OrderStatus::Queued => {
                    batch.not_executable.push(id);
                }
                Some(order) => {
                    order.set_status(OrderStatus::Pending);
                    batch.claimed.push(order.clone());
                }
            }
        }
        batch
    }

    /// Hands a claimed order back without settling it. Only a pending
    /// record flips back to queued; anything settled in the meantime is
    /// left alone.
    pub fn release_claim(&self, id: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.orders.get_mut(&id) {
            Some(order) if order.status() == OrderStatus::Pending => {
                order.set_status(OrderStatus::Queued);
                true
            }
            _ => false,
        }
    }

    /// Settles a claimed order. Success removes the record and returns
    /// it stamped executed; failure keeps it with the error attached so
    /// clients can inspect what happened.
    pub fn finish_execution(&self, id: u64, outcome: ExecutionOutcome) -> Option<QueuedOrder> {
        let mut inner = self.inner.lock().unwrap();
        match outcome {
            ExecutionOutcome::Submitted { client_order_id } => {
                let mut order = inner.orders.remove(&id)?;
                info!("order {id} executed as {client_order_id}");
                order.mark_executed(client_order_id);
                Some(order)
            }
            ExecutionOutcome::Failed { error } => {
                let order = inner.orders.get_mut(&id)?;
                order.mark_failed(error);
                Some(order.clone())
            }
        }
    }
}
