/// Client-side mirror of backend state, one slot per resource.
///
/// Reconciliation rule: the local value of a slot is the last value the backend
/// acknowledged. Every request that will overwrite a slot first takes a ticket from
/// it; a response only lands if its ticket is newer than the ticket of the value
/// currently held. Overlapping requests therefore resolve last-request-wins rather
/// than last-response-wins.
use std::fmt;

use storefront_common::model::{HistorySnapshot, Preferences, Product, Recommendation};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Products,
    Preferences,
    History,
    Recommendations,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Products => "products",
            Resource::Preferences => "preferences",
            Resource::History => "history",
            Resource::Recommendations => "recommendations",
        };
        f.write_str(name)
    }
}

/// Sequence token handed out by a slot before a request goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct Slot<T> {
    resource: Resource,
    value: T,
    issued: u64,
    applied: u64,
    resolved: u64,
}

impl<T> Slot<T> {
    fn new(resource: Resource, value: T) -> Self {
        Self {
            resource,
            value,
            issued: 0,
            applied: 0,
            resolved: 0,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Lands `value` if `ticket` is newer than the value held. Returns whether it landed.
    pub fn apply(&mut self, ticket: Ticket, value: T) -> bool {
        self.resolved = self.resolved.max(ticket.0);
        if ticket.0 <= self.applied {
            debug!(
                resource = %self.resource,
                ticket = ticket.0,
                applied = self.applied,
                "discarding stale response"
            );
            return false;
        }
        self.value = value;
        self.applied = ticket.0;
        true
    }

    /// Marks a ticket as finished without a value (the request failed).
    pub fn abandon(&mut self, ticket: Ticket) {
        self.resolved = self.resolved.max(ticket.0);
    }

    /// True while the newest issued ticket has not resolved yet.
    pub fn is_pending(&self) -> bool {
        self.issued > self.resolved
    }
}

#[derive(Debug)]
pub struct ClientCache {
    pub products: Slot<Vec<Product>>,
    pub preferences: Slot<Preferences>,
    pub history: Slot<HistorySnapshot>,
    pub recommendations: Slot<Vec<Recommendation>>,
}

impl Default for ClientCache {
    fn default() -> Self {
        Self {
            products: Slot::new(Resource::Products, Vec::new()),
            preferences: Slot::new(Resource::Preferences, Preferences::default()),
            history: Slot::new(Resource::History, HistorySnapshot::default()),
            recommendations: Slot::new(Resource::Recommendations, Vec::new()),
        }
    }
}
