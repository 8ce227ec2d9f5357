// 11.0: every state change produces an event. used for audit trails, keeper
// bots watching for pending conversions, and off-chain reconstruction of the ledger.

use crate::conversion::{CancelReason, ConversionKey, Direction};
use crate::types::{AccountId, Address, AssetId, Timestamp, Wei};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Conversion events
    ConversionInitiated(ConversionInitiatedEvent),
    ConversionExecuted(ConversionExecutedEvent),
    ConversionCancelled(ConversionCancelledEvent),
    ConversionRetried(ConversionRetriedEvent),
    ConversionForceUnfrozen(ConversionForceUnfrozenEvent),

    // Liquidation events
    AccountLiquidated(AccountLiquidatedEvent),
    LiquidationIntentAttached(LiquidationIntentAttachedEvent),
    ExpirySet(ExpirySetEvent),

    // Ledger events
    BalanceChanged(BalanceChangedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionInitiatedEvent {
    pub key: ConversionKey,
    pub vault: Address,
    pub account_number: u64,
    pub direction: Direction,
    pub input_asset: AssetId,
    pub input_amount: Wei,
    pub output_asset: AssetId,
    pub min_output: Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionExecutedEvent {
    pub key: ConversionKey,
    pub output_amount: Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionCancelledEvent {
    pub key: ConversionKey,
    pub reason: CancelReason,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRetriedEvent {
    pub key: ConversionKey,
    pub attempt: u32,
    pub min_output: Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionForceUnfrozenEvent {
    pub key: ConversionKey,
    pub operator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLiquidatedEvent {
    pub solid: AccountId,
    pub liquid: AccountId,
    pub held_asset: AssetId,
    pub owed_asset: AssetId,
    /// owed debt covered
    pub repaid: Wei,
    /// solid account's gain, in the owed asset
    pub reward: Wei,
    /// zero for an immediate liquidation
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationIntentAttachedEvent {
    pub key: ConversionKey,
    pub solid: AccountId,
    pub owed_asset: AssetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirySetEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub delta: Wei,
    pub new_balance: Wei,
}

/// Bounded audit log. ids keep counting after the oldest events are dropped,
/// so a consumer can tell it missed something.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    capacity: usize,
    next_id: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) -> &Event {
        let event = Event::new(EventId(self.next_id), timestamp, payload);
        self.next_id += 1;
        self.events.push(event);

        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
