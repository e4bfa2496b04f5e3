//! Single-slot readiness handshake between two stages
//!
//! The slot holds the consumer's readiness and a count of deposited items
//! not yet taken. The consumer signals ready when it can take an item; the
//! producer clears readiness by depositing one. Readiness is only granted
//! while nothing is waiting, so a deposit made without waiting for
//! readiness is never lost.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::RunControl;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SlotState {
    ready: bool,
    pending: u32,
}

struct Slot {
    name: String,
    state: watch::Sender<SlotState>,
}

impl Slot {
    fn update(&self, side: &str, f: impl FnOnce(&mut SlotState)) {
        let mut previous = SlotState::default();
        self.state.send_modify(|state| {
            previous = *state;
            f(state);
        });
        let current = *self.state.borrow();
        debug!(
            handshake = %self.name,
            side,
            ready = current.ready,
            pending = current.pending,
            was_ready = previous.ready,
            "handshake: set"
        );
    }

    fn current(&self) -> SlotState {
        *self.state.borrow()
    }

    /// Wait until `f` holds, or the run stops
    async fn wait_until(&self, run: &RunControl, f: impl Fn(&SlotState) -> bool) -> bool {
        let mut rx = self.state.subscribe();
        tokio::select! {
            seen = async { rx.wait_for(|state| f(state)).await.is_ok() } => seen && run.is_running(),
            _ = run.stopped() => false,
        }
    }
}

/// Create a handshake, returning its producer and consumer ends
///
/// `initially_ready` is the consumer's readiness at startup.
pub fn handshake(name: impl Into<String>, initially_ready: bool) -> (Producer, Consumer) {
    let (state, _rx) = watch::channel(SlotState {
        ready: initially_ready,
        pending: 0,
    });
    let slot = Arc::new(Slot {
        name: name.into(),
        state,
    });
    (Producer { slot: slot.clone() }, Consumer { slot })
}

/// The upstream end: deposits items
pub struct Producer {
    slot: Arc<Slot>,
}

impl Producer {
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn is_consumer_ready(&self) -> bool {
        self.slot.current().ready
    }

    /// Wait for the consumer to be ready; false if the run stopped first
    pub async fn wait_ready(&self, run: &RunControl) -> bool {
        self.slot.wait_until(run, |state| state.ready).await
    }

    /// Hand the item over; the consumer now owns the shared belt
    pub fn item_deposited(&self) {
        self.slot.update("producer", |state| {
            state.ready = false;
            state.pending += 1;
        });
    }
}

/// The downstream end: takes items
pub struct Consumer {
    slot: Arc<Slot>,
}

impl Consumer {
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// True while a deposited item has not been taken
    pub fn has_item(&self) -> bool {
        self.slot.current().pending > 0
    }

    /// Signal readiness for the next item
    ///
    /// Ignored while an item is still waiting to be taken.
    pub fn ready(&self) {
        self.slot.update("consumer", |state| {
            if state.pending == 0 {
                state.ready = true;
            }
        });
    }

    /// Wait for a deposited item and take it; false if the run stopped first
    pub async fn wait_item(&self, run: &RunControl) -> bool {
        if !self.slot.wait_until(run, |state| state.pending > 0).await {
            return false;
        }
        self.slot.update("consumer", |state| state.pending = state.pending.saturating_sub(1));
        true
    }
}
