// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One-shot response handles and the per-category table that holds them
// while the provider works.

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use visit_sdk_core::config::PendingPolicy;
use visit_sdk_core::error::{BridgeError, Result};
use visit_sdk_core::types::{MethodResponse, PendingCategory};

/// Exactly one response owed to a caller.
///
/// Every resolving method consumes the handle, so a second resolution
/// cannot be expressed.
#[derive(Debug)]
pub struct PendingResult {
    method: String,
    tx: oneshot::Sender<Result<MethodResponse>>,
}

/// Caller side of a [`PendingResult`].
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<MethodResponse>>,
}

impl PendingResult {
    pub fn channel(method: impl Into<String>) -> (Self, PendingReply) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                method: method.into(),
                tx,
            },
            PendingReply { rx },
        )
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Deliver `response`. Returns `false` if the caller stopped waiting.
    pub fn resolve(self, response: MethodResponse) -> bool {
        self.send(Ok(response))
    }

    pub fn success(self, value: impl Into<Value>) -> bool {
        self.resolve(MethodResponse::success(value))
    }

    pub fn error(self, code: &str, message: impl Into<String>) -> bool {
        self.resolve(MethodResponse::error(code, message))
    }

    pub fn not_implemented(self) -> bool {
        self.resolve(MethodResponse::NotImplemented)
    }

    /// Give up on the call without a channel reply; the caller observes `err`.
    pub fn abandon(self, err: BridgeError) -> bool {
        self.send(Err(err))
    }

    fn send(self, outcome: Result<MethodResponse>) -> bool {
        let delivered = self.tx.send(outcome).is_ok();
        if !delivered {
            debug!(method = %self.method, "caller went away before the reply");
        }
        delivered
    }
}

impl PendingReply {
    /// Wait for the reply. A handle dropped without resolution reads as
    /// [`BridgeError::ControllerClosed`].
    pub async fn wait(self) -> Result<MethodResponse> {
        self.rx.await.unwrap_or(Err(BridgeError::ControllerClosed))
    }
}

/// How a stored call is expected to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    /// The provider is working on it and will call back.
    Active,
    /// Nothing is in progress for it: a side-channel call, or a data call
    /// left waiting while disconnected. Any later call may take the slot.
    Parked,
}

#[derive(Debug)]
struct Slot {
    ticket: u64,
    hold: Hold,
    pending: PendingResult,
}

/// At most one [`PendingResult`] per [`PendingCategory`].
#[derive(Debug)]
pub struct PendingTable {
    policy: PendingPolicy,
    general: Option<Slot>,
    status: Option<Slot>,
    data: Option<Slot>,
    next_ticket: u64,
}

impl PendingTable {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            policy,
            general: None,
            status: None,
            data: None,
            next_ticket: 1,
        }
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    /// Store `pending` in its category slot and return its ticket.
    ///
    /// With [`PendingPolicy::Supersede`] an occupied slot is taken over and
    /// the previous caller is abandoned with [`BridgeError::Orphaned`]. With
    /// [`PendingPolicy::Reject`] the new handle is handed back untouched,
    /// unless the current occupant is [`Hold::Parked`], which is always
    /// taken over.
    pub fn store(
        &mut self,
        category: PendingCategory,
        pending: PendingResult,
        hold: Hold,
    ) -> std::result::Result<u64, PendingResult> {
        let policy = self.policy;
        let ticket = self.next_ticket;
        let slot = self.slot_mut(category);

        match (slot.take(), policy) {
            (Some(existing), PendingPolicy::Reject) if existing.hold == Hold::Active => {
                debug!(
                    %category,
                    held_by = existing.pending.method(),
                    rejected = pending.method(),
                    "slot busy; rejecting call"
                );
                *slot = Some(existing);
                return Err(pending);
            }
            (Some(old), _) => {
                warn!(
                    %category,
                    orphaned = old.pending.method(),
                    by = pending.method(),
                    parked = old.hold == Hold::Parked,
                    "pending call superseded"
                );
                old.pending.abandon(BridgeError::Orphaned);
            }
            (None, _) => {}
        }

        *slot = Some(Slot {
            ticket,
            hold,
            pending,
        });
        self.next_ticket += 1;
        Ok(ticket)
    }

    /// Take whatever is stored in `category`.
    pub fn take(&mut self, category: PendingCategory) -> Option<PendingResult> {
        self.slot_mut(category).take().map(|slot| slot.pending)
    }

    /// Take the stored handle only if it is the one `ticket` was issued for.
    pub fn take_ticket(&mut self, category: PendingCategory, ticket: u64) -> Option<PendingResult> {
        let slot = self.slot_mut(category);
        if slot.as_ref().is_some_and(|current| current.ticket == ticket) {
            slot.take().map(|s| s.pending)
        } else {
            None
        }
    }

    pub fn is_pending(&self, category: PendingCategory) -> bool {
        match category {
            PendingCategory::General => self.general.is_some(),
            PendingCategory::Status => self.status.is_some(),
            PendingCategory::Data => self.data.is_some(),
        }
    }

    /// Empty every slot.
    pub fn drain(&mut self) -> Vec<PendingResult> {
        [&mut self.general, &mut self.status, &mut self.data]
            .into_iter()
            .filter_map(|slot| slot.take().map(|s| s.pending))
            .collect()
    }

    fn slot_mut(&mut self, category: PendingCategory) -> &mut Option<Slot> {
        match category {
            PendingCategory::General => &mut self.general,
            PendingCategory::Status => &mut self.status,
            PendingCategory::Data => &mut self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visit_sdk_core::error::codes;

    #[tokio::test]
    async fn resolve_delivers_once() {
        let (pending, reply) = PendingResult::channel("getHealthConnectStatus");
        assert!(pending.success("CONNECTED"));
        assert_eq!(reply.wait().await.unwrap(), MethodResponse::success("CONNECTED"));
    }

    #[tokio::test]
    async fn dropped_handle_reads_as_closed() {
        let (pending, reply) = PendingResult::channel("askForFitnessPermission");
        drop(pending);
        assert!(matches!(reply.wait().await, Err(BridgeError::ControllerClosed)));
    }

    #[test]
    fn resolving_after_caller_left_is_harmless() {
        let (pending, reply) = PendingResult::channel("requestDailyFitnessData");
        drop(reply);
        assert!(!pending.error(codes::UNAVAILABLE, "gone"));
    }

    #[tokio::test]
    async fn supersede_orphans_the_older_caller() {
        let mut table = PendingTable::new(PendingPolicy::Supersede);
        let (first, first_reply) = PendingResult::channel("getHealthConnectStatus");
        let (second, second_reply) = PendingResult::channel("getHealthConnectStatus");

        let first_ticket = table.store(PendingCategory::Status, first, Hold::Active).unwrap();
        let second_ticket = table.store(PendingCategory::Status, second, Hold::Active).unwrap();
        assert_ne!(first_ticket, second_ticket);

        assert!(matches!(first_reply.wait().await, Err(BridgeError::Orphaned)));
        assert!(table.take_ticket(PendingCategory::Status, first_ticket).is_none());

        let current = table.take_ticket(PendingCategory::Status, second_ticket).unwrap();
        current.success("INSTALLED");
        assert_eq!(
            second_reply.wait().await.unwrap(),
            MethodResponse::success("INSTALLED")
        );
    }

    #[test]
    fn reject_keeps_the_older_caller() {
        let mut table = PendingTable::new(PendingPolicy::Reject);
        let (first, _first_reply) = PendingResult::channel("askForFitnessPermission");
        let (second, _second_reply) = PendingResult::channel("openHealthConnectApp");

        table.store(PendingCategory::General, first, Hold::Active).unwrap();
        let bounced = table
            .store(PendingCategory::General, second, Hold::Active)
            .unwrap_err();
        assert_eq!(bounced.method(), "openHealthConnectApp");
        assert_eq!(
            table.take(PendingCategory::General).unwrap().method(),
            "askForFitnessPermission"
        );
    }

    #[test]
    fn categories_are_independent() {
        let mut table = PendingTable::new(PendingPolicy::Reject);
        let (a, _ra) = PendingResult::channel("getHealthConnectStatus");
        let (b, _rb) = PendingResult::channel("requestDailyFitnessData");
        table.store(PendingCategory::Status, a, Hold::Active).unwrap();
        table.store(PendingCategory::Data, b, Hold::Parked).unwrap();
        assert!(table.is_pending(PendingCategory::Status));
        assert!(table.is_pending(PendingCategory::Data));
        assert!(!table.is_pending(PendingCategory::General));
        assert_eq!(table.drain().len(), 2);
        assert!(!table.is_pending(PendingCategory::Data));
    }

    #[tokio::test]
    async fn reject_yields_parked_slot() {
        let mut table = PendingTable::new(PendingPolicy::Reject);
        let (opened, opened_reply) = PendingResult::channel("openHealthConnectApp");
        let (asked, asked_reply) = PendingResult::channel("askForFitnessPermission");
        let (again, _again_reply) = PendingResult::channel("askForFitnessPermission");

        table
            .store(PendingCategory::General, opened, Hold::Parked)
            .unwrap();
        table
            .store(PendingCategory::General, asked, Hold::Active)
            .unwrap();
        assert!(matches!(opened_reply.wait().await, Err(BridgeError::Orphaned)));

        // An active occupant is still protected.
        let bounced = table
            .store(PendingCategory::General, again, Hold::Parked)
            .unwrap_err();
        assert_eq!(bounced.method(), "askForFitnessPermission");

        table.take(PendingCategory::General).unwrap().success("GRANTED");
        assert_eq!(
            asked_reply.wait().await.unwrap(),
            MethodResponse::success("GRANTED")
        );
    }
}
