//! Per-record step scheduling.
//!
//! Step requests arrive from many places at once (direct calls, RPC, store
//! notifications). [`StepScheduler`] makes sure that on one client at most one
//! step runs per record, and that a burst of requests arriving while a step
//! runs collapses into a single follow-up execution.
//!
//! Bookkeeping per record is a queue number, a lock count and a queue of
//! parked continuations:
//!
//! 1. every request takes a ticket (the incremented queue number);
//! 2. if the lock is free it runs, otherwise it parks a continuation;
//! 3. on release one continuation is resumed;
//! 4. a resumed request whose ticket is no longer the newest returns as
//!    coalesced and hands the baton on, the newest one runs.
//!
//! Inside a run the handler is called repeatedly while it reports a
//! transition, so self-chaining steps (`idle` popping the next flow step)
//! execute as a loop bounded by `max_chain_steps`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use activation_core::MessageId;

use crate::api::{Result, RuntimeError};

/// What one handler invocation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The state moved; the handler should run again.
    Transitioned,
    /// Nothing to do on this client right now.
    Parked,
    /// The record is finished or gone.
    Terminal,
}

/// Result of a step request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheduled {
    Executed {
        transitions: usize,
        outcome: StepOutcome,
    },
    /// A newer request covered this one.
    Coalesced,
}

#[derive(Default)]
struct Slot {
    queue_number: u64,
    lock_count: u32,
    continuations: VecDeque<oneshot::Sender<()>>,
    retired: bool,
}

impl Slot {
    fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    /// Resumes the oldest live continuation; false if none was waiting.
    fn wake_next(&mut self) -> bool {
        while let Some(waiter) = self.continuations.pop_front() {
            if waiter.send(()).is_ok() {
                return true;
            }
        }
        false
    }
}

enum Admission {
    Run,
    Wait(oneshot::Receiver<()>),
    Coalesced,
}

/// Client-local re-entrancy guard keyed by record id.
pub struct StepScheduler {
    slots: Mutex<HashMap<MessageId, Slot>>,
    max_chain_steps: usize,
}

impl StepScheduler {
    pub fn new(max_chain_steps: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            max_chain_steps: max_chain_steps.max(1),
        }
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<MessageId, Slot>>> {
        self.slots.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    /// Runs `work` for `id` under the per-record lock.
    ///
    /// `work` is called once per transition until it reports something other
    /// than [`StepOutcome::Transitioned`].
    pub async fn request_step<F, Fut>(&self, id: &MessageId, mut work: F) -> Result<Scheduled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<StepOutcome>>,
    {
        let ticket = {
            let mut slots = self.slots()?;
            let slot = slots.entry(id.clone()).or_default();
            slot.queue_number += 1;
            slot.queue_number
        };

        let mut resumed = false;
        loop {
            match self.admit(id, ticket, resumed)? {
                Admission::Run => break,
                Admission::Coalesced => {
                    trace!(target: "activation::scheduler", record = %id, ticket, "coalesced");
                    return Ok(Scheduled::Coalesced);
                }
                Admission::Wait(continuation) => {
                    // A dropped sender means the slot was retired; re-check either way.
                    let _ = continuation.await;
                    resumed = true;
                }
            }
        }

        let mut lock = HeldLock {
            scheduler: self,
            id,
            terminal: false,
        };

        let mut transitions = 0;
        let outcome = loop {
            match work().await {
                Ok(StepOutcome::Transitioned) => {
                    transitions += 1;
                    if transitions >= self.max_chain_steps {
                        warn!(
                            target: "activation::scheduler",
                            record = %id,
                            transitions,
                            "chain limit reached, yielding"
                        );
                        break StepOutcome::Transitioned;
                    }
                }
                Ok(outcome) => break outcome,
                Err(err) => {
                    error!(
                        target: "activation::scheduler",
                        record = %id,
                        transitions,
                        error = %err,
                        "step failed"
                    );
                    return Err(err);
                }
            }
        };

        lock.terminal = outcome == StepOutcome::Terminal;
        debug!(
            target: "activation::scheduler",
            record = %id,
            transitions,
            ?outcome,
            "step executed"
        );
        Ok(Scheduled::Executed {
            transitions,
            outcome,
        })
    }

    fn admit(&self, id: &MessageId, ticket: u64, resumed: bool) -> Result<Admission> {
        let mut slots = self.slots()?;
        let slot = slots.entry(id.clone()).or_default();

        if resumed && ticket != slot.queue_number {
            if !slot.is_locked() {
                slot.wake_next();
            }
            return Ok(Admission::Coalesced);
        }

        if !slot.is_locked() {
            slot.lock_count += 1;
            return Ok(Admission::Run);
        }

        let (resume, continuation) = oneshot::channel();
        slot.continuations.push_back(resume);
        Ok(Admission::Wait(continuation))
    }

    fn release(&self, id: &MessageId, terminal: bool) {
        let Ok(mut slots) = self.slots.lock() else {
            error!(target: "activation::scheduler", record = %id, "lock poisoned on release");
            return;
        };
        let Some(slot) = slots.get_mut(id) else {
            return;
        };

        slot.lock_count = slot.lock_count.saturating_sub(1);
        if slot.is_locked() {
            return;
        }
        if !slot.wake_next() && (terminal || slot.retired) {
            slots.remove(id);
        }
    }

    /// Drops the bookkeeping for a deleted record once it is idle.
    pub fn forget(&self, id: &MessageId) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        match slots.get_mut(id) {
            Some(slot) if slot.is_locked() || !slot.continuations.is_empty() => {
                slot.retired = true;
            }
            Some(_) => {
                slots.remove(id);
            }
            None => {}
        }
    }

    /// Number of records with live bookkeeping.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    /// Returns true while a step for `id` is executing.
    pub fn is_running(&self, id: &MessageId) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.get(id).is_some_and(Slot::is_locked))
            .unwrap_or(false)
    }
}

/// Releases the per-record lock even when the running future is dropped.
struct HeldLock<'a> {
    scheduler: &'a StepScheduler,
    id: &'a MessageId,
    terminal: bool,
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        self.scheduler.release(self.id, self.terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn id() -> MessageId {
        MessageId::from("Message.1")
    }

    #[tokio::test]
    async fn single_request_runs_and_terminal_slot_is_dropped() {
        let scheduler = StepScheduler::new(8);
        let result = scheduler
            .request_step(&id(), || async { Ok(StepOutcome::Terminal) })
            .await
            .unwrap();

        assert_eq!(result, Scheduled::Executed {
            transitions: 0,
            outcome: StepOutcome::Terminal,
        });
        assert_eq!(scheduler.tracked(), 0);
    }

    #[tokio::test]
    async fn transitions_are_chained_until_parked() {
        let scheduler = StepScheduler::new(8);
        let calls = AtomicUsize::new(0);
        let result = scheduler
            .request_step(&id(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(if n < 3 {
                        StepOutcome::Transitioned
                    } else {
                        StepOutcome::Parked
                    })
                }
            })
            .await
            .unwrap();

        assert_eq!(result, Scheduled::Executed {
            transitions: 3,
            outcome: StepOutcome::Parked,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(scheduler.tracked(), 1);
    }

    #[tokio::test]
    async fn chain_is_bounded() {
        let scheduler = StepScheduler::new(4);
        let result = scheduler
            .request_step(&id(), || async { Ok(StepOutcome::Transitioned) })
            .await
            .unwrap();
        assert_eq!(result, Scheduled::Executed {
            transitions: 4,
            outcome: StepOutcome::Transitioned,
        });
    }

    #[tokio::test]
    async fn failed_step_releases_the_lock() {
        let scheduler = StepScheduler::new(4);
        let err = scheduler
            .request_step(&id(), || async {
                Err(RuntimeError::RecordNotFound { id: id() })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::RecordNotFound { .. }));
        assert!(!scheduler.is_running(&id()));

        let again = scheduler
            .request_step(&id(), || async { Ok(StepOutcome::Parked) })
            .await
            .unwrap();
        assert!(matches!(again, Scheduled::Executed { .. }));
    }

    #[tokio::test]
    async fn burst_during_execution_yields_one_follow_up() {
        const BURST: usize = 5;

        let scheduler = Arc::new(StepScheduler::new(8));
        let executions = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(Notify::new());

        let spawn_request = || {
            let scheduler = scheduler.clone();
            let executions = executions.clone();
            let in_flight = in_flight.clone();
            let overlapped = overlapped.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                scheduler
                    .request_step(&id(), || {
                        let executions = executions.clone();
                        let in_flight = in_flight.clone();
                        let overlapped = overlapped.clone();
                        let gate = gate.clone();
                        async move {
                            if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                                overlapped.store(true, Ordering::SeqCst);
                            }
                            if executions.fetch_add(1, Ordering::SeqCst) == 0 {
                                gate.notified().await;
                            }
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(StepOutcome::Parked)
                        }
                    })
                    .await
            })
        };

        let first = spawn_request();
        while executions.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let burst: Vec<_> = (0..BURST).map(|_| spawn_request()).collect();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let mut results = vec![first.await.unwrap().unwrap()];
        for handle in burst {
            results.push(handle.await.unwrap().unwrap());
        }

        let executed = results
            .iter()
            .filter(|r| matches!(r, Scheduled::Executed { .. }))
            .count();
        assert_eq!(executions.load(Ordering::SeqCst), 2);
        assert_eq!(executed, 2);
        assert_eq!(results.len() - executed, BURST - 1);
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn forget_drops_idle_slots() {
        let scheduler = StepScheduler::new(4);
        scheduler
            .request_step(&id(), || async { Ok(StepOutcome::Parked) })
            .await
            .unwrap();
        assert_eq!(scheduler.tracked(), 1);
        scheduler.forget(&id());
        assert_eq!(scheduler.tracked(), 0);
    }
}
