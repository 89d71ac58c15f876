//! Scheduling of BSP traffic.
//!
//! Every message that enters or leaves the manager is classified into one of three scheduling
//! classes and admitted through [`MessageGate`]:
//!
//! * `StateChange` messages are a barrier: they wait for every earlier state change and state
//!   read to finish, and later messages wait for them.
//! * `StateRead` messages may run concurrently with each other.
//! * `TaskProgress` messages are serialized among themselves but are independent of state
//!   reads and changes.
//!
//! Admission is FIFO-fair: a state read enqueued after a state change does not overtake it.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use bsp_types::notifications::Notification as _;
use bsp_types::requests::Request as _;
use bsp_types::{notifications, requests};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Changes the state of the build system (or of the manager's caches) and must be ordered
    /// with respect to every read.
    StateChange,
    /// Reads build-system state without modifying it.
    StateRead,
    /// Progress bookkeeping, independent of the build-system state.
    TaskProgress,
}

const STATE_READ_METHODS: &[&str] = &[
    requests::WorkspaceBuildTargets::METHOD,
    requests::BuildTargetSources::METHOD,
    requests::BuildTargetPrepare::METHOD,
    requests::TextDocumentSourceKitOptions::METHOD,
    requests::TextDocumentRegisterForChanges::METHOD,
    requests::WorkspaceWaitForBuildSystemUpdates::METHOD,
];

const TASK_PROGRESS_METHODS: &[&str] = &[
    notifications::OnBuildTaskStart::METHOD,
    notifications::OnBuildTaskProgress::METHOD,
    notifications::OnBuildTaskFinish::METHOD,
    notifications::OnBuildLogMessage::METHOD,
];

/// Assigns a scheduling class to a BSP method. Initialize/shutdown, target changes and
/// watched-files changes mutate state; unknown methods are conservatively treated the same
/// way.
pub fn classify(method: &str) -> MessageClass {
    if STATE_READ_METHODS.contains(&method) {
        MessageClass::StateRead
    } else if TASK_PROGRESS_METHODS.contains(&method) {
        MessageClass::TaskProgress
    } else {
        MessageClass::StateChange
    }
}

#[derive(Default)]
struct GateState {
    next_ticket: u64,
    /// Tickets that have been issued but not yet admitted, oldest first.
    waiting: VecDeque<(u64, MessageClass)>,
    active_readers: usize,
    writer_active: bool,
    progress_active: bool,
}

impl GateState {
    fn may_enter(&self, ticket: u64, class: MessageClass) -> bool {
        match class {
            MessageClass::StateChange => {
                !self.writer_active
                    && self.active_readers == 0
                    && self.is_first_of(ticket, |c| {
                        matches!(c, MessageClass::StateChange | MessageClass::StateRead)
                    })
            }
            MessageClass::StateRead => {
                !self.writer_active && !self.earlier_waiter_exists(ticket, MessageClass::StateChange)
            }
            MessageClass::TaskProgress => {
                !self.progress_active && self.is_first_of(ticket, |c| c == MessageClass::TaskProgress)
            }
        }
    }

    fn is_first_of(&self, ticket: u64, pred: impl Fn(MessageClass) -> bool) -> bool {
        self.waiting
            .iter()
            .filter(|(_, c)| pred(*c))
            .map(|(t, _)| *t)
            .min()
            == Some(ticket)
    }

    fn earlier_waiter_exists(&self, ticket: u64, class: MessageClass) -> bool {
        self.waiting
            .iter()
            .any(|(t, c)| *t < ticket && *c == class)
    }

    fn remove_waiter(&mut self, ticket: u64) {
        self.waiting.retain(|(t, _)| *t != ticket);
    }
}

pub struct MessageGate {
    state: Mutex<GateState>,
    admitted: Condvar,
}

impl Default for MessageGate {
    fn default() -> Self {
        MessageGate::new()
    }
}

impl MessageGate {
    pub fn new() -> MessageGate {
        MessageGate {
            state: Mutex::new(GateState::default()),
            admitted: Condvar::new(),
        }
    }

    /// Blocks until a message of the given class may be handled and returns a permit that must
    /// be held for the duration of the handling.
    pub fn enter(self: &Arc<Self>, class: MessageClass) -> GatePermit {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiting.push_back((ticket, class));

            while !state.may_enter(ticket, class) {
                state = self.admitted.wait(state).unwrap();
            }
            state.remove_waiter(ticket);
            match class {
                MessageClass::StateChange => state.writer_active = true,
                MessageClass::StateRead => state.active_readers += 1,
                MessageClass::TaskProgress => state.progress_active = true,
            }
            ticket
        };
        // Another waiter may have become eligible (e.g. a read behind a read).
        self.admitted.notify_all();
        GatePermit {
            gate: Arc::clone(self),
            class,
            _ticket: ticket,
        }
    }

    fn exit(&self, class: MessageClass) {
        {
            let mut state = self.state.lock().unwrap();
            match class {
                MessageClass::StateChange => state.writer_active = false,
                MessageClass::StateRead => state.active_readers -= 1,
                MessageClass::TaskProgress => state.progress_active = false,
            }
        }
        self.admitted.notify_all();
    }
}

/// Held while a message is being handled; releases the scheduling slot on drop.
pub struct GatePermit {
    gate: Arc<MessageGate>,
    class: MessageClass,
    _ticket: u64,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.exit(self.class);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use test_case::test_case;

    use super::*;

    #[test_case("build/initialize", MessageClass::StateChange)]
    #[test_case("buildTarget/didChange", MessageClass::StateChange)]
    #[test_case("workspace/buildTargets", MessageClass::StateRead)]
    #[test_case("textDocument/sourceKitOptions", MessageClass::StateRead)]
    #[test_case("buildTarget/prepare", MessageClass::StateRead)]
    #[test_case("build/taskProgress", MessageClass::TaskProgress)]
    #[test_case("build/logMessage", MessageClass::TaskProgress)]
    #[test_case("some/unknownMethod", MessageClass::StateChange)]
    fn classification(method: &str, expected: MessageClass) {
        assert_eq!(classify(method), expected);
    }

    #[test]
    #[ntest::timeout(10000)]
    fn reads_run_concurrently() {
        let gate = Arc::new(MessageGate::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let concurrent = Arc::clone(&concurrent);
                let peak = Arc::clone(&peak);
                std::thread::spawn(move || {
                    let _permit = gate.enter(MessageClass::StateRead);
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[test]
    #[ntest::timeout(10000)]
    fn state_change_is_a_barrier() {
        let gate = Arc::new(MessageGate::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let read_permit = gate.enter(MessageClass::StateRead);

        let writer = {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            std::thread::spawn(move || {
                let _permit = gate.enter(MessageClass::StateChange);
                order.lock().unwrap().push("change");
            })
        };
        // Give the writer time to queue up behind the active read.
        std::thread::sleep(Duration::from_millis(50));

        let late_reader = {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            std::thread::spawn(move || {
                let _permit = gate.enter(MessageClass::StateRead);
                order.lock().unwrap().push("late read");
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        // Neither the writer nor the late reader may run while the first read is active.
        assert!(order.lock().unwrap().is_empty());

        drop(read_permit);
        writer.join().unwrap();
        late_reader.join().unwrap();

        // FIFO fairness: the late reader must not overtake the queued state change.
        assert_eq!(*order.lock().unwrap(), vec!["change", "late read"]);
    }

    #[test]
    #[ntest::timeout(10000)]
    fn progress_is_independent_of_reads() {
        let gate = Arc::new(MessageGate::new());
        let _read = gate.enter(MessageClass::StateRead);
        // Must not deadlock even though a read is active.
        let _progress = gate.enter(MessageClass::TaskProgress);
    }
}
