//! Collapses storms of identical events into a single callback invocation.
//!
//! `schedule` merges the new value into the pending one and restarts the timer; the callback
//! fires at most once per window with the accumulated result. `flush` delivers a pending value
//! immediately, which `wait_for_up_to_date_build_graph` relies on.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct DebounceState<T> {
    pending: Option<T>,
    deadline: Option<Instant>,
    shutdown: bool,
}

struct DebouncerShared<T> {
    state: Mutex<DebounceState<T>>,
    wakeup: Condvar,
    duration: Duration,
    combine: Box<dyn Fn(&mut T, T) + Send + Sync>,
    callback: Box<dyn Fn(T) + Send + Sync>,
}

pub struct Debouncer<T: Send + 'static> {
    shared: Arc<DebouncerShared<T>>,
    _worker: jod_thread::JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(
        duration: Duration,
        combine: impl Fn(&mut T, T) + Send + Sync + 'static,
        callback: impl Fn(T) + Send + Sync + 'static,
    ) -> Debouncer<T> {
        let shared = Arc::new(DebouncerShared {
            state: Mutex::new(DebounceState {
                pending: None,
                deadline: None,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            duration,
            combine: Box::new(combine),
            callback: Box::new(callback),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            jod_thread::Builder::new()
                .name("debouncer".to_string())
                .spawn(move || shared.run())
                .expect("failed to spawn debouncer thread")
        };
        Debouncer {
            shared,
            _worker: worker,
        }
    }

    /// Merge `value` into the pending accumulation and (re)start the debounce window.
    pub fn schedule(&self, value: T) {
        let mut state = self.shared.state.lock().unwrap();
        match &mut state.pending {
            Some(pending) => (self.shared.combine)(pending, value),
            None => state.pending = Some(value),
        }
        state.deadline = Some(Instant::now() + self.shared.duration);
        drop(state);
        self.shared.wakeup.notify_all();
    }

    /// Deliver any pending value now, on the calling thread.
    pub fn flush(&self) {
        let value = {
            let mut state = self.shared.state.lock().unwrap();
            state.deadline = None;
            state.pending.take()
        };
        if let Some(value) = value {
            (self.shared.callback)(value);
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.shared.state.lock().unwrap().shutdown = true;
        self.shared.wakeup.notify_all();
    }
}

impl<T: Send> DebouncerShared<T> {
    fn run(&self) {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return;
            }
            match state.deadline {
                None => {
                    state = self.wakeup.wait(state).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now < deadline {
                        let (next, _) = self.wakeup.wait_timeout(state, deadline - now).unwrap();
                        state = next;
                        continue;
                    }
                    state.deadline = None;
                    if let Some(value) = state.pending.take() {
                        drop(state);
                        (self.callback)(value);
                        state = self.state.lock().unwrap();
                    }
                }
            }
        }
    }
}
