// Named timers for the session controller
//
// Each named timer has at most one pending firing: arming cancels the
// previous handle first. Firings are delivered as messages on a channel the
// controller drains, so timer callbacks run on the controller's turn and
// never concurrently with room events.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    /// Return to listening after the assistant stops speaking
    SpeakingReturn,
    /// Report an agent that never joined
    JoinWatchdog,
}

/// A delivered firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    Timer {
        name: TimerName,
        /// Room epoch the timer was armed for
        epoch: u64,
        generation: u64,
    },
    Tick {
        epoch: u64,
    },
}

struct Armed {
    handle: JoinHandle<()>,
    generation: u64,
}

pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    rx: mpsc::UnboundedReceiver<TimerFired>,
    timers: HashMap<TimerName, Armed>,
    ticker: Option<JoinHandle<()>>,
    next_generation: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            timers: HashMap::new(),
            ticker: None,
            next_generation: 0,
        }
    }

    /// Arm `name` to fire after `delay`, replacing any pending firing
    pub fn arm(&mut self, name: TimerName, delay: Duration, epoch: u64) {
        self.cancel(name);

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired::Timer {
                name,
                epoch,
                generation,
            });
        });

        debug!("Armed {:?} for {:?} (generation {})", name, delay, generation);
        self.timers.insert(name, Armed { handle, generation });
    }

    /// Cancel a pending firing; returns whether one was pending
    pub fn cancel(&mut self, name: TimerName) -> bool {
        match self.timers.remove(&name) {
            Some(armed) => {
                armed.handle.abort();
                debug!("Cancelled {:?}", name);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, name: TimerName) -> bool {
        self.timers.contains_key(&name)
    }

    /// Start the periodic ticker unless it is already running
    pub fn start_ticker(&mut self, period: Duration, epoch: u64) {
        if self.ticker.is_some() {
            return;
        }

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(TimerFired::Tick { epoch }).is_err() {
                    break;
                }
            }
        });

        self.ticker = Some(handle);
    }

    pub fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    pub fn ticker_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Cancel every timer and the ticker
    pub fn cancel_all(&mut self) {
        for (_, armed) in self.timers.drain() {
            armed.handle.abort();
        }
        self.stop_ticker();
    }

    /// Whether nothing can fire anymore
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.ticker.is_none()
    }

    pub async fn recv(&mut self) -> Option<TimerFired> {
        self.rx.recv().await
    }

    /// Check that a delivered firing is still live and consume it
    ///
    /// Firings of cancelled or re-armed timers are rejected.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        match fired {
            TimerFired::Timer {
                name, generation, ..
            } => match self.timers.get(name) {
                Some(armed) if armed.generation == *generation => {
                    self.timers.remove(name);
                    true
                }
                _ => false,
            },
            TimerFired::Tick { .. } => self.ticker.is_some(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
