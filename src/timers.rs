//! Named one-shot and repeating timers.
//!
//! Each timer is a tokio task guarded by a child [`CancellationToken`].
//! Scheduling a name that is already in use cancels the previous timer in the
//! same call, so at most one timer per name is ever live. Firing posts a
//! [`TimerTick`] onto the owner's event channel; the owner passes the tick
//! back through [`TimerRegistry::accept`], which rejects ticks from timers
//! that were cancelled or replaced after the tick was queued.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Floor for repeating intervals; a zero interval would spin.
const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(10);

/// A timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTick {
    pub name: String,
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    token: CancellationToken,
    generation: u64,
    repeating: bool,
}

/// Timers keyed by name, delivering ticks as `E` on one channel.
pub struct TimerRegistry<E> {
    events: mpsc::UnboundedSender<E>,
    parent: CancellationToken,
    slots: HashMap<String, Slot>,
    next_generation: u64,
}

impl<E> TimerRegistry<E>
where
    E: From<TimerTick> + Send + 'static,
{
    /// Create a registry. Cancelling `parent` stops every timer.
    pub fn new(events: mpsc::UnboundedSender<E>, parent: CancellationToken) -> Self {
        Self {
            events,
            parent,
            slots: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Fire once after `delay`, replacing any timer with the same name.
    pub fn schedule_once(&mut self, name: &str, delay: Duration) {
        let (token, tick) = self.arm(name, false);
        let events = self.events.clone();
        debug!(timer = name, delay_secs = delay.as_secs(), "timer armed");

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(E::from(tick));
                }
            }
        });
    }

    /// Fire after `first_delay` and then every `interval`, replacing any
    /// timer with the same name.
    pub fn schedule_repeating(&mut self, name: &str, first_delay: Duration, interval: Duration) {
        let (token, tick) = self.arm(name, true);
        let events = self.events.clone();
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        debug!(
            timer = name,
            first_delay_secs = first_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "repeating timer armed"
        );

        tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {
                        if events.send(E::from(tick.clone())).is_err() {
                            break;
                        }
                    }
                }
                delay = interval;
            }
        });
    }

    /// Cancel the named timer. Returns `true` if one was live.
    pub fn cancel(&mut self, name: &str) -> bool {
        match self.slots.remove(name) {
            Some(slot) => {
                slot.token.cancel();
                debug!(timer = name, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every timer.
    pub fn cancel_all(&mut self) {
        for (name, slot) in self.slots.drain() {
            slot.token.cancel();
            trace!(timer = %name, "timer cancelled");
        }
    }

    /// Whether a timer with this name is live.
    #[must_use]
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Validate a delivered tick. A one-shot timer is consumed by its first
    /// accepted tick; stale ticks return `false`.
    pub fn accept(&mut self, tick: &TimerTick) -> bool {
        let Some(slot) = self.slots.get(&tick.name) else {
            trace!(timer = %tick.name, "dropping tick for cancelled timer");
            return false;
        };
        if slot.generation != tick.generation {
            trace!(timer = %tick.name, "dropping tick from replaced timer");
            return false;
        }
        if !slot.repeating {
            self.slots.remove(&tick.name);
        }
        true
    }

    fn arm(&mut self, name: &str, repeating: bool) -> (CancellationToken, TimerTick) {
        self.cancel(name);
        self.next_generation += 1;
        let token = self.parent.child_token();
        self.slots.insert(
            name.to_owned(),
            Slot {
                token: token.clone(),
                generation: self.next_generation,
                repeating,
            },
        );
        (
            token,
            TimerTick {
                name: name.to_owned(),
                generation: self.next_generation,
            },
        )
    }
}

impl<E> Drop for TimerRegistry<E> {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            slot.token.cancel();
        }
    }
}
