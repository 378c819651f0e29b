//! Cooperative software timers
//!
//! The scheduler is polled with the current time in milliseconds and hands
//! back the events of every timer that elapsed. Nothing runs on its own.

use tracing::trace;

/// Identifies one armed schedule inside a [`TimerScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer owned by the component that arms it
///
/// Re-arming replaces the previous schedule. Dropping a `Timer` does not
/// cancel it; call [`TimerScheduler::stop`].
#[derive(Debug, Default)]
pub struct Timer {
    id: Option<TimerId>,
}

impl Timer {
    pub const fn new() -> Self {
        Self { id: None }
    }

    pub fn id(&self) -> Option<TimerId> {
        self.id
    }
}

#[derive(Debug)]
struct Entry<E> {
    id: TimerId,
    fire_at: u64,
    period: u64,
    one_shot: bool,
    event: E,
}

/// Ordered list of live timers
#[derive(Debug)]
pub struct TimerScheduler<E> {
    entries: Vec<Entry<E>>,
    next_id: u64,
}

impl<E> Default for TimerScheduler<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E: Clone> TimerScheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `timer` to fire `period_ms` after `now`
    ///
    /// A periodic timer (not `one_shot`) keeps firing every `period_ms`,
    /// measured from its previous fire time.
    pub fn start(&mut self, timer: &mut Timer, now: u64, period_ms: u64, event: E, one_shot: bool) {
        self.stop(timer);

        let id = TimerId(self.next_id);
        self.next_id += 1;
        timer.id = Some(id);

        trace!(timer = id.0, period_ms, one_shot, "Timer started");
        self.entries.push(Entry {
            id,
            fire_at: now.saturating_add(period_ms),
            period: period_ms,
            one_shot: one_shot || period_ms == 0,
            event,
        });
    }

    /// Disarms `timer`; a no-op when it is not running
    pub fn stop(&mut self, timer: &mut Timer) {
        if let Some(id) = timer.id.take() {
            self.entries.retain(|entry| entry.id != id);
        }
    }

    pub fn is_active(&self, timer: &Timer) -> bool {
        timer
            .id
            .is_some_and(|id| self.entries.iter().any(|entry| entry.id == id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events of every timer due at `now`, in fire-time order
    ///
    /// Ties keep arming order. Each timer fires at most once per poll;
    /// periodic timers are moved forward by their period and one-shot
    /// timers are dropped.
    pub fn poll(&mut self, now: u64) -> Vec<E> {
        let mut due: Vec<(u64, TimerId)> = self
            .entries
            .iter()
            .filter(|entry| entry.fire_at <= now)
            .map(|entry| (entry.fire_at, entry.id))
            .collect();
        due.sort();

        let mut fired = Vec::with_capacity(due.len());
        for (_, id) in due {
            let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
                continue;
            };
            let entry = &mut self.entries[index];
            fired.push(entry.event.clone());

            if entry.one_shot {
                self.entries.remove(index);
            } else {
                entry.fire_at = entry.fire_at.saturating_add(entry.period);
            }
        }
        fired
    }

    /// Milliseconds until the earliest timer fires, `None` when idle
    pub fn next_delay(&self, now: u64) -> Option<u64> {
        self.entries
            .iter()
            .map(|entry| entry.fire_at.saturating_sub(now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_fires_once() {
        let mut scheduler = TimerScheduler::new();
        let mut timer = Timer::new();
        scheduler.start(&mut timer, 0, 100, "once", true);

        assert!(scheduler.poll(99).is_empty());
        assert_eq!(scheduler.poll(100), vec!["once"]);
        assert!(scheduler.poll(1000).is_empty());
        assert!(!scheduler.is_active(&timer));
    }

    #[test]
    fn test_periodic_does_not_drift() {
        let mut scheduler = TimerScheduler::new();
        let mut timer = Timer::new();
        scheduler.start(&mut timer, 0, 100, "tick", false);

        assert_eq!(scheduler.poll(130), vec!["tick"]);
        assert_eq!(scheduler.next_delay(130), Some(70));
        assert_eq!(scheduler.poll(200), vec!["tick"]);
        // Late poll: fires once, schedule stays on the original grid
        assert_eq!(scheduler.poll(450), vec!["tick"]);
        assert_eq!(scheduler.next_delay(450), Some(0));
    }

    #[test]
    fn test_fire_order() {
        let mut scheduler = TimerScheduler::new();
        let (mut a, mut b, mut c) = (Timer::new(), Timer::new(), Timer::new());
        scheduler.start(&mut a, 0, 50, 'a', true);
        scheduler.start(&mut b, 0, 20, 'b', true);
        scheduler.start(&mut c, 0, 50, 'c', true);

        assert_eq!(scheduler.poll(60), vec!['b', 'a', 'c']);
    }

    #[test]
    fn test_restart_replaces_schedule() {
        let mut scheduler = TimerScheduler::new();
        let mut timer = Timer::new();
        scheduler.start(&mut timer, 0, 10, 1, true);
        scheduler.start(&mut timer, 0, 500, 2, true);

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.poll(100).is_empty());
        assert_eq!(scheduler.poll(500), vec![2]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut scheduler: TimerScheduler<u8> = TimerScheduler::new();
        let mut timer = Timer::new();
        scheduler.stop(&mut timer);
        scheduler.start(&mut timer, 0, 10, 0, false);
        scheduler.stop(&mut timer);
        scheduler.stop(&mut timer);

        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_delay(0), None);
    }
}
