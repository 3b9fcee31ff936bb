//! Single logical clock for the companion.
//!
//! Owns the fixed-cadence tick and every delayed or repeating action. Time is
//! virtual (milliseconds) and only moves when the owner asks for the next due
//! event, so tests can drive it deterministically.

use std::collections::{BTreeSet, HashMap};

/// Handle to a scheduled action. Only valid for the session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    session: u32,
}

/// Something that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Due<T> {
    /// Fixed-cadence motion tick.
    Tick,
    /// A delayed or repeating action.
    Timer(T),
}

struct Entry<T> {
    due: u64,
    period: Option<u64>,
    action: T,
}

pub struct Scheduler<T> {
    now: u64,
    tick_ms: u64,
    /// `None` while the tick loop is stopped.
    next_tick: Option<u64>,
    /// (due, id) in firing order; equal due times fire in scheduling order.
    order: BTreeSet<(u64, u64)>,
    entries: HashMap<u64, Entry<T>>,
    next_id: u64,
    session: u32,
    tick_count: u64,
}

impl<T: Clone> Scheduler<T> {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            now: 0,
            tick_ms: tick_ms.max(1),
            next_tick: None,
            order: BTreeSet::new(),
            entries: HashMap::new(),
            next_id: 1,
            session: 0,
            tick_count: 0,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_ticking(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Start the tick loop; first tick lands one cadence from now.
    pub fn start_ticking(&mut self) {
        if self.next_tick.is_none() {
            self.next_tick = Some(self.now + self.tick_ms);
        }
    }

    pub fn stop_ticking(&mut self) {
        self.next_tick = None;
    }

    /// Run `action` once, `delay_ms` from now.
    pub fn after(&mut self, delay_ms: u64, action: T) -> TimerHandle {
        self.insert(self.now + delay_ms, None, action)
    }

    /// Run `action` every `period_ms`, first firing one period from now.
    pub fn every(&mut self, period_ms: u64, action: T) -> TimerHandle {
        let period = period_ms.max(1);
        self.insert(self.now + period, Some(period), action)
    }

    fn insert(&mut self, due: u64, period: Option<u64>, action: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.order.insert((due, id));
        self.entries.insert(id, Entry { due, period, action });
        TimerHandle {
            id,
            session: self.session,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        handle.session == self.session && self.entries.contains_key(&handle.id)
    }

    /// Cancel one action. Returns false for stale or already-fired handles.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if handle.session != self.session {
            return false;
        }
        match self.entries.remove(&handle.id) {
            Some(entry) => {
                self.order.remove(&(entry.due, handle.id));
                true
            }
            None => false,
        }
    }

    /// Cancel everything and stop ticking. Handles from before this call are
    /// dead even if an id were ever reused.
    pub fn cancel_all(&mut self) {
        let dropped = self.entries.len();
        self.order.clear();
        self.entries.clear();
        self.next_tick = None;
        self.session = self.session.wrapping_add(1);
        log::debug!("scheduler: cancelled {dropped} timers, session {}", self.session);
    }

    /// Pop the earliest event due at or before `until`, moving the clock to
    /// its due time. Timers win ties against the tick. When nothing is due
    /// the clock moves to `until` and `None` is returned.
    pub fn next_due(&mut self, until: u64) -> Option<Due<T>> {
        let timer = self.order.first().copied().filter(|&(due, _)| due <= until);
        let tick = self.next_tick.filter(|&t| t <= until);

        match (timer, tick) {
            (Some((due, id)), tick) if tick.map_or(true, |t| due <= t) => {
                self.order.remove(&(due, id));
                self.now = self.now.max(due);
                let entry = self.entries.remove(&id)?;
                match entry.period {
                    Some(period) => {
                        let action = entry.action.clone();
                        let next = due + period;
                        self.order.insert((next, id));
                        self.entries.insert(
                            id,
                            Entry {
                                due: next,
                                period: Some(period),
                                action: entry.action,
                            },
                        );
                        Some(Due::Timer(action))
                    }
                    None => Some(Due::Timer(entry.action)),
                }
            }
            (_, Some(t)) => {
                self.now = self.now.max(t);
                self.next_tick = Some(t + self.tick_ms);
                self.tick_count += 1;
                Some(Due::Tick)
            }
            _ => {
                self.now = self.now.max(until);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>, until: u64) -> Vec<(u64, Due<&'static str>)> {
        let mut out = Vec::new();
        while let Some(due) = s.next_due(until) {
            out.push((s.now(), due));
        }
        out
    }

    #[test]
    fn one_shot_fires_once_at_due_time() {
        let mut s = Scheduler::new(16);
        s.after(100, "wake");
        assert!(drain(&mut s, 99).is_empty());
        assert_eq!(s.now(), 99);
        assert_eq!(drain(&mut s, 500), vec![(100, Due::Timer("wake"))]);
        assert_eq!(s.now(), 500);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn equal_due_times_fire_in_scheduling_order() {
        let mut s = Scheduler::new(16);
        s.after(50, "a");
        s.after(50, "b");
        s.after(10, "c");
        let fired: Vec<_> = drain(&mut s, 100).into_iter().map(|(_, d)| d).collect();
        assert_eq!(
            fired,
            vec![Due::Timer("c"), Due::Timer("a"), Due::Timer("b")]
        );
    }

    #[test]
    fn ticks_run_at_fixed_cadence_and_lose_ties() {
        let mut s = Scheduler::new(16);
        s.start_ticking();
        s.after(32, "t");
        let events = drain(&mut s, 48);
        assert_eq!(
            events,
            vec![
                (16, Due::Tick),
                (32, Due::Timer("t")),
                (32, Due::Tick),
                (48, Due::Tick),
            ]
        );
        assert_eq!(s.tick_count(), 3);
    }

    #[test]
    fn repeating_timer_rearms_until_cancelled() {
        let mut s = Scheduler::new(16);
        let h = s.every(100, "blink");
        assert_eq!(drain(&mut s, 350).len(), 3);
        assert!(s.is_pending(h));
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(drain(&mut s, 1_000).is_empty());
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut s = Scheduler::new(16);
        let h = s.after(10, "gone");
        s.after(20, "kept");
        assert!(s.cancel(h));
        let fired: Vec<_> = drain(&mut s, 100).into_iter().map(|(_, d)| d).collect();
        assert_eq!(fired, vec![Due::Timer("kept")]);
    }

    #[test]
    fn cancel_all_kills_old_session() {
        let mut s = Scheduler::new(16);
        s.start_ticking();
        let old = s.after(10, "stale");
        s.every(5, "stale-repeat");
        s.cancel_all();
        assert!(!s.is_ticking());
        assert!(!s.is_pending(old));
        assert!(!s.cancel(old));

        s.start_ticking();
        s.after(10, "fresh");
        let fired: Vec<_> = drain(&mut s, 10).into_iter().map(|(_, d)| d).collect();
        assert_eq!(fired, vec![Due::Timer("fresh")]);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut s: Scheduler<&str> = Scheduler::new(16);
        assert!(s.next_due(100).is_none());
        assert!(s.next_due(40).is_none());
        assert_eq!(s.now(), 100);
    }
}
