//! Deferred callbacks on the fixed-step frame clock
//!
//! Every delay in a run (spawn intervals, stun recovery, answer feedback)
//! is a named timer here. Nothing blocks: the run advances the clock once
//! per tick and then pops due timers one at a time, so a timer cancelled
//! while another is being handled never fires.

use serde::{Deserialize, Serialize};

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    ObstacleSpawn,
    BonusSpawn,
    StunRecovery,
    FeedbackDelay,
}

/// Handle to a scheduled timer, stamped with the run epoch that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle {
    epoch: u32,
    id: u32,
}

impl TimerHandle {
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

/// A timer that came due this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

#[derive(Debug, Clone)]
struct Timer {
    handle: TimerHandle,
    kind: TimerKind,
    /// Tick at which the timer fires
    due: u64,
    /// Re-arm interval for repeating timers
    period: Option<u64>,
    /// Ticks left when paused (None = running)
    paused_remaining: Option<u64>,
}

/// Frame clock plus the set of pending timers
#[derive(Debug, Clone)]
pub struct Scheduler {
    epoch: u32,
    now: u64,
    next_id: u32,
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            now: 0,
            next_id: 1,
            timers: Vec::new(),
        }
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    fn insert(&mut self, kind: TimerKind, delay: u64, period: Option<u64>) -> TimerHandle {
        let handle = TimerHandle {
            epoch: self.epoch,
            id: self.next_id,
        };
        self.next_id += 1;
        self.timers.push(Timer {
            handle,
            kind,
            due: self.now + delay.max(1),
            period: period.map(|p| p.max(1)),
            paused_remaining: None,
        });
        handle
    }

    /// Fire once after `delay` ticks
    pub fn after(&mut self, kind: TimerKind, delay: u64) -> TimerHandle {
        self.insert(kind, delay, None)
    }

    /// Fire every `period` ticks, first after one full period
    pub fn every(&mut self, kind: TimerKind, period: u64) -> TimerHandle {
        self.insert(kind, period, Some(period))
    }

    /// Remove a timer. Returns false if it was not pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    /// Drop every pending timer
    pub fn cancel_all(&mut self) {
        if !self.timers.is_empty() {
            log::debug!("Cancelling {} pending timers (epoch {})", self.timers.len(), self.epoch);
        }
        self.timers.clear();
    }

    /// Freeze a timer, keeping its remaining time
    pub fn pause(&mut self, handle: TimerHandle) {
        let now = self.now;
        if let Some(timer) = self.timers.iter_mut().find(|t| t.handle == handle)
            && timer.paused_remaining.is_none()
        {
            timer.paused_remaining = Some(timer.due.saturating_sub(now).max(1));
        }
    }

    /// Unfreeze a paused timer
    pub fn resume(&mut self, handle: TimerHandle) {
        let now = self.now;
        if let Some(timer) = self.timers.iter_mut().find(|t| t.handle == handle)
            && let Some(remaining) = timer.paused_remaining.take()
        {
            timer.due = now + remaining;
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn is_paused(&self, handle: TimerHandle) -> bool {
        self.timers
            .iter()
            .any(|t| t.handle == handle && t.paused_remaining.is_some())
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Advance the clock by one tick
    pub fn advance_clock(&mut self) {
        self.now += 1;
    }

    /// Take the earliest due, running timer (ties broken by creation order).
    ///
    /// One-shot timers are removed; repeating timers are re-armed.
    pub fn pop_due(&mut self) -> Option<FiredTimer> {
        let now = self.now;
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.paused_remaining.is_none() && t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.handle.id))
            .map(|(i, _)| i)?;

        let fired = FiredTimer {
            handle: self.timers[idx].handle,
            kind: self.timers[idx].kind,
        };
        match self.timers[idx].period {
            Some(period) => self.timers[idx].due += period,
            None => {
                self.timers.remove(idx);
            }
        }
        Some(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ticks(s: &mut Scheduler, n: u64) -> Vec<(u64, TimerKind)> {
        let mut fired = Vec::new();
        for _ in 0..n {
            s.advance_clock();
            while let Some(f) = s.pop_due() {
                fired.push((s.now(), f.kind));
            }
        }
        fired
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut s = Scheduler::new(0);
        let h = s.after(TimerKind::StunRecovery, 3);
        assert!(s.is_pending(h));
        let fired = run_ticks(&mut s, 10);
        assert_eq!(fired, vec![(3, TimerKind::StunRecovery)]);
        assert!(!s.is_pending(h));
    }

    #[test]
    fn test_repeating_timer() {
        let mut s = Scheduler::new(0);
        s.every(TimerKind::ObstacleSpawn, 4);
        let fired = run_ticks(&mut s, 12);
        let ticks: Vec<u64> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![4, 8, 12]);
    }

    #[test]
    fn test_pause_keeps_remaining_time() {
        let mut s = Scheduler::new(0);
        let h = s.every(TimerKind::BonusSpawn, 10);
        run_ticks(&mut s, 6);
        s.pause(h);
        assert!(s.is_paused(h));
        assert!(run_ticks(&mut s, 50).is_empty());
        s.resume(h);
        // 4 ticks were left when paused
        let fired = run_ticks(&mut s, 4);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 60);
    }

    #[test]
    fn test_cancel_and_cancel_all() {
        let mut s = Scheduler::new(2);
        let a = s.after(TimerKind::FeedbackDelay, 5);
        let b = s.every(TimerKind::ObstacleSpawn, 5);
        assert!(s.cancel(a));
        assert!(!s.cancel(a));
        assert_eq!(s.pending_count(), 1);
        s.cancel_all();
        assert!(!s.is_pending(b));
        assert!(run_ticks(&mut s, 20).is_empty());
        assert_eq!(b.epoch(), 2);
    }

    #[test]
    fn test_cancel_during_dispatch_prevents_fire() {
        let mut s = Scheduler::new(0);
        s.after(TimerKind::FeedbackDelay, 2);
        let stun = s.after(TimerKind::StunRecovery, 2);
        s.advance_clock();
        s.advance_clock();
        let first = s.pop_due().expect("due");
        assert_eq!(first.kind, TimerKind::FeedbackDelay);
        s.cancel(stun);
        assert!(s.pop_due().is_none());
    }
}
