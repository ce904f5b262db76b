//! Match clock: countdown, phase-time and boundary-shrink sub-timers.
//!
//! The clock only counts; `step` reports what a tick produced (display,
//! announcements, signals, expiry) and the coordinator acts on it.

use crate::services::{BarColor, Signal, StatusBar};
use crate::util::time::RemainingTime;

use super::phase::Phase;

/// Remaining-time mark (in seconds) announced every multiple of
const ANNOUNCE_EVERY_SECS: u32 = 300;
/// Dedicated one-minute warning
const FINAL_WARNING_SECS: u32 = 60;
/// Countdown seconds that get an individual announcement
const COUNTDOWN_CALLOUT_SECS: u32 = 5;

/// What a single tick produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockStep {
    pub status: Option<StatusBar>,
    pub announcements: Vec<String>,
    pub signals: Vec<Signal>,
    /// Countdown or phase time reached zero on this tick
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SubTimer {
    left: u32,
    total: u32,
}

impl SubTimer {
    fn arm(&mut self, secs: u32) {
        self.left = secs;
        self.total = secs;
    }

    fn disarm(&mut self) {
        *self = Self::default();
    }

    fn is_active(&self) -> bool {
        self.left > 0
    }

    /// Decrement and return the new value
    fn tick(&mut self) -> u32 {
        self.left = self.left.saturating_sub(1);
        self.left
    }

    fn progress(&self) -> f64 {
        (f64::from(self.left) / f64::from(self.total.max(1))).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchClock {
    countdown: SubTimer,
    phase_time: SubTimer,
    shrink: SubTimer,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_countdown(&mut self, secs: u32) {
        self.countdown.arm(secs);
    }

    /// Arm the phase-time counter. Any shrink sub-timer from a previous
    /// phase is dropped; PVP entry re-arms it explicitly.
    pub fn arm_phase(&mut self, secs: u32) {
        self.phase_time.arm(secs);
        self.shrink.disarm();
    }

    pub fn arm_shrink(&mut self, secs: u32) {
        self.shrink.arm(secs);
    }

    pub fn disarm_all(&mut self) {
        self.countdown.disarm();
        self.phase_time.disarm();
        self.shrink.disarm();
    }

    pub fn is_idle(&self) -> bool {
        !self.countdown.is_active() && !self.phase_time.is_active() && !self.shrink.is_active()
    }

    pub fn phase_left(&self) -> u32 {
        self.phase_time.left
    }

    pub fn shrink_left(&self) -> u32 {
        self.shrink.left
    }

    pub fn remaining(&self, phase: Phase) -> RemainingTime {
        match phase {
            Phase::Countdown => RemainingTime::from_secs(self.countdown.left),
            Phase::Collection | Phase::Pvp => RemainingTime::from_secs(self.phase_time.left),
            Phase::Idle | Phase::Ended => RemainingTime::zero(),
        }
    }

    /// Advance one tick for `phase`
    pub fn step(&mut self, phase: Phase) -> ClockStep {
        match phase {
            Phase::Countdown => self.step_countdown(),
            Phase::Collection | Phase::Pvp => self.step_phase_time(phase),
            Phase::Idle | Phase::Ended => ClockStep::default(),
        }
    }

    fn step_countdown(&mut self) -> ClockStep {
        let mut step = ClockStep::default();
        let left = self.countdown.tick();

        step.status = Some(StatusBar {
            title: format!("Match starts in {}s", left),
            color: BarColor::Yellow,
            progress: self.countdown.progress(),
            visible: true,
        });

        if left == 0 {
            step.expired = true;
        } else if left <= COUNTDOWN_CALLOUT_SECS {
            step.announcements.push(format!("[Match] {}", left));
            step.signals.push(Signal::CountdownTick);
        } else if left % 10 == 0 {
            step.announcements
                .push(format!("[Match] Starting in {} seconds", left));
        }
        step
    }

    fn step_phase_time(&mut self, phase: Phase) -> ClockStep {
        let mut step = ClockStep::default();

        // The shrink drives the display while active; phase time keeps counting underneath.
        let shrinking = phase == Phase::Pvp && self.shrink.is_active();
        if shrinking {
            let shrink_left = self.shrink.tick();
            step.status = Some(StatusBar {
                title: format!(
                    "Border closes in {}",
                    RemainingTime::from_secs(shrink_left)
                ),
                color: BarColor::Red,
                progress: self.shrink.progress(),
                visible: true,
            });
            if shrink_left == 0 {
                step.signals.push(Signal::BorderClosed);
            }
        }

        let left = self.phase_time.tick();
        if !shrinking {
            let (name, color) = match phase {
                Phase::Collection => ("Gathering", BarColor::Green),
                _ => ("PVP", BarColor::Red),
            };
            step.status = Some(StatusBar {
                title: format!("{} - {}", name, RemainingTime::from_secs(left)),
                color,
                progress: self.phase_time.progress(),
                visible: true,
            });
        }

        if left == 0 {
            step.expired = true;
            return step;
        }

        if phase == Phase::Collection && left == FINAL_WARNING_SECS {
            step.announcements
                .push("[Warning] Gathering ends in 1 minute!".to_string());
            step.signals.push(Signal::Warning);
        }
        if left % ANNOUNCE_EVERY_SECS == 0 {
            step.announcements
                .push(format!("[Match] Time remaining: {} min", left / 60));
        }
        if phase == Phase::Pvp && left == FINAL_WARNING_SECS {
            step.announcements
                .push("[Warning] 1 minute remaining!".to_string());
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_expires_after_configured_ticks() {
        let mut clock = MatchClock::new();
        clock.arm_countdown(3);

        let first = clock.step(Phase::Countdown);
        assert!(!first.expired);
        assert_eq!(first.announcements, vec!["[Match] 2".to_string()]);
        assert_eq!(first.signals, vec![Signal::CountdownTick]);

        assert!(!clock.step(Phase::Countdown).expired);
        let last = clock.step(Phase::Countdown);
        assert!(last.expired);
        assert_eq!(last.status.map(|s| s.progress), Some(0.0));
    }

    #[test]
    fn countdown_announces_multiples_of_ten() {
        let mut clock = MatchClock::new();
        clock.arm_countdown(21);
        let step = clock.step(Phase::Countdown);
        assert_eq!(step.announcements, vec!["[Match] Starting in 20 seconds".to_string()]);
        assert!(step.signals.is_empty());
        let step = clock.step(Phase::Countdown);
        assert!(step.announcements.is_empty());
    }

    #[test]
    fn countdown_progress_is_clamped_fraction() {
        let mut clock = MatchClock::new();
        clock.arm_countdown(10);
        let step = clock.step(Phase::Countdown);
        let progress = step.status.map(|s| s.progress).unwrap_or_default();
        assert!((progress - 0.9).abs() < 1e-9);
    }

    #[test]
    fn collection_warns_at_one_minute() {
        let mut clock = MatchClock::new();
        clock.arm_phase(61);
        let step = clock.step(Phase::Collection);
        assert_eq!(step.signals, vec![Signal::Warning]);
        assert_eq!(step.announcements.len(), 1);
    }

    #[test]
    fn remaining_marks_every_five_minutes() {
        let mut clock = MatchClock::new();
        clock.arm_phase(601);
        let step = clock.step(Phase::Collection);
        assert_eq!(step.announcements, vec!["[Match] Time remaining: 10 min".to_string()]);
    }

    #[test]
    fn shrink_drives_display_while_phase_time_counts() {
        let mut clock = MatchClock::new();
        clock.arm_phase(10);
        clock.arm_shrink(2);

        let step = clock.step(Phase::Pvp);
        assert!(step.status.as_ref().is_some_and(|s| s.title.starts_with("Border")));
        assert_eq!(clock.phase_left(), 9);
        assert_eq!(clock.shrink_left(), 1);

        let step = clock.step(Phase::Pvp);
        assert_eq!(step.signals, vec![Signal::BorderClosed]);
        assert_eq!(clock.phase_left(), 8);

        let step = clock.step(Phase::Pvp);
        assert!(step.status.as_ref().is_some_and(|s| s.title.starts_with("PVP")));
        assert_eq!(clock.phase_left(), 7);
    }

    #[test]
    fn phase_time_expiry_wins_over_running_shrink() {
        let mut clock = MatchClock::new();
        clock.arm_phase(2);
        clock.arm_shrink(100);
        assert!(!clock.step(Phase::Pvp).expired);
        assert!(clock.step(Phase::Pvp).expired);
        assert!(clock.shrink_left() > 0);
    }

    #[test]
    fn thresholds_fire_under_active_shrink() {
        let mut clock = MatchClock::new();
        clock.arm_phase(61);
        clock.arm_shrink(30);
        let step = clock.step(Phase::Pvp);
        assert_eq!(step.announcements, vec!["[Warning] 1 minute remaining!".to_string()]);
    }

    #[test]
    fn idle_and_ended_do_nothing() {
        let mut clock = MatchClock::new();
        clock.arm_phase(5);
        assert_eq!(clock.step(Phase::Idle), ClockStep::default());
        assert_eq!(clock.step(Phase::Ended), ClockStep::default());
        assert_eq!(clock.phase_left(), 5);
    }

    #[test]
    fn disarm_clears_every_sub_timer() {
        let mut clock = MatchClock::new();
        clock.arm_countdown(5);
        clock.arm_phase(5);
        clock.arm_shrink(5);
        clock.disarm_all();
        assert!(clock.is_idle());
    }
}
