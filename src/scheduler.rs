//! Event scheduler: two recurring daily pump windows plus two one-shot
//! deadlines.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Timer slots                           │
//! │                                                              │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌─────────┐ │
//! │  │ Window 1   │  │ Window 2   │  │ Pump-off   │  │ Spa-off │ │
//! │  │ on / off   │  │ on / off   │  │ deadline   │  │ deadline│ │
//! │  │ (daily)    │  │ (daily)    │  │ (one-shot) │  │(one-shot│ │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘  └────┬────┘ │
//! │        └───────────────┴───────┬───────┴──────────────┘      │
//! │                                ▼                             │
//! │                evaluate(now, mode) -> [TimerAction]          │
//! │                                │                             │
//! │                                ▼                             │
//! │                 ControlService -> Equipment                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler never touches equipment.  It reports which slots fired
//! and the owner of the equipment carries them out.
//!
//! ## Firing rules
//!
//! - Recurring triggers fire when their time of day falls in the interval
//!   `(last evaluation, now]`.  A second evaluation at the same or an
//!   earlier instant is a no-op, so nothing fires twice for one second.
//! - Gaps longer than [`MAX_CATCH_UP_SECS`] (suspend, clock step) are not
//!   replayed; only the current second is matched.
//! - One-shot deadlines fire on the first evaluation at or after the
//!   deadline and are cleared before the action is returned.
//! - A window's off trigger that lands in a protective mode is held as
//!   pending and fires on the first evaluation after the mode ends.  That
//!   window's next on trigger drops the pending off.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use heapless::Vec;
use log::{info, warn};

use crate::error::SchedulerConfigError;
use crate::fsm::SystemMode;

// ═══════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════

/// Number of recurring pump windows.
pub const WINDOW_SLOTS: usize = 2;

/// Longest evaluation gap that is still replayed in full.
pub const MAX_CATCH_UP_SECS: i64 = 120;

/// Upper bound on actions from a single evaluation.
pub const MAX_ACTIONS: usize = 2 * WINDOW_SLOTS + 2;

// ═══════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════

/// A daily pump run.  `off` is `on + duration`, wrapping past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpWindow {
    pub on: NaiveTime,
    pub off: NaiveTime,
    pub duration_minutes: u16,
    /// An off trigger was held back by a protective mode.
    pub deferred_off: bool,
}

/// What an evaluation asks the equipment owner to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Window `n` reached its on time.
    WindowOn(usize),
    /// Window `n` reached (or was released from) its off time.
    WindowOff(usize),
    /// The ad-hoc pump-off deadline passed.
    PumpOffDeadline,
    /// The spa-off deadline passed.
    SpaOffDeadline,
}

/// The one-shot deadline an adjustment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    PumpOff,
    SpaOff,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct EventScheduler {
    windows: [Option<PumpWindow>; WINDOW_SLOTS],
    pump_off_at: Option<NaiveDateTime>,
    spa_off_at: Option<NaiveDateTime>,
    /// Window whose on trigger started the pump that is running now.
    running_window: Option<usize>,
    last_eval: Option<NaiveDateTime>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Arming ───────────────────────────────────────────────

    /// Arm recurring window `slot`.  On error the slot keeps its old value.
    pub fn set_window(
        &mut self,
        slot: usize,
        hour: u8,
        minute: u8,
        duration_minutes: u16,
    ) -> Result<(), SchedulerConfigError> {
        if slot >= WINDOW_SLOTS {
            return Err(SchedulerConfigError::InvalidTimeOfDay);
        }
        if duration_minutes == 0 {
            warn!("TIMER | window {} duration is 0, not armed", slot + 1);
            return Err(SchedulerConfigError::ZeroDuration);
        }
        if duration_minutes >= 24 * 60 {
            return Err(SchedulerConfigError::DurationTooLong);
        }
        let on = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)
            .ok_or(SchedulerConfigError::InvalidTimeOfDay)?;
        let (off, _) = on.overflowing_add_signed(TimeDelta::minutes(i64::from(duration_minutes)));

        info!("TIMER | window {} armed {} -> {}", slot + 1, on, off);
        self.windows[slot] = Some(PumpWindow {
            on,
            off,
            duration_minutes,
            deferred_off: false,
        });
        Ok(())
    }

    pub fn clear_window(&mut self, slot: usize) {
        if let Some(w) = self.windows.get_mut(slot) {
            *w = None;
        }
        if self.running_window == Some(slot) {
            self.running_window = None;
        }
    }

    /// Arm the ad-hoc pump-off deadline `run` after `now`.
    pub fn arm_pump_off(
        &mut self,
        now: NaiveDateTime,
        run: TimeDelta,
    ) -> Result<NaiveDateTime, SchedulerConfigError> {
        if run <= TimeDelta::zero() {
            return Err(SchedulerConfigError::ZeroDuration);
        }
        if run >= TimeDelta::days(1) {
            return Err(SchedulerConfigError::DurationTooLong);
        }
        let at = now + run;
        info!("TIMER | pump-off armed for {}", at.time());
        self.pump_off_at = Some(at);
        self.running_window = None;
        Ok(at)
    }

    /// Arm the spa-off deadline `hours` after `start`.
    pub fn arm_spa_off(
        &mut self,
        start: NaiveDateTime,
        hours: u8,
        max_hours: u8,
    ) -> Result<NaiveDateTime, SchedulerConfigError> {
        validate_spa_hours(hours, max_hours)?;
        let at = start + TimeDelta::hours(i64::from(hours));
        info!("TIMER | spa-off armed for {}", at.time());
        self.spa_off_at = Some(at);
        Ok(at)
    }

    /// Drop the ad-hoc pump-off deadline and forget any window run.
    pub fn clear_pump_off(&mut self) {
        if self.pump_off_at.take().is_some() {
            info!("TIMER | pump-off cleared");
        }
        self.running_window = None;
    }

    pub fn clear_spa_off(&mut self) {
        if self.spa_off_at.take().is_some() {
            info!("TIMER | spa-off cleared");
        }
    }

    /// Record that window `slot` actually started the pump.
    pub fn note_window_run(&mut self, slot: usize) {
        self.running_window = Some(slot);
    }

    /// Move a one-shot deadline by whole hours.  The result must stay in
    /// the future.
    pub fn adjust(
        &mut self,
        which: Deadline,
        delta_hours: i64,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime, SchedulerConfigError> {
        let slot = match which {
            Deadline::PumpOff => &mut self.pump_off_at,
            Deadline::SpaOff => &mut self.spa_off_at,
        };
        let current = slot.ok_or(SchedulerConfigError::NotArmed)?;
        let moved = current + TimeDelta::hours(delta_hours);
        if moved <= now {
            return Err(SchedulerConfigError::DeadlineInPast);
        }
        if moved - now >= TimeDelta::days(1) {
            return Err(SchedulerConfigError::DurationTooLong);
        }
        *slot = Some(moved);
        info!("TIMER | {:?} deadline moved to {}", which, moved.time());
        Ok(moved)
    }

    // ── Evaluation ───────────────────────────────────────────

    /// Work out which slots fire at `now`.  Call once per wall-clock second.
    pub fn evaluate(&mut self, now: NaiveDateTime, mode: SystemMode) -> Vec<TimerAction, MAX_ACTIONS> {
        let mut fired = Vec::new();
        let now = now.with_nanosecond(0).unwrap_or(now);

        let last = match self.last_eval {
            Some(last) if now <= last => return fired,
            Some(last) if (now - last).num_seconds() <= MAX_CATCH_UP_SECS => last,
            Some(last) => {
                warn!(
                    "TIMER | {}s evaluation gap, not replayed",
                    (now - last).num_seconds()
                );
                now - TimeDelta::seconds(1)
            }
            None => now - TimeDelta::seconds(1),
        };
        self.last_eval = Some(now);

        let protective = mode.is_protective();
        for (slot, entry) in self.windows.iter_mut().enumerate() {
            let Some(w) = entry else { continue };

            if crossed(w.on, last, now) {
                if w.deferred_off {
                    info!("TIMER | window {} pending off dropped", slot + 1);
                }
                w.deferred_off = false;
                info!("TIMER | window {} on fired", slot + 1);
                let _ = fired.push(TimerAction::WindowOn(slot));
            }

            if crossed(w.off, last, now) {
                if protective {
                    info!("TIMER | window {} off deferred ({})", slot + 1, mode);
                    w.deferred_off = true;
                } else {
                    info!("TIMER | window {} off fired", slot + 1);
                    let _ = fired.push(TimerAction::WindowOff(slot));
                }
            } else if w.deferred_off && !protective {
                info!("TIMER | window {} deferred off fired", slot + 1);
                w.deferred_off = false;
                let _ = fired.push(TimerAction::WindowOff(slot));
            }
        }

        if self.pump_off_at.is_some_and(|at| at <= now) {
            self.pump_off_at = None;
            info!("TIMER | pump-off fired");
            let _ = fired.push(TimerAction::PumpOffDeadline);
        }

        if self.spa_off_at.is_some_and(|at| at <= now) {
            self.spa_off_at = None;
            info!("TIMER | spa-off fired");
            let _ = fired.push(TimerAction::SpaOffDeadline);
        }

        fired
    }

    // ── Queries ──────────────────────────────────────────────

    pub fn window(&self, slot: usize) -> Option<PumpWindow> {
        self.windows.get(slot).copied().flatten()
    }

    pub fn pump_off_at(&self) -> Option<NaiveDateTime> {
        self.pump_off_at
    }

    pub fn spa_off_at(&self) -> Option<NaiveDateTime> {
        self.spa_off_at
    }

    /// Next time the pump is due off: the ad-hoc deadline, else the off
    /// time of the window that started the current run.
    pub fn next_pump_off(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.pump_off_at.or_else(|| {
            let w = self.window(self.running_window?)?;
            Some(next_occurrence(w.off, now))
        })
    }

    /// Time left on the deadline that ends the current mode.
    pub fn time_remaining(&self, mode: SystemMode, now: NaiveDateTime) -> Option<TimeDelta> {
        let until = match mode {
            SystemMode::SpaOn => self.spa_off_at?,
            SystemMode::PumpOn | SystemMode::Manual | SystemMode::Cooldown | SystemMode::Freeze => {
                self.next_pump_off(now)?
            }
            SystemMode::Off | SystemMode::Standby => return None,
        };
        Some((until - now).max(TimeDelta::zero()))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

/// Spa sessions run at least one hour and less than `max_hours`.
pub fn validate_spa_hours(hours: u8, max_hours: u8) -> Result<(), SchedulerConfigError> {
    if hours == 0 {
        return Err(SchedulerConfigError::ZeroDuration);
    }
    if hours >= max_hours {
        return Err(SchedulerConfigError::DurationTooLong);
    }
    Ok(())
}

/// Whether the most recent occurrence of `t` at or before `now` is after `last`.
fn crossed(t: NaiveTime, last: NaiveDateTime, now: NaiveDateTime) -> bool {
    let mut at = now.date().and_time(t);
    if at > now {
        at -= TimeDelta::days(1);
    }
    at > last
}

/// First occurrence of `t` strictly after `now`.
fn next_occurrence(t: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let at = now.date().and_time(t);
    if at > now { at } else { at + TimeDelta::days(1) }
}
