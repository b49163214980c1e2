//! Simulation clock and calendar increment.
//!
//! Simulated time `t` only ever moves by the step size selected for the
//! iteration, and the calendar date follows `t` through [`CalendarTime::advance`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Calendar date plus UT seconds of day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalendarTime {
    date: NaiveDate,
    ut_sec: f64,
}

impl CalendarTime {
    /// Builds a calendar time, rolling `ut_sec` past midnight into later days.
    pub fn from_ymd(ymd: [i32; 3], ut_sec: f64) -> anyhow::Result<Self> {
        let [year, month, day] = ymd;
        anyhow::ensure!(
            month > 0 && day > 0,
            "not a calendar date: {year}-{month}-{day}"
        );
        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .ok_or_else(|| anyhow::anyhow!("not a calendar date: {year}-{month}-{day}"))?;
        anyhow::ensure!(
            ut_sec.is_finite() && ut_sec >= 0.0,
            "UT seconds must be a non-negative number, got {ut_sec}"
        );

        let mut time = Self { date, ut_sec: 0.0 };
        time.advance(ut_sec);
        Ok(time)
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.date.day()
    }

    #[must_use]
    pub fn ymd(&self) -> [i32; 3] {
        [self.year(), self.month() as i32, self.day() as i32]
    }

    #[must_use]
    pub fn ut_sec(&self) -> f64 {
        self.ut_sec
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Adds `dt` seconds, carrying whole days into the date.
    pub fn advance(&mut self, dt: f64) {
        self.ut_sec += dt;
        while self.ut_sec >= SECONDS_PER_DAY {
            match self.date.succ_opt() {
                Some(next) => {
                    self.date = next;
                    self.ut_sec -= SECONDS_PER_DAY;
                }
                // End of the representable calendar; keep counting seconds.
                None => break,
            }
        }
    }
}

/// Start state returned by the initial-state loader.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct InitialConditions {
    pub time: CalendarTime,
    /// Simulated duration in seconds.
    pub tdur: f64,
}

/// Iteration counter, simulated time, step size and calendar.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    /// Iteration counter, 1 on the first pass through the loop.
    pub it: u64,
    /// Simulated seconds since the start of the run.
    pub t: f64,
    /// Step size of the current iteration.
    pub dt: f64,
    pub time: CalendarTime,
}

impl SimulationClock {
    /// Step size handed to the one-time initializers before any selection.
    pub const BOOTSTRAP_DT: f64 = 1.0e-6;

    #[must_use]
    pub fn start(time: CalendarTime) -> Self {
        Self {
            it: 1,
            t: 0.0,
            dt: Self::BOOTSTRAP_DT,
            time,
        }
    }

    /// True on the bootstrap iteration.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.it == 1
    }

    /// Records the step size chosen for this iteration.
    pub fn set_step(&mut self, dt: f64) {
        self.dt = dt;
    }

    /// Closes the iteration: `it += 1`, `t += dt`, calendar follows.
    pub fn advance(&mut self) {
        self.it += 1;
        self.t += self.dt;
        self.time.advance(self.dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_within_day() {
        let mut time = CalendarTime::from_ymd([2023, 5, 1], 36_000.0).unwrap();
        time.advance(1.5);
        assert_eq!(time.ymd(), [2023, 5, 1]);
        assert!((time.ut_sec() - 36_001.5).abs() < 1e-9);
    }

    #[test]
    fn test_advance_rolls_month_and_year() {
        let mut time = CalendarTime::from_ymd([2023, 12, 31], 86_390.0).unwrap();
        time.advance(20.0);
        assert_eq!(time.ymd(), [2024, 1, 1]);
        assert!((time.ut_sec() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_leap_day() {
        let mut time = CalendarTime::from_ymd([2024, 2, 28], 86_000.0).unwrap();
        time.advance(1_000.0);
        assert_eq!(time.ymd(), [2024, 2, 29]);
    }

    #[test]
    fn test_from_ymd_normalizes_overflowing_seconds() {
        let time = CalendarTime::from_ymd([2023, 5, 1], 90_000.0).unwrap();
        assert_eq!(time.ymd(), [2023, 5, 2]);
        assert!((time.ut_sec() - 3_600.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_ymd_rejects_bad_dates() {
        assert!(CalendarTime::from_ymd([2023, 13, 1], 0.0).is_err());
        assert!(CalendarTime::from_ymd([2023, 0, 1], 0.0).is_err());
        assert!(CalendarTime::from_ymd([2023, 5, 1], -1.0).is_err());
    }

    #[test]
    fn test_clock_advance() {
        let time = CalendarTime::from_ymd([2023, 5, 1], 0.0).unwrap();
        let mut clock = SimulationClock::start(time);
        assert!(clock.is_first());
        clock.set_step(2.0);
        clock.advance();
        assert_eq!(clock.it, 2);
        assert_eq!(clock.t, 2.0);
        assert!(!clock.is_first());
        assert!((clock.time.ut_sec() - 2.0).abs() < 1e-12);
    }
}
