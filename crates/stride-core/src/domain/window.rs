//! Window partitioner.
//!
//! Cuts the next `[start, end)` slice a time-windowed job should process.
//! Successive windows are contiguous: the next start is always the previous
//! end, so every timestamp belongs to exactly one task.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time slice `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

/// Schedule parameters of a time-windowed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub offset_secs: i64,
    pub step_secs: i64,
}

/// Partitioner answer. Only `Window` and `AdHoc` produce a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextWindow {
    Window(Window),

    /// `step = 0`: windowing disabled, one window-less task per trigger.
    AdHoc,

    /// Nothing to do until real time moves further past `offset`.
    CaughtUp,

    /// The hard end bound has been reached.
    Exhausted,
}

/// Compute the next window after `last_end` (falls back to `params.start`).
///
/// Candidate is `[last_end, min(last_end + step, now - offset, end))`.
/// An empty or negative candidate is `CaughtUp`, not an error. Arithmetic
/// that leaves chrono's range clamps instead of panicking: an unreachable
/// horizon is `CaughtUp`, an unreachable `last_end + step` is capped by the
/// horizon.
pub fn next_window(
    params: &WindowParams,
    last_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> NextWindow {
    if params.step_secs <= 0 {
        return NextWindow::AdHoc;
    }

    let from = last_end.unwrap_or(params.start);
    if let Some(end) = params.end
        && from >= end
    {
        return NextWindow::Exhausted;
    }

    let Some(horizon) = TimeDelta::try_seconds(params.offset_secs.max(0))
        .and_then(|offset| now.checked_sub_signed(offset))
    else {
        return NextWindow::CaughtUp;
    };
    let mut to = TimeDelta::try_seconds(params.step_secs)
        .and_then(|step| from.checked_add_signed(step))
        .map_or(horizon, |stepped| stepped.min(horizon));
    if let Some(end) = params.end {
        to = to.min(end);
    }

    if to <= from {
        return NextWindow::CaughtUp;
    }
    NextWindow::Window(Window::new(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn params(step_secs: i64, offset_secs: i64) -> WindowParams {
        WindowParams {
            start: t(0, 0),
            end: None,
            offset_secs,
            step_secs,
        }
    }

    #[test]
    fn first_window_starts_at_job_start() {
        let next = next_window(&params(300, 0), None, t(1, 0));
        assert_eq!(next, NextWindow::Window(Window::new(t(0, 0), t(0, 5))));
    }

    #[test]
    fn window_collapses_to_offset_horizon() {
        // last_end + step = 01:05, now - offset = 01:02
        let next = next_window(&params(300, 60), Some(t(1, 0)), t(1, 3));
        assert_eq!(next, NextWindow::Window(Window::new(t(1, 0), t(1, 2))));
    }

    #[rstest]
    #[case::horizon_equals_last_end(t(1, 0), 0)]
    #[case::horizon_behind_last_end(t(1, 0), 600)]
    #[case::offset_keeps_behind(t(1, 4), 300)]
    fn caught_up_produces_nothing(#[case] now: DateTime<Utc>, #[case] offset: i64) {
        let next = next_window(&params(300, offset), Some(t(1, 0)), now);
        assert_eq!(next, NextWindow::CaughtUp);
    }

    #[test]
    fn hard_end_exhausts_job() {
        let mut p = params(300, 0);
        p.end = Some(t(0, 10));

        assert_eq!(
            next_window(&p, Some(t(0, 5)), t(2, 0)),
            NextWindow::Window(Window::new(t(0, 5), t(0, 10)))
        );
        assert_eq!(next_window(&p, Some(t(0, 10)), t(2, 0)), NextWindow::Exhausted);
    }

    #[test]
    fn hard_end_clamps_last_window() {
        let mut p = params(300, 0);
        p.end = Some(t(0, 7));
        assert_eq!(
            next_window(&p, Some(t(0, 5)), t(2, 0)),
            NextWindow::Window(Window::new(t(0, 5), t(0, 7)))
        );
    }

    #[test]
    fn zero_step_is_ad_hoc() {
        assert_eq!(next_window(&params(0, 0), None, t(1, 0)), NextWindow::AdHoc);
    }

    #[rstest]
    #[case::huge_step(i64::MAX / 2, 0)]
    #[case::max_step(i64::MAX, 0)]
    #[case::step_past_chrono_range(400_000 * 365 * 86_400, 0)]
    fn oversized_step_is_capped_by_horizon(#[case] step: i64, #[case] offset: i64) {
        let next = next_window(&params(step, offset), None, t(1, 0));
        assert_eq!(next, NextWindow::Window(Window::new(t(0, 0), t(1, 0))));
    }

    #[rstest]
    #[case::huge_offset(i64::MAX / 2)]
    #[case::offset_past_chrono_range(400_000 * 365 * 86_400)]
    fn oversized_offset_is_caught_up(#[case] offset: i64) {
        assert_eq!(next_window(&params(300, offset), None, t(1, 0)), NextWindow::CaughtUp);
    }

    #[test]
    fn successive_windows_are_contiguous() {
        let p = params(420, 90);
        let mut last_end = None;
        let mut windows = Vec::new();
        let mut now = t(0, 0);

        for _ in 0..200 {
            now += Duration::seconds(97);
            while let NextWindow::Window(w) = next_window(&p, last_end, now) {
                last_end = Some(w.end);
                windows.push(w);
            }
        }

        assert!(!windows.is_empty());
        assert_eq!(windows[0].start, p.start);
        for pair in windows.windows(2) {
            assert_eq!(pair[1].start, pair[0].end);
            assert!(pair[0].start < pair[0].end);
            assert!(pair[0].width() <= Duration::seconds(420));
        }
        assert!(windows.last().unwrap().end <= now - Duration::seconds(90));
    }
}
