// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Process uptime reporting.
//!
//! Uptime is derived from a stored unix start timestamp, never from a running
//! counter. Minutes and hours are reported with two decimals. Hours are
//! computed from the already-rounded minutes, so both roundings apply in
//! sequence. Rounding is half-to-even and done in integer hundredths, which
//! keeps the results exact.
//!
//! ```
//! use warden_core::uptime::Uptime;
//!
//! let uptime = Uptime::from_seconds(5431);
//! assert_eq!(uptime.minutes(), "90.52");
//! assert_eq!(uptime.hours(), "1.51");
//! ```

use std::fmt;

use chrono::Utc;

/// Uptime in seconds, minutes and hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uptime {
    seconds: u64,
    minutes_centi: u64,
    hours_centi: u64,
}

impl Uptime {
    /// Computes uptime from a whole number of seconds.
    pub fn from_seconds(seconds: u64) -> Self {
        let minutes_centi = div_round_half_even(u128::from(seconds) * 100, 60);
        let hours_centi = div_round_half_even(minutes_centi, 60);

        Self {
            seconds,
            minutes_centi: saturate(minutes_centi),
            hours_centi: saturate(hours_centi),
        }
    }

    /// Computes uptime between two unix timestamps. A clock that moved
    /// backwards yields zero.
    pub fn between(started_at: i64, now: i64) -> Self {
        Self::from_seconds(u64::try_from(now.saturating_sub(started_at)).unwrap_or(0))
    }

    /// Computes uptime from `started_at` until the current wall-clock time.
    pub fn since(started_at: i64) -> Self {
        Self::between(started_at, Utc::now().timestamp())
    }

    /// Whole seconds.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Minutes in hundredths.
    pub fn minutes_centi(&self) -> u64 {
        self.minutes_centi
    }

    /// Hours in hundredths.
    pub fn hours_centi(&self) -> u64 {
        self.hours_centi
    }

    /// Minutes formatted with two decimals.
    pub fn minutes(&self) -> String {
        format_centi(self.minutes_centi)
    }

    /// Hours formatted with two decimals.
    pub fn hours(&self) -> String {
        format_centi(self.hours_centi)
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s or {}min or {}h",
            self.seconds,
            self.minutes(),
            self.hours()
        )
    }
}

fn div_round_half_even(numerator: u128, denominator: u128) -> u128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;

    match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn format_centi(centi: u64) -> String {
    format!("{}.{:02}", centi / 100, centi % 100)
}
