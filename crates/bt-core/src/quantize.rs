//! Duration parsing and billing quantization.
//!
//! Committed hours are always rounded *up* onto a fixed grid so that billed
//! time is never below time worked. All arithmetic is done on exact decimals.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// The billing grid, in minutes.
pub const GRID_MINUTES: u32 = 15;

const MINUTES_PER_HOUR: Decimal = Decimal::from_parts(60, 0, 0, false, 0);
const SECONDS_PER_HOUR: Decimal = Decimal::from_parts(3600, 0, 0, false, 0);
const SECONDS_PER_MINUTE: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Decimal places of a second kept before flooring for display.
///
/// Division by 60 or 3600 leaves a tail in the last of the 28 significant
/// digits (e.g. 50/60 × 3600 = 2999.999…9). Collapsing it first keeps
/// whole seconds whole.
const DISPLAY_SECOND_DP: u32 = 6;

/// Parses free-text duration input into fractional hours.
///
/// Accepted shapes:
/// - `H:MM`: hours and minutes; minutes are clamped into `[0, 59]`, an
///   unparseable hour or minute component counts as 0
/// - a decimal number using `.` or `,` as the fractional separator
///
/// Anything else, including negative numbers, yields 0. Never fails.
pub fn parse_duration(input: &str) -> Decimal {
    let input = input.trim();
    if input.is_empty() {
        return Decimal::ZERO;
    }

    if let Some((hours, minutes)) = input.split_once(':') {
        let hours = hours
            .trim()
            .parse::<u32>()
            .map_or(Decimal::ZERO, Decimal::from);
        let minutes = minutes.trim().parse::<i64>().unwrap_or(0).clamp(0, 59);
        return hours + Decimal::from(minutes) / MINUTES_PER_HOUR;
    }

    match Decimal::from_str(&input.replace(',', ".")) {
        Ok(hours) if hours > Decimal::ZERO => hours.normalize(),
        _ => Decimal::ZERO,
    }
}

/// Rounds hours up to the next multiple of `grid_minutes`.
///
/// Non-positive input maps to 0. A grid of 0 minutes disables rounding.
pub fn round_up_to_grid(hours: Decimal, grid_minutes: u32) -> Decimal {
    if hours <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if grid_minutes == 0 {
        return hours;
    }

    let grid = Decimal::from(grid_minutes);
    let minutes = hours.saturating_mul(MINUTES_PER_HOUR);
    let slots = (minutes / grid).ceil();
    (slots.saturating_mul(grid) / MINUTES_PER_HOUR).normalize()
}

/// Rounds hours up onto the 15-minute billing grid.
pub fn round_up(hours: Decimal) -> Decimal {
    round_up_to_grid(hours, GRID_MINUTES)
}

/// Parses user input and quantizes it. Used for every manual edit of hours.
pub fn parse_and_quantize(input: &str) -> Decimal {
    round_up(parse_duration(input))
}

/// Returns true if `hours` lies exactly on the billing grid.
pub fn is_on_grid(hours: Decimal) -> bool {
    let slots_per_hour = Decimal::from(60 / GRID_MINUTES);
    hours >= Decimal::ZERO && (hours * slots_per_hour).fract().is_zero()
}

/// Converts whole elapsed seconds to fractional hours.
pub fn seconds_to_hours(seconds: u64) -> Decimal {
    Decimal::from(seconds) / SECONDS_PER_HOUR
}

/// Formats hours as `H:MM`.
///
/// Partial minutes are floored, never rounded, so the display never shows a
/// minute that has not fully elapsed. Negative values display as `0:00`.
pub fn format_for_display(hours: Decimal) -> String {
    let seconds = if hours > Decimal::ZERO {
        hours
            .saturating_mul(SECONDS_PER_HOUR)
            .round_dp(DISPLAY_SECOND_DP)
            .floor()
    } else {
        Decimal::ZERO
    };
    let total_minutes = (seconds / SECONDS_PER_MINUTE)
        .floor()
        .to_u64()
        .unwrap_or(u64::MAX);
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parses_colon_form() {
        assert_eq!(parse_duration("1:30"), d("1.5"));
        assert_eq!(parse_duration("0:45"), d("0.75"));
        assert_eq!(parse_duration(" 2:05 "), d("2") + d("5") / d("60"));
    }

    #[test]
    fn colon_form_clamps_minutes() {
        assert_eq!(parse_duration("1:75"), d("1") + d("59") / d("60"));
        assert_eq!(parse_duration("1:-5"), d("1"));
    }

    #[test]
    fn colon_form_with_invalid_hours_counts_minutes_only() {
        assert_eq!(parse_duration("x:30"), d("0.5"));
        assert_eq!(parse_duration(":30"), d("0.5"));
        assert_eq!(parse_duration("-1:30"), d("0.5"));
    }

    #[test]
    fn parses_decimal_with_either_separator() {
        assert_eq!(parse_duration("1.5"), d("1.5"));
        assert_eq!(parse_duration("1,5"), d("1.5"));
        assert_eq!(parse_duration("2"), d("2"));
    }

    #[test]
    fn unparseable_input_is_zero() {
        assert_eq!(parse_duration(""), Decimal::ZERO);
        assert_eq!(parse_duration("abc"), Decimal::ZERO);
        assert_eq!(parse_duration("1h30"), Decimal::ZERO);
        assert_eq!(parse_duration("-2"), Decimal::ZERO);
    }

    #[test]
    fn round_up_is_ceiling_not_nearest() {
        assert_eq!(round_up(d("0.01")), d("0.25"));
        assert_eq!(round_up(d("1.26")), d("1.5"));
        assert_eq!(round_up(d("1.5")), d("1.5"));
    }

    #[test]
    fn round_up_non_positive_is_zero() {
        assert_eq!(round_up(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(round_up(d("-1.3")), Decimal::ZERO);
    }

    #[test]
    fn round_up_to_other_grids() {
        assert_eq!(round_up_to_grid(d("0.1"), 6), d("0.1"));
        assert_eq!(round_up_to_grid(d("0.11"), 6), d("0.2"));
        assert_eq!(round_up_to_grid(d("1.01"), 60), d("2"));
        assert_eq!(round_up_to_grid(d("1.01"), 0), d("1.01"));
    }

    #[test]
    fn round_up_is_idempotent_on_grid_values() {
        for quarter in 0..=400u32 {
            let h = Decimal::from(quarter) / d("4");
            assert_eq!(round_up(h), h, "grid value {h} moved");
        }
    }

    #[test]
    fn round_up_never_truncates_and_stays_within_one_slot() {
        let slot = d("0.25");
        for seconds in 0..=4 * 3600u64 {
            let h = seconds_to_hours(seconds);
            let rounded = round_up(h);
            assert!(rounded >= h, "{seconds}s rounded down to {rounded}");
            assert!(rounded - h < slot, "{seconds}s rounded up a full slot");
            assert!(is_on_grid(rounded));
        }
    }

    #[test]
    fn parse_and_quantize_is_idempotent() {
        for input in ["0:50", "1,1", "2.3", "0:01", "7:59", "3"] {
            let once = parse_and_quantize(input);
            let twice = parse_and_quantize(&once.to_string());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn comma_input_round_trips_to_display() {
        let parsed = parse_duration("1,5");
        assert_eq!(parsed, d("1.5"));
        let rounded = round_up(parsed);
        assert_eq!(rounded, d("1.5"));
        assert_eq!(format_for_display(rounded), "1:30");
    }

    #[test]
    fn odd_minutes_ceil_to_next_quarter() {
        let parsed = parse_duration("0:50");
        assert!(parsed > d("0.8333") && parsed < d("0.8334"));
        let rounded = round_up(parsed);
        assert_eq!(rounded, d("1"));
        assert_eq!(format_for_display(rounded), "1:00");
    }

    #[test]
    fn display_floors_partial_minutes() {
        assert_eq!(format_for_display(seconds_to_hours(119)), "0:01");
        assert_eq!(format_for_display(seconds_to_hours(3599)), "0:59");
        assert_eq!(format_for_display(parse_duration("0:50")), "0:50");
    }

    #[test]
    fn display_of_negative_is_zero() {
        assert_eq!(format_for_display(d("-0.5")), "0:00");
    }

    #[test]
    fn display_of_large_values() {
        assert_eq!(format_for_display(d("123.75")), "123:45");
    }

    #[test]
    fn grid_membership() {
        assert!(is_on_grid(d("1.75")));
        assert!(is_on_grid(Decimal::ZERO));
        assert!(!is_on_grid(d("1.1")));
        assert!(!is_on_grid(d("-0.25")));
    }
}
