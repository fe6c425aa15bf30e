//! Battery state parsing from `pmset -g batt` output.

use crate::probe::BatteryState;

/// Parse power-source output into a battery state.
///
/// Desktops print only the power-source header; that parses to
/// `is_present=false` with the AC flag still meaningful. Time remaining maps
/// to -1 whenever the firmware has no estimate yet.
pub fn parse_pmset(output: &str) -> BatteryState {
    let on_ac_power = output.contains("'AC Power'");
    for line in output.lines() {
        if !line.contains("InternalBattery") {
            continue;
        }
        let mut segments = line.split(';');
        let charge_percent = segments
            .next()
            .and_then(|seg| seg.split_whitespace().last())
            .and_then(|token| token.trim_end_matches('%').parse::<f64>().ok())
            .unwrap_or(0.0);
        let state = segments.next().map(str::trim).unwrap_or("");
        let time_remaining_minutes = segments
            .next()
            .and_then(|seg| parse_remaining_minutes(seg.trim()))
            .unwrap_or(-1);
        return BatteryState {
            is_present: true,
            is_charging: state == "charging",
            on_ac_power,
            charge_percent,
            time_remaining_minutes,
        };
    }
    BatteryState {
        is_present: false,
        is_charging: false,
        on_ac_power,
        charge_percent: 0.0,
        time_remaining_minutes: -1,
    }
}

/// Parse the `H:MM remaining ...` segment; `(no estimate)` yields None.
fn parse_remaining_minutes(segment: &str) -> Option<i32> {
    let clock = segment.split_whitespace().next()?;
    let (hours, minutes) = clock.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    Some(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discharging_battery_with_estimate() {
        let output = "\
Now drawing from 'Battery Power'
 -InternalBattery-0 (id=12582979)\t87%; discharging; 4:33 remaining present: true
";
        let state = parse_pmset(output);
        assert!(state.is_present);
        assert!(!state.is_charging);
        assert!(!state.on_ac_power);
        assert_eq!(state.charge_percent, 87.0);
        assert_eq!(state.time_remaining_minutes, 4 * 60 + 33);
    }

    #[test]
    fn charging_battery_on_ac() {
        let output = "\
Now drawing from 'AC Power'
 -InternalBattery-0 (id=12582979)\t64%; charging; 1:12 remaining present: true
";
        let state = parse_pmset(output);
        assert!(state.is_present);
        assert!(state.is_charging);
        assert!(state.on_ac_power);
        assert_eq!(state.charge_percent, 64.0);
        assert_eq!(state.time_remaining_minutes, 72);
    }

    #[test]
    fn no_estimate_maps_to_unknown() {
        let output = "\
Now drawing from 'Battery Power'
 -InternalBattery-0 (id=12582979)\t99%; discharging; (no estimate) remaining present: true
";
        let state = parse_pmset(output);
        assert!(state.is_present);
        assert_eq!(state.time_remaining_minutes, -1);
    }

    #[test]
    fn charged_battery_is_not_charging() {
        let output = "\
Now drawing from 'AC Power'
 -InternalBattery-0 (id=12582979)\t100%; charged; 0:00 remaining present: true
";
        let state = parse_pmset(output);
        assert!(state.is_present);
        assert!(!state.is_charging);
        assert!(state.on_ac_power);
        assert_eq!(state.charge_percent, 100.0);
        assert_eq!(state.time_remaining_minutes, 0);
    }

    #[test]
    fn desktop_without_battery() {
        let state = parse_pmset("Now drawing from 'AC Power'\n");
        assert!(!state.is_present);
        assert!(state.on_ac_power);
        assert_eq!(state.charge_percent, 0.0);
        assert_eq!(state.time_remaining_minutes, -1);
    }
}
