//! Host-wide figures: load averages, core count, process count.

/// Parse `sysctl -n vm.loadavg` output: `{ 1.84 1.90 2.01 }`.
pub fn parse_loadavg(output: &str) -> Option<(f64, f64, f64)> {
    let inner = output
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();
    let mut fields = inner.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some((one, five, fifteen))
}

/// Parse a single-value numeric sysctl output such as `hw.ncpu`.
pub fn parse_count(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

/// Count non-empty lines; used on `ps -axo pid=` output where each line is
/// one process.
pub fn count_lines(output: &str) -> u32 {
    output.lines().filter(|line| !line.trim().is_empty()).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loadavg_braced_triple_parses() {
        assert_eq!(parse_loadavg("{ 1.84 1.90 2.01 }\n"), Some((1.84, 1.90, 2.01)));
        assert_eq!(parse_loadavg("{ 0.00 0.01 0.05 }"), Some((0.0, 0.01, 0.05)));
    }

    #[test]
    fn malformed_loadavg_is_rejected() {
        assert_eq!(parse_loadavg(""), None);
        assert_eq!(parse_loadavg("{ 1.84 1.90 }"), None);
        assert_eq!(parse_loadavg("load average: 1.84"), None);
    }

    #[test]
    fn count_parses_with_surrounding_whitespace() {
        assert_eq!(parse_count("10\n"), Some(10));
        assert_eq!(parse_count("  8  "), Some(8));
        assert_eq!(parse_count("many"), None);
    }

    #[test]
    fn process_lines_counted_ignoring_blanks() {
        assert_eq!(count_lines("  1\n 42\n367\n\n"), 3);
        assert_eq!(count_lines(""), 0);
    }
}
