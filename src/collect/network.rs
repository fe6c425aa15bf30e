//! Interface counter parsing from `netstat -ibn` output.
//!
//! The table repeats each interface once per address family plus one
//! `<Link#n>` row carrying the hardware-level counters. Only link rows are
//! parsed; address rows replace the error columns with `-` and would double
//! count anyway.

use crate::probe::NetworkCounters;

/// Cumulative counters for one interface's link row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfaceCounters {
    pub name: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
}

impl IfaceCounters {
    /// Parse one `netstat -ibn` row. Returns `None` for header rows,
    /// address rows, and rows missing counter columns.
    fn parse_link_row(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        let link_pos = rest.iter().position(|token| token.starts_with("<Link#"))?;

        // Loopback and some virtual links have no hardware address, so the
        // column after <Link#n> is either an address or already Ipkts.
        let mut tail = &rest[link_pos + 1..];
        if let Some(first) = tail.first() {
            if first.parse::<u64>().is_err() {
                tail = &tail[1..];
            }
        }
        // Ipkts Ierrs Ibytes Opkts Oerrs Obytes
        if tail.len() < 6 {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            packets_in: tail[0].parse().ok()?,
            bytes_in: tail[2].parse().ok()?,
            packets_out: tail[3].parse().ok()?,
            bytes_out: tail[5].parse().ok()?,
        })
    }

    /// Loopback interfaces carry mirrored local traffic, not host I/O.
    pub fn is_loopback(&self) -> bool {
        self.name.starts_with("lo")
    }
}

/// Parse full `netstat -ibn` output into per-interface link counters.
pub fn parse_netstat(output: &str) -> Vec<IfaceCounters> {
    output
        .lines()
        .filter_map(IfaceCounters::parse_link_row)
        .collect()
}

/// Sum counters across non-loopback interfaces.
pub fn totals(interfaces: &[IfaceCounters]) -> NetworkCounters {
    let mut sum = NetworkCounters::default();
    for iface in interfaces.iter().filter(|iface| !iface.is_loopback()) {
        sum.bytes_in = sum.bytes_in.saturating_add(iface.bytes_in);
        sum.bytes_out = sum.bytes_out.saturating_add(iface.bytes_out);
        sum.packets_in = sum.packets_in.saturating_add(iface.packets_in);
        sum.packets_out = sum.packets_out.saturating_add(iface.packets_out);
    }
    sum
}
