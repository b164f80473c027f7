//! End-of-run summary rendering
//!
//! The summary goes to stderr so that it never mixes with the entry
//! stream on stdout.

use crate::config::ScanConfig;
use crate::walker::ScanReport;
use console::style;
use humansize::{format_size, BINARY};

/// Print the scan summary (and the config dump when verbose)
pub fn print_summary(config: &ScanConfig, report: &ScanReport) {
    if !config.print_summary {
        return;
    }

    let stats = &report.stats;
    let elapsed_micros = report.duration.as_micros().max(1) as u64;

    let entries_per_sec = stats.entries_total() * 1_000_000 / elapsed_micros;
    let elapsed_secs = elapsed_micros / 1_000_000;
    let elapsed_millis_remainder = (elapsed_micros % 1_000_000) / 1000;

    if config.verbose {
        eprintln!("{}", style("CONFIG:").bold());
        eprintln!("  * threads:       {}", config.num_threads);
        eprintln!("  * godeep:        {}", config.godeep_threshold);
        eprintln!(
            "  * flags:         stat: {}; aclcheck: {}",
            config.stat_all, config.check_acls
        );
    }

    eprintln!("{}", style("STATISTICS:").bold());

    eprintln!(
        "  * entries found: files: {}; dirs: {}; filter matches: {}",
        format_count(stats.files_found),
        format_count(stats.dirs_found),
        format_count(stats.filter_matches),
    );

    eprintln!(
        "  * special cases: unknown type: {}; errors: {}",
        format_count(stats.unknown_type),
        format_count(stats.errors),
    );

    if stats.stat_calls > 0 {
        eprintln!("  * stat calls:    {}", format_count(stats.stat_calls));
    }

    if config.check_acls {
        eprintln!(
            "  * ACLs found:    {} access; {} default",
            format_count(stats.access_acls),
            format_count(stats.default_acls),
        );
    }

    eprintln!(
        "  * scan speed:    {} entries/s; runtime: {}.{:03}s",
        format_count(entries_per_sec),
        elapsed_secs,
        elapsed_millis_remainder,
    );

    if config.copy_dest_dir.is_some() {
        let copied_per_sec = stats.bytes_copied * 1_000_000 / elapsed_micros;
        eprintln!(
            "  * copy speed:    {}/s; total: {}; skipped files: {}",
            format_size(copied_per_sec, BINARY),
            format_size(stats.bytes_copied, BINARY),
            format_count(stats.files_not_copied),
        );
    }
}

/// Group the digits of a counter with commas
///
/// A comma goes before every digit whose distance to the end of the
/// number is a nonzero multiple of three.
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (pos, digit) in digits.chars().enumerate() {
        let tail = digits.len() - pos;
        if pos > 0 && tail % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_grouping() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(100), "100");
        assert_eq!(format_count(4096), "4,096");
        assert_eq!(format_count(12_345), "12,345");
        assert_eq!(format_count(999_999), "999,999");
        assert_eq!(format_count(1_000_000), "1,000,000");
        assert_eq!(format_count(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_count_grouping_boundaries() {
        // exactly at the group edges on both sides
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
    }
}
