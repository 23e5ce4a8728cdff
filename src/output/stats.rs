//! Statistics reporting.

use console::style;

use crate::download::AcquireStats;

/// Print segment download statistics.
pub fn print_acquire_stats(stats: &AcquireStats) {
    println!();
    println!("{}", style("Download statistics:").bold());
    println!("  Chunks:     {}", stats.total);
    println!("  Downloaded: {}", style(stats.downloaded).green());
    println!("  Resumed:    {} (already on disk)", stats.skipped);
    if stats.retries > 0 {
        println!("  Retries:    {}", style(stats.retries).yellow());
    }
}
