//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     spaces-dl                                         ║
║     Download recorded Twitter/X Spaces as MP3         ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print task summary.
pub fn print_task_summary(space_id: &str, login: &str, output_dir: &str) {
    println!();
    println!("{}", style("Task:").bold());
    println!("  Space:     {}", space_id);
    println!("  Login:     {}", login);
    println!("  Directory: {}", output_dir);
    println!();
}
