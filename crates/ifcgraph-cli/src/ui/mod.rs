use console::style;
use ifcgraph_graph::BuildPhase;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", style("✔").green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    println!("{} {}", style("✖").red(), msg);
}

/// Print info message (indented)
pub fn info(msg: &str) {
    println!("  {}", msg);
}

/// Print a header/title
pub fn header(msg: &str) {
    println!();
    println!("  {}", style(msg).bold());
    println!();
}

/// Print an aligned `label  count` row
pub fn count_row(label: &str, count: i64) {
    println!("  {:<40} {:>8}", label, style(count).cyan());
}

/// Create a progress bar
pub fn progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::default_bar().template("⚡ {msg}...  {bar:20.cyan/dim} {pos}/{len}") {
        pb.set_style(bar_style.progress_chars("█▓░"));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a spinner for indeterminate progress
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Message shown while a build phase runs
pub fn phase_message(phase: BuildPhase) -> &'static str {
    match phase {
        BuildPhase::NodePass => "Creating nodes",
        BuildPhase::RelationshipPass => "Creating relationships",
        BuildPhase::Idle | BuildPhase::Done => "Building graph",
    }
}
