//! Terminal styling for the command-line front end

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("scorebin").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!("    {}", style("Bucketing for credit-scoring features").dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// One labelled line of the configuration card
pub struct ConfigLine<'a> {
    pub icon: &'a Emoji<'a, 'a>,
    pub label: &'a str,
    pub value: String,
}

/// Print a configuration card
pub fn print_config(lines: &[ConfigLine<'_>]) {
    let box_width = 60;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!("    │ {}{}│", style("Configuration").cyan().bold(), " ".repeat(box_width - 16));
    println!("    ├{}┤", line);
    for entry in lines {
        println!(
            "    │  {}{:<10} {:<42}│",
            entry.icon,
            entry.label,
            truncate_string(&entry.value, 42)
        );
    }
    println!("    └{}┘", line);
    println!();
}

/// Path shown in the configuration card
pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!("    {}", style(format!("({:.2}s)", elapsed.as_secs_f64())).dim());
}

pub fn print_completion(message: &str) {
    println!();
    println!("    {} {}", ROCKET, style(message).green().bold());
    println!();
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
