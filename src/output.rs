use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

use console::{colors_enabled, style};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

fn accent<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).cyan()
}

pub fn section(title: &str) {
    println!();
    println!("{}", accent(title).bold());
}

pub fn step(message: &str) {
    println!("{} {}", accent("•").bold(), message);
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

pub fn error(message: &str) {
    println!("{} {}", style("✗").red().bold(), message);
}

pub fn error_stderr(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

pub fn muted(message: &str) {
    println!("{}", style(message).dim());
}

pub fn emphasized(value: &str) -> String {
    if std::io::stdout().is_terminal() && colors_enabled() {
        // Italic on/off (3/23) instead of a full reset so surrounding
        // styles stay active after emphasized text.
        format!("\x1b[3m{}\x1b[23m", value)
    } else {
        format!("'{}'", value)
    }
}

/// Ask a y/N question. Returns the default when not attached to a TTY.
pub fn confirm(prompt: &str, default: bool) -> std::io::Result<bool> {
    if !is_interactive() {
        return Ok(default);
    }

    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(std::io::Error::other)
}
