use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const ENV_FILE: &str = ".env";

/// Read deployment secrets from `.env` in the app directory.
///
/// Line grammar: `KEY=VALUE`, `#` starts a comment, whitespace around
/// key and value is trimmed, blank lines and lines with an empty key are
/// skipped. No escape processing.
pub fn read_secrets<P: AsRef<Path>>(app_dir: P) -> HashMap<String, String> {
    let path = app_dir.as_ref().join(ENV_FILE);
    match fs::read_to_string(path) {
        Ok(content) => parse(&content),
        Err(_) => HashMap::new(),
    }
}

fn parse(content: &str) -> HashMap<String, String> {
    let mut secrets = HashMap::new();

    for line in content.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        secrets.insert(key.to_string(), value.trim().to_string());
    }

    secrets
}
