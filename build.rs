// Build script - reads defaults.yaml at compile time and generates constants
// This allows changing defaults during development without editing source code

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Tell Cargo to rerun if defaults.yaml changes
    println!("cargo:rerun-if-changed=src/defaults.yaml");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("compiled_defaults.rs");

    // Try to read defaults.yaml from src/, fall back to hardcoded defaults if not found
    let defaults = if Path::new("src/defaults.yaml").exists() {
        let content = fs::read_to_string("src/defaults.yaml")
            .expect("Failed to read src/defaults.yaml");
        parse_defaults(&content)
    } else {
        CompiledDefaults::default()
    };

    let generated = format!(
        r#"// Auto-generated from defaults.yaml at compile time
// Do not edit - modify defaults.yaml and rebuild instead

pub const DEFAULT_MAX_SIZE: &str = {max_size:?};
pub const SCRIPT_INTERPRETER: &str = {interpreter:?};
"#,
        max_size = defaults.max_size,
        interpreter = defaults.interpreter,
    );

    fs::write(&dest_path, generated).expect("Failed to write compiled defaults");
}

struct CompiledDefaults {
    max_size: String,
    interpreter: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            max_size: "1GiB".to_string(),
            interpreter: "/usr/bin/fish".to_string(),
        }
    }
}

fn parse_defaults(content: &str) -> CompiledDefaults {
    let mut defaults = CompiledDefaults::default();

    // Simple YAML parsing (avoiding external dependencies in build script)
    let mut in_defaults = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("defaults:") {
            in_defaults = true;
            continue;
        }

        // A non-indented key closes the section
        if !trimmed.is_empty() && !trimmed.starts_with('#') && !line.starts_with(' ') && !line.starts_with('\t') {
            in_defaults = false;
        }

        if !in_defaults {
            continue;
        }

        if let Some((key, value)) = parse_kv(trimmed) {
            match key {
                "max_size" => defaults.max_size = unquote(value),
                "interpreter" => defaults.interpreter = unquote(value),
                _ => {}
            }
        }
    }

    defaults
}

fn parse_kv(line: &str) -> Option<(&str, &str)> {
    // Skip comments and empty lines
    if line.starts_with('#') || line.is_empty() {
        return None;
    }

    let colon_pos = line.find(':')?;
    let key = line[..colon_pos].trim();
    let mut value = line[colon_pos + 1..].trim();

    // Remove inline comments
    if let Some(comment_pos) = value.find(" #") {
        value = value[..comment_pos].trim();
    }

    if value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').trim_matches('\'').to_string()
}
