use crate::orchestration::run_store::ValidationResult;
use std::path::Path;
use std::process::{Command, Stdio};

const OUTPUT_LIMIT: usize = 1000;

/// Runs `command` through `sh -c` from `cwd`. Exit status zero passes.
pub fn run_validation_command(command: &str, cwd: &Path) -> ValidationResult {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let passed = output.status.success();
            ValidationResult {
                command: command.to_string(),
                passed,
                output: non_empty(&stdout),
                error: if passed {
                    None
                } else {
                    Some(non_empty(&stderr).unwrap_or_else(|| match output.status.code() {
                        Some(code) => format!("exited with status {code}"),
                        None => "terminated by signal".to_string(),
                    }))
                },
            }
        }
        Err(err) => ValidationResult {
            command: command.to_string(),
            passed: false,
            output: None,
            error: Some(format!("failed to spawn shell: {err}")),
        },
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate_chars(trimmed, OUTPUT_LIMIT))
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
