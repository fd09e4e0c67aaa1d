use crate::provider::{AgentRequest, InvocationSpec};
use std::collections::BTreeMap;

/// Variables forwarded to the agent process; everything else is dropped.
const PASSTHROUGH_VARS: [&str; 12] = [
    "ANTHROPIC_API_KEY",
    "GITHUB_PAT",
    "CLAUDE_CODE_PATH",
    "HOME",
    "USER",
    "PATH",
    "SHELL",
    "TERM",
    "LANG",
    "LC_ALL",
    "PYTHONPATH",
    "TMPDIR",
];

pub fn build_invocation(request: &AgentRequest, binary: &str) -> InvocationSpec {
    let mut args = vec![
        "-p".to_string(),
        request.directive.clone(),
        "--model".to_string(),
        request.model.clone(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
    ];
    if request.skip_permissions {
        args.push("--dangerously-skip-permissions".to_string());
    }
    InvocationSpec {
        binary: binary.to_string(),
        args,
    }
}

pub fn safe_subprocess_env() -> BTreeMap<String, String> {
    safe_env_from(|key| std::env::var(key).ok())
}

pub(crate) fn safe_env_from(lookup: impl Fn(&str) -> Option<String>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for key in PASSTHROUGH_VARS {
        if let Some(value) = lookup(key) {
            env.insert(key.to_string(), value);
        }
    }
    if let Some(pat) = env.get("GITHUB_PAT").cloned() {
        env.insert("GH_TOKEN".to_string(), pat);
    }
    env.insert(
        "CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR".to_string(),
        lookup("CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR").unwrap_or_else(|| "true".to_string()),
    );
    env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
    env
}
