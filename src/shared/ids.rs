use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RUN_SUFFIX_SPACE: u32 = 36 * 36 * 36 * 36;
const RUN_ID_MAX_GENERATION_ATTEMPTS: usize = 16;

/// Identifiers that end up as path segments must stay within this alphabet.
pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_identifier_value($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(RunId, "run id");
define_id_type!(AgentName, "agent name");

impl RunId {
    /// Draws a compact `run-<seconds>-<suffix>` id. `exists` lets the caller
    /// reject ids that are already taken on disk.
    pub fn generate(now: i64, exists: impl Fn(&str) -> bool) -> Result<Self, String> {
        for _ in 0..RUN_ID_MAX_GENERATION_ATTEMPTS {
            let candidate = generate_compact_run_id(now)?;
            if !exists(&candidate) {
                return Ok(Self(candidate));
            }
        }
        Err(format!(
            "failed to allocate a unique run id after {RUN_ID_MAX_GENERATION_ATTEMPTS} attempts"
        ))
    }

    pub fn generate_under(state_root: &Path, now: i64) -> Result<Self, String> {
        let agents = state_root.join("agents");
        Self::generate(now, |candidate| agents.join(candidate).exists())
    }
}

fn generate_compact_run_id(now: i64) -> Result<String, String> {
    let timestamp =
        u64::try_from(now).map_err(|_| "run id requires a non-negative timestamp".to_string())?;
    let mut bytes = [0_u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("failed to generate run id randomness: {err}"))?;
    let sample = u32::from_le_bytes(bytes) % RUN_SUFFIX_SPACE;
    Ok(format!(
        "run-{}-{}",
        base36_encode_u64(timestamp),
        base36_encode_fixed_u32(sample, 4)
    ))
}

fn base36_encode_u64(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while value > 0 {
        chars.push(BASE36_ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    chars.iter().rev().collect()
}

fn base36_encode_fixed_u32(mut value: u32, width: usize) -> String {
    let mut chars = vec!['0'; width];
    for idx in (0..width).rev() {
        chars[idx] = BASE36_ALPHABET[(value % 36) as usize] as char;
        value /= 36;
    }
    chars.into_iter().collect()
}

/// Two-segment task ordinal, stored in canonical `PP_II` form so that
/// lexicographic order matches numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Accepts `2.6`, `2_6` and `02_06`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split(['.', '_']);
        let (Some(phase), Some(index), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!(
                "task id `{trimmed}` must have the form <phase>.<index> or <phase>_<index>"
            ));
        };
        let phase = parse_segment(trimmed, phase)?;
        let index = parse_segment(trimmed, index)?;
        Ok(Self(format!("{phase:02}_{index:02}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn phase(&self) -> u32 {
        self.0
            .split('_')
            .next()
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(0)
    }
}

fn parse_segment(raw: &str, segment: &str) -> Result<u32, String> {
    if segment.is_empty() || !segment.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(format!("task id `{raw}` has a non-numeric segment"));
    }
    segment
        .parse::<u32>()
        .map_err(|err| format!("task id `{raw}` is out of range: {err}"))
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .map_err(|err| D::Error::custom(format!("invalid task id `{raw}`: {err}")))
    }
}
