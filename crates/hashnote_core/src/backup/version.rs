//! Backup version stamps.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Version of the running application, stamped into every export.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dotted numeric version. Missing or non-numeric parts read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AppVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl AppVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut parts = raw
            .trim()
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<u64>().unwrap_or(0)
            });
        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    pub fn current() -> Self {
        Self::parse(APP_VERSION)
    }
}

impl Display for AppVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Raised when a backup was written by a newer application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewerVersionWarning {
    pub backup_version: String,
    pub running_version: String,
}

impl Display for NewerVersionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "backup was created with version {} but this is version {}; some data may not import correctly",
            self.backup_version, self.running_version
        )
    }
}

/// Compares a backup's version with the running one.
pub fn check_compatibility(backup_version: Option<&str>) -> Option<NewerVersionWarning> {
    let raw = backup_version?;
    let running = AppVersion::current();
    match AppVersion::parse(raw).cmp(&running) {
        Ordering::Greater => Some(NewerVersionWarning {
            backup_version: raw.to_string(),
            running_version: running.to_string(),
        }),
        _ => None,
    }
}
