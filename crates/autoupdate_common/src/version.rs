//! Release version parsing and ordering
//!
//! Accepts the tag styles used by loader releases (`v3.0.5`, `v3.0.5-pre1`)
//! and OS image versions (`41.20241020.0`). Comparison pads missing release
//! components with zeros and orders pre-release < final < post-release.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{AutoUpdateError, Result};

/// Pre-release kinds, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

/// Position of a version relative to its final release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Only carried by [`Version::ZERO`]; sorts below every parsed stage
    Unknown,
    Pre(PreKind, u64),
    Final,
    Post(u64),
}

#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    stage: Stage,
}

impl Version {
    /// Lowest version. Stands in for anything missing or unparseable,
    /// so every parsed version, `0.0.0-pre1` included, compares above it.
    pub const ZERO: Version = Version {
        release: Vec::new(),
        stage: Stage::Unknown,
    };

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_prerelease(&self) -> bool {
        matches!(self.stage, Stage::Pre(..))
    }

    pub fn is_zero(&self) -> bool {
        self.stage == Stage::Unknown
    }

    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || AutoUpdateError::InvalidVersion(input.to_string());

        let trimmed = input.trim();
        let without_prefix = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        // Local labels (`+build.5`) never take part in ordering
        let public = without_prefix.split('+').next().unwrap_or_default();
        let lowered = public.to_ascii_lowercase();

        let release_end = lowered
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(lowered.len());
        let (release_part, suffix) = lowered.split_at(release_end);
        let release_part = release_part.strip_suffix('.').unwrap_or(release_part);

        if release_part.is_empty() {
            return Err(invalid());
        }

        let release = release_part
            .split('.')
            .map(|component| component.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<u64>>>()?;

        let stage = if suffix.is_empty() {
            Stage::Final
        } else {
            parse_stage(suffix).ok_or_else(invalid)?
        };

        Ok(Self { release, stage })
    }

    /// Parse `input`, falling back to [`Version::ZERO`] with a warning.
    pub fn parse_or_zero(input: Option<&str>) -> Self {
        match input {
            Some(raw) => Self::parse(raw).unwrap_or_else(|e| {
                warn!("{}, treating as {}", e, Self::ZERO);
                Self::ZERO
            }),
            None => {
                warn!("No version available, treating as {}", Self::ZERO);
                Self::ZERO
            }
        }
    }

    fn component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

fn parse_stage(suffix: &str) -> Option<Stage> {
    let rest = suffix.strip_prefix(['-', '_', '.']).unwrap_or(suffix);

    let label_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (label, rest) = rest.split_at(label_end);

    let rest = rest.strip_prefix(['-', '_', '.']).unwrap_or(rest);
    let number = if rest.is_empty() {
        0
    } else {
        rest.parse::<u64>().ok()?
    };

    match label {
        "a" | "alpha" => Some(Stage::Pre(PreKind::Alpha, number)),
        "b" | "beta" => Some(Stage::Pre(PreKind::Beta, number)),
        "c" | "rc" | "pre" | "preview" => Some(Stage::Pre(PreKind::Rc, number)),
        "post" | "rev" | "r" => Some(Stage::Post(number)),
        _ => None,
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| self.stage.cmp(&other.stage))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = AutoUpdateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.release.is_empty() {
            write!(f, "0.0.0")?;
        } else {
            let parts: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
            write!(f, "{}", parts.join("."))?;
        }

        match self.stage {
            Stage::Pre(PreKind::Alpha, n) => write!(f, "a{}", n),
            Stage::Pre(PreKind::Beta, n) => write!(f, "b{}", n),
            Stage::Pre(PreKind::Rc, n) => write!(f, "rc{}", n),
            Stage::Unknown | Stage::Final => Ok(()),
            Stage::Post(n) => write!(f, ".post{}", n),
        }
    }
}
