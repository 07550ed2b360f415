//! Tasmota firmware versions.

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use benchlink::InstrumentError;

/// A firmware version such as `13.2.0(release-tasmota)`.
///
/// Only the dotted numeric part takes part in comparisons. The build suffix in parentheses is
/// kept for display.
#[derive(Debug, Clone)]
pub struct FirmwareVersion {
    numbers: Vec<u32>,
    build: Option<String>,
}

impl FirmwareVersion {
    /// The numeric components, e.g., `[13, 2, 0]`.
    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// The build suffix without parentheses, e.g., `release-tasmota`.
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Returns `true` if this version is the same as or newer than `minimum`.
    pub fn at_least(&self, minimum: &FirmwareVersion) -> bool {
        self.cmp_numbers(minimum) != Ordering::Less
    }

    /// Compare the numeric parts, treating missing components as zero.
    fn cmp_numbers(&self, other: &FirmwareVersion) -> Ordering {
        let len = self.numbers.len().max(other.numbers.len());
        (0..len)
            .map(|i| {
                let a = self.numbers.get(i).copied().unwrap_or(0);
                let b = other.numbers.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_numbers(other) == Ordering::Equal
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_numbers(other))
    }
}

impl FromStr for FirmwareVersion {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (numeric, build) = match s.split_once('(') {
            Some((numeric, rest)) => (
                numeric.trim(),
                Some(rest.trim_end_matches(')').trim().to_string()),
            ),
            None => (s, None),
        };

        let numbers = numeric
            .split('.')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InstrumentError::ResponseParseError(s.to_string()))?;

        Ok(FirmwareVersion { numbers, build })
    }
}

impl Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let numeric: Vec<String> = self.numbers.iter().map(u32::to_string).collect();
        write!(f, "{}", numeric.join("."))?;
        if let Some(build) = &self.build {
            write!(f, "({build})")?;
        }
        Ok(())
    }
}
