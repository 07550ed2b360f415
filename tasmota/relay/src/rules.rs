//! Recognition of relay power states in console replies.
//!
//! Tasmota reports power states in many shapes, depending on the firmware revision and on the
//! command that was sent. Instead of searching for substrings one after another, all recognized
//! reply grammars are kept in an ordered rule table. The first rule that matches a line decides.

use std::fmt::Display;

use regex::Regex;

/// Power state of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Relay is energized.
    On,
    /// Relay is released.
    Off,
    /// The state could not be determined. This is not the same as [`PowerState::Off`].
    Unknown,
}

impl PowerState {
    /// The state as a boolean, `None` if unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PowerState::On => Some(true),
            PowerState::Off => Some(false),
            PowerState::Unknown => None,
        }
    }

    /// Command argument to request this state.
    pub(crate) fn as_cmd_str(&self) -> &str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
            PowerState::Unknown => "",
        }
    }

    fn from_word(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "ON" => PowerState::On,
            "OFF" => PowerState::Off,
            _ => PowerState::Unknown,
        }
    }
}

impl From<bool> for PowerState {
    fn from(value: bool) -> Self {
        if value { PowerState::On } else { PowerState::Off }
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "ON"),
            PowerState::Off => write!(f, "OFF"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// How the capture of a rule is turned into a state.
#[derive(Debug, Clone, Copy)]
enum Decode {
    /// Capture is `ON` or `OFF`.
    Word,
    /// Capture is a decimal bitmask of all relays, bit 0 being relay 1.
    Bitmask,
}

#[derive(Debug)]
struct PowerRule {
    name: &'static str,
    regex: Regex,
    decode: Decode,
}

/// Ordered rule table that recognizes the power state of one relay.
#[derive(Debug)]
pub struct PowerRules {
    relay_number: usize,
    rules: Vec<PowerRule>,
}

impl PowerRules {
    /// Build the rule table for a relay.
    ///
    /// # Arguments
    /// - `relay_number`: One-indexed relay number as used in Tasmota commands, e.g., `Power1`.
    ///
    /// For relay 1, the unsuffixed forms (`POWER ON`, `"POWER":"ON"`, ...) that single relay
    /// devices report are recognized as well.
    pub fn for_relay(relay_number: usize) -> Self {
        let mut keys = vec![format!("POWER{relay_number}")];
        if relay_number == 1 {
            keys.push("POWER".to_string());
        }

        let grammars: [(&'static str, &str); 5] = [
            ("json", r#""{key}"\s*:\s*"(ON|OFF)""#),
            ("result", r"RSL:\s*{key}\s*=\s*(ON|OFF)\b"),
            ("assign", r"\b{key}\s*=\s*(ON|OFF)\b"),
            ("colon", r"\b{key}:\s*(ON|OFF)\b"),
            ("plain", r"\b{key}\s+(ON|OFF)\b"),
        ];

        let mut rules = Vec::new();
        for (name, grammar) in grammars {
            for key in &keys {
                let pattern = format!("(?i){}", grammar.replace("{key}", &format!("{key}\\b")));
                rules.push(PowerRule {
                    name,
                    regex: compile(&pattern),
                    decode: Decode::Word,
                });
            }
        }
        rules.push(PowerRule {
            name: "status-bitmask",
            regex: compile(r#"(?i)"Power"\s*:\s*"?(\d+)"?"#),
            decode: Decode::Bitmask,
        });

        Self {
            relay_number,
            rules,
        }
    }

    /// Returns the state reported in a reply line, or `None` if no rule matches.
    ///
    /// Command echoes (`CMD: Power1 ON`) repeat the request and are never taken as a state.
    pub fn state_of(&self, line: &str) -> Option<PowerState> {
        if is_echo(line) {
            return None;
        }
        self.rules.iter().find_map(|rule| {
            let capture = rule.regex.captures(line)?.get(1)?.as_str();
            let state = match rule.decode {
                Decode::Word => PowerState::from_word(capture),
                Decode::Bitmask => self.decode_bitmask(capture)?,
            };
            log::trace!("Rule `{}` matched `{line}`: {state}", rule.name);
            Some(state)
        })
    }

    fn decode_bitmask(&self, capture: &str) -> Option<PowerState> {
        let mask: u64 = capture.parse().ok()?;
        let bit = self.relay_number.checked_sub(1)?;
        if bit >= 64 {
            return None;
        }
        Some(PowerState::from(mask & (1 << bit) != 0))
    }
}

/// Console echo of a received command, optionally behind a timestamp.
fn is_echo(line: &str) -> bool {
    line.split_whitespace()
        .take(2)
        .any(|word| word.eq_ignore_ascii_case("CMD:"))
}

/// Compile a pattern from the fixed rule set.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Built-in power state pattern should compile")
}
