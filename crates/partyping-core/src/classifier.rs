//! Maps decoded log lines to party notifications.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::log_line::LogLine;
use crate::notification::Notification;

/// Event code of party filled / disbanded system messages.
pub const CODE_PARTY_STATUS: i64 = 57;
/// Event code of party join / leave / return messages.
pub const CODE_PARTY_MEMBERSHIP: i64 = 8761;

const FILLED_PATTERN: &str = "have been filled";
const DISBANDED_PATTERN: &str = "has been disbanded";
const JOINED_PATTERN: &str = "joins the party";
const LEFT_PATTERN: &str = "left the party";

/// Which party events produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyToggles {
    pub fill: bool,
    pub disband: bool,
    pub join: bool,
    pub leave: bool,
}

impl Default for NotifyToggles {
    fn default() -> Self {
        Self {
            fill: true,
            disband: false,
            join: false,
            leave: false,
        }
    }
}

impl NotifyToggles {
    /// Returns `true` if no event category is enabled.
    pub fn is_silent(&self) -> bool {
        !(self.fill || self.disband || self.join || self.leave)
    }
}

/// Stateless classifier over a fixed set of toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    toggles: NotifyToggles,
}

impl Classifier {
    pub fn new(toggles: NotifyToggles) -> Self {
        Self { toggles }
    }

    pub fn toggles(&self) -> NotifyToggles {
        self.toggles
    }

    /// Produce the notification for `log_line`, if any.
    pub fn classify(&self, log_line: &LogLine) -> Option<Notification> {
        let line = log_line.line.as_str();
        let t = &self.toggles;

        match log_line.code {
            CODE_PARTY_STATUS => {
                if t.fill && line.contains(FILLED_PATTERN) {
                    Some(Notification::new("Your Party Has Filled", line, "gamelan"))
                } else if t.disband && line.contains(DISBANDED_PATTERN) {
                    Some(Notification::new("Your Party Has Disbanded", line, "none"))
                } else {
                    None
                }
            }
            CODE_PARTY_MEMBERSHIP => {
                if t.join && line.contains(JOINED_PATTERN) {
                    Some(Notification::new(
                        "Player Joined Your Party",
                        camel_case_spaced(line),
                        "none",
                    ))
                } else if t.leave && line.contains(LEFT_PATTERN) {
                    Some(Notification::new(
                        "Player Left Your Party",
                        camel_case_spaced(line),
                        "none",
                    ))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn capital_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("([a-z'])([A-Z])").expect("static regex is valid"))
}

/// Insert a space between a lowercase letter or apostrophe and a following
/// uppercase letter, everywhere in `input`.
///
/// Player names arrive glued to the next word (`"Foo BarJoins the party."`).
pub fn camel_case_spaced(input: &str) -> String {
    capital_boundary()
        .replace_all(input, "$1 $2")
        .into_owned()
}
