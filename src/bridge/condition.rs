//! Bridge conditions and their evaluation.
//!
//! A condition pairs a message attribute with a regex. The pattern is
//! searched for anywhere in the attribute value (unanchored), so `^`/`$`
//! must be spelled out for exact matches.

use std::fmt;
use std::str::FromStr;

use fancy_regex::Regex;
use tracing::warn;

use crate::common::{ConditionError, InboundMessage};

/// The message attributes a condition can inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// Author's user id.
    UserId,
    /// Author's display name in the source guild.
    UserName,
    /// Message content.
    Text,
    /// Source channel id.
    ChannelId,
    /// Source channel name.
    ChannelName,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::UserId,
        Attribute::UserName,
        Attribute::Text,
        Attribute::ChannelId,
        Attribute::ChannelName,
    ];

    /// Short code used in commands and in the `attributes` table.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserId => "uid",
            Self::UserName => "uname",
            Self::Text => "text",
            Self::ChannelId => "cid",
            Self::ChannelName => "cname",
        }
    }

    /// Pull this attribute's value out of a message.
    pub fn extract(&self, message: &InboundMessage) -> String {
        match self {
            Self::UserId => message.author_id.to_string(),
            Self::UserName => message.author_name.clone().unwrap_or_default(),
            Self::Text => message.text.clone(),
            Self::ChannelId => message.source.channel_id.to_string(),
            Self::ChannelName => message.channel_name.clone(),
        }
    }

    /// Comma separated list of all codes, for help texts.
    pub fn codes() -> String {
        Self::ALL.iter().map(Attribute::code).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Attribute {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.code() == lowered)
            .ok_or_else(|| ConditionError::UnknownAttribute {
                name: s.to_string(),
            })
    }
}

/// An attribute/pattern pair guarding a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: Attribute,
    pub regex: String,
}

impl Condition {
    pub fn new(attribute: Attribute, regex: impl Into<String>) -> Self {
        Self {
            attribute,
            regex: regex.into(),
        }
    }

    /// Compile the pattern.
    pub fn compile(&self) -> Result<Regex, ConditionError> {
        Regex::new(&self.regex).map_err(|e| ConditionError::InvalidPattern {
            pattern: self.regex.clone(),
            message: e.to_string(),
        })
    }

    /// Test the condition, surfacing pattern problems to the caller.
    ///
    /// The pattern is compiled on every call.
    pub fn try_evaluate(&self, message: &InboundMessage) -> Result<bool, ConditionError> {
        self.compile()?
            .is_match(&self.attribute.extract(message))
            .map_err(|e| ConditionError::MatchFailed {
                pattern: self.regex.clone(),
                message: e.to_string(),
            })
    }

    /// Test the condition, failing closed on any pattern error.
    pub fn evaluate(&self, message: &InboundMessage) -> bool {
        self.try_evaluate(message).unwrap_or_else(|e| {
            warn!(attribute = %self.attribute, "Condition does not hold: {}", e);
            false
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.attribute, self.regex)
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    /// Parse `attribute:regex`. Only the first `:` separates, the pattern may contain more.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (attribute, regex) =
            s.trim()
                .split_once(':')
                .ok_or_else(|| ConditionError::InvalidPattern {
                    pattern: s.to_string(),
                    message: "expected attribute:regex".to_string(),
                })?;

        if regex.is_empty() {
            return Err(ConditionError::InvalidPattern {
                pattern: s.to_string(),
                message: "empty regex".to_string(),
            });
        }

        Ok(Self::new(attribute.parse()?, regex))
    }
}
