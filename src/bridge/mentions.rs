//! Per-bridge mention allow-list.

use std::collections::BTreeSet;
use std::fmt;

/// Categories of mentions a relayed message may ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MentionKind {
    Everyone,
    Roles,
    Users,
}

impl MentionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Roles => "roles",
            Self::Users => "users",
        }
    }

    /// Parse a mention name. `here` is folded into `everyone`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "everyone" | "here" => Some(Self::Everyone),
            "roles" => Some(Self::Roles),
            "users" => Some(Self::Users),
            _ => None,
        }
    }
}

/// Which mentions are allowed to ping at the destination.
///
/// The empty policy suppresses all pings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionPolicy {
    kinds: BTreeSet<MentionKind>,
}

impl MentionPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a policy from raw names, silently dropping unknown ones.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kinds: names
                .into_iter()
                .filter_map(|n| MentionKind::parse(n.as_ref()))
                .collect(),
        }
    }

    pub fn allows(&self, kind: MentionKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = MentionKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl fmt::Display for MentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kinds.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.kinds.iter().map(MentionKind::name).collect();
        f.write_str(&names.join(","))
    }
}
