//! Path filters: opaque predicates over data item addresses.
//!
//! A pattern is `device:key` with `*` wildcards: `*` alone (or an empty
//! pattern) matches everything, a bare pattern selects a device, and
//! either segment may be `*` or end in `*` for prefix matching —
//! `mill-3:*`, `*:temp`, `mill-*:axis_*`.

use types::ItemAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Any,
    Exact(String),
    Prefix(String),
}

impl Segment {
    fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() || token == "*" {
            return Segment::Any;
        }
        match token.strip_suffix('*') {
            Some(prefix) => Segment::Prefix(prefix.to_string()),
            None => Segment::Exact(token.to_string()),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Exact(exact) => value == exact,
            Segment::Prefix(prefix) => value.starts_with(prefix),
        }
    }
}

/// Predicate over `device:key` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    device: Segment,
    key: Segment,
}

impl PathFilter {
    /// Matches every address.
    pub fn all() -> Self {
        Self {
            device: Segment::Any,
            key: Segment::Any,
        }
    }

    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            return Self::all();
        }
        match pattern.split_once(':') {
            Some((device, key)) => Self {
                device: Segment::parse(device),
                key: Segment::parse(key),
            },
            // A bare pattern selects a device.
            None => Self {
                device: Segment::parse(pattern),
                key: Segment::Any,
            },
        }
    }

    pub fn matches(&self, address: &ItemAddress) -> bool {
        self.device.matches(&address.device_uuid) && self.key.matches(&address.key)
    }

    pub fn matches_all(&self) -> bool {
        self.device == Segment::Any && self.key == Segment::Any
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::all()
    }
}
