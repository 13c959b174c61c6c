//! IP whitelist: literal addresses and IPv4 CIDR ranges.
//!
//! # Design Decisions
//! - CIDR containment is IPv4 bit-mask arithmetic only; IPv6 ranges are
//!   kept as entries that never match (logged at load)
//! - Anything that fails to parse is non-matching, never an error

use std::fmt;
use std::net::Ipv4Addr;

/// One configured whitelist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistEntry {
    /// Exact address, compared case-insensitively.
    Literal(String),
    /// IPv4 range `range/prefix_len`.
    Cidr { range: u32, prefix_len: u8 },
    /// Unparsable range; kept for diagnostics, never matches.
    Invalid(String),
}

impl WhitelistEntry {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some((range, prefix)) = raw.split_once('/') else {
            return WhitelistEntry::Literal(raw.to_lowercase());
        };

        let range = ipv4_to_u32(range);
        let prefix_len = prefix.trim().parse::<u8>().ok().filter(|p| *p <= 32);
        match (range, prefix_len) {
            (Some(range), Some(prefix_len)) => WhitelistEntry::Cidr { range, prefix_len },
            _ => {
                tracing::warn!(entry = %raw, "Whitelist entry is not an IPv4 CIDR range; it will never match");
                WhitelistEntry::Invalid(raw.to_string())
            }
        }
    }

    /// `ip` must already be normalized (see `access_guard::normalize_ip`).
    pub fn matches(&self, ip: &str) -> bool {
        match self {
            WhitelistEntry::Literal(literal) => !ip.is_empty() && literal.eq_ignore_ascii_case(ip),
            WhitelistEntry::Cidr { range, prefix_len } => match ipv4_to_u32(ip) {
                Some(ip) => {
                    let mask = cidr_mask(*prefix_len);
                    (ip & mask) == (range & mask)
                }
                None => false,
            },
            WhitelistEntry::Invalid(_) => false,
        }
    }
}

impl fmt::Display for WhitelistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhitelistEntry::Literal(ip) => write!(f, "{ip}"),
            WhitelistEntry::Cidr { range, prefix_len } => {
                write!(f, "{}/{}", Ipv4Addr::from(*range), prefix_len)
            }
            WhitelistEntry::Invalid(raw) => write!(f, "{raw} (invalid)"),
        }
    }
}

/// Immutable set of entries loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    pub fn from_entries<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: raw
                .into_iter()
                .filter(|s| !s.as_ref().trim().is_empty())
                .map(|s| WhitelistEntry::parse(s.as_ref()))
                .collect(),
        }
    }

    /// First entry admitting `ip`.
    pub fn find(&self, ip: &str) -> Option<&WhitelistEntry> {
        self.entries.iter().find(|entry| entry.matches(ip))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Dotted-quad IPv4 → integer.
pub fn ipv4_to_u32(ip: &str) -> Option<u32> {
    ip.trim().parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Mask with the high `prefix_len` bits set.
pub fn cidr_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(cidr_mask(0), 0);
        assert_eq!(cidr_mask(8), 0xFF00_0000);
        assert_eq!(cidr_mask(24), 0xFFFF_FF00);
        assert_eq!(cidr_mask(32), u32::MAX);
    }

    #[test]
    fn test_cidr_membership() {
        let entry = WhitelistEntry::parse("203.0.113.0/24");
        assert!(entry.matches("203.0.113.5"));
        assert!(entry.matches("203.0.113.255"));
        assert!(!entry.matches("203.0.114.5"));
        assert!(!entry.matches("not-an-ip"));
        assert!(!entry.matches(""));
        assert_eq!(entry.to_string(), "203.0.113.0/24");

        let everything = WhitelistEntry::parse("0.0.0.0/0");
        assert!(everything.matches("8.8.8.8"));
    }

    #[test]
    fn test_literal_is_case_insensitive() {
        let entry = WhitelistEntry::parse(" 2001:DB8::1 ");
        assert!(entry.matches("2001:db8::1"));
        assert!(!entry.matches("2001:db8::2"));
        assert!(!WhitelistEntry::parse("").matches(""));
    }

    #[test]
    fn test_invalid_ranges_never_match() {
        for raw in ["2001:db8::/32", "10.0.0.0/33", "10.0.0/8", "10.0.0.0/x"] {
            let entry = WhitelistEntry::parse(raw);
            assert!(matches!(entry, WhitelistEntry::Invalid(_)), "{raw}");
            assert!(!entry.matches("10.0.0.1"));
            assert!(!entry.matches("2001:db8::1"));
        }
    }

    #[test]
    fn test_find() {
        let whitelist = Whitelist::from_entries(["198.51.100.9", "10.0.0.0/8", ""]);
        assert_eq!(whitelist.len(), 2);
        assert_eq!(
            whitelist.find("198.51.100.9"),
            Some(&WhitelistEntry::Literal("198.51.100.9".into()))
        );
        assert!(whitelist.find("10.20.30.40").is_some());
        assert!(whitelist.find("11.0.0.1").is_none());
    }
}
