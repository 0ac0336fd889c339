//! Interface access policy
//!
//! Decides which page origins may call into the host interface. Each
//! access level maps to a list of origin rules; an origin is admitted when
//! any rule of the configured level matches it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::{BridgeError, Result};

/// Sites trusted by default at [`AccessLevel::LocalAndKnown`]
pub const DEFAULT_KNOWN_SITES: &[&str] = &["https://kodi.tv", "https://forum.kodi.tv/"];

/// Who may use the host interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Nobody
    #[default]
    Off,
    /// Pages loaded from local files
    LocalOnly,
    /// Local files and the known sites
    LocalAndKnown,
    /// Every page
    Everyone,
}

impl AccessLevel {
    /// Rules checked for this level
    pub fn rules(self) -> &'static [OriginRule] {
        match self {
            Self::Off => &[],
            Self::LocalOnly => &[OriginRule::LocalFile],
            Self::LocalAndKnown => &[OriginRule::KnownSite, OriginRule::LocalFile],
            Self::Everyone => &[OriginRule::Any],
        }
    }
}

impl TryFrom<i32> for AccessLevel {
    type Error = BridgeError;

    /// Map the numeric add-on setting value
    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::LocalOnly),
            2 => Ok(Self::LocalAndKnown),
            3 => Ok(Self::Everyone),
            other => Err(BridgeError::Config(format!("unknown access level {}", other))),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "local_only" | "local" => Ok(Self::LocalOnly),
            "local_and_known" | "known" => Ok(Self::LocalAndKnown),
            "everyone" | "all" => Ok(Self::Everyone),
            other => Err(BridgeError::Config(format!("unknown access level '{}'", other))),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::LocalOnly => "local_only",
            Self::LocalAndKnown => "local_and_known",
            Self::Everyone => "everyone",
        };
        f.write_str(name)
    }
}

/// A predicate over a page origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginRule {
    /// `file://` URLs
    LocalFile,
    /// URLs starting with one of the known site prefixes
    KnownSite,
    /// Anything
    Any,
}

/// Access policy for the host interface
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    level: AccessLevel,
    known_sites: Vec<String>,
}

impl AccessPolicy {
    /// Create a policy with the default known sites
    pub fn new(level: AccessLevel) -> Self {
        Self::with_known_sites(level, DEFAULT_KNOWN_SITES.iter().map(|s| s.to_string()))
    }

    /// Create a policy with a custom known-site list
    pub fn with_known_sites(level: AccessLevel, sites: impl IntoIterator<Item = String>) -> Self {
        Self {
            level,
            known_sites: sites.into_iter().collect(),
        }
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn set_level(&mut self, level: AccessLevel) {
        self.level = level;
    }

    /// Trust another site prefix
    pub fn add_known_site(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !self.known_sites.contains(&prefix) {
            self.known_sites.push(prefix);
        }
    }

    pub fn known_sites(&self) -> &[String] {
        &self.known_sites
    }

    /// Check if a page at `origin` may use the host interface
    pub fn is_allowed(&self, origin: &str) -> bool {
        let allowed = self
            .level
            .rules()
            .iter()
            .any(|rule| self.matches(*rule, origin));
        log::debug!("Interface access for '{}' at level {}: {}", origin, self.level, allowed);
        allowed
    }

    fn matches(&self, rule: OriginRule, origin: &str) -> bool {
        match rule {
            OriginRule::Any => true,
            OriginRule::LocalFile => Url::parse(origin)
                .map(|url| url.scheme() == "file")
                .unwrap_or(false),
            OriginRule::KnownSite => self
                .known_sites
                .iter()
                .any(|site| origin.starts_with(site.as_str())),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(AccessLevel::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_denies_everything() {
        let policy = AccessPolicy::new(AccessLevel::Off);
        assert!(!policy.is_allowed("file:///home/user/index.html"));
        assert!(!policy.is_allowed("https://kodi.tv"));
    }

    #[test]
    fn test_local_only() {
        let policy = AccessPolicy::new(AccessLevel::LocalOnly);
        assert!(policy.is_allowed("file:///home/user/index.html"));
        assert!(!policy.is_allowed("https://kodi.tv/about"));
        assert!(!policy.is_allowed("not a url"));
    }

    #[test]
    fn test_local_and_known_admits_both() {
        let policy = AccessPolicy::new(AccessLevel::LocalAndKnown);
        assert!(policy.is_allowed("https://kodi.tv/addons"));
        assert!(policy.is_allowed("https://forum.kodi.tv/showthread.php"));
        assert!(policy.is_allowed("file:///tmp/page.html"));
        assert!(!policy.is_allowed("https://example.com"));
        assert!(!policy.is_allowed("http://kodi.tv"));
    }

    #[test]
    fn test_everyone() {
        let policy = AccessPolicy::new(AccessLevel::Everyone);
        assert!(policy.is_allowed("https://example.com"));
    }

    #[test]
    fn test_custom_known_site() {
        let mut policy = AccessPolicy::new(AccessLevel::LocalAndKnown);
        policy.add_known_site("https://example.org/");
        policy.add_known_site("https://example.org/");
        assert_eq!(policy.known_sites().len(), 3);
        assert!(policy.is_allowed("https://example.org/app"));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(AccessLevel::try_from(2).unwrap(), AccessLevel::LocalAndKnown);
        assert!(AccessLevel::try_from(7).is_err());
        assert_eq!("everyone".parse::<AccessLevel>().unwrap(), AccessLevel::Everyone);
        assert_eq!(AccessLevel::LocalOnly.to_string(), "local_only");
        assert!("sometimes".parse::<AccessLevel>().is_err());
    }
}
