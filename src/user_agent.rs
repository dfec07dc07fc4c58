//! User-Agent classification
//!
//! Device type, browser family and operating system are derived from the raw
//! `User-Agent` header with ordered substring rules. The first matching rule
//! wins, so the order of each table is part of the contract: a Chrome UA also
//! contains "Safari", and an iPad UA matches both the tablet and the mobile
//! patterns.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
pub enum Browser {
    Chrome,
    Safari,
    Firefox,
    Edge,
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
pub enum Os {
    Windows,
    #[serde(rename = "macOS")]
    #[strum(serialize = "macOS")]
    MacOs,
    Linux,
    Android,
    #[serde(rename = "iOS")]
    #[strum(serialize = "iOS")]
    Ios,
    Unknown,
}

/// Result of classifying a single user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub device_type: DeviceType,
    pub browser: Browser,
    pub os: Os,
}

/// Case-insensitive tokens, checked before the mobile tokens.
const TABLET_TOKENS: &[&str] = &["tablet", "ipad"];

/// Case-insensitive tokens. "ipad" is listed here too; the tablet check
/// above is what keeps iPads out of this bucket.
const MOBILE_TOKENS: &[&str] = &["mobile", "android", "iphone", "ipad"];

/// Case-sensitive, in priority order.
const BROWSER_RULES: &[(&str, Browser)] = &[
    ("Chrome", Browser::Chrome),
    ("Safari", Browser::Safari),
    ("Firefox", Browser::Firefox),
    ("Edge", Browser::Edge),
];

/// Case-sensitive, in priority order.
const OS_RULES: &[(&str, Os)] = &[
    ("Windows", Os::Windows),
    ("Mac", Os::MacOs),
    ("Linux", Os::Linux),
    ("Android", Os::Android),
    ("iOS", Os::Ios),
];

pub fn classify(user_agent: &str) -> ClientInfo {
    ClientInfo {
        device_type: device_type(user_agent),
        browser: first_match(user_agent, BROWSER_RULES).unwrap_or(Browser::Unknown),
        os: first_match(user_agent, OS_RULES).unwrap_or(Os::Unknown),
    }
}

fn device_type(user_agent: &str) -> DeviceType {
    let lowered = user_agent.to_ascii_lowercase();
    let matches_any = |tokens: &[&str]| tokens.iter().any(|t| lowered.contains(t));

    if matches_any(TABLET_TOKENS) {
        DeviceType::Tablet
    } else if matches_any(MOBILE_TOKENS) {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

fn first_match<T: Copy>(user_agent: &str, rules: &[(&str, T)]) -> Option<T> {
    rules
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, label)| *label)
}
