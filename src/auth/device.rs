//! User-agent parsing for session device descriptors.
//!
//! This only needs to be good enough to show a user a recognisable label
//! for each session ("iOS 17.2 smartphone iPhone Apple"), so it covers the
//! common platforms with a handful of patterns rather than a full UA
//! database.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref WINDOWS_REGEX: Regex = Regex::new(r"Windows NT (\d+\.\d+)").unwrap();
    static ref ANDROID_REGEX: Regex = Regex::new(r"Android (\d+(?:\.\d+)*)").unwrap();
    /// Model follows the Android version: "Android 14; Pixel 8 Build/..." or "Android 14; SM-S918B)"
    static ref ANDROID_MODEL_REGEX: Regex =
        Regex::new(r"Android [^;)]*;(?:\s*[a-z]{2}[-_][A-Za-z]{2};)?\s*([^;)]+?)(?:\s+Build/[^;)]*)?\)").unwrap();
    static ref IOS_REGEX: Regex = Regex::new(r"(?:iPhone )?OS (\d+(?:_\d+)*) like Mac OS X").unwrap();
    static ref MACOS_REGEX: Regex = Regex::new(r"Mac OS X (\d+(?:[_.]\d+)*)").unwrap();
    static ref BOT_REGEX: Regex =
        Regex::new(r"(?i)(bot|crawler|spider|slurp|curl|wget|python-requests|httpclient)").unwrap();
}

/// Known Android model prefixes and their brands
const ANDROID_BRANDS: &[(&str, &str)] = &[
    ("SM-", "Samsung"),
    ("Galaxy", "Samsung"),
    ("Pixel", "Google"),
    ("Nexus", "Google"),
    ("Redmi", "Xiaomi"),
    ("POCO", "Xiaomi"),
    ("Mi ", "Xiaomi"),
    ("HUAWEI", "Huawei"),
    ("ONEPLUS", "OnePlus"),
    ("OnePlus", "OnePlus"),
    ("moto", "Motorola"),
    ("Nokia", "Nokia"),
    ("CPH", "OPPO"),
    ("vivo", "vivo"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Desktop,
    Smartphone,
    Tablet,
    Bot,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Smartphone => "smartphone",
            DeviceType::Tablet => "tablet",
            DeviceType::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<DeviceType>,
    pub device_name: Option<String>,
    pub brand: Option<String>,
}

impl DeviceInfo {
    pub fn parse(user_agent: &str) -> Self {
        let ua = user_agent.trim();
        let mut info = DeviceInfo::default();
        if ua.is_empty() {
            return info;
        }

        if BOT_REGEX.is_match(ua) {
            info.device_type = Some(DeviceType::Bot);
            return info;
        }

        if ua.contains("iPad") || ua.contains("iPhone") || ua.contains("iPod") {
            let is_ipad = ua.contains("iPad");
            info.os_name = Some(if is_ipad { "iPadOS" } else { "iOS" }.to_string());
            info.os_version = IOS_REGEX
                .captures(ua)
                .map(|c| c[1].replace('_', "."));
            info.device_type = Some(if is_ipad {
                DeviceType::Tablet
            } else {
                DeviceType::Smartphone
            });
            info.device_name = Some(
                if is_ipad {
                    "iPad"
                } else if ua.contains("iPod") {
                    "iPod"
                } else {
                    "iPhone"
                }
                .to_string(),
            );
            info.brand = Some("Apple".to_string());
        } else if let Some(caps) = ANDROID_REGEX.captures(ua) {
            info.os_name = Some("Android".to_string());
            info.os_version = Some(caps[1].to_string());
            info.device_type = Some(if ua.contains("Mobile") {
                DeviceType::Smartphone
            } else {
                DeviceType::Tablet
            });
            if let Some(model) = ANDROID_MODEL_REGEX
                .captures(ua)
                .map(|c| c[1].trim().to_string())
                .filter(|m| !m.is_empty() && m != "K")
            {
                info.brand = ANDROID_BRANDS
                    .iter()
                    .find(|(prefix, _)| model.starts_with(prefix))
                    .map(|(_, brand)| brand.to_string());
                info.device_name = Some(model);
            }
        } else if let Some(caps) = WINDOWS_REGEX.captures(ua) {
            info.os_name = Some("Windows".to_string());
            info.os_version = Some(windows_version(&caps[1]).to_string());
            info.device_type = Some(DeviceType::Desktop);
        } else if ua.contains("CrOS") {
            info.os_name = Some("Chrome OS".to_string());
            info.device_type = Some(DeviceType::Desktop);
        } else if let Some(caps) = MACOS_REGEX.captures(ua) {
            info.os_name = Some("Mac".to_string());
            info.os_version = Some(caps[1].replace('_', "."));
            info.device_type = Some(DeviceType::Desktop);
            info.brand = Some("Apple".to_string());
        } else if ua.contains("Linux") || ua.contains("X11") {
            info.os_name = Some("GNU/Linux".to_string());
            info.device_type = Some(DeviceType::Desktop);
        }

        info
    }

    pub fn is_empty(&self) -> bool {
        *self == DeviceInfo::default()
    }
}

fn windows_version(nt: &str) -> &str {
    match nt {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.1" | "5.2" => "XP",
        other => other,
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("unknown device");
        }

        let parts = [
            self.os_name.as_deref(),
            self.os_version.as_deref(),
            self.device_type.map(|t| t.as_str()),
            self.device_name.as_deref(),
            self.brand.as_deref(),
        ];
        let label = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");
        f.write_str(&label)
    }
}

/// Session descriptor for an optional `User-Agent` header value
pub fn describe_user_agent(user_agent: Option<&str>) -> String {
    DeviceInfo::parse(user_agent.unwrap_or_default()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iphone() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";
        assert_eq!(describe_user_agent(Some(ua)), "iOS 17.2.1 smartphone iPhone Apple");
    }

    #[test]
    fn test_ipad() {
        let ua = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
        let info = DeviceInfo::parse(ua);
        assert_eq!(info.os_name.as_deref(), Some("iPadOS"));
        assert_eq!(info.os_version.as_deref(), Some("16.6"));
        assert_eq!(info.device_type, Some(DeviceType::Tablet));
    }

    #[test]
    fn test_android_phone() {
        let ua = "Mozilla/5.0 (Linux; Android 14; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
        let info = DeviceInfo::parse(ua);
        assert_eq!(info.os_name.as_deref(), Some("Android"));
        assert_eq!(info.os_version.as_deref(), Some("14"));
        assert_eq!(info.device_type, Some(DeviceType::Smartphone));
        assert_eq!(info.device_name.as_deref(), Some("SM-S918B"));
        assert_eq!(info.brand.as_deref(), Some("Samsung"));
    }

    #[test]
    fn test_android_build_suffix() {
        let ua = "Mozilla/5.0 (Linux; Android 13; Pixel 7 Build/TQ3A.230805.001) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0 Mobile Safari/537.36";
        let info = DeviceInfo::parse(ua);
        assert_eq!(info.device_name.as_deref(), Some("Pixel 7"));
        assert_eq!(info.brand.as_deref(), Some("Google"));
    }

    #[test]
    fn test_android_tablet_without_mobile() {
        let ua = "Mozilla/5.0 (Linux; Android 12; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0 Safari/537.36";
        assert_eq!(DeviceInfo::parse(ua).device_type, Some(DeviceType::Tablet));
    }

    #[test]
    fn test_windows_desktop() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        assert_eq!(describe_user_agent(Some(ua)), "Windows 10 desktop");
    }

    #[test]
    fn test_macos() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";
        assert_eq!(describe_user_agent(Some(ua)), "Mac 10.15.7 desktop Apple");
    }

    #[test]
    fn test_linux() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(describe_user_agent(Some(ua)), "GNU/Linux desktop");
    }

    #[test]
    fn test_bots_and_tools() {
        assert_eq!(describe_user_agent(Some("curl/8.4.0")), "bot");
        assert_eq!(
            describe_user_agent(Some("Mozilla/5.0 (compatible; Googlebot/2.1)")),
            "bot"
        );
    }

    #[test]
    fn test_missing_or_unknown() {
        assert_eq!(describe_user_agent(None), "unknown device");
        assert_eq!(describe_user_agent(Some("")), "unknown device");
        assert_eq!(describe_user_agent(Some("SomethingElse/1.0")), "unknown device");
    }
}
