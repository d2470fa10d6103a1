//! User-agent classification: browser, OS, device type and model.
//!
//! Plain substring scanning; no regex engine is pulled into the WASM binary
//! for a handful of fixed patterns.

use crate::record::UNKNOWN;

/// Browser family from a user agent string.
///
/// Edge and Opera are checked before Chrome because both carry a `Chrome/`
/// token.
pub fn browser_name(ua: &str) -> &'static str {
    if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("Edg") {
        "Edge"
    } else if ua.contains("OPR") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Safari") {
        "Safari"
    } else if ua.contains("MSIE") || ua.contains("Trident") {
        "Internet Explorer"
    } else {
        UNKNOWN
    }
}

/// Major version of the first `Chrome/`, `Firefox/`, `Safari/`, `Edg/`,
/// `Opera/` or `Version/` token in the string.
pub fn browser_version(ua: &str) -> String {
    const MARKERS: &[&str] = &["Chrome/", "Firefox/", "Safari/", "Edg/", "Opera/", "Version/"];

    MARKERS
        .iter()
        .flat_map(|marker| {
            ua.match_indices(marker).filter_map(move |(pos, _)| {
                let digits = leading_digits(&ua[pos + marker.len()..]);
                (!digits.is_empty()).then(|| (pos, digits))
            })
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, digits)| digits.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Operating system family.
///
/// Android reports `Linux` and iOS reports `like Mac OS X`, so the mobile
/// systems are matched first.
pub fn os_name(ua: &str) -> &'static str {
    if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
        "iOS"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Mac OS") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else if ua.contains("Unix") {
        "Unix"
    } else {
        UNKNOWN
    }
}

/// Operating system version, `major.minor` where the UA exposes it.
pub fn os_version(ua: &str) -> String {
    let version = match os_name(ua) {
        "Windows" => major_minor_after(ua, "Windows NT ").map(|nt| {
            match nt.as_str() {
                "10.0" => "10/11".to_string(),
                "6.3" => "8.1".to_string(),
                "6.2" => "8".to_string(),
                "6.1" => "7".to_string(),
                _ => nt,
            }
        }),
        "macOS" => major_minor_after(ua, "Mac OS X "),
        "Android" => major_minor_after(ua, "Android "),
        "iOS" => major_minor_after(ua, "OS "),
        _ => None,
    };
    version.unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn is_mobile(ua: &str) -> bool {
    ["Mobile", "Android", "iPhone", "iPad"]
        .iter()
        .any(|token| ua.contains(token))
}

pub fn is_tablet(ua: &str) -> bool {
    (ua.contains("iPad") || ua.contains("Android")) && !ua.contains("Mobile")
}

/// `Mobile`, `Tablet` or `Desktop`
pub fn device_type(ua: &str) -> &'static str {
    if is_tablet(ua) {
        "Tablet"
    } else if ["Mobile", "Android", "iPhone"].iter().any(|t| ua.contains(t)) {
        "Mobile"
    } else {
        "Desktop"
    }
}

pub fn device_model(ua: &str) -> String {
    if ua.contains("iPhone") {
        // First "iPhone" followed by a word, e.g. "iPhone OS" in Safari UAs
        let model = ua.match_indices("iPhone").find_map(|(pos, marker)| {
            let rest = ua[pos + marker.len()..].trim_start();
            let word: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            (!word.is_empty()).then_some(word)
        });
        return match model {
            Some(word) => format!("iPhone {}", word),
            None => "iPhone".to_string(),
        };
    }

    if ua.contains("iPad") {
        return "iPad".to_string();
    }

    if let Some(pos) = ua.find("Android") {
        let after = &ua[pos..];
        let model = after.find(';').and_then(|semi| {
            let rest = &after[semi + 1..];
            rest.find(')').map(|close| rest[..close].trim().to_string())
        });
        return match model {
            Some(m) if !m.is_empty() => m,
            _ => "Android Device".to_string(),
        };
    }

    "Desktop/Laptop".to_string()
}

fn leading_digits(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

/// `"10_15_7"` after the marker becomes `"10.15"`; a bare major stays as is.
fn major_minor_after(ua: &str, marker: &str) -> Option<String> {
    let pos = ua.find(marker)?;
    let rest = &ua[pos + marker.len()..];

    let major = leading_digits(rest);
    if major.is_empty() {
        return None;
    }

    let tail = &rest[major.len()..];
    let minor = tail
        .strip_prefix('.')
        .or_else(|| tail.strip_prefix('_'))
        .map(leading_digits)
        .filter(|m| !m.is_empty());

    Some(match minor {
        Some(minor) => format!("{}.{}", major, minor),
        None => major.to_string(),
    })
}
