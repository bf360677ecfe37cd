use chrono::{DateTime, SecondsFormat};

/// Parse Kubernetes-style durations ("30s", "5m", "1h30m", "1500ms", or a
/// bare number of seconds) into whole seconds, rounding sub-second
/// remainders up.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let mut total_ms: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let n: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => return None,
        };
        total_ms = total_ms.checked_add(n.checked_mul(factor)?)?;
        rest = &rest[unit_len..];
    }
    Some(total_ms.div_ceil(1_000))
}

/// Render milliseconds the way Go's `time.Duration` prints them, which is
/// what `metav1.Duration` fields hold ("30s", "1m30s", "1h0m0s", "250ms").
pub fn format_duration_ms(ms: i64) -> String {
    if ms <= 0 {
        return "0s".to_string();
    }
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1_000;
    let frac = ms % 1_000;
    let (h, m, s) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    let sec = if frac == 0 {
        s.to_string()
    } else {
        let f = format!("{:03}", frac);
        format!("{}.{}", s, f.trim_end_matches('0'))
    };
    if h > 0 {
        format!("{}h{}m{}s", h, m, sec)
    } else if m > 0 {
        format!("{}m{}s", m, sec)
    } else {
        format!("{}s", sec)
    }
}

/// Epoch milliseconds to RFC 3339; `None` for unset (non-positive) values.
pub fn format_epoch_ms(ms: i64) -> Option<String> {
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}
