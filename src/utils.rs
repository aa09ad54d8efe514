//! Formatting helpers shared by the command layer.

use regex::Regex;

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn pretty_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Parses `SS`, `MM:SS`, `HH:MM:SS` or `1h2m3s` into seconds.
pub fn parse_time(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains(':') {
        let parts: Vec<u64> = input
            .split(':')
            .map(|p| p.trim().parse::<u64>().ok())
            .collect::<Option<_>>()?;

        return match parts.as_slice() {
            [m, s] => Some(m * 60 + s),
            [h, m, s] => Some(h * 3600 + m * 60 + s),
            _ => None,
        };
    }

    if let Ok(seconds) = input.parse::<u64>() {
        return Some(seconds);
    }

    parse_duration(input)
}

fn parse_duration(input: &str) -> Option<u64> {
    let re = Regex::new(r"^(?:(\d+)h)?\s*(?:(\d+)m)?\s*(?:(\d+)s)?$").ok()?;
    let caps = re.captures(input)?;
    let unit = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    // Todos los grupos vacíos: no es una duración
    if (1..=3).all(|i| caps.get(i).is_none()) {
        return None;
    }

    Some(unit(1) * 3600 + unit(2) * 60 + unit(3))
}
