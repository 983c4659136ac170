use std::time::Duration;

const UNITS: [(&str, u64); 5] = [
    ("year", 31_536_000),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Render a duration as e.g. `1 minute 5 seconds 250 ms (65.25 seconds)`.
pub fn humanize_duration(elapsed: Duration) -> String {
    let raw = format!("{} seconds", elapsed.as_secs_f64());
    if elapsed.is_zero() {
        return raw;
    }

    let mut remaining = elapsed.as_secs();
    let mut parts = Vec::new();
    for (unit, size) in UNITS {
        let count = remaining / size;
        remaining %= size;
        if count > 0 {
            let plural = if count > 1 { "s" } else { "" };
            parts.push(format!("{count} {unit}{plural}"));
        }
    }
    let ms = elapsed.subsec_millis();
    if ms > 0 {
        parts.push(format!("{ms} ms"));
    }
    parts.push(format!("({raw})"));
    parts.join(" ")
}
