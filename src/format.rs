//! Human-readable number formatting for terminal output.

/// Bytes with a binary unit: `0 B`, `512 B`, `1.5 KB`, `48.0 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut idx = 0;
    while value >= 1024.0 && idx < UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[idx])
    }
}

/// Milliseconds below one second, seconds with two decimals above.
pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.0} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}

/// Rounded to an integer with thousands separators: `1,234,568`.
pub fn format_number(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Short scale notation with at most one decimal: `950`, `1.2K`, `3.4M`.
pub fn format_compact(value: f64) -> String {
    const SUFFIXES: [&str; 5] = ["", "K", "M", "B", "T"];
    let sign = if value < 0.0 { "-" } else { "" };
    let mut scaled = value.abs();
    let mut idx = 0;
    while idx < SUFFIXES.len() - 1 && round_one(scaled) >= 1000.0 {
        scaled /= 1000.0;
        idx += 1;
    }
    format!("{}{}{}", sign, one_decimal(scaled), SUFFIXES[idx])
}

/// A fraction as a percentage with at most one decimal: `12.3%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", one_decimal(fraction * 100.0))
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn one_decimal(value: f64) -> String {
    let s = format!("{:.1}", round_one(value));
    match s.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => s,
    }
}
