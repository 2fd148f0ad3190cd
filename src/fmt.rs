//! Size parsing and formatting helpers.

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// Controls compact (log lines) vs verbose (user-facing messages) output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, short suffixes ("1.5G")
    Compact,
    /// Detail: spaces, full suffixes ("1.5 GiB")
    Detail,
}

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.5 GiB"`, `"100.3 MiB"`, `"50.0 KiB"`, `"512 B"`
pub fn format_bytes(bytes: u64, style: FmtStyle) -> String {
    let (g, m, k, b) = match style {
        FmtStyle::Compact => ("G", "M", "K", "B"),
        FmtStyle::Detail => (" GiB", " MiB", " KiB", " B"),
    };
    let f = bytes as f64;
    if bytes >= GIB {
        format!("{:.1}{}", f / GIB as f64, g)
    } else if bytes >= MIB {
        format!("{:.1}{}", f / MIB as f64, m)
    } else if bytes >= KIB {
        format!("{:.1}{}", f / KIB as f64, k)
    } else {
        format!("{}{}", bytes, b)
    }
}

/// Whole mebibytes, rounded up so a shortfall is never understated.
pub fn mib_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(MIB)
}

/// Parses a zramctl-style size ("512M", "1G", "1.5G", "1GiB", "4096") into bytes.
///
/// Suffixes are binary multiples, as zramctl interprets them.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let upper = s.to_ascii_uppercase();
    let trimmed = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let (num_str, multiplier) = if let Some(num) = trimmed.strip_suffix('T') {
        (num, TIB)
    } else if let Some(num) = trimmed.strip_suffix('G') {
        (num, GIB)
    } else if let Some(num) = trimmed.strip_suffix('M') {
        (num, MIB)
    } else if let Some(num) = trimmed.strip_suffix('K') {
        (num, KIB)
    } else {
        (trimmed, 1)
    };

    let num_str = num_str.trim();
    if let Ok(n) = num_str.parse::<u64>() {
        return n
            .checked_mul(multiplier)
            .ok_or_else(|| format!("size '{}' overflows", s));
    }

    match num_str.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok((n * multiplier as f64) as u64),
        _ => Err(format!("invalid size '{}'", s)),
    }
}
