//! Byte formatting and process memory sampling

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Format bytes into a human-readable string (1024-based)
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Resident set size of the current process, if the platform exposes it
///
/// Taken from the `VmRSS` line of `/proc/self/status`, which the kernel
/// reports in kB whatever the page size (4K, 16K or 64K).
#[cfg(target_os = "linux")]
pub fn resident_memory_bytes() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status_rss(&content)
}

/// Resident set size of the current process, if the platform exposes it
#[cfg(not(target_os = "linux"))]
pub fn resident_memory_bytes() -> Option<u64> {
    None
}

/// One-line memory summary for progress logs
pub fn memory_summary() -> String {
    match resident_memory_bytes() {
        Some(rss) => format!("RSS: {}", format_bytes(rss)),
        None => "RSS: unavailable".to_string(),
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_status_rss(content: &str) -> Option<u64> {
    let line = content.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value = fields.next()?.parse::<u64>().ok()?;
    match fields.next() {
        Some("kB") => Some(value * 1024),
        _ => None,
    }
}
