/// Whole-point download percentage, rounded up and capped at 100.
///
/// Returns `None` when the expected size is zero, since no meaningful
/// percentage exists.
#[must_use]
pub fn progress_percent(downloaded: u64, expected: u64) -> Option<u8> {
    if expected == 0 {
        return None;
    }
    let scaled = u128::from(downloaded) * 100;
    let expected = u128::from(expected);
    let pct = scaled.div_ceil(expected).min(100);
    Some(pct as u8)
}

/// Render a human-friendly byte count.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else if value < GIB {
        format!("{:.1} MB", value / MIB)
    } else {
        format!("{:.2} GB", value / GIB)
    }
}
