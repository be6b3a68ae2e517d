//! Internal utility functions.
//!
//! Helpers for time/size formatting, frame-rate parsing, and timestamp to
//! frame conversion that do not belong in any single public module.

/// Format seconds as `HH:MM:SS`, truncating fractional seconds.
pub fn format_hms(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_hms_millis(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = seconds % 60.0;
    format!("{hours:02}:{minutes:02}:{secs:06.3}")
}

/// Human-readable size with one decimal place, in binary units.
pub fn format_file_size(bytes: u64) -> String {
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
        format!("{:.1} GB", value / GIB)
    }
}

/// Convert a timestamp to a frame index, rounding to the nearest frame.
///
/// Returns 0 when either input is not positive.
pub fn timestamp_to_frame_number(seconds: f64, frames_per_second: f64) -> u64 {
    if frames_per_second <= 0.0 || seconds <= 0.0 || !seconds.is_finite() {
        return 0;
    }
    (seconds * frames_per_second).round() as u64
}

/// Map a 1–100 quality to ffmpeg's `-q:v` scale (1 best, 31 worst).
pub fn native_jpeg_quality(quality: u8) -> u8 {
    let quality = i32::from(quality);
    (31 - quality * 30 / 100).clamp(1, 31) as u8
}

/// Parse an ffprobe rational such as `"30000/1001"` or a plain number.
///
/// `"0/0"` and unparsable values yield `None`.
pub fn parse_rational(value: &str) -> Option<f64> {
    let value = value.trim();
    let parsed = match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator = numerator.trim().parse::<f64>().ok()?;
            let denominator = denominator.trim().parse::<f64>().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => value.parse::<f64>().ok()?,
    };
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}
