//! Pure display helpers for the status line.

/// Renders seconds the way the status line shows time spent: "1h1m" once a
/// full hour is reached, "42m" below that, "0m" for an empty day.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Builds a bar of exactly `width` glyphs. The fraction is clamped to [0, 1]
/// and rounded onto the glyph grid.
pub fn render_progress_bar(fraction: f64, width: usize, filled: &str, empty: &str) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled_count = ((fraction * width as f64).round() as usize).min(width);
    format!(
        "{}{}",
        filled.repeat(filled_count),
        empty.repeat(width - filled_count)
    )
}

/// Shortens text to at most `max_length` characters, ending in "..." when
/// anything was cut. Counts characters, not bytes, since project names can
/// carry arbitrary unicode.
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max_length.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

/// Strips any "owner/" style prefix, keeping only the last path segment.
pub fn shorten_project_name(full_name: &str) -> &str {
    full_name.rsplit('/').next().unwrap_or(full_name)
}
