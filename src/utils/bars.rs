/// Character used for filled cells of the hourly histogram.
const BAR_FILLED: char = '█';

/// Horizontal bar for one histogram row, scaled so `max` fills `width` cells.
/// With `max == 0` the bar is drawn as dots.
pub fn hour_bar(value: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return ".".repeat(width);
    }

    let filled = (value * width / max).min(width);
    let mut bar = String::with_capacity(width * BAR_FILLED.len_utf8());
    bar.extend(std::iter::repeat(BAR_FILLED).take(filled));
    bar.extend(std::iter::repeat(' ').take(width - filled));
    bar
}

/// ASCII progress bar such as `[#####.....]` for `processed` out of `total`.
pub fn progress_bar(processed: usize, total: usize, width: usize) -> String {
    let percent = if total == 0 {
        0
    } else {
        (processed.min(total) * 100) / total
    };
    let filled = percent * width / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
