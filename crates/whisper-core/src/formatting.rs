/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Number of Unicode code points, the unit every length limit here is expressed in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Single-line preview, cut at `max` code points with an ellipsis.
pub fn preview(s: &str, max: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&flat) <= max {
        return flat;
    }
    let mut out = flat.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_escapes_specials() {
        assert_eq!(escape_html("<b>&\"</b>"), "&lt;b&gt;&amp;&quot;&lt;/b&gt;");
    }

    #[test]
    fn preview_flattens_and_cuts() {
        assert_eq!(preview("a\n b   c", 10), "a b c");
        assert_eq!(preview("abcdefgh", 5), "abcd…");
        assert_eq!(char_len("héllo"), 5);
    }
}
