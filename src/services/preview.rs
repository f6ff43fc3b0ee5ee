pub const PREVIEW_LINES: usize = 5;

/// A contiguous slice of cached, already-rendered lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewWindow<'a> {
    pub start_line: usize,
    pub lines: &'a [String],
}

impl PreviewWindow<'_> {
    pub fn html(&self) -> String {
        self.lines.concat()
    }
}

/// Zero-based line of the first ASCII case-insensitive occurrence of `query`.
pub fn match_line(content: &str, query: &str) -> Option<usize> {
    if query.is_empty() {
        return None;
    }
    // ASCII folding keeps byte offsets aligned with `content`.
    let haystack = content.to_ascii_lowercase();
    let needle = query.to_ascii_lowercase();
    let offset = haystack.find(&needle)?;
    Some(content.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count())
}

/// Picks at most [`PREVIEW_LINES`] lines starting at the query's line. No
/// window in listing mode or without a cache; a query that does not occur
/// verbatim starts the window at the top.
pub fn extract<'a>(
    content: &str,
    html_lines: Option<&'a [String]>,
    query: &str,
) -> Option<PreviewWindow<'a>> {
    let lines = html_lines?;
    if query.is_empty() {
        return None;
    }
    let start = match_line(content, query).unwrap_or(0).min(lines.len());
    let end = (start + PREVIEW_LINES).min(lines.len());
    Some(PreviewWindow {
        start_line: start,
        lines: &lines[start..end],
    })
}
