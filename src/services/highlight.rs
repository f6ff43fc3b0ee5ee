//! Per-line highlight cache.
//!
//! Content is tokenized once, with parser state carried from line to line, then
//! every line is rendered on its own. A scope that spans several lines is
//! reopened at the start of each line and closed at its end, so any slice of
//! the resulting array is valid HTML by itself.

use once_cell::sync::Lazy;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, line_tokens_to_classed_spans, ClassStyle};
use syntect::parsing::{ParseState, Scope, ScopeStack, ScopeStackOp};
use syntect::util::LinesWithEndings;
use tracing::debug;

use crate::config::DEFAULT_STYLE;
use crate::error::{StoreError, StoreResult};
use crate::services::lexer::{self, Lexer};

static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// The token stream for one source line, plus the scope stack as it stood
/// when the line started. The stack keeps any cleared scopes, since a later
/// line may restore them.
#[derive(Debug, Clone)]
pub struct LineTokens<'a> {
    pub number: usize,
    pub text: &'a str,
    pub stack: ScopeStack,
    pub ops: Vec<(usize, ScopeStackOp)>,
}

pub fn tokenize_lines<'a>(lexer: &Lexer, content: &'a str) -> StoreResult<Vec<LineTokens<'a>>> {
    let syntax_set = lexer::syntax_set();
    let mut state = ParseState::new(lexer.syntax());
    let mut stack = ScopeStack::new();
    let mut lines = Vec::new();

    for (idx, text) in LinesWithEndings::from(content).enumerate() {
        let ops = state
            .parse_line(text, syntax_set)
            .map_err(|err| StoreError::Highlight(err.to_string()))?;
        let start_stack = stack.clone();
        for (_, op) in &ops {
            stack
                .apply(op)
                .map_err(|err| StoreError::Highlight(format!("{err:?}")))?;
        }
        lines.push(LineTokens {
            number: idx + 1,
            text,
            stack: start_stack,
            ops,
        });
    }

    Ok(lines)
}

/// Renders one line into a self-contained fragment:
/// `<span class="line"><span class="ln">N</span><span class="cl">…</span></span>`.
pub fn render_line(line: &LineTokens<'_>) -> StoreResult<String> {
    let mut stack = line.stack.clone();
    let mut html = String::with_capacity(line.text.len() * 3 + 64);

    html.push_str(&format!(
        r#"<span class="line"><span class="ln">{}</span><span class="cl">"#,
        line.number
    ));
    for scope in stack.as_slice() {
        push_open_span(&mut html, *scope);
    }

    let (body, _) =
        line_tokens_to_classed_spans(line.text, &line.ops, ClassStyle::Spaced, &mut stack)
            .map_err(|err| StoreError::Highlight(err.to_string()))?;
    html.push_str(&body);

    for _ in 0..stack.len() {
        html.push_str("</span>");
    }
    html.push_str("</span></span>");
    Ok(html)
}

fn push_open_span(html: &mut String, scope: Scope) {
    html.push_str("<span class=\"");
    html.push_str(&scope.build_string().replace('.', " "));
    html.push_str("\">");
}

/// Builds the cached line array, or `None` when the content is past `max_chars`.
pub fn build_line_cache(
    lexer: &Lexer,
    content: &str,
    max_chars: usize,
) -> StoreResult<Option<Vec<String>>> {
    // Byte length bounds the char count from above, so the count is only
    // needed for long inputs.
    if content.len() > max_chars && content.chars().count() > max_chars {
        debug!(
            "skipping highlight for {} byte snippet (limit {max_chars} chars)",
            content.len()
        );
        return Ok(None);
    }

    let lines = tokenize_lines(lexer, content)?;
    let rendered = lines
        .iter()
        .map(render_line)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(Some(rendered))
}

pub fn available_styles() -> Vec<&'static str> {
    THEME_SET.themes.keys().map(String::as_str).collect()
}

/// Class-based CSS for a bundled theme, without background colors.
/// Unknown names fall back to the default style.
pub fn style_css(name: &str) -> StoreResult<String> {
    let theme = THEME_SET
        .themes
        .get(name)
        .or_else(|| THEME_SET.themes.get(DEFAULT_STYLE))
        .ok_or_else(|| StoreError::Highlight(format!("no theme available for {name}")))?;
    let css = css_for_theme_with_class_style(theme, ClassStyle::Spaced)
        .map_err(|err| StoreError::Highlight(err.to_string()))?;
    Ok(css
        .lines()
        .filter(|line| !line.contains("background-color"))
        .collect::<Vec<_>>()
        .join("\n"))
}
