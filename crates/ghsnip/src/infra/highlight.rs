//! Syntax highlighting utilities built on top of syntect.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SyntectStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

const DEFAULT_THEME: &str = "InspiredGitHub";

static DEFAULT_ASSETS: Lazy<(Arc<SyntaxSet>, Arc<ThemeSet>)> = Lazy::new(|| {
    (
        Arc::new(SyntaxSet::load_defaults_newlines()),
        Arc::new(ThemeSet::load_defaults()),
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightAttributes {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightStyle {
    pub foreground: Option<RgbColor>,
    pub attributes: HighlightAttributes,
}

impl HighlightStyle {
    /// Inline CSS for this style, empty when the style is the default.
    fn css(&self) -> String {
        let mut css = String::new();
        if let Some(color) = self.foreground {
            let _ = write!(css, "color:{};", color.hex());
        }
        if self.attributes.bold {
            css.push_str("font-weight:bold;");
        }
        if self.attributes.italic {
            css.push_str("font-style:italic;");
        }
        if self.attributes.underline {
            css.push_str("text-decoration:underline;");
        }
        css
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub content: String,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightLine {
    pub spans: Vec<HighlightSpan>,
}

impl HighlightLine {
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.content.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    Highlighted,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    pub lines: Vec<HighlightLine>,
    /// Syntax name used, `None` when rendered as plain text.
    pub syntax: Option<String>,
    pub background: Option<RgbColor>,
    pub mode: HighlightMode,
}

impl HighlightResult {
    pub fn plain<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        HighlightResult {
            lines: lines
                .into_iter()
                .map(|line| HighlightLine {
                    spans: vec![HighlightSpan {
                        content: line.to_owned(),
                        style: HighlightStyle::default(),
                    }],
                })
                .collect(),
            syntax: None,
            background: None,
            mode: HighlightMode::Plain,
        }
    }

    /// Escaped HTML with one `<span style=...>` per styled segment, lines joined by `\n`.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                html.push('\n');
            }
            for span in &line.spans {
                let escaped = html_escape::encode_text(&span.content);
                let css = span.style.css();
                if css.is_empty() {
                    html.push_str(&escaped);
                } else {
                    let _ = write!(html, "<span style=\"{css}\">{escaped}</span>");
                }
            }
        }
        html
    }
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    syntax_set: Arc<SyntaxSet>,
    theme_set: Arc<ThemeSet>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        let assets = &*DEFAULT_ASSETS;
        Self {
            syntax_set: Arc::clone(&assets.0),
            theme_set: Arc::clone(&assets.1),
        }
    }

    pub fn available_themes(&self) -> Vec<String> {
        let mut themes: Vec<_> = self.theme_set.themes.keys().cloned().collect();
        themes.sort();
        themes
    }

    /// Highlight `text` for the language tag, or return it plain when the tag is `None` or
    /// unknown to syntect.
    pub fn highlight(&self, text: &str, language: Option<&str>, theme: &str) -> HighlightResult {
        let lines: Vec<&str> = text.split('\n').collect();

        let Some(syntax) = language.and_then(|tag| self.syntax_for_language(tag)) else {
            return HighlightResult::plain(lines);
        };
        let Some(resolved) = self.resolve_theme(theme) else {
            return HighlightResult::plain(lines);
        };

        match self.highlight_with_syntax(&lines, resolved.theme, syntax) {
            Ok(highlighted) => HighlightResult {
                lines: highlighted,
                syntax: Some(syntax.name.clone()),
                background: resolved.theme.settings.background.and_then(convert_color),
                mode: HighlightMode::Highlighted,
            },
            Err(err) => {
                tracing::warn!(error = %err, syntax = %syntax.name, "highlight failed");
                HighlightResult::plain(lines)
            }
        }
    }

    fn highlight_with_syntax(
        &self,
        lines: &[&str],
        theme: &Theme,
        syntax: &SyntaxReference,
    ) -> Result<Vec<HighlightLine>> {
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut result = Vec::with_capacity(lines.len());
        for line in lines {
            // The newline-aware grammars expect each line to keep its terminator.
            let terminated = format!("{line}\n");
            let segments = highlighter.highlight_line(&terminated, &self.syntax_set)?;
            let spans = segments
                .into_iter()
                .filter_map(|(style, text)| {
                    let content = text.strip_suffix('\n').unwrap_or(text);
                    (!content.is_empty()).then(|| HighlightSpan {
                        content: content.to_owned(),
                        style: convert_style(style),
                    })
                })
                .collect();
            result.push(HighlightLine { spans });
        }
        Ok(result)
    }

    fn syntax_for_language(&self, language: &str) -> Option<&SyntaxReference> {
        let syntax = self.syntax_set.find_syntax_by_token(language);
        if syntax.is_none() {
            tracing::debug!(language, "no syntax for language, rendering plain text");
        }
        syntax
    }

    fn resolve_theme<'a>(&'a self, requested: &'a str) -> Option<ResolvedTheme<'a>> {
        if let Some(theme) = self.theme_set.themes.get(requested) {
            return Some(ResolvedTheme {
                name: Cow::Borrowed(requested),
                theme,
            });
        }

        if let Some((name, theme)) = self
            .theme_set
            .themes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(requested))
        {
            return Some(ResolvedTheme {
                name: Cow::Owned(name.clone()),
                theme,
            });
        }

        let (name, theme) = self
            .theme_set
            .themes
            .get_key_value(DEFAULT_THEME)
            .or_else(|| self.theme_set.themes.iter().next())?;

        tracing::warn!(requested, fallback = %name, "theme not found");

        Some(ResolvedTheme {
            name: Cow::Owned(name.clone()),
            theme,
        })
    }

    /// Name of the theme that `requested` resolves to.
    pub fn resolved_theme_name(&self, requested: &str) -> Option<String> {
        self.resolve_theme(requested)
            .map(|resolved| resolved.name.into_owned())
    }
}

#[derive(Debug, Clone)]
struct ResolvedTheme<'a> {
    name: Cow<'a, str>,
    theme: &'a Theme,
}

fn convert_style(style: SyntectStyle) -> HighlightStyle {
    let attributes = HighlightAttributes {
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
        underline: style.font_style.contains(FontStyle::UNDERLINE),
    };

    HighlightStyle {
        foreground: convert_color(style.foreground),
        attributes,
    }
}

fn convert_color(color: syntect::highlighting::Color) -> Option<RgbColor> {
    if color.a == 0 {
        None
    } else {
        Some(RgbColor {
            r: color.r,
            g: color.g,
            b: color.b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_theme_is_available() {
        let highlighter = Highlighter::new();
        assert!(
            highlighter
                .available_themes()
                .iter()
                .any(|theme| theme == DEFAULT_THEME)
        );
    }

    #[test]
    fn highlight_python_produces_segments() {
        let highlighter = Highlighter::new();
        let result = highlighter.highlight("def greet():\n    return 1", Some("python"), "");

        assert_eq!(result.mode, HighlightMode::Highlighted);
        assert_eq!(result.syntax.as_deref(), Some("Python"));
        assert_eq!(result.lines.len(), 2);
        assert!(result.lines[0].spans.len() > 1);
        assert_eq!(result.lines[1].text(), "    return 1");
    }

    #[test]
    fn unknown_or_missing_language_is_plain() {
        let highlighter = Highlighter::new();
        let missing = highlighter.highlight("x = 1", None, DEFAULT_THEME);
        assert_eq!(missing.mode, HighlightMode::Plain);

        let unknown = highlighter.highlight("x = 1", Some("not-a-language"), DEFAULT_THEME);
        assert_eq!(unknown.mode, HighlightMode::Plain);
        assert_eq!(unknown.lines[0].text(), "x = 1");
    }

    #[test]
    fn unknown_theme_falls_back() {
        let highlighter = Highlighter::new();
        assert_eq!(
            highlighter.resolved_theme_name("not-a-theme").as_deref(),
            Some(DEFAULT_THEME)
        );
        assert_eq!(
            highlighter.resolved_theme_name("inspiredgithub").as_deref(),
            Some(DEFAULT_THEME)
        );
        let result = highlighter.highlight("let a = 1;", Some("javascript"), "not-a-theme");
        assert_eq!(result.mode, HighlightMode::Highlighted);
    }

    #[test]
    fn plain_html_is_escaped() {
        let result = HighlightResult::plain(["if a < b && c > d {", "}"]);
        assert_eq!(result.to_html(), "if a &lt; b &amp;&amp; c &gt; d {\n}");
    }

    #[test]
    fn styled_html_wraps_spans() {
        let result = HighlightResult {
            lines: vec![HighlightLine {
                spans: vec![HighlightSpan {
                    content: "fn".into(),
                    style: HighlightStyle {
                        foreground: Some(RgbColor { r: 255, g: 0, b: 16 }),
                        attributes: HighlightAttributes {
                            bold: true,
                            ..HighlightAttributes::default()
                        },
                    },
                }],
            }],
            syntax: Some("Rust".into()),
            background: None,
            mode: HighlightMode::Highlighted,
        };
        assert_eq!(
            result.to_html(),
            "<span style=\"color:#ff0010;font-weight:bold;\">fn</span>"
        );
    }
}
