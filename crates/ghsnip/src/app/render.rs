//! Panel renderers turning snippets into HTML or terminal output.

use std::fmt::Write as _;

use anyhow::{Result, anyhow};
use crossterm::style::{Color, Stylize};
use minijinja::{Environment, ErrorKind, Output, State, Value, context};

use crate::app::snippet::Snippet;
use crate::domain::model::FileReference;

/// Turns a snippet, or the error that replaced it, into a displayable fragment.
pub trait Renderer {
    fn render(&self, snippet: &Snippet) -> Result<String>;

    fn render_error(&self, reference: Option<&FileReference>, message: &str) -> Result<String>;
}

/// `line 4` or `lines 3-9`, `None` when nothing is shown.
pub fn lines_label(snippet: &Snippet) -> Option<String> {
    let window = &snippet.window;
    if window.is_empty() {
        None
    } else if window.start == window.end {
        Some(format!("line {}", window.start))
    } else {
        Some(format!("lines {}-{}", window.start, window.end))
    }
}

/// HTML panel renderer backed by minijinja templates.
pub struct HtmlRenderer {
    env: Environment<'static>,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_formatter(escape_value);
        env.add_template("panel.html", PANEL_TEMPLATE)
            .map_err(|err| anyhow!("failed to register panel template: {err}"))?;
        env.add_template("error.html", ERROR_TEMPLATE)
            .map_err(|err| anyhow!("failed to register error template: {err}"))?;
        env.add_template("page.html", PAGE_TEMPLATE)
            .map_err(|err| anyhow!("failed to register page template: {err}"))?;
        Ok(Self { env })
    }

    /// Wrap rendered body HTML in a standalone page with the panel stylesheet.
    pub fn page(&self, title: &str, body: &str) -> Result<String> {
        self.render_template(
            "page.html",
            context! {
                title => title,
                body => Value::from_safe_string(body.to_owned()),
            },
        )
    }

    fn render_template(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|err| anyhow!("template '{name}' missing: {err}"))?;
        template
            .render(ctx)
            .map(|html| html.trim_end().to_owned())
            .map_err(|err| anyhow!("failed to render template '{name}': {err}"))
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, snippet: &Snippet) -> Result<String> {
        self.render_template(
            "panel.html",
            context! {
                path => &snippet.reference.path,
                file_name => snippet.reference.file_name(),
                url => &snippet.url,
                lines => lines_label(snippet),
                language => &snippet.language,
                background => snippet.highlighted.background.map(|color| color.hex()),
                code => Value::from_safe_string(snippet.highlighted.to_html()),
                notice => &snippet.notice,
            },
        )
    }

    fn render_error(&self, reference: Option<&FileReference>, message: &str) -> Result<String> {
        self.render_template(
            "error.html",
            context! {
                path => reference.map(|r| r.path.as_str()),
                message => message,
            },
        )
    }
}

/// HTML-escape interpolated values while leaving `/` alone, so links stay literal.
fn escape_value(out: &mut Output, _state: &State, value: &Value) -> Result<(), minijinja::Error> {
    let written = match value.as_str() {
        Some(text) if !value.is_safe() => {
            write!(out, "{}", html_escape::encode_double_quoted_attribute(text))
        }
        _ => write!(out, "{value}"),
    };
    written.map_err(|_| {
        minijinja::Error::new(ErrorKind::WriteFailure, "failed to write template output")
    })
}

/// Plain or ANSI-colored panel for terminals.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    color: bool,
}

impl TerminalRenderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dark_grey().to_string()
        } else {
            text.to_owned()
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, snippet: &Snippet) -> Result<String> {
        let mut out = String::new();

        let mut title = snippet.reference.file_name().to_owned();
        if let Some(label) = lines_label(snippet) {
            let _ = write!(title, " ({label})");
        }
        let title = if self.color {
            title.bold().to_string()
        } else {
            title
        };
        let _ = writeln!(out, "── {title} ──");
        let _ = writeln!(out, "{}", self.dim(&snippet.url));

        let width = snippet.window.end.to_string().len();
        for (offset, line) in snippet.highlighted.lines.iter().enumerate() {
            let number = format!("{:>width$} │", snippet.window.start + offset);
            let _ = write!(out, "{} ", self.dim(&number));
            for span in &line.spans {
                if self.color {
                    let mut styled = span.content.as_str().stylize();
                    if let Some(rgb) = span.style.foreground {
                        styled = styled.with(Color::Rgb {
                            r: rgb.r,
                            g: rgb.g,
                            b: rgb.b,
                        });
                    }
                    if span.style.attributes.bold {
                        styled = styled.bold();
                    }
                    if span.style.attributes.italic {
                        styled = styled.italic();
                    }
                    if span.style.attributes.underline {
                        styled = styled.underlined();
                    }
                    let _ = write!(out, "{styled}");
                } else {
                    out.push_str(&span.content);
                }
            }
            out.push('\n');
        }

        if let Some(notice) = &snippet.notice {
            let _ = writeln!(out, "{}", self.dim(notice));
        }
        let _ = write!(out, "{}", self.dim(&format!("[copy path] {}", snippet.reference.path)));
        Ok(out)
    }

    fn render_error(&self, reference: Option<&FileReference>, message: &str) -> Result<String> {
        let text = match reference {
            Some(reference) => format!("error: {}: {message}", reference.path),
            None => format!("error: {message}"),
        };
        Ok(if self.color {
            text.red().to_string()
        } else {
            text
        })
    }
}

const PANEL_TEMPLATE: &str = r#"<div class="ghsnip-panel" data-path="{{ path }}" style="border-left: 3px solid #00000087; padding-left: 10px">
<div class="ghsnip-header"><a href="{{ url }}">{{ file_name }}</a>{% if lines %} <span class="ghsnip-lines">{{ lines }}</span>{% endif %}</div>
<pre{% if background %} style="background-color: {{ background }}"{% endif %}><code{% if language %} class="language-{{ language }}"{% endif %}>{{ code }}</code></pre>
{% if notice %}
<div class="ghsnip-notice">{{ notice }}</div>
{% endif %}
<div class="ghsnip-footer"><button type="button" class="ghsnip-copy" onclick="const panel = this.closest('.ghsnip-panel'); const note = this.nextElementSibling; navigator.clipboard.writeText(panel.dataset.path).then(() => { note.hidden = false; setTimeout(() => { note.hidden = true; }, 2000); });">Copy path</button> <span class="ghsnip-copied" hidden>Copied {{ path }} to clipboard</span></div>
</div>
"#;

const ERROR_TEMPLATE: &str = r#"<div class="ghsnip-error">{% if path %}<strong>{{ path }}</strong>: {% endif %}{{ message }}</div>
"#;

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
.ghsnip-panel { margin: 1em 0; }
.ghsnip-header { font-family: sans-serif; margin-bottom: 0.25em; }
.ghsnip-lines, .ghsnip-notice, .ghsnip-copied { color: #666; font-size: 0.85em; }
.ghsnip-panel pre { padding: 0.5em; overflow-x: auto; }
.ghsnip-error { color: #b00020; font-family: monospace; white-space: pre-wrap; }
</style>
</head>
<body>
{{ body }}
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::snippet::SnippetService;
    use crate::infra::config::Settings;

    fn snippet(path: &str, content: &str, lines: Option<(usize, Option<usize>)>) -> Snippet {
        let settings = Settings::default();
        let mut reference = FileReference::new("octo", "demo", path);
        if let Some((start, end)) = lines {
            reference = reference.with_lines(start, end);
        }
        SnippetService::new(&settings).build(reference, content, &settings)
    }

    #[test]
    fn html_panel_has_link_code_and_copy_button() -> Result<()> {
        let renderer = HtmlRenderer::new()?;
        let html = renderer.render(&snippet("lib/app.js", "let a = 1 < 2;\nlet b;", Some((1, Some(2)))))?;

        assert!(html.contains(
            r#"<a href="https://github.com/octo/demo/blob/main/lib/app.js#L1-L2">app.js</a>"#
        ));
        assert!(html.contains(r#"class="language-javascript""#));
        assert!(html.contains("lines 1-2"));
        assert!(html.contains("&lt;"));
        assert!(html.contains("navigator.clipboard.writeText"));
        assert!(html.contains(r#"data-path="lib/app.js""#));
        Ok(())
    }

    #[test]
    fn html_links_and_paths_stay_literal() -> Result<()> {
        let renderer = HtmlRenderer::new()?;
        let html = renderer.render(&snippet("src/a \"b\".py", "x = 1", Some((3, None))))?;

        assert!(!html.contains("&#x2f;"));
        assert!(html.contains(r#"data-path="src/a &quot;b&quot;.py""#));
        assert!(html.contains("Copied src/a &quot;b&quot;.py to clipboard"));
        assert!(html.contains(
            r#"href="https://github.com/octo/demo/blob/main/src/a &quot;b&quot;.py#L3""#
        ));
        Ok(())
    }

    #[test]
    fn html_panel_without_language_is_plain() -> Result<()> {
        let renderer = HtmlRenderer::new()?;
        let html = renderer.render(&snippet("notes.txt", "a & b", None))?;

        assert!(!html.contains("class=\"language-"));
        assert!(html.contains("<code>a &amp; b</code>"));
        Ok(())
    }

    #[test]
    fn html_error_is_escaped() -> Result<()> {
        let renderer = HtmlRenderer::new()?;
        let reference = FileReference::new("o", "r", "src/<main>.rs");
        let html = renderer.render_error(Some(&reference), "HTTP 404 <Not Found>")?;

        assert!(html.starts_with(r#"<div class="ghsnip-error">"#));
        assert!(html.contains("src/&lt;main&gt;.rs"));
        assert!(html.contains("HTTP 404 &lt;Not Found&gt;"));
        Ok(())
    }

    #[test]
    fn page_wraps_body() -> Result<()> {
        let renderer = HtmlRenderer::new()?;
        let page = renderer.page("Notes", "<p>hi</p>")?;
        assert!(page.starts_with("<!doctype html>"));
        assert!(page.contains("<title>Notes</title>"));
        assert!(page.contains("<p>hi</p>"));
        Ok(())
    }

    #[test]
    fn terminal_plain_output_has_gutter() -> Result<()> {
        let renderer = TerminalRenderer::new(false);
        let text = renderer.render(&snippet("notes.txt", "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk", Some((9, Some(10)))))?;
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "── notes.txt (lines 9-10) ──");
        assert_eq!(lines[2], " 9 │ i");
        assert_eq!(lines[3], "10 │ j");
        assert_eq!(lines[4], "[copy path] notes.txt");
        Ok(())
    }

    #[test]
    fn terminal_error_mentions_path() -> Result<()> {
        let renderer = TerminalRenderer::new(false);
        let reference = FileReference::new("o", "r", "a.rs");
        assert_eq!(
            renderer.render_error(Some(&reference), "boom")?,
            "error: a.rs: boom"
        );
        assert_eq!(renderer.render_error(None, "boom")?, "error: boom");
        Ok(())
    }
}
