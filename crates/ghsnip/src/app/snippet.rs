//! Snippet pipeline: reference parsing, fetching, line selection, and highlighting.

use thiserror::Error;

use crate::app::language::LanguageMap;
use crate::app::lines::{LineWindow, select_window};
use crate::app::reference;
use crate::domain::errors::ReferenceError;
use crate::domain::model::FileReference;
use crate::infra::config::Settings;
use crate::infra::github::{ContentSource, FetchError};
use crate::infra::highlight::{HighlightResult, Highlighter};

/// A fetched, windowed, and highlighted slice of a remote file, ready for rendering.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub reference: FileReference,
    pub window: LineWindow,
    pub language: Option<String>,
    pub highlighted: HighlightResult,
    pub url: String,
    pub notice: Option<String>,
}

#[derive(Debug, Error)]
pub enum SnippetError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure of one block, carrying the reference when parsing got that far.
#[derive(Debug)]
pub struct SnippetFailure {
    pub reference: Option<FileReference>,
    pub error: SnippetError,
}

/// Service preparing snippets for the renderers.
#[derive(Debug, Clone)]
pub struct SnippetService {
    highlighter: Highlighter,
    languages: LanguageMap,
}

impl SnippetService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            highlighter: Highlighter::new(),
            languages: LanguageMap::with_overrides(&settings.languages),
        }
    }

    /// Parse `raw`, fetch the file from `source`, and build the snippet.
    pub async fn load<S: ContentSource>(
        &self,
        raw: &str,
        settings: &Settings,
        source: &S,
    ) -> Result<Snippet, SnippetFailure> {
        let reference = reference::resolve(raw, settings).map_err(|err| SnippetFailure {
            reference: None,
            error: err.into(),
        })?;

        match source.fetch(&reference).await {
            Ok(content) => Ok(self.build(reference, &content, settings)),
            Err(err) => {
                tracing::warn!(path = %reference.path, error = %err, "failed to fetch snippet");
                Err(SnippetFailure {
                    reference: Some(reference),
                    error: err.into(),
                })
            }
        }
    }

    /// Window and highlight already fetched `content`.
    pub fn build(&self, reference: FileReference, content: &str, settings: &Settings) -> Snippet {
        let window = select_window(
            content,
            reference.line_start,
            reference.line_end,
            settings.max_lines_shown,
        );
        let language = self
            .languages
            .language_for(&reference.path)
            .map(str::to_owned);

        let notice = if window.is_empty() && window.start <= window.total {
            Some(format!(
                "Lines {}-{} of {} end before they start.",
                window.start,
                reference.line_end.unwrap_or(window.end),
                reference.file_name()
            ))
        } else if window.is_empty() {
            Some(format!(
                "Line {} is past the end of {} ({} lines).",
                window.start,
                reference.file_name(),
                window.total
            ))
        } else if window.truncated {
            Some(format!(
                "Showing lines {}-{} of {}.",
                window.start, window.end, window.total
            ))
        } else {
            None
        };

        let highlighted = if window.is_empty() {
            HighlightResult::plain(Vec::<&str>::new())
        } else {
            self.highlighter
                .highlight(&window.text, language.as_deref(), &settings.theme)
        };

        let url = reference.blob_url(&settings.host, &settings.branch);
        tracing::debug!(
            path = %reference.path,
            start = window.start,
            end = window.end,
            language = language.as_deref().unwrap_or("none"),
            "built snippet"
        );

        Snippet {
            reference,
            window,
            language,
            highlighted,
            url,
            notice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::github::MemorySource;
    use crate::infra::highlight::HighlightMode;

    fn settings() -> Settings {
        Settings {
            default_owner: "octo".into(),
            default_repo: "demo".into(),
            max_lines_shown: 3,
            ..Settings::default()
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_file("octo", "demo", "app.py", "import os\n\ndef main():\n    pass\n")
            .with_file("octo", "demo", "notes.txt", "one\ntwo")
    }

    #[tokio::test]
    async fn loads_explicit_range() {
        let service = SnippetService::new(&settings());
        let snippet = service
            .load("app.py#L3-L4", &settings(), &source())
            .await
            .expect("snippet loads");

        assert_eq!(snippet.window.text, "def main():\n    pass");
        assert_eq!(snippet.language.as_deref(), Some("python"));
        assert_eq!(snippet.highlighted.mode, HighlightMode::Highlighted);
        assert_eq!(snippet.url, "https://github.com/octo/demo/blob/main/app.py#L3-L4");
        assert!(snippet.notice.is_none());
    }

    #[tokio::test]
    async fn default_window_reports_truncation() {
        let service = SnippetService::new(&settings());
        let snippet = service
            .load("app.py", &settings(), &source())
            .await
            .expect("snippet loads");

        assert_eq!(snippet.window.text, "import os\n\ndef main():");
        assert_eq!(snippet.notice.as_deref(), Some("Showing lines 1-3 of 5."));
    }

    #[tokio::test]
    async fn unknown_extension_is_plain() {
        let service = SnippetService::new(&settings());
        let snippet = service
            .load("notes.txt", &settings(), &source())
            .await
            .expect("snippet loads");

        assert_eq!(snippet.language, None);
        assert_eq!(snippet.highlighted.mode, HighlightMode::Plain);
    }

    #[tokio::test]
    async fn start_past_end_has_notice() {
        let service = SnippetService::new(&settings());
        let snippet = service
            .load("notes.txt#L9", &settings(), &source())
            .await
            .expect("snippet loads");

        assert!(snippet.window.text.is_empty());
        assert!(snippet.highlighted.lines.is_empty());
        assert_eq!(
            snippet.notice.as_deref(),
            Some("Line 9 is past the end of notes.txt (2 lines).")
        );
    }

    #[test]
    fn inverted_range_is_not_reported_past_the_end() {
        let settings = settings();
        let reference = FileReference::new("octo", "demo", "a.py").with_lines(4, Some(2));
        let snippet = SnippetService::new(&settings).build(reference, "a\nb\nc\nd\ne", &settings);

        assert!(snippet.window.is_empty());
        assert!(snippet.highlighted.lines.is_empty());
        assert_eq!(
            snippet.notice.as_deref(),
            Some("Lines 4-2 of a.py end before they start.")
        );
    }

    #[tokio::test]
    async fn fetch_failure_keeps_reference() {
        let service = SnippetService::new(&settings());
        let failure = service
            .load("missing.rs#L2", &settings(), &source())
            .await
            .expect_err("file is missing");

        assert_eq!(
            failure.reference.map(|r| r.path),
            Some("missing.rs".to_string())
        );
        assert!(matches!(failure.error, SnippetError::Fetch(_)));
    }

    #[tokio::test]
    async fn strict_mode_rejects_before_fetching() {
        let settings = Settings {
            strict_references: true,
            ..settings()
        };
        let service = SnippetService::new(&settings);
        let failure = service
            .load("app.py#L4-L2", &settings, &source())
            .await
            .expect_err("inverted range");

        assert!(failure.reference.is_none());
        assert!(matches!(failure.error, SnippetError::Reference(_)));
    }
}
