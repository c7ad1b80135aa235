//! Domain models for remote file references.

/// A file on the remote forge, optionally narrowed to a line range.
///
/// Line numbers are 1-based. `line_end` is only ever set together with `line_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
}

impl FileReference {
    /// Reference to a whole file.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            line_start: None,
            line_end: None,
        }
    }

    /// Narrow the reference to `start` and an optional inclusive `end`.
    pub fn with_lines(mut self, start: usize, end: Option<usize>) -> Self {
        self.line_start = Some(start);
        self.line_end = end;
        self
    }

    /// Last segment of the path, used as the panel title.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// `#L5` or `#L5-L10` fragment matching the forge's line anchors.
    pub fn line_anchor(&self) -> Option<String> {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) => Some(format!("#L{start}-L{end}")),
            (Some(start), None) => Some(format!("#L{start}")),
            _ => None,
        }
    }

    /// Web link to the file on the forge.
    pub fn blob_url(&self, host: &str, branch: &str) -> String {
        let mut url = format!(
            "https://{host}/{}/{}/blob/{branch}/{}",
            self.owner,
            self.repo,
            self.path.trim_start_matches('/')
        );
        if let Some(anchor) = self.line_anchor() {
            url.push_str(&anchor);
        }
        url
    }
}
