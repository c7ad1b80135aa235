//! Parsing of `path#Lstart-Lend` references written inside `github` code blocks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::ReferenceError;
use crate::domain::model::FileReference;
use crate::infra::config::Settings;

static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)#L([0-9]+)(?:-L([0-9]+))?$").expect("reference pattern compiles")
});

/// Parse a block body into a [`FileReference`].
///
/// Owner and repository always come from the caller. A suffix that does not look like
/// `#L<n>` or `#L<n>-L<m>` is kept as part of the path.
pub fn parse(raw: &str, default_owner: &str, default_repo: &str) -> FileReference {
    let trimmed = raw.trim();
    let reference = FileReference::new(default_owner, default_repo, trimmed);

    let Some(captures) = REFERENCE_PATTERN.captures(trimmed) else {
        return reference;
    };

    let start = captures.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
    let end = match captures.get(3) {
        Some(m) => match m.as_str().parse::<usize>() {
            Ok(end) => Some(end),
            Err(_) => return reference,
        },
        None => None,
    };

    match start {
        Some(start) => FileReference {
            path: captures[1].to_owned(),
            ..reference
        }
        .with_lines(start, end),
        None => reference,
    }
}

/// Like [`parse`], but rejects references the lenient parser would silently accept.
pub fn parse_strict(
    raw: &str,
    default_owner: &str,
    default_repo: &str,
) -> Result<FileReference, ReferenceError> {
    let reference = parse(raw, default_owner, default_repo);

    if reference.path.is_empty() {
        return Err(ReferenceError::EmptyPath);
    }
    if reference.line_start.is_none() && reference.path.contains("#L") {
        return Err(ReferenceError::MalformedRange(raw.trim().to_owned()));
    }

    match (reference.line_start, reference.line_end) {
        (Some(0), _) | (_, Some(0)) => Err(ReferenceError::ZeroLine),
        (Some(start), Some(end)) if end < start => {
            Err(ReferenceError::InvertedRange { start, end })
        }
        _ => Ok(reference),
    }
}

/// Parse using the owner, repository, and strictness configured in `settings`.
pub fn resolve(raw: &str, settings: &Settings) -> Result<FileReference, ReferenceError> {
    if settings.strict_references {
        parse_strict(raw, &settings.default_owner, &settings.default_repo)
    } else {
        Ok(parse(raw, &settings.default_owner, &settings.default_repo))
    }
}
