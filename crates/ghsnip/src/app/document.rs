//! Markdown processing: every ```` ```github ```` block is replaced by its rendered panel.

use std::ops::Range;

use anyhow::Result;
use clap::ValueEnum;
use futures::future::join_all;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use serde::{Deserialize, Serialize};

use crate::app::render::Renderer;
use crate::app::snippet::SnippetService;
use crate::infra::config::Settings;
use crate::infra::github::ContentSource;

/// Info string that marks a fenced block as a snippet reference.
pub const BLOCK_LANGUAGE: &str = "github";

/// How processed documents are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Markdown converted to HTML with panels in place of the blocks.
    #[default]
    Html,
    /// Original markdown with panel HTML spliced in.
    Markdown,
    /// Original markdown with terminal panels spliced in.
    Terminal,
}

/// A `github` fenced block found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Byte range of the whole block, fences included.
    pub range: Range<usize>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub block: CodeBlock,
    pub fragment: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub output: String,
    pub blocks: Vec<BlockOutcome>,
}

impl ProcessedDocument {
    pub fn failures(&self) -> usize {
        self.blocks
            .iter()
            .filter(|outcome| outcome.error.is_some())
            .count()
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

fn is_snippet_block(info: &str) -> bool {
    info.split_whitespace().next() == Some(BLOCK_LANGUAGE)
}

/// Locate every snippet block in document order.
pub fn find_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if is_snippet_block(&info) =>
            {
                current = Some(CodeBlock {
                    range,
                    body: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Fetch and render each block independently; failures become error fragments.
pub async fn render_blocks<S, R>(
    blocks: &[CodeBlock],
    settings: &Settings,
    source: &S,
    renderer: &R,
) -> Result<Vec<BlockOutcome>>
where
    S: ContentSource,
    R: Renderer,
{
    let service = SnippetService::new(settings);
    let results = join_all(
        blocks
            .iter()
            .map(|block| service.load(&block.body, settings, source)),
    )
    .await;

    blocks
        .iter()
        .zip(results)
        .map(|(block, result)| -> Result<BlockOutcome> {
            match result {
                Ok(snippet) => Ok(BlockOutcome {
                    block: block.clone(),
                    fragment: renderer.render(&snippet)?,
                    error: None,
                }),
                Err(failure) => {
                    let message = failure.error.to_string();
                    Ok(BlockOutcome {
                        block: block.clone(),
                        fragment: renderer.render_error(failure.reference.as_ref(), &message)?,
                        error: Some(message),
                    })
                }
            }
        })
        .collect()
}

/// Render every snippet block of `markdown` and assemble the output document.
pub async fn process_document<S, R>(
    markdown: &str,
    settings: &Settings,
    source: &S,
    renderer: &R,
    format: OutputFormat,
) -> Result<ProcessedDocument>
where
    S: ContentSource,
    R: Renderer,
{
    let blocks = find_blocks(markdown);
    tracing::debug!(blocks = blocks.len(), ?format, "processing document");

    let outcomes = render_blocks(&blocks, settings, source, renderer).await?;
    let output = match format {
        OutputFormat::Html => to_html(markdown, &outcomes),
        OutputFormat::Markdown => splice(markdown, &outcomes, guard_blank_lines),
        OutputFormat::Terminal => splice(markdown, &outcomes, str::to_owned),
    };

    Ok(ProcessedDocument {
        output,
        blocks: outcomes,
    })
}

/// Replace block byte ranges with fragments, leaving the rest untouched.
fn splice(markdown: &str, outcomes: &[BlockOutcome], prepare: fn(&str) -> String) -> String {
    let mut output = String::with_capacity(markdown.len());
    let mut cursor = 0;

    for outcome in outcomes {
        let range = &outcome.block.range;
        output.push_str(&markdown[cursor..range.start]);
        let prefix = container_prefix(markdown, range.start);
        output.push_str(&prefix_continuation_lines(&prepare(&outcome.fragment), &prefix));
        if markdown[range.clone()].ends_with('\n') {
            output.push('\n');
        }
        cursor = range.end;
    }

    output.push_str(&markdown[cursor..]);
    output
}

/// Blockquote markers and indentation in front of a block, with list markers blanked out.
fn container_prefix(markdown: &str, start: usize) -> String {
    let line_start = markdown[..start].rfind('\n').map_or(0, |index| index + 1);
    markdown[line_start..start]
        .chars()
        .map(|c| if c == '>' || c.is_whitespace() { c } else { ' ' })
        .collect()
}

fn prefix_continuation_lines(fragment: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return fragment.to_owned();
    }
    fragment.replace('\n', &format!("\n{prefix}"))
}

/// A blank line would end the HTML block early, so keep every line non-blank.
fn guard_blank_lines(fragment: &str) -> String {
    fragment
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                format!("{line}<span></span>")
            } else {
                line.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn to_html(markdown: &str, outcomes: &[BlockOutcome]) -> String {
    let mut fragments = outcomes.iter().map(|outcome| outcome.fragment.clone());
    let mut inside = false;

    let events = Parser::new_ext(markdown, parser_options()).filter_map(|event| {
        if inside {
            if matches!(event, Event::End(TagEnd::CodeBlock)) {
                inside = false;
            }
            return None;
        }
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                if is_snippet_block(info) =>
            {
                inside = true;
                let fragment = fragments.next().unwrap_or_default();
                Some(Event::Html(format!("{fragment}\n").into()))
            }
            other => Some(other),
        }
    });

    let mut output = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut output, events);
    output
}
