//! Command-line surface: argument parsing and subcommand dispatch.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::document::{OutputFormat, process_document};
use crate::app::reference;
use crate::app::render::{HtmlRenderer, Renderer, TerminalRenderer};
use crate::app::snippet::SnippetService;
use crate::infra::clipboard::Clipboard;
use crate::infra::config::{Settings, settings_path};
use crate::infra::github::GitHubClient;
use crate::infra::highlight::Highlighter;

#[derive(Debug, Parser)]
#[command(
    name = "ghsnip",
    author,
    version,
    about = "Embed line ranges of remote repository files into markdown documents",
    long_about = None
)]
pub struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, value_name = "PATH", env = "GHSNIP_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace every ```github block of a markdown document with a rendered panel
    Render {
        /// Markdown file to process, `-` for stdin
        input: PathBuf,
        /// Write the result here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Wrap HTML output in a complete page with the panel stylesheet
        #[arg(long)]
        standalone: bool,
        /// Disable colors for terminal output
        #[arg(long)]
        no_color: bool,
    },
    /// Fetch one reference and print its panel
    Show {
        /// `path`, `path#L5` or `path#L5-L10`
        reference: String,
        #[command(flatten)]
        repo: RepoArgs,
        /// Print the HTML panel instead of the terminal one
        #[arg(long)]
        html: bool,
        #[arg(long)]
        no_color: bool,
    },
    /// Print the web link of a reference
    Url {
        reference: String,
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Copy the path of a reference to the clipboard
    CopyPath {
        reference: String,
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Per-invocation replacements for the configured repository.
#[derive(Debug, Clone, Default, Args)]
pub struct RepoArgs {
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long)]
    pub repo: Option<String>,
}

impl RepoArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(owner) = self.owner {
            settings.default_owner = owner;
        }
        if let Some(repo) = self.repo {
            settings.default_repo = repo;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings with the token masked
    Show,
    /// Print the settings file location
    Path,
    /// Print one setting
    Get { key: String },
    /// Change one setting and save the file. An empty value clears `languages.<ext>`
    Set { key: String, value: String },
}

/// Run a parsed command line. `Ok(ExitCode::FAILURE)` means some block or reference failed.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config;
    match cli.command {
        Commands::Render {
            input,
            output,
            format,
            standalone,
            no_color,
        } => {
            let settings = Settings::load(config.as_deref())?;
            render(&settings, &input, output.as_deref(), format, standalone, !no_color).await
        }
        Commands::Show {
            reference,
            repo,
            html,
            no_color,
        } => {
            let mut settings = Settings::load(config.as_deref())?;
            repo.apply(&mut settings);
            show(&settings, &reference, html, !no_color).await
        }
        Commands::Url { reference, repo } => {
            let mut settings = Settings::load(config.as_deref())?;
            repo.apply(&mut settings);
            let reference = reference::resolve(&reference, &settings)?;
            println!("{}", reference.blob_url(&settings.host, &settings.branch));
            Ok(ExitCode::SUCCESS)
        }
        Commands::CopyPath { reference, repo } => {
            let mut settings = Settings::load(config.as_deref())?;
            repo.apply(&mut settings);
            let reference = reference::resolve(&reference, &settings)?;
            let notice = Clipboard::new().copy_path(&reference.path)?;
            eprintln!("{notice}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            configure(config.as_deref(), action)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "ghsnip", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn render(
    settings: &Settings,
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    standalone: bool,
    color: bool,
) -> Result<ExitCode> {
    let markdown = read_input(input)?;
    let client = GitHubClient::from_settings(settings)?;

    let processed = match format {
        OutputFormat::Terminal => {
            let color = color && output.is_none() && io::stdout().is_terminal();
            let renderer = TerminalRenderer::new(color);
            process_document(&markdown, settings, &client, &renderer, format).await?
        }
        OutputFormat::Html | OutputFormat::Markdown => {
            let renderer = HtmlRenderer::new()?;
            let mut processed =
                process_document(&markdown, settings, &client, &renderer, format).await?;
            if standalone {
                if format == OutputFormat::Html {
                    processed.output = renderer.page(&page_title(input), &processed.output)?;
                } else {
                    tracing::warn!("--standalone only applies to html output");
                }
            }
            processed
        }
    };

    write_output(output, &processed.output)?;

    let failures = processed.failures();
    tracing::info!(
        blocks = processed.blocks.len(),
        failures,
        "rendered document"
    );
    if failures > 0 {
        eprintln!(
            "{failures} of {} snippet blocks failed",
            processed.blocks.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn show(settings: &Settings, raw: &str, html: bool, color: bool) -> Result<ExitCode> {
    let client = GitHubClient::from_settings(settings)?;
    let service = SnippetService::new(settings);
    let renderer: Box<dyn Renderer> = if html {
        Box::new(HtmlRenderer::new()?)
    } else {
        Box::new(TerminalRenderer::new(color && io::stdout().is_terminal()))
    };

    match service.load(raw, settings, &client).await {
        Ok(snippet) => {
            println!("{}", renderer.render(&snippet)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            let message = failure.error.to_string();
            eprintln!(
                "{}",
                renderer.render_error(failure.reference.as_ref(), &message)?
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn configure(config: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load(config)?;
            let text = toml::to_string_pretty(&settings.redacted())
                .context("failed to serialize settings")?;
            print!("{text}");
        }
        ConfigAction::Path => {
            println!("{}", writable_path(config)?.display());
        }
        ConfigAction::Get { key } => {
            let settings = Settings::load(config)?;
            println!("{}", settings.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let path = writable_path(config)?;
            let mut settings = Settings::load_file(&path)?;
            settings.set(&key, &value)?;
            settings.save(&path)?;
            if key == "theme"
                && let Some(warning) = theme_warning(&Highlighter::new(), &value)
            {
                eprintln!("warning: {warning}");
            }
            tracing::debug!(%key, path = %path.display(), "saved setting");
        }
    }
    Ok(())
}

/// Explain the fallback when `requested` names no bundled theme.
fn theme_warning(highlighter: &Highlighter, requested: &str) -> Option<String> {
    let themes = highlighter.available_themes();
    if themes.iter().any(|theme| theme.eq_ignore_ascii_case(requested)) {
        return None;
    }
    let fallback = highlighter.resolved_theme_name(requested)?;
    Some(format!(
        "theme '{requested}' is not available, panels will use '{fallback}' (available: {})",
        themes.join(", ")
    ))
}

fn writable_path(config: Option<&Path>) -> Result<PathBuf> {
    config
        .map(Path::to_path_buf)
        .or_else(settings_path)
        .ok_or_else(|| anyhow!("no settings directory on this platform; pass --config"))
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read markdown from stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write to stdout")
        }
    }
}

fn page_title(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty() && *stem != "-")
        .unwrap_or("ghsnip")
        .to_owned()
}
