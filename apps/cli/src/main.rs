use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use nahj_core::{bootstrap, reference, snippet, CoreConfig, CoreRuntime, SubUnitFallback};
use output::{OutputFormat, Renderer};
use progress::spinner;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod settings;

use settings::Settings;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "nahj",
    version,
    about = "Resolve index references into highlighted passages of the Nahj corpus."
)]
struct Cli {
    /// Preferred renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "markdown")]
    format: OutputFormat,
    /// TOML configuration file layered over the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the cache directory used by the CMS client.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Disable ANSI colors in log output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Look up reference tokens and excerpt the passages that mention a term.
    Resolve {
        #[arg(short, long)]
        term: String,
        /// Tokens such as `1.26.1` or `0.5`; commas also separate tokens.
        #[arg(required = true, value_delimiter = ',')]
        tokens: Vec<String>,
        /// Use the whole document when the referenced paragraph is missing.
        #[arg(long)]
        whole_document: bool,
        /// Preferred translation language code.
        #[arg(long)]
        language: Option<String>,
    },
    /// Show how reference tokens are interpreted.
    Parse {
        #[arg(required = true, value_delimiter = ',')]
        tokens: Vec<String>,
    },
    /// Extract the sentence around a term from local text.
    Snippet(SnippetArgs),
    /// Mark every occurrence of a term (and its plural forms) in a text.
    Highlight {
        #[arg(short, long)]
        term: String,
        text: String,
    },
    /// Inspect or clear the on-disk response cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone)]
struct SnippetArgs {
    #[arg(short, long)]
    term: String,
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    text: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
enum CacheCommand {
    /// Report cache directory status and hit counters.
    Status,
    /// Delete every cached response.
    Purge,
}

#[derive(Clone, Debug, Serialize)]
struct CacheStatusReport {
    path: String,
    exists: bool,
    entry_count: usize,
}

#[derive(Clone, Debug, Serialize)]
struct ParsedRow {
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;
    let renderer = Renderer::new(cli.format);

    match &cli.command {
        Command::Resolve {
            term,
            tokens,
            whole_document,
            language,
        } => {
            let mut config = core_config(&cli)?;
            if *whole_document {
                config.resolver.sub_unit_fallback = SubUnitFallback::WholeDocument;
            }
            if let Some(language) = language {
                config.resolver.translation_language.clone_from(language);
            }
            let runtime = bootstrap(config)?;
            handle_resolve(&runtime, term, tokens, &cli, &renderer).await
        }
        Command::Parse { tokens } => {
            let rows = tokens.iter().map(|token| parse_row(token)).collect::<Vec<_>>();
            renderer.parsed(&rows)
        }
        Command::Snippet(args) => {
            let text = match (&args.text, &args.file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => return Err(anyhow!("either --text or --file is required")),
            };
            renderer.snippet(&args.term, snippet::extract(&text, &args.term).as_deref())
        }
        Command::Highlight { term, text } => renderer.highlight(&nahj_core::render(text, term)),
        Command::Cache { command } => {
            let runtime = bootstrap(core_config(&cli)?)?;
            handle_cache_command(command, &runtime, &cli, &renderer).await
        }
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "nahj", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn core_config(cli: &Cli) -> Result<CoreConfig> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = Some(dir.clone());
    }
    Ok(CoreConfig {
        client: settings.client_config(),
        resolver: settings.resolver_options(),
        ..CoreConfig::default()
    })
}

async fn handle_resolve(
    runtime: &CoreRuntime,
    term: &str,
    tokens: &[String],
    cli: &Cli,
    renderer: &Renderer,
) -> Result<()> {
    let progress = spinner(
        cli.progress_enabled(),
        format!("Resolving {} reference(s)...", tokens.len()),
    );
    let (results, report) = runtime.resolver().resolve_with_report(tokens, term).await;
    finish_spinner(
        progress,
        Some(format!("Resolved {} of {}", report.resolved, report.unique)),
    );
    info!(
        target: "nahj_cli",
        requested = report.requested,
        resolved = report.resolved,
        failed = report.failed,
        "resolution complete"
    );

    if cli.quiet {
        return Ok(());
    }
    renderer.resolution(term, &results, &report)
}

async fn handle_cache_command(
    command: &CacheCommand,
    runtime: &CoreRuntime,
    cli: &Cli,
    renderer: &Renderer,
) -> Result<()> {
    let client = runtime.client();
    match command {
        CacheCommand::Status => {
            let path = client.cache_dir().clone();
            let entry_count = client.disk_entry_count().await?;
            if cli.quiet {
                return Ok(());
            }
            let report = CacheStatusReport {
                path: path.display().to_string(),
                exists: path.exists(),
                entry_count,
            };
            renderer.cache_status(&report)
        }
        CacheCommand::Purge => {
            let removed = client.purge_disk_cache().await?;
            client.clear_memory_cache();
            info!(target: "nahj_cli", removed, "cache purged");
            if cli.quiet {
                return Ok(());
            }
            renderer.cache_purged(removed)
        }
    }
}

fn parse_row(token: &str) -> ParsedRow {
    match reference::try_parse(token) {
        Ok(parsed) => ParsedRow {
            token: token.to_string(),
            collection: Some(parsed.collection.label().to_string()),
            section_id: Some(parsed.section_id),
            error: None,
        },
        Err(error) => ParsedRow {
            token: token.to_string(),
            collection: None,
            section_id: None,
            error: Some(error.to_string()),
        },
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nahj_cli=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(progress) = spinner {
        if let Some(msg) = message {
            progress.finish_with_message(msg);
        } else {
            progress.finish_and_clear();
        }
    }
}

mod output {
    use anyhow::Result;
    use clap::ValueEnum;
    use nahj_core::{markdown, MatchResult, ResolveReport, Segment};
    use serde_json::json;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        Json,
        Markdown,
        Text,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn resolution(
            &self,
            term: &str,
            results: &[MatchResult],
            report: &ResolveReport,
        ) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "term": term, "results": results, "report": report });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    println!("{}", markdown::results_page(term, results, report));
                }
                OutputFormat::Text => {
                    if results.is_empty() {
                        println!("No passages matched these references.");
                    }
                    for result in results {
                        let reference = result.sub_unit_ref.as_deref().map_or_else(
                            || result.document_ref.clone(),
                            |sub| format!("{} ¶{sub}", result.document_ref),
                        );
                        println!("[{}] {} {reference}", result.token, result.collection.label());
                        println!("  {}", bracketed(&nahj_core::render(&result.snippet, term)));
                    }
                    println!(
                        "{} resolved, {} failed, {} unmatched, {} unparseable",
                        report.resolved, report.failed, report.unmatched, report.unparseable
                    );
                }
            }
            Ok(())
        }

        pub fn parsed(&self, rows: &[crate::ParsedRow]) -> Result<()> {
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
                OutputFormat::Markdown => {
                    println!("| Token | Collection | Section | Error |");
                    println!("| --- | --- | --- | --- |");
                    for row in rows {
                        println!(
                            "| `{}` | {} | {} | {} |",
                            row.token,
                            row.collection.as_deref().unwrap_or("-"),
                            row.section_id.as_deref().unwrap_or("-"),
                            row.error.as_deref().unwrap_or("")
                        );
                    }
                }
                OutputFormat::Text => {
                    for row in rows {
                        match (&row.collection, &row.section_id, &row.error) {
                            (Some(collection), Some(section), _) => {
                                println!("{} -> {collection} {section}", row.token);
                            }
                            (_, _, Some(error)) => println!("{} -> rejected: {error}", row.token),
                            _ => println!("{} -> rejected", row.token),
                        }
                    }
                }
            }
            Ok(())
        }

        pub fn snippet(&self, term: &str, snippet: Option<&str>) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "term": term, "snippet": snippet });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown | OutputFormat::Text => match snippet {
                    Some(text) => println!("{text}"),
                    None => println!("No occurrence of \"{term}\" found."),
                },
            }
            Ok(())
        }

        pub fn highlight(&self, segments: &[Segment]) -> Result<()> {
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(segments)?),
                OutputFormat::Markdown => println!("{}", markdown::emphasize(segments)),
                OutputFormat::Text => println!("{}", bracketed(segments)),
            }
            Ok(())
        }

        pub fn cache_status(&self, report: &crate::CacheStatusReport) -> Result<()> {
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
                OutputFormat::Markdown => {
                    println!("| Property | Value |");
                    println!("| --- | --- |");
                    println!("| Path | `{}` |", report.path);
                    println!("| Exists | {} |", report.exists);
                    println!("| Entries | {} |", report.entry_count);
                }
                OutputFormat::Text => {
                    println!("Cache directory: {}", report.path);
                    println!("Exists: {}", report.exists);
                    println!("Entries: {}", report.entry_count);
                }
            }
            Ok(())
        }

        pub fn cache_purged(&self, removed: usize) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "event": "purge_cache", "removed": removed });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown | OutputFormat::Text => {
                    println!("Removed {removed} cached response(s).");
                }
            }
            Ok(())
        }
    }

    pub(crate) fn bracketed(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|segment| {
                if segment.is_match {
                    format!("[{}]", segment.text)
                } else {
                    segment.text.clone()
                }
            })
            .collect()
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}
