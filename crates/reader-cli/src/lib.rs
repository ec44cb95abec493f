use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{
    CreateHighlightInput, HighlightId, HighlightPatch, NormalizedRect, PaperId, TargetLang,
    ViewerConfig,
};
use gemini_client::GeminiClient;
use serde::Serialize;
use std::ffi::OsString;
use std::path::PathBuf;
use storage::{Settings, Storage};
use tracing::debug;
use viewer_core::{AiService, AnnotationStore};

#[derive(Debug, Parser)]
#[command(name = "paper-reader")]
#[command(about = "Paper reader highlights and AI tools")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage stored highlights.
    Highlights {
        #[command(subcommand)]
        command: HighlightCommands,
    },
    /// Summarize text with the configured AI service.
    Summarize {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Translate text between Korean and English.
    Translate {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Target language, `ko` or `en`. Anything else translates to English.
        #[arg(long, default_value = "ko")]
        to: String,
    },
    /// Inspect or change stored configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum HighlightCommands {
    /// Print a paper's highlights as JSON, ordered by page.
    List {
        #[arg(long)]
        paper: String,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Store a highlight from page-relative rectangles.
    Add {
        #[arg(long)]
        paper: String,
        #[arg(long)]
        page: u32,
        #[arg(long)]
        text: String,
        /// `top,left,width,height` in percent of the page box. Repeatable.
        #[arg(
            long = "rect",
            value_name = "TOP,LEFT,WIDTH,HEIGHT",
            required = true,
            value_parser = parse_rect
        )]
        rects: Vec<NormalizedRect>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Change a highlight's color or note.
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print viewer config and settings as JSON. The API key is masked.
    Show,
    SetApiKey {
        #[arg(value_name = "KEY")]
        key: String,
    },
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    data_dir: String,
    config: ViewerConfig,
    gemini_api_key: Option<String>,
    gemini_model: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Highlights { command } => run_highlights(&open_storage()?, command),
        Commands::Summarize { text } => {
            let storage = open_storage()?;
            let config = storage.load_config().context("failed to read config")?;
            let client = ai_client(&storage)?.with_summary_lang(config.default_target_lang);
            let summary = client.summarize(&text).context("summarize failed")?;
            println!("{summary}");
            Ok(())
        }
        Commands::Translate { text, to } => {
            let target = TargetLang::from_code(&to);
            let translation = ai_client(&open_storage()?)?
                .translate(&text, target)
                .context("translate failed")?;
            println!("{translation}");
            Ok(())
        }
        Commands::Config { command } => run_config(&open_storage()?, command),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_highlights(storage: &Storage, command: HighlightCommands) -> Result<()> {
    let mut store = storage.annotation_store().context("failed to open highlight store")?;

    match command {
        HighlightCommands::List { paper, page } => {
            let highlights =
                store.list(&PaperId::new(paper), page).context("failed to list highlights")?;
            print_json(&highlights)
        }
        HighlightCommands::Add { paper, page, text, rects, color, note } => {
            let input = CreateHighlightInput {
                paper_id: PaperId::new(paper),
                page_number: page,
                rects,
                selected_text: text,
                color,
                note,
            };
            let highlight = store.create(input).context("failed to add highlight")?;
            print_json(&highlight)
        }
        HighlightCommands::Update { id, color, note } => {
            if color.is_none() && note.is_none() {
                anyhow::bail!("nothing to update: pass --color and/or --note");
            }

            let highlight = store
                .update(&HighlightId::new(id), HighlightPatch { color, note })
                .context("failed to update highlight")?;
            print_json(&highlight)
        }
        HighlightCommands::Delete { id } => {
            let id = HighlightId::new(id);
            store.delete(&id).context("failed to delete highlight")?;
            println!("deleted:{id}");
            Ok(())
        }
    }
}

fn run_config(storage: &Storage, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = storage.load_config().context("failed to read config")?;
            let settings = storage.load_settings().context("failed to read settings")?;

            print_json(&ConfigOutput {
                data_dir: storage.root().display().to_string(),
                config,
                gemini_api_key: settings.gemini_api_key.as_deref().map(mask_key),
                gemini_model: settings.gemini_model,
            })
        }
        ConfigCommands::SetApiKey { key } => {
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("API key must not be empty");
            }

            let settings = storage.load_settings().context("failed to read settings")?;
            let settings = Settings { gemini_api_key: Some(key.to_owned()), ..settings };
            storage.save_settings(&settings).context("failed to save settings")?;
            println!("saved");
            Ok(())
        }
    }
}

/// Storage rooted at `PAPER_READER_DATA_DIR` when set, else the platform data dir.
fn open_storage() -> Result<Storage> {
    match std::env::var_os("PAPER_READER_DATA_DIR") {
        Some(dir) => Ok(Storage::with_root(PathBuf::from(dir))),
        None => Storage::from_default_project().context("failed to locate data directory"),
    }
}

fn ai_client(storage: &Storage) -> Result<GeminiClient> {
    let settings = storage.load_settings().context("failed to read settings")?;
    debug!(
        model = %settings.gemini_model,
        has_key = settings.gemini_api_key.is_some(),
        "building AI client"
    );

    Ok(GeminiClient::new(settings.gemini_api_key).with_model(settings.gemini_model))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{visible}")
}

fn parse_rect(value: &str) -> std::result::Result<NormalizedRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|error| format!("invalid number in '{value}': {error}"))?;

    match parts.as_slice() {
        &[top, left, width, height] => Ok(NormalizedRect { top, left, width, height }),
        _ => Err(format!("expected TOP,LEFT,WIDTH,HEIGHT, got '{value}'")),
    }
}
