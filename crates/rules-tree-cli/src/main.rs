use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rules_tree_config::{Config, Layout, RuleSetConfig};
use rules_tree_engine::codec;
use rules_tree_engine::io::{self as section_io, LoadMode};
use rules_tree_engine::sync::{self, JsonFileStore, SectionStore, StoreError, SyncOutcome};
use rules_tree_engine::{
    Depth, Metadata, ParsedRules, RuleSetId, SectionNumber, SourceLayout, parse_html_rules,
    parse_rules,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod lock;

use lock::WriterLock;

#[derive(Parser)]
#[command(name = "rules-tree")]
#[command(about = "Parse numbered rules documents and keep a section store in sync", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.config/rules-tree/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Store directory, overriding the configured one
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a rules text into section files
    Parse {
        #[arg(long, value_name = "ID")]
        rule_set: RuleSetId,

        /// Source text file, or `-` for stdin
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// The input is an HTML page
        #[arg(long)]
        html: bool,

        /// Line layout of the source text (`lines` or `flowed`)
        #[arg(long, value_name = "LAYOUT")]
        layout: Option<SourceLayout>,

        /// Recorded in metadata.json; defaults to the input path
        #[arg(long, value_name = "URL")]
        source_url: Option<String>,

        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Reconcile the store with the section files
    Sync {
        #[arg(long, value_name = "ID")]
        rule_set: RuleSetId,

        #[arg(long, value_name = "DIR")]
        source_dir: Option<PathBuf>,

        /// Print the change report without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace every stored section of a rule-set with the section files
    Import {
        #[arg(long, value_name = "ID")]
        rule_set: RuleSetId,

        #[arg(long, value_name = "DIR")]
        source_dir: Option<PathBuf>,
    },

    /// Print a stored section and its descendants
    Show {
        #[arg(long, value_name = "ID")]
        rule_set: RuleSetId,

        section: SectionNumber,

        /// Levels below the section to include
        #[arg(long, value_name = "N")]
        depth: Option<usize>,

        /// Print the interchange JSON instead of an outline
        #[arg(long)]
        json: bool,
    },

    /// Set the free-text annotation of a stored section
    Annotate {
        #[arg(long, value_name = "ID")]
        rule_set: RuleSetId,

        section: SectionNumber,

        text: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if is_not_found(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_not_found)
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store_dir = cli.store.unwrap_or_else(|| config.store_path.clone());

    match cli.command {
        Command::Parse {
            rule_set,
            input,
            html,
            layout,
            source_url,
            output_dir,
        } => {
            let settings = config.rule_set(rule_set.as_str());
            let layout = layout.unwrap_or_else(|| {
                settings
                    .map(|s| source_layout(s.layout))
                    .unwrap_or_default()
            });
            let output_dir = sections_dir(&rule_set, output_dir, settings)?;
            let source_url = source_url.or_else(|| settings.and_then(|s| s.source_url.clone()));
            parse_command(&input, html, layout, &output_dir, source_url)
        }
        Command::Sync {
            rule_set,
            source_dir,
            dry_run,
        } => {
            let source_dir =
                sections_dir(&rule_set, source_dir, config.rule_set(rule_set.as_str()))?;
            sync_command(&store_dir, &rule_set, &source_dir, dry_run)
        }
        Command::Import {
            rule_set,
            source_dir,
        } => {
            let source_dir =
                sections_dir(&rule_set, source_dir, config.rule_set(rule_set.as_str()))?;
            import_command(&store_dir, &rule_set, &source_dir)
        }
        Command::Show {
            rule_set,
            section,
            depth,
            json,
        } => {
            let store = JsonFileStore::open(&store_dir)?;
            let depth = depth.map(Depth::Levels).unwrap_or_default();
            let record = store.subtree(&rule_set, &section, depth)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let forest = codec::decode(&record);
                print!("{forest}");
            }
            Ok(())
        }
        Command::Annotate {
            rule_set,
            section,
            text,
        } => {
            let _lock = WriterLock::acquire(&store_dir, &rule_set)?;
            let mut store = JsonFileStore::open(&store_dir)?;
            store.update_annotation(&rule_set, &section, &text)?;
            println!("Annotated {rule_set} {section}");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let loaded = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(loaded.unwrap_or_else(|| {
        log::debug!(
            "No config file found at {}, using defaults",
            path.map_or_else(Config::config_path, Path::to_path_buf)
                .display()
        );
        Config::default()
    }))
}

fn source_layout(layout: Layout) -> SourceLayout {
    match layout {
        Layout::Lines => SourceLayout::Lines,
        Layout::Flowed => SourceLayout::Flowed,
    }
}

fn sections_dir(
    rule_set: &RuleSetId,
    explicit: Option<PathBuf>,
    settings: Option<&RuleSetConfig>,
) -> Result<PathBuf> {
    match (explicit, settings) {
        (Some(dir), _) => Ok(dir),
        (None, Some(settings)) => Ok(settings.sections_dir.clone()),
        (None, None) => bail!(
            "Rule-set {rule_set} is not configured; pass a sections directory explicitly"
        ),
    }
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read stdin")?;
        return Ok(section_io::decode_source(bytes, input)?);
    }
    section_io::read_source_text(input)
        .with_context(|| format!("Failed to read source text {}", input.display()))
}

fn parse_command(
    input: &Path,
    html: bool,
    layout: SourceLayout,
    output_dir: &Path,
    source_url: Option<String>,
) -> Result<()> {
    let text = read_input(input)?;
    let ParsedRules { forest, report } = if html {
        parse_html_rules(&text)?
    } else {
        parse_rules(&text, layout)
    };

    let written = section_io::write_section_files(output_dir, &forest)?;
    let source_url = source_url.unwrap_or_else(|| input.display().to_string());
    section_io::write_metadata(output_dir, &Metadata::today(source_url))?;

    for root in forest.root_ids() {
        let node = forest.node(*root);
        let count = codec::encode(&forest, *root, Depth::Full).count();
        println!("{}. {} ({count} sections)", node.id, node.text);
    }
    println!(
        "Wrote {} files with {} sections to {} ({} duplicates, {} orphans, {} other lines)",
        written.len(),
        report.sections,
        output_dir.display(),
        report.duplicates.len(),
        report.orphans.len(),
        report.ignored_lines
    );
    Ok(())
}

fn sync_command(
    store_dir: &Path,
    rule_set: &RuleSetId,
    source_dir: &Path,
    dry_run: bool,
) -> Result<()> {
    let _lock = if dry_run {
        None
    } else {
        Some(WriterLock::acquire(store_dir, rule_set)?)
    };

    let files = section_io::read_section_files(source_dir, LoadMode::Strict)
        .with_context(|| format!("Failed to load section files from {}", source_dir.display()))?;
    let mut store = JsonFileStore::open(store_dir)?;

    let outcome = sync::sync(&mut store, rule_set, &files.forest, dry_run)?;
    print!("{}", outcome.changes());
    match outcome {
        SyncOutcome::DryRun(_) => println!("Dry run, no changes applied"),
        SyncOutcome::Applied { report, .. } => println!("{report}"),
    }
    Ok(())
}

fn import_command(store_dir: &Path, rule_set: &RuleSetId, source_dir: &Path) -> Result<()> {
    let _lock = WriterLock::acquire(store_dir, rule_set)?;

    let files = section_io::read_section_files(source_dir, LoadMode::Strict)
        .with_context(|| format!("Failed to load section files from {}", source_dir.display()))?;
    let mut store = JsonFileStore::open(store_dir)?;

    let count = sync::import(&mut store, rule_set, &files.forest)?;
    println!("Imported {count} sections into {rule_set}");
    Ok(())
}
