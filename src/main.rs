use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use cellcheck_lib::config::{self as cellcheck_config, Config};
use cellcheck_lib::exit_codes::exit;
use cellcheck_lib::fixes;
use cellcheck_lib::rules::heading_utils::HeadingOutline;
use cellcheck_lib::{CellId, IssueCategory, Notebook, NotebookHost, ScanOrchestrator, SectionView};

#[derive(Parser)]
#[command(author, version, about = "Accessibility checks for Jupyter notebooks", long_about = None, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"])]
    color: String,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore configuration files and use built-in defaults
    #[arg(long, global = true, conflicts_with = "config")]
    no_config: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check notebooks and list accessibility issues
    Check(CheckArgs),
    /// Insert a level-one heading as the first cell
    FixH1 {
        /// Notebook to fix
        notebook: PathBuf,
        /// Heading text
        #[arg(long)]
        title: String,
        /// Write the result here instead of overwriting the notebook
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask the configured model for a rewrite of a flagged cell
    #[cfg(feature = "ai")]
    Suggest {
        /// Notebook containing the cell
        notebook: PathBuf,
        /// Cell id
        #[arg(long)]
        cell: String,
        /// Issue label as printed by `check`
        #[arg(long)]
        issue: String,
        /// Replace the cell source with the suggestion and save
        #[arg(long)]
        apply: bool,
        /// Write the result here instead of overwriting the notebook
        #[arg(short, long, requires = "apply")]
        output: Option<PathBuf>,
    },
    /// Explain an issue category or a rule
    Explain {
        /// Category (header, alt-text, contrast, transparency, ai-suggestion) or rule (NB001...)
        topic: String,
    },
    /// Create a default .cellcheck.toml
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = cellcheck_config::CONFIG_FILE_NAME)]
        output: String,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Args)]
struct CheckArgs {
    /// Notebooks to check
    #[arg(required = true)]
    notebooks: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Disable specific rules (comma-separated)
    #[arg(short, long)]
    disable: Option<String>,

    /// Enable only specific rules (comma-separated)
    #[arg(short, long)]
    enable: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct NotebookReport<'a> {
    path: String,
    flagged_cells: Vec<&'a CellId>,
    sections: Vec<SectionView<'a>>,
}

fn split_rule_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn load_config(cli: &Cli) -> Result<Config> {
    if cli.no_config {
        return Ok(Config::default());
    }
    Config::load(cli.config.as_deref()).context("Could not load configuration")
}

fn load_notebook(path: &Path) -> Result<Notebook> {
    Notebook::load(path).with_context(|| format!("Could not open {}", path.display()))
}

fn print_text_report(path: &Path, orchestrator: &ScanOrchestrator) {
    let index = orchestrator.index();
    if index.flagged_cells().is_empty() {
        println!("{} {}", "✓".green().bold(), path.display());
        return;
    }

    println!("{}", path.display().to_string().bold());
    for section in index.enumerate() {
        println!("  {} ({})", section.title.yellow().bold(), section.entries.len());
        for entry in section.entries {
            println!("    {} {}", format!("[{}]", entry.cell_id).cyan(), entry.label);
        }
    }

    let flagged = index.flagged_cells().len();
    let listed = index.len();
    println!(
        "  {} {} cell{} flagged, {} issue{} listed",
        "✗".red().bold(),
        flagged,
        if flagged == 1 { "" } else { "s" },
        listed,
        if listed == 1 { "" } else { "s" }
    );
}

/// Returns (issues found, some notebook could not be read)
fn run_check(args: &CheckArgs, mut config: Config) -> Result<(bool, bool)> {
    if let Some(disable) = &args.disable {
        config.global.disable = split_rule_list(disable);
    }
    if let Some(enable) = &args.enable {
        config.global.enable = split_rule_list(enable);
    }

    let mut found_issues = false;
    let mut had_errors = false;
    let mut orchestrators = Vec::new();

    for path in &args.notebooks {
        let notebook = match load_notebook(path) {
            Ok(notebook) => notebook,
            Err(e) => {
                eprintln!("{}: {:#}", "Error".red().bold(), e);
                had_errors = true;
                continue;
            }
        };
        let (orchestrator, summary) = cellcheck_lib::audit(&notebook, &config);
        log::debug!("{}: {:?}", path.display(), summary);
        found_issues |= !orchestrator.index().flagged_cells().is_empty();
        orchestrators.push((path, orchestrator));
    }

    match args.format {
        OutputFormat::Text => {
            for (path, orchestrator) in &orchestrators {
                print_text_report(path, orchestrator);
            }
        }
        OutputFormat::Json => {
            let reports: Vec<NotebookReport> = orchestrators
                .iter()
                .map(|(path, orchestrator)| NotebookReport {
                    path: path.display().to_string(),
                    flagged_cells: orchestrator.index().flagged_cells(),
                    sections: orchestrator.index().enumerate(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    Ok((found_issues, had_errors))
}

fn run_fix_h1(notebook_path: &Path, title: &str, output: Option<&Path>) -> Result<()> {
    let mut notebook = load_notebook(notebook_path)?;

    if HeadingOutline::from_cells(&notebook.cells()).has_h1() {
        println!("{} already has a level-one heading", notebook_path.display());
        return Ok(());
    }

    let id = fixes::insert_missing_h1(&mut notebook, title)?;
    let target = output.unwrap_or(notebook_path);
    notebook.save(target)?;
    println!(
        "Inserted heading cell {} into {}",
        id.to_string().cyan(),
        target.display()
    );
    Ok(())
}

#[cfg(feature = "ai")]
fn run_suggest(
    config: &Config,
    notebook_path: &Path,
    cell: &str,
    signature: &str,
    apply: bool,
    output: Option<&Path>,
) -> Result<()> {
    use cellcheck_lib::suggest::OllamaClient;

    let mut notebook = load_notebook(notebook_path)?;
    let cell_id = CellId::from(cell);
    let mut orchestrator = ScanOrchestrator::from_config(config);
    orchestrator.open_document(&notebook, config.scan_config());

    let Some(issue) = orchestrator
        .issues_for_cell(&notebook, &cell_id)
        .into_iter()
        .find(|issue| issue.signature == signature)
    else {
        bail!("Cell {cell} has no issue labelled '{signature}'");
    };

    let mut client = OllamaClient::new(&config.suggestions);
    let suggestion = fixes::request_suggestion(
        &notebook,
        &mut client,
        orchestrator.index_mut(),
        &issue,
        config.scan_config(),
    )?;

    println!("{}", "Suggested cell content:".bold());
    println!("{}", suggestion.replacement);
    if !suggestion.explanation.is_empty() {
        println!();
        println!("{}", "Explanation:".bold());
        println!("{}", suggestion.explanation);
    }

    if apply {
        fixes::apply_suggestion(&mut notebook, orchestrator.index_mut(), &issue, &suggestion)?;
        let target = output.unwrap_or(notebook_path);
        notebook.save(target)?;
        println!("Applied suggestion to cell {} in {}", cell.cyan(), target.display());
    }
    Ok(())
}

fn run_explain(topic: &str, config: &Config) -> Result<()> {
    let rules = cellcheck_lib::rules::all_rules(config);
    if let Some(rule) = rules.iter().find(|rule| rule.name().eq_ignore_ascii_case(topic)) {
        println!("{} {}", rule.name().bold(), rule.description());
        for category in rule.categories() {
            println!();
            print_category_help(*category);
        }
        return Ok(());
    }

    let category: IssueCategory = topic.parse().map_err(anyhow::Error::msg)?;
    print_category_help(category);
    Ok(())
}

fn print_category_help(category: IssueCategory) {
    let help = category.help();
    println!("{}", category.section_title().yellow().bold());
    println!("{}", help.summary);
    println!("{}: {}", help.link_text, help.link.cyan());
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}

fn main() {
    let cli = Cli::parse();

    match cli.color.as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::unset_override(),
    }

    init_logging(cli.verbose);

    let result = run(&cli);
    match result {
        Ok(true) => exit::violations_found(),
        Ok(false) => exit::success(),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            exit::tool_error();
        }
    }
}

/// Returns whether issues were found
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Check(args) => {
            let config = load_config(cli)?;
            let (found_issues, had_errors) = run_check(args, config)?;
            if had_errors {
                bail!("Some notebooks could not be checked");
            }
            Ok(found_issues)
        }
        Commands::FixH1 {
            notebook,
            title,
            output,
        } => {
            run_fix_h1(notebook, title, output.as_deref())?;
            Ok(false)
        }
        #[cfg(feature = "ai")]
        Commands::Suggest {
            notebook,
            cell,
            issue,
            apply,
            output,
        } => {
            let config = load_config(cli)?;
            run_suggest(&config, notebook, cell, issue, *apply, output.as_deref())?;
            Ok(false)
        }
        Commands::Explain { topic } => {
            run_explain(topic, &load_config(cli)?)?;
            Ok(false)
        }
        Commands::Init { output } => {
            cellcheck_config::create_default_config(output)?;
            println!("Created default configuration file: {output}");
            Ok(false)
        }
        Commands::Schema => {
            println!("{}", cellcheck_config::config_schema()?);
            Ok(false)
        }
    }
}
