//! notepress - publish notes as a static site

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use notepress::config::Config;
use notepress::export::{self, ExportedNote};
use notepress::publish::{Publisher, StaleOutput, TemplateSet};
use notepress::source::{NoteSource, SqliteSource};

#[derive(Parser)]
#[command(name = "notepress")]
#[command(version, about = "Publish notes as a static site", long_about = None)]
#[command(after_help = "EXAMPLES:
    notepress publish                     Publish using ./config.json
    notepress publish --reslug            Recompute slugs, adding redirects
    notepress publish --site-url URL      Publish for another host
    notepress export -o notes.json -f     Dump notes with formatting runs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: ./config.json if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Notes folder to read (overrides config)
    #[arg(long, global = true)]
    folder: Option<String>,

    /// Notes database (overrides config)
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Render changed notes and update the site
    Publish(PublishArgs),
    /// List notes, or write them as JSON
    Export(ExportArgs),
}

#[derive(Args)]
struct PublishArgs {
    /// Output directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Template directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    templates: Option<PathBuf>,

    /// Recompute every slug; changed slugs get redirects
    #[arg(long)]
    reslug: bool,

    /// Render every note even if unchanged
    #[arg(long)]
    force: bool,

    /// Delete pages of moved and deleted notes
    #[arg(long)]
    remove_stale: bool,

    /// Render workers (overrides config)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Site URL used in links and the feed (overrides config)
    #[arg(long, value_name = "URL")]
    site_url: Option<String>,

    /// Site title (overrides config)
    #[arg(long, value_name = "TEXT")]
    site_title: Option<String>,

    /// Site description for the feed (overrides config)
    #[arg(long, value_name = "TEXT")]
    site_description: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    /// Write JSON here instead of listing notes
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Include formatting runs in the JSON
    #[arg(short, long)]
    formatting: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let result = match load_config(&cli) {
        Ok(config) => match &cli.command {
            Command::Publish(args) => publish(config, args),
            Command::Export(args) => export(&config, args),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) {
    let default = if quiet {
        "notepress=warn"
    } else if verbose {
        "notepress=debug"
    } else {
        "notepress=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> notepress::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(folder) = &cli.folder {
        config.notes_folder_name = folder.clone();
    }
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    if let Command::Publish(args) = &cli.command {
        if let Some(output) = &args.output {
            config.output_directory = output.clone();
        }
        if let Some(templates) = &args.templates {
            config.template_directory = templates.clone();
        }
        if args.remove_stale {
            config.stale_output = StaleOutput::Remove;
        }
        if args.jobs.is_some() {
            config.jobs = args.jobs;
        }
        if let Some(url) = &args.site_url {
            config.site_url = url.clone();
        }
        if let Some(title) = &args.site_title {
            config.site_title = title.clone();
        }
        if let Some(description) = &args.site_description {
            config.site_description = description.clone();
        }
    }
    config.validate()?;
    Ok(config)
}

fn publish(config: Config, args: &PublishArgs) -> notepress::Result<()> {
    // Templates first: a missing one must stop the run before any note is read.
    let templates = TemplateSet::load(&config.template_directory)?;
    let source = SqliteSource::open(&config.database_path()?, &config.notes_folder_name)?;

    let mut options = config.publish_options();
    options.reslug = args.reslug;
    options.force = args.force;

    let report = Publisher::new(options, templates).run(&source)?;

    for rejected in &report.rejected {
        eprintln!("rejected: {} ({:?}): {}", rejected.id, rejected.title, rejected.reason);
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    println!(
        "{} new, {} changed, {} moved, {} unchanged, {} deleted; {} files written",
        report.new.len(),
        report.changed.len(),
        report.moved.len(),
        report.unchanged,
        report.deleted.len(),
        report.written.len()
    );
    Ok(())
}

fn export(config: &Config, args: &ExportArgs) -> notepress::Result<()> {
    let source = SqliteSource::open(&config.database_path()?, &config.notes_folder_name)?;
    source.check_schema()?;
    let notes = source.notes()?;
    println!("Found {} notes in '{}'", notes.len(), config.notes_folder_name);

    match &args.output {
        Some(path) => {
            export::write_json(&notes, path, args.formatting)?;
            println!("Exported {} notes to {}", notes.len(), path.display());
        }
        None => {
            for note in &notes {
                println!("{}", ExportedNote::from_note(note, false).summary());
            }
        }
    }
    Ok(())
}
