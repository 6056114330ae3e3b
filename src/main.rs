use clap::{Parser, Subcommand};
use clipstash::config::Config;
use clipstash::query::{Criteria, QueryOutcome};
use clipstash::{EntryId, Store, TagNode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "clipstash", version, about = "Tagged history of the URLs you copy")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show recorded entries, most recent first
    History {
        /// Text to look for in titles and URLs
        #[arg(long)]
        search: Option<String>,
        /// Filter by tag (includes its parents and sub-tags); repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only entries without tags
        #[arg(long)]
        no_tags: bool,
        #[arg(long)]
        platform: Option<String>,
        /// Exact number of times played
        #[arg(long = "watched")]
        watch_count: Option<u32>,
        /// YYYY-MM-DD or DD/MM/YYYY
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        no_limit: bool,
    },
    /// Record a URL
    Add {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        platform: String,
    },
    /// Remove an entry
    Remove { id: EntryId },
    /// Mark an entry as played once more
    Watched { id: EntryId },
    /// List the platforms seen so far
    Platforms,
    /// Manage tags
    #[command(subcommand)]
    Tag(TagCommand),
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    Add {
        name: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Rename { name: String, new_name: String },
    Describe { name: String, description: String },
    Remove { name: String },
    /// Show the tag tree
    List,
    /// Show the full path of a tag
    Path { name: String },
    Attach { id: EntryId, name: String },
    Detach { id: EntryId, name: String },
    /// File an entry under a slash-separated path, creating missing tags
    Assign { id: EntryId, path: String },
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let file_layer = config
        .log_dir()
        .ok()
        .and_then(|dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(clipstash::constants::LOG_FILE)
                .build(dir)
                .ok()
        })
        .map(|appender| fmt::layer().with_writer(appender).with_ansi(false));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> clipstash::Result<()> {
    let store = config.open_store()?;
    let mutated = match command {
        Command::History {
            search,
            tags,
            no_tags,
            platform,
            watch_count,
            since,
            limit,
            no_limit,
        } => {
            let criteria = Criteria {
                search,
                tags,
                no_tags,
                platform,
                watch_count,
                since,
                limit,
                no_limit,
            };
            let outcome = store
                .history()
                .with_default_limit(config.default_limit)
                .query(&criteria)?;
            print_history(&outcome);
            false
        }
        Command::Add {
            url,
            title,
            platform,
        } => {
            let id = store.create_entry(&url, &title, &platform)?;
            println!("Recorded entry {id}");
            true
        }
        Command::Remove { id } => {
            store.delete_entry(id)?;
            println!("Removed entry {id}");
            true
        }
        Command::Watched { id } => {
            let count = store.increment_watch_count(id)?;
            println!("Entry {id} watched {count} time(s)");
            true
        }
        Command::Platforms => {
            for platform in store.platforms()? {
                println!("{platform}");
            }
            false
        }
        Command::Tag(command) => run_tag(command, &store)?,
    };

    if mutated {
        config.persist(&store)?;
    }
    Ok(())
}

/// Returns whether the store changed.
fn run_tag(command: TagCommand, store: &Store) -> clipstash::Result<bool> {
    let tags = store.tags();
    match command {
        TagCommand::Add {
            name,
            parent,
            description,
        } => {
            tags.create(&name, parent.as_deref(), description.as_deref())?;
            println!("Created tag '{name}'");
        }
        TagCommand::Rename { name, new_name } => {
            tags.rename(&name, &new_name)?;
            println!("Renamed '{name}' to '{new_name}'");
        }
        TagCommand::Describe { name, description } => {
            tags.describe(&name, Some(&description))?;
            println!("Updated description of '{name}'");
        }
        TagCommand::Remove { name } => {
            tags.delete(&name)?;
            println!("Removed tag '{name}'");
        }
        TagCommand::List => {
            print_forest(&tags.forest()?);
            return Ok(false);
        }
        TagCommand::Path { name } => {
            println!("{}", tags.path(&name)?.join(" > "));
            return Ok(false);
        }
        TagCommand::Attach { id, name } => {
            tags.attach(id, &name)?;
            println!("Tagged entry {id} with '{name}'");
        }
        TagCommand::Detach { id, name } => {
            tags.detach(id, &name)?;
            println!("Removed tag '{name}' from entry {id}");
        }
        TagCommand::Assign { id, path } => {
            tags.assign_path(id, &path)?;
            println!("Filed entry {id} under '{path}'");
        }
    }
    Ok(true)
}

fn print_history(outcome: &QueryOutcome) {
    if outcome.is_empty() {
        println!("No history available");
        return;
    }
    for item in outcome.items() {
        let entry = &item.entry;
        let title = if entry.title.is_empty() {
            "(untitled)"
        } else {
            entry.title.as_str()
        };
        println!(
            "[{}] {}  {}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.platform,
            title
        );
        println!("     {}", entry.url);
        if entry.watch_count > 0 {
            println!("     watched {} time(s)", entry.watch_count);
        }
        if !item.tags.is_empty() {
            println!("     tags: {}", item.tags.join(", "));
        }
    }
}

fn print_forest(forest: &[TagNode]) {
    if forest.is_empty() {
        println!("No tags defined");
        return;
    }
    let mut stack: Vec<&TagNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        let indent = "  ".repeat(node.depth);
        match &node.description {
            Some(description) => println!("{indent}{}  ({description})", node.name),
            None => println!("{indent}{}", node.name),
        }
        stack.extend(node.children.iter().rev());
    }
}
