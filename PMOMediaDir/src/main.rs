use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pmocontentdir::pmodidl::{DIDLLite, DidlObject, MediaMetadataParser};
use pmocontentdir::{ContentDirectory, ContentDirectoryConfigExt, ROOT_ID, logging};
use pmoconfig::{Config, get_config};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "pmomediadir")]
#[command(about = "Expose local media directories as a UPnP ContentDirectory", long_about = None)]
struct Cli {
    /// Configuration directory (default: PMOMEDIADIR_CONFIG, ./.pmomediadir, ~/.pmomediadir)
    #[arg(short, long)]
    config: Option<String>,

    /// Additional directories to expose for this run
    #[arg(short, long = "dir")]
    dirs: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Browse action and print the DIDL-Lite result
    Browse {
        /// ObjectID ("0" for the root)
        #[arg(default_value = "0")]
        object_id: String,

        /// BrowseMetadata or BrowseDirectChildren
        #[arg(short, long, default_value = "BrowseDirectChildren")]
        flag: String,

        /// Print a markdown summary instead of XML
        #[arg(short, long)]
        markdown: bool,
    },
    /// Walk the exposed tree from the root
    Tree {
        /// Maximum depth (mount points are at depth 1)
        #[arg(short, long, default_value_t = 3)]
        depth: usize,
    },
    /// Print SystemUpdateID, capabilities and mount points
    Info,
    /// Add directories to content.directories and save the configuration
    Mount {
        /// Directory paths
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn load_config(directory: Option<&str>) -> anyhow::Result<Arc<Config>> {
    match directory {
        Some(dir) => Ok(Arc::new(
            Config::load_config(dir).with_context(|| format!("loading config from {}", dir))?,
        )),
        None => Ok(get_config()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let _log = logging::init_logging(&config);

    match cli.command {
        Commands::Mount { paths } => mount(&config, &paths),
        command => run(&config, &cli.dirs, command),
    }
}

fn run(config: &Config, dirs: &[String], command: Commands) -> anyhow::Result<()> {
    let directory = config.create_content_directory();
    for dir in dirs {
        directory.add_directory(dir)?;
    }
    info!(
        "📁 {} directory(ies) exposed, SystemUpdateID {}",
        directory.directories().len(),
        directory.get_system_update_id()
    );

    match command {
        Commands::Browse {
            object_id,
            flag,
            markdown,
        } => {
            let response = directory.browse(&object_id, &flag, "*", 0, 0, "")?;
            if markdown {
                let didl = DIDLLite::parse(&response.result)?;
                print!("{}", didl.to_markdown());
            } else {
                println!("{}", response.result);
            }
            println!(
                "NumberReturned={} TotalMatches={} UpdateID={}",
                response.number_returned, response.total_matches, response.update_id
            );
        }
        Commands::Tree { depth } => {
            walk(&directory, &ROOT_ID.to_string(), 0, depth)?;
            println!("SystemUpdateID={}", directory.get_system_update_id());
        }
        Commands::Info => {
            println!("SystemUpdateID={}", directory.get_system_update_id());
            println!("SearchCapabilities={:?}", directory.get_search_capabilities());
            println!("SortCapabilities={:?}", directory.get_sort_capabilities());
            println!("ContainerUpdateIDs={:?}", directory.container_update_ids());
            for dir in directory.directories() {
                println!("  - {}", dir.display());
            }
        }
        Commands::Mount { paths } => mount(config, &paths)?,
    }

    Ok(())
}

fn mount(config: &Config, paths: &[String]) -> anyhow::Result<()> {
    let mut directories = config.get_directories();

    for path in paths {
        let canonical = std::fs::canonicalize(path)
            .with_context(|| format!("cannot resolve {}", path))?;
        if !canonical.is_dir() {
            bail!("{} is not a directory", canonical.display());
        }

        let canonical = canonical.to_string_lossy().into_owned();
        if directories.contains(&canonical) {
            info!("{} already configured", canonical);
        } else {
            info!("✅ Adding {}", canonical);
            directories.push(canonical);
        }
    }

    config.set_directories(directories)?;
    println!("Configuration saved in {}", config.directory());
    Ok(())
}

/// Affiche récursivement les enfants d'un container
fn walk(
    directory: &ContentDirectory,
    object_id: &str,
    level: usize,
    max_depth: usize,
) -> anyhow::Result<()> {
    if level >= max_depth {
        return Ok(());
    }

    let response = match directory.browse(object_id, "BrowseDirectChildren", "*", 0, 0, "") {
        Ok(response) => response,
        Err(e) => {
            println!("{}  ⚠️ {}", "  ".repeat(level), e);
            return Ok(());
        }
    };

    let didl = DIDLLite::parse(&response.result)?;
    for object in &didl.objects {
        match object {
            DidlObject::Container(container) => {
                println!(
                    "{}📁 {} [{}] ({} children)",
                    "  ".repeat(level),
                    container.title,
                    container.id,
                    container.child_count.as_deref().unwrap_or("?")
                );
                walk(directory, &container.id, level + 1, max_depth)?;
            }
            DidlObject::Item(item) => {
                println!(
                    "{}🎵 {} [{}] {}",
                    "  ".repeat(level),
                    item.title,
                    item.id,
                    item.class
                );
            }
        }
    }

    Ok(())
}
