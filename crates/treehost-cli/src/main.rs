//! treehost CLI.
//!
//! Inspects a file tree through whichever backend a config file selects.
//!
//! Usage:
//!   # Empty in-memory tree
//!   treehost tree
//!
//!   # A directory on disk, described in TOML
//!   treehost --config host.toml ls /src
//!   treehost --config host.toml put /notes.txt "draft" # memory hosts forget this at exit
//!   treehost --config host.toml watch / --count 5

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use treehost::{Host, HostConfig, HostPath, WatchOptions};

/// Inspect and dry-run file trees.
#[derive(Parser, Debug)]
#[command(name = "treehost")]
#[command(about = "Inspect file trees served by a treehost backend")]
struct Args {
    /// Host config file (TOML). Defaults to an empty in-memory host.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every file in the tree
    Tree,
    /// Print a file's content
    Cat { path: String },
    /// List a directory's immediate children
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print metadata as JSON
    Stat { path: String },
    /// Write a text file, then print the resulting tree
    Put { path: String, text: String },
    /// Print change events as JSON lines
    Watch {
        #[arg(default_value = "/")]
        path: String,
        /// Only direct children of the path
        #[arg(long)]
        shallow: bool,
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HostConfig::default(),
    };
    let host = config.build().context("building host")?;
    tracing::debug!(capabilities = ?host.capabilities(), "host ready");

    run(&host, args.command).await
}

async fn run(host: &Arc<dyn Host>, command: Command) -> Result<()> {
    let mut out = std::io::stdout().lock();

    match command {
        Command::Tree => print_tree(host.as_ref(), &mut out).await?,
        Command::Cat { path } => {
            let path = HostPath::new(&path)?;
            let content = host.read(&path).await?;
            out.write_all(content.as_bytes())?;
        }
        Command::Ls { path } => {
            let path = HostPath::new(&path)?;
            for name in host.list(&path).await? {
                let child = path.join(&name);
                let suffix = if host.is_directory(&child).await? { "/" } else { "" };
                writeln!(out, "{name}{suffix}")?;
            }
        }
        Command::Stat { path } => {
            let path = HostPath::new(&path)?;
            let stats = host
                .stat(&path)
                .await?
                .with_context(|| format!("no such path: {path}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
        Command::Put { path, text } => {
            let path = HostPath::new(&path)?;
            host.write(&path, text.into()).await?;
            tracing::info!(path = %path, "wrote file");
            print_tree(host.as_ref(), &mut out).await?;
        }
        Command::Watch {
            path,
            shallow,
            count,
        } => {
            let path = HostPath::new(&path)?;
            let options = if shallow {
                WatchOptions::shallow()
            } else {
                WatchOptions::default()
            };
            let events = host
                .watch(&path, options)
                .context("this backend cannot watch")?;
            let mut events = events.take(count.unwrap_or(usize::MAX));
            while let Some(event) = events.next().await {
                writeln!(out, "{}", serde_json::to_string(&event)?)?;
                out.flush()?;
            }
        }
    }

    Ok(())
}

/// Every file under the root, depth first, sorted.
async fn collect_files(host: &dyn Host) -> Result<Vec<HostPath>> {
    let mut files = Vec::new();
    let mut pending = vec![HostPath::root()];

    while let Some(dir) = pending.pop() {
        for name in host.list(&dir).await? {
            let child = dir.join(&name);
            if host.is_directory(&child).await? {
                pending.push(child);
            } else {
                files.push(child);
            }
        }
    }

    files.sort();
    Ok(files)
}

async fn print_tree(host: &dyn Host, out: &mut impl Write) -> Result<()> {
    for path in collect_files(host).await? {
        writeln!(out, "{path}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehost::SimpleMemoryHost;

    fn p(s: &str) -> HostPath {
        HostPath::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_collect_files_sorted() {
        let host = SimpleMemoryHost::new();
        host.write(&p("/b/z"), "1".into()).await.unwrap();
        host.write(&p("/a"), "2".into()).await.unwrap();
        host.write(&p("/b/c/d"), "3".into()).await.unwrap();

        assert_eq!(
            collect_files(&host).await.unwrap(),
            vec![p("/a"), p("/b/c/d"), p("/b/z")]
        );
    }

    #[tokio::test]
    async fn test_print_tree() {
        let host = SimpleMemoryHost::new();
        host.write(&p("/x/y"), "1".into()).await.unwrap();

        let mut buf = Vec::new();
        print_tree(&host, &mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "/x/y\n");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["treehost", "--config", "h.toml", "put", "/f", "text"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("h.toml")));
        assert!(matches!(args.command, Command::Put { ref path, ref text } if path == "/f" && text == "text"));

        let args = Args::try_parse_from(["treehost", "ls"]).unwrap();
        assert!(matches!(args.command, Command::Ls { ref path } if path == "/"));
    }
}
