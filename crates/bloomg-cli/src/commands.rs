//! Subcommand execution.

use crate::cli::Command;
use anyhow::{bail, Context, Result};
use bloomg::{AnyTransport, Client, OpKind, Outcome, Pipeline};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// One parsed pipeline script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub kind: OpKind,
    pub filter: String,
    pub keys: Vec<String>,
}

/// Parse `bulk|multi FILTER KEY...` lines. Blank lines and `#` comments are skipped.
pub fn parse_script(script: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();

    for (number, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut words = line.split_whitespace();
        let kind = match words.next() {
            Some("bulk") => OpKind::Bulk,
            Some("multi") => OpKind::Multi,
            Some(other) => bail!("line {}: unknown command {:?}", number + 1, other),
            None => continue,
        };
        let Some(filter) = words.next() else {
            bail!("line {}: missing filter name", number + 1);
        };

        lines.push(ScriptLine {
            kind,
            filter: filter.to_string(),
            keys: words.map(str::to_string).collect(),
        });
    }

    Ok(lines)
}

fn queue(pipeline: &mut Pipeline<AnyTransport>, lines: Vec<ScriptLine>) {
    for line in lines {
        match line.kind {
            OpKind::Bulk => pipeline.bulk(line.filter, line.keys),
            OpKind::Multi => pipeline.multi(line.filter, line.keys),
        };
    }
}

async fn read_script(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut script = String::new();
            tokio::io::stdin()
                .read_to_string(&mut script)
                .await
                .context("reading stdin")?;
            Ok(script)
        }
    }
}

fn render_outcome(index: usize, outcome: &bloomg::Result<Outcome>) -> String {
    match outcome {
        Ok(Outcome::Added) => format!("{}: ok", index),
        Ok(Outcome::Checked(found)) => {
            let words: Vec<&str> = found.iter().map(|f| if *f { "yes" } else { "no" }).collect();
            format!("{}: {}", index, words.join(" "))
        }
        Err(e) => format!("{}: error: {}", index, e),
    }
}

/// Run one subcommand, printing results to stdout
pub async fn run(client: &Client<AnyTransport>, command: Command) -> Result<()> {
    debug!("Running {:?}", command);

    match command {
        Command::Create { filter } => {
            client.create_filter(&filter).await?;
            println!("created {}", filter);
        }
        Command::List => {
            for name in client.list_filters().await? {
                println!("{}", name);
            }
        }
        Command::Add { filter, key } => {
            client.filter(&filter).await?.add(key).await?;
        }
        Command::Has { filter, key } => {
            let found = client.filter(&filter).await?.has(key).await?;
            println!("{}", if found { "yes" } else { "no" });
        }
        Command::Bulk { filter, keys } => {
            client.filter(&filter).await?.bulk(keys).await?;
        }
        Command::Multi { filter, keys } => {
            let found = client.filter(&filter).await?.multi(keys.iter().cloned()).await?;
            for (key, present) in keys.iter().zip(found) {
                println!("{} {}", key, if present { "yes" } else { "no" });
            }
        }
        Command::Drop { filter } => {
            client.filter(&filter).await?.drop().await?;
        }
        Command::Clear { filter } => {
            client.filter(&filter).await?.clear().await?;
        }
        Command::Close { filter } => {
            client.filter(&filter).await?.close().await?;
        }
        Command::Info { filter } => {
            let info = client.filter(&filter).await?.info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Pipeline { file } => {
            let script = read_script(file.as_deref()).await?;
            let lines = parse_script(&script)?;
            if lines.is_empty() {
                bail!("pipeline script has no commands");
            }

            let mut pipeline = client.pipeline();
            queue(&mut pipeline, lines);

            let results = pipeline.execute().await?;
            let failures = results.iter().filter(|r| r.is_err()).count();
            for (index, outcome) in results.iter().enumerate() {
                println!("{}", render_outcome(index, outcome));
            }
            if failures > 0 {
                bail!("{} of {} pipeline commands failed", failures, results.len());
            }
        }
    }

    Ok(())
}
