// Certvault — CLI Command Handlers
//
// Each function handles one CLI subcommand. They open the configured
// database, load the workspace, and act on artifacts addressed by store key.

use std::path::{Path, PathBuf};

use colored::Colorize;
use zeroize::Zeroizing;

use crate::artifact::{MessageKind, RenderFormat, RenderOptions};
use crate::codec;
use crate::config::Config;
use crate::error::{CertvaultError, Result};
use crate::store::{ArtifactStore, SqliteArtifactStore, StoreKey};
use crate::tree::{Filter, NodeId};
use crate::workspace::{ImportOutcome, Workspace};

use super::{Cli, Commands, ExportFormat};

type SqliteWorkspace<'a> = Workspace<SqliteArtifactStore<'a>>;

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<()> {
    let config = Config::new(cli.db, cli.passphrase, cli.pem_comment);
    let db = config.open_database()?;
    let mut ws = Workspace::open(SqliteArtifactStore::new(&db))?;

    let result = match cli.command {
        Commands::Import { files } => cmd_import(&mut ws, &files),
        Commands::List { filter, literal } => cmd_list(&ws, filter, literal),
        Commands::Show { key } => cmd_show(&ws, &key),
        Commands::Export {
            key,
            format,
            out,
            save,
            private,
        } => cmd_export(&ws, &config, &key, format, out, save, private),
        Commands::Rename { key, name } => cmd_rename(&mut ws, &key, &name),
        Commands::Comment { key, text } => cmd_comment(&mut ws, &key, &text),
        Commands::Delete { key } => cmd_delete(&mut ws, &key),
        Commands::Attach { child, parent } => cmd_attach(&mut ws, &child, &parent),
        Commands::Detach { key } => cmd_detach(&mut ws, &key),
        Commands::Audit { key } => cmd_audit(&ws, &key),
        Commands::Remind { key } => cmd_remind(&ws, &key),
    };
    ws.close();
    result
}

/// Resolve a store key given on the command line to a loaded node.
fn resolve(ws: &SqliteWorkspace<'_>, key: &str) -> Result<NodeId> {
    let store_key: StoreKey = key
        .parse()
        .map_err(|e| CertvaultError::Other(format!("Invalid store key '{}': {}", key, e)))?;
    ws.find_by_key(&store_key)
        .ok_or_else(|| CertvaultError::Other(format!("No artifact with key {}", store_key)))
}

fn key_text(ws: &SqliteWorkspace<'_>, id: NodeId) -> Result<String> {
    Ok(ws
        .tree()
        .node(id)?
        .store_key()
        .map(|k| k.to_string())
        .unwrap_or_default())
}

// ─── Import ──────────────────────────────────────────────────────────────────

fn cmd_import(ws: &mut SqliteWorkspace<'_>, files: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for file in files {
        let bytes = std::fs::read(file)?;
        let hint = file.to_string_lossy();
        let outcomes = match ws.import(&bytes, &hint) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}: {}", file.display(), e);
                continue;
            }
        };
        for outcome in outcomes {
            let node = ws.tree().node(outcome.id())?;
            match outcome {
                ImportOutcome::Imported(_) => {
                    println!("✓ {}", node.message(MessageKind::Import));
                }
                ImportOutcome::Duplicate(_) => {
                    println!("  {} '{}' is already stored", node.kind().label(), node.name());
                }
                ImportOutcome::Upgraded(_) => {
                    println!("✓ Added the private key to '{}'", node.name());
                }
            }
        }
    }

    if failed > 0 {
        return Err(CertvaultError::Other(format!(
            "{} of {} files could not be imported",
            failed,
            files.len()
        )));
    }
    Ok(())
}

// ─── List / Show ─────────────────────────────────────────────────────────────

fn cmd_list(ws: &SqliteWorkspace<'_>, filter: Option<String>, literal: bool) -> Result<()> {
    let filter = match filter {
        None => Filter::all(),
        Some(text) if literal => Filter::literal(&text),
        Some(text) => Filter::new(&text)?,
    };

    let rows = ws.list(&filter);
    if rows.is_empty() {
        println!("No artifacts found.");
        return Ok(());
    }

    for (id, depth) in rows {
        let node = ws.tree().node(id)?;
        println!(
            "{}{}  {}",
            "  ".repeat(depth),
            node.render(RenderFormat::Colored)?,
            key_text(ws, id)?.dimmed()
        );
    }
    Ok(())
}

fn cmd_show(ws: &SqliteWorkspace<'_>, key: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    let node = ws.tree().node(id)?;

    for (name, value) in node.properties()? {
        println!("{:<20} {}", format!("{}:", name), value);
    }
    println!("{:-<80}", "");
    print!("{}", node.render(RenderFormat::Dump)?);
    Ok(())
}

// ─── Export ──────────────────────────────────────────────────────────────────

fn cmd_export(
    ws: &SqliteWorkspace<'_>,
    config: &Config,
    key: &str,
    format: ExportFormat,
    out: Option<PathBuf>,
    save: bool,
    private: bool,
) -> Result<()> {
    let id = resolve(ws, key)?;
    let options = RenderOptions {
        pem_comment: config.pem_comment,
    };

    let target = match (out, save) {
        (Some(path), _) => Some(path),
        (None, true) => {
            let node = ws.tree().node(id)?;
            Some(node.dump_filename(Path::new("."), node.kind().extension()))
        }
        (None, false) if format == ExportFormat::Der => {
            return Err(CertvaultError::Other(
                "DER output is binary; use --out or --save".to_string(),
            ))
        }
        (None, false) => None,
    };

    let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(match (format, private) {
        (ExportFormat::Pem, true) => ws.export_private_key(id)?.as_bytes().to_vec(),
        (_, true) => {
            return Err(CertvaultError::NotAvailable(
                "private keys are only exported as PEM".to_string(),
            ))
        }
        (ExportFormat::Pem, false) => ws.export(id, RenderFormat::Pem, options)?.into_bytes(),
        (ExportFormat::Dump, false) => ws.export(id, RenderFormat::Dump, options)?.into_bytes(),
        (ExportFormat::Der, false) => ws.export_der(id)?,
        (ExportFormat::Base64, false) => {
            let node = ws.tree().node(id)?;
            if let Some(store_key) = node.store_key() {
                ws.store().log_action(store_key, "exported", Some("base64"))?;
            }
            format!("{}\n", codec::to_base64(node)).into_bytes()
        }
    });

    match target {
        Some(path) => {
            std::fs::write(&path, bytes.as_slice())?;
            println!("✓ Exported to {}", path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

// ─── Metadata ────────────────────────────────────────────────────────────────

fn cmd_rename(ws: &mut SqliteWorkspace<'_>, key: &str, name: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    ws.rename(id, name)?;
    println!("✓ Renamed to '{}'", name);
    Ok(())
}

fn cmd_comment(ws: &mut SqliteWorkspace<'_>, key: &str, text: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    ws.set_comment(id, text)?;
    println!("✓ Comment updated");
    Ok(())
}

// ─── Delete ──────────────────────────────────────────────────────────────────

fn cmd_delete(ws: &mut SqliteWorkspace<'_>, key: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    let deleted = ws.remove(id)?;
    println!("✓ Deleted {} artifact(s)", deleted.len());
    for key in deleted {
        println!("  {}", key.to_string().dimmed());
    }
    Ok(())
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

fn cmd_attach(ws: &mut SqliteWorkspace<'_>, child: &str, parent: &str) -> Result<()> {
    let child = resolve(ws, child)?;
    let parent = resolve(ws, parent)?;
    ws.attach(child, parent)?;
    println!("✓ Moved");
    Ok(())
}

fn cmd_detach(ws: &mut SqliteWorkspace<'_>, key: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    ws.detach(id)?;
    println!("✓ Detached");
    Ok(())
}

// ─── Audit ───────────────────────────────────────────────────────────────────

fn cmd_audit(ws: &SqliteWorkspace<'_>, key: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    let store_key = ws
        .tree()
        .node(id)?
        .store_key()
        .copied()
        .ok_or_else(|| CertvaultError::Other(format!("No artifact with key {}", key)))?;

    let logs = ws.store().get_audit_logs(&store_key)?;
    if logs.is_empty() {
        println!("No audit logs found for artifact: {}", store_key);
        return Ok(());
    }

    println!("Audit Log for Artifact: {}", store_key);
    println!("{:-<80}", "");
    for log in logs {
        println!("{}", log);
    }
    println!("{:-<80}", "");
    Ok(())
}

// ─── Reminder ────────────────────────────────────────────────────────────────

fn cmd_remind(ws: &SqliteWorkspace<'_>, key: &str) -> Result<()> {
    let id = resolve(ws, key)?;
    let node = ws.tree().node(id)?;
    let lines = node.expiry_reminder().ok_or_else(|| {
        CertvaultError::NotAvailable(format!("{} does not expire", node.name()))
    })?;

    println!("BEGIN:VCALENDAR");
    println!("VERSION:2.0");
    println!("PRODID:-//certvault//EN");
    for line in lines {
        println!("{}", line);
    }
    println!("END:VCALENDAR");
    Ok(())
}
