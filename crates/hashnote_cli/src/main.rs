//! Command-line front end for a hashnote store.
//!
//! ```text
//! hashnote_cli [version]
//! hashnote_cli repair
//! hashnote_cli tags [filter]
//! hashnote_cli search <query>
//! hashnote_cli export <file>
//! hashnote_cli import <file> [--yes]
//! ```
//!
//! The store location and logging come from `HASHNOTE_*` environment variables.

use hashnote_core::{
    init_from_config, BackupCodec, CoreConfig, ImportOutcome, NoteService, SearchQuery, Store,
    TagService,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let config = CoreConfig::from_env();
    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("version") => {
            println!("hashnote_core ping={}", hashnote_core::ping());
            println!("hashnote_core version={}", hashnote_core::core_version());
            Ok(())
        }
        Some("repair") => run_repair(&config),
        Some("tags") => run_tags(&config, args.get(1).map_or("", String::as_str)),
        Some("search") => run_search(&config, &args[1..].join(" ")),
        Some("export") => match args.get(1) {
            Some(path) => run_export(&config, path),
            None => Err("usage: hashnote_cli export <file>".into()),
        },
        Some("import") => match args.get(1) {
            Some(path) => run_import(&config, path, args.iter().any(|arg| arg == "--yes")),
            None => Err("usage: hashnote_cli import <file> [--yes]".into()),
        },
        Some(other) => Err(format!("unknown command `{other}`").into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open_store(config: &CoreConfig) -> Result<Store, Box<dyn Error>> {
    Ok(Store::open(&config.db_path)?)
}

fn run_repair(config: &CoreConfig) -> CliResult {
    let mut store = open_store(config)?;
    let report = TagService::new(&mut store).recompute()?;
    println!(
        "tags repaired={} notes normalized={}",
        report.tags_repaired, report.notes_normalized
    );
    Ok(())
}

fn run_tags(config: &CoreConfig, filter: &str) -> CliResult {
    let mut store = open_store(config)?;
    for tag in TagService::new(&mut store).find_tags(filter)? {
        println!(
            "#{}\t{}\t{}",
            tag.name,
            tag.count,
            tag.color.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn run_search(config: &CoreConfig, query: &str) -> CliResult {
    let mut store = open_store(config)?;
    let hits = NoteService::new(&mut store).search(&SearchQuery::new(query))?;
    for note in &hits {
        println!("{}\t{}", note.id, note.title);
    }
    println!("{} match(es)", hits.len());
    Ok(())
}

fn run_export(config: &CoreConfig, path: &str) -> CliResult {
    let mut store = open_store(config)?;
    let json = BackupCodec::new(&mut store).export_json()?;
    std::fs::write(path, json)?;
    println!("exported to {path}");
    Ok(())
}

fn run_import(config: &CoreConfig, path: &str, assume_yes: bool) -> CliResult {
    let text = std::fs::read_to_string(path)?;
    let mut store = open_store(config)?;
    let outcome = BackupCodec::new(&mut store)
        .with_batch_size(config.import_batch_size)
        .import_json(&text, |warning| {
            eprintln!("warning: {warning}");
            assume_yes
        })?;
    match outcome {
        ImportOutcome::Completed(report) => {
            println!(
                "imported={} failed={} tags={}",
                report.imported, report.failed, report.repair.tags_repaired
            );
            Ok(())
        }
        ImportOutcome::Declined(_) => Err("import cancelled; rerun with --yes to continue".into()),
    }
}
