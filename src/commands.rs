use std::path::Path;
use std::time::Instant;

use cassref::checker::{CheckReport, CheckScope, ConsistencyChecker, Finding, FindingStatus};
use cassref::index::MatchMode;
use cassref::object::{object_info, search_inside};
use cassref::output::{emit_success, OutputMode};
use cassref::repair::{RepairOutcome, RepairReport, Repairer};
use cassref::store::{SqliteStore, Store};
use cassref::ui::{self, Icons, Spinner};
use indicatif::HumanDuration;
use owo_colors::OwoColorize;

/// Knobs shared by the checking and repairing commands
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub output_mode: OutputMode,
    pub match_mode: MatchMode,
    pub dry_run: bool,
}

pub fn run_info(store: &dyn Store, id: &str, opts: RunOptions) -> anyhow::Result<()> {
    let info = object_info(store, id)?;

    if opts.output_mode.is_human() {
        println!("INFO for id: {}", id);
        if info.is_empty() {
            ui::warn(&format!("No type, fq_name or parent_type columns for {}", id));
        } else {
            println!("----");
            print!("{}", serde_yaml::to_string(&info)?);
        }
    } else {
        emit_success(
            opts.output_mode,
            "info",
            serde_json::json!({ "id": id, "attributes": info }),
        )?;
    }
    Ok(())
}

pub fn run_fulltext(store: &dyn Store, needle: &str, opts: RunOptions) -> anyhow::Result<()> {
    let human = opts.output_mode.is_human();
    let mut hits = Vec::new();

    let count = search_inside(store, needle, opts.match_mode, |table, cell| {
        if human {
            println!("{} {}", ui::muted(table.as_str()), cell);
        } else {
            hits.push(serde_json::json!({ "table": table, "cell": cell }));
        }
    })?;

    if human {
        ui::summary_row("Matches:", &count.to_string());
    } else {
        emit_success(
            opts.output_mode,
            "fulltext",
            serde_json::json!({ "needle": needle, "count": count, "matches": hits }),
        )?;
    }
    Ok(())
}

pub fn run_check(store: &dyn Store, scope: CheckScope, opts: RunOptions) -> anyhow::Result<()> {
    let started = Instant::now();
    let human = opts.output_mode.is_human();
    if human && !cassref::output::is_quiet() {
        ui::header(&format!("Checking back references for {}", scope));
    }

    let spinner = Spinner::new("Scanning obj_uuid_table");
    let report = ConsistencyChecker::new(store, opts.match_mode).check(scope)?;
    spinner.finish_and_clear();

    if human {
        print_check_report(&report);
        ui::timing(&format!("Done in {}", HumanDuration(started.elapsed())));
    } else {
        emit_success(opts.output_mode, "check-backref", &report)?;
    }
    Ok(())
}

pub fn run_clear_backref(store: &dyn Store, scope: CheckScope, opts: RunOptions) -> anyhow::Result<()> {
    let repairer = Repairer::new(store, opts.match_mode).with_dry_run(opts.dry_run);

    let targets = match scope {
        CheckScope::One(id) => vec![id],
        CheckScope::All => {
            let spinner = Spinner::new("Looking for absent targets");
            let report = ConsistencyChecker::new(store, opts.match_mode).check_all()?;
            spinner.finish_and_clear();
            report.absent_targets()
        }
    };

    let mut reports = Vec::with_capacity(targets.len());
    for target in &targets {
        let report = repairer.clear_stale_references(target)?;
        if opts.output_mode.is_human() {
            print_repair_report(&report);
        }
        reports.push(report);
    }

    if opts.output_mode.is_human() {
        if targets.is_empty() {
            ui::success("No absent targets, nothing to clear");
        } else if targets.len() > 1 {
            let deleted: usize = reports.iter().map(RepairReport::deleted).sum();
            ui::summary_row("Targets:", &targets.len().to_string());
            ui::summary_row("Deleted:", &deleted.to_string());
        }
    } else {
        emit_success(opts.output_mode, "clear-backref", &reports)?;
    }
    Ok(())
}

pub fn run_clear_props(store: &dyn Store, id: &str, opts: RunOptions) -> anyhow::Result<()> {
    let report = Repairer::new(store, opts.match_mode)
        .with_dry_run(opts.dry_run)
        .clear_orphaned_properties(id)?;

    if opts.output_mode.is_human() {
        print_repair_report(&report);
    } else {
        emit_success(opts.output_mode, "clear-props", &report)?;
    }
    Ok(())
}

pub fn run_snapshot(store: &dyn Store, path: &Path, opts: RunOptions) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spinner = Spinner::new("Copying tables");
    let snapshot = SqliteStore::open(path)?;
    let stats = snapshot.import_from(store)?;
    spinner.finish_and_clear();

    if opts.output_mode.is_human() {
        println!("{} Snapshot written to {}", Icons::DATABASE, path.display());
        println!("{}", stats);
    } else {
        emit_success(
            opts.output_mode,
            "snapshot",
            serde_json::json!({ "path": path, "cells": stats }),
        )?;
    }
    Ok(())
}

/// One line per broken reference, plus the escalation line for absent targets
pub fn render_finding(finding: &Finding) -> String {
    let mut text = format!(
        "NOT FOUND in obj_fq_name_table: {} (type {}) referenced by {} on source object {}",
        finding.target, finding.kind, finding.column, finding.source
    );
    if finding.status == FindingStatus::Absent {
        text.push_str(&format!("\n    object {} is entirely absent", finding.target));
    }
    text
}

fn print_check_report(report: &CheckReport) {
    for finding in &report.findings {
        let icon = match finding.status {
            FindingStatus::Absent => Icons::DIRECT,
            FindingStatus::Dangling => Icons::INDIRECT,
        };
        println!(
            "{} {}",
            icon,
            render_finding(finding).style(ui::theme().finding(finding.status))
        );
    }
    for malformed in &report.malformed {
        ui::warn(&format!(
            "Skipped malformed column {:?} on {}: {}",
            malformed.column, malformed.source, malformed.reason
        ));
    }

    ui::section("Summary");
    let mut tally = ui::TableBuilder::new();
    tally.add_row("Cells scanned", &report.scanned.to_string());
    tally.add_row("References examined", &report.examined.to_string());
    tally.add_row("Dangling", &report.dangling_count().to_string());
    tally.add_row("Entirely absent", &report.absent_count().to_string());
    tally.add_row("Malformed", &report.malformed.len().to_string());
    println!("{}", tally.build());

    if report.is_consistent() {
        ui::success("All references are consistent");
    } else if report.findings.len() <= 20 {
        println!("{}", ui::findings_table(&report.findings));
    }
}

fn print_repair_report(report: &RepairReport) {
    match report.outcome {
        RepairOutcome::Refused => {
            ui::warn(&format!(
                "{} still has an fq-name index entry, nothing deleted",
                report.target
            ));
        }
        RepairOutcome::Cleared { deleted } => {
            for cell in &report.removed {
                println!("{} {} {}", Icons::DEL, cell.key, ui::dim(&cell.column));
            }
            if report.dry_run {
                ui::info(
                    &format!("{} {}", Icons::SHIELD, report.action),
                    &format!("would delete {} cells for {}", deleted, report.target),
                );
            } else {
                ui::success(&format!("Deleted {} cells for {}", deleted, report.target));
            }
        }
    }
}
