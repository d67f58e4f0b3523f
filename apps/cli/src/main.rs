// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash-Lite CLI - run clash detection jobs from the command line.
//!
//! Two subcommands cover the job lifecycle:
//!
//! - `run` - execute a detection job over a stage file, optionally
//!   exporting the results and baking overlap geometry
//! - `clean` - remove the rows of a previously persisted query

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use clash_lite_core::ClashSettings;
use clash_lite_job::{
    BakeTargets, ClashJob, EngineConfigRecovery, JobParams, ProgressEvent,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clash-lite", version, about = "Clash detection over stage documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a detection job and persist its results.
    Run(RunArgs),
    /// Remove a previously persisted query and its overlap rows.
    Clean(CleanArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Stage file to process.
    stage: PathBuf,

    /// Scope A: absolute prim path (leading `/`) or collection name.
    #[arg(long)]
    scope_a: String,

    /// Scope B: absolute prim path (leading `/`) or collection name.
    #[arg(long)]
    scope_b: String,

    /// Clearance tolerance; 0 detects hard clashes only.
    #[arg(long, default_value_t = 0.0)]
    tolerance: f64,

    /// Sweep the check across a time window.
    #[arg(long)]
    dynamic: bool,

    /// Start of the time window in seconds.
    #[arg(long, default_value_t = 0.0)]
    start_time: f64,

    /// End of the time window in seconds.
    #[arg(long, default_value_t = 0.0)]
    end_time: f64,

    /// Search for fully coincident duplicate meshes instead.
    #[arg(long)]
    duplicates: bool,

    /// Log engine details while running.
    #[arg(long)]
    engine_log: bool,

    /// Write an HTML report to this path.
    #[arg(long)]
    html: Option<PathBuf>,

    /// Write a JSON report to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Bake overlap geometry into this mesh layer file.
    #[arg(long, requires = "bake_materials")]
    bake_meshes: Option<PathBuf>,

    /// Material layer file accompanying the baked meshes.
    #[arg(long, requires = "bake_meshes")]
    bake_materials: Option<PathBuf>,

    /// Name stored with the query.
    #[arg(long, default_value = "cli run")]
    name: String,

    /// Comment stored with the query.
    #[arg(long, default_value = "")]
    comment: String,

    /// Remove the persisted query again when engine configuration fails.
    #[arg(long)]
    unwind_on_config_error: bool,

    /// Undo all side effects right after the run (dry-run style).
    #[arg(long)]
    undo: bool,
}

#[derive(Args)]
struct CleanArgs {
    /// Stage file whose clash data layer holds the query.
    stage: PathBuf,

    /// Identifier of the persisted query to remove.
    #[arg(long)]
    query_id: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,clash_lite_job=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Clean(args) => clean(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let settings = ClashSettings {
        logging: args.engine_log,
        tolerance: args.tolerance,
        dynamic: args.dynamic,
        start_time: args.start_time,
        end_time: args.end_time,
        duplicate_search: args.duplicates,
    };

    let mut params = JobParams::new(&args.stage)
        .scope(&args.scope_a, &args.scope_b)
        .settings(settings)
        .named(&args.name, &args.comment);
    if let Some(path) = args.html {
        params = params.export_html(path);
    }
    if let Some(path) = args.json {
        params = params.export_json(path);
    }
    if let (Some(meshes), Some(materials)) = (args.bake_meshes, args.bake_materials) {
        params = params.bake(BakeTargets {
            mesh_layer_path: meshes,
            material_layer_path: materials,
        });
    }
    if args.unwind_on_config_error {
        params = params.recovery(EngineConfigRecovery::UnwindQuery);
    }

    let mut job = ClashJob::configure(params)
        .context("invalid job parameters")?
        .with_progress_sink(|event: ProgressEvent| {
            tracing::info!(phase = ?event.phase, percent = event.percent, "progress");
        });
    let report = job.run().context("clash detection run failed")?;

    println!(
        "{} overlap(s) found, persisted as query {}",
        report.overlap_count,
        job.query().identifier()
    );
    if let Some(error) = &report.export_error {
        eprintln!("export failed: {error}");
    }
    for path in &job.outcome().exported {
        println!("exported {}", path.display());
    }
    for path in &job.outcome().baked_layers {
        println!("baked {}", path.display());
    }

    if args.undo {
        let undo = job.clean_up();
        println!(
            "undo: {} file(s) deleted, {} overlap row(s) and {} query row(s) removed",
            undo.files_deleted.len(),
            undo.overlaps_removed,
            undo.queries_removed
        );
        if !undo.success {
            bail!("undo left some artifacts behind");
        }
    } else if report.export_error.is_some() {
        bail!("run completed but export failed");
    }
    Ok(())
}

fn clean(args: CleanArgs) -> Result<()> {
    let mut job = ClashJob::for_persisted_query(&args.stage, args.query_id);
    let report = job.clean_up();
    println!(
        "{} overlap row(s) and {} query row(s) removed",
        report.overlaps_removed, report.queries_removed
    );
    if !report.success {
        bail!("cleanup failed for query {}", args.query_id);
    }
    Ok(())
}
