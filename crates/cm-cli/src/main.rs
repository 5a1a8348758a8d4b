mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use cm_core::{
    CenterManifold, CollinearKind, CollinearPoint, NormalFormConfig, RunSnapshot, Stage,
    format_cm_table,
};
use cm_store::Store;

use crate::config::CliConfig;

/// Earth-Moon mass ratio.
const EARTH_MOON_MU: f64 = 0.012150585609624;

#[derive(Parser)]
#[command(
    name = "cm",
    about = "Center manifolds of the collinear libration points of the RTBP"
)]
struct Cli {
    /// TOML file with a [normal_form] table and optional `threads`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the center manifold of a collinear point and store the run
    Compute {
        /// L1, L2 or L3
        #[arg(long, default_value = "L1")]
        point: CollinearKind,

        /// Mass ratio of the primaries
        #[arg(long, default_value_t = EARTH_MOON_MU)]
        mu: f64,

        /// Truncation degree (overrides the config file)
        #[arg(long)]
        degree: Option<usize>,

        /// Smallest accepted homological denominator (overrides the config file)
        #[arg(long)]
        resonance_tol: Option<f64>,

        /// Print the coefficient table but do not store the run
        #[arg(long)]
        no_store: bool,
    },

    /// List stored runs
    Runs,

    /// Show a stored run
    Show {
        /// Run id or a unique prefix of it
        id: String,

        /// Summarize this stage instead of printing the center-manifold table
        #[arg(long)]
        stage: Option<Stage>,
    },

    /// Map a center-manifold point (q2, p2, q3, p3) to local phase-space coordinates
    Ic {
        /// Run id or a unique prefix of it
        id: String,
        #[arg(allow_negative_numbers = true)]
        q2: f64,
        #[arg(allow_negative_numbers = true)]
        p2: f64,
        #[arg(allow_negative_numbers = true)]
        q3: f64,
        #[arg(allow_negative_numbers = true)]
        p3: f64,
    },

    /// Export a run to a JSON file
    Export {
        /// Run id or a unique prefix of it
        id: String,
        /// Output file path
        path: PathBuf,
    },

    /// Import a run from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },

    /// Delete a stored run
    Delete {
        /// Run id or a unique prefix of it
        id: String,
    },
}

fn open_store() -> Result<Store> {
    let base_dir = std::env::var("CM_DATA_DIR").ok().map(PathBuf::from);
    Store::open_in_dir(base_dir.as_deref()).context("failed to open run store")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn init_thread_pool(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        tracing::debug!(threads, "rayon pool configured");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = CliConfig::load(cli.config.as_deref())?;
    init_thread_pool(file_config.threads)?;

    match &cli.command {
        Commands::Compute {
            point,
            mu,
            degree,
            resonance_tol,
            no_store,
        } => {
            let mut nf = file_config.normal_form;
            if let Some(degree) = degree {
                nf = nf.with_max_degree(*degree);
            }
            if let Some(tol) = resonance_tol {
                nf.resonance_tol = *tol;
            }
            cmd_compute(*point, *mu, nf, *no_store)
        }
        Commands::Runs => cmd_runs(),
        Commands::Show { id, stage } => cmd_show(id, *stage),
        Commands::Ic { id, q2, p2, q3, p3 } => cmd_ic(id, [*q2, *p2, *q3, *p3]),
        Commands::Export { id, path } => cmd_export(id, path),
        Commands::Import { path } => cmd_import(path),
        Commands::Delete { id } => cmd_delete(id),
    }
}

fn resolve(store: &Store, id: &str) -> Result<Uuid> {
    store
        .resolve_run_id(id)
        .with_context(|| format!("no unique run for '{id}'"))
}

fn cmd_compute(kind: CollinearKind, mu: f64, config: NormalFormConfig, no_store: bool) -> Result<()> {
    let point = CollinearPoint::new(kind, mu).context("invalid libration point")?;
    let mut cm = CenterManifold::new(point, config).context("failed to set up the pipeline")?;

    let data = cm.data().clone();
    let gamma = point.gamma().context("failed to locate the libration point")?;
    println!("point:      {kind} (mu = {mu})");
    println!("gamma:      {gamma:.16e}");
    println!("lambda1:    {:.16e}", data.lambda1);
    println!("omega1:     {:.16e}", data.omega1);
    println!("omega2:     {:.16e}", data.omega2);
    println!("max_degree: {}", config.max_degree);

    let stages = cm.stages().context("center-manifold computation failed")?;
    let table = format_cm_table(&stages.center_manifold_real, cm.tables())
        .context("failed to format coefficient table")?;
    print!("{table}");

    if !no_store {
        let store = open_store()?;
        let run = RunSnapshot::new(point, config, stages);
        store.save_run(&run).context("failed to store run")?;
        println!("stored run {}", run.id);
    }
    Ok(())
}

fn cmd_runs() -> Result<()> {
    let store = open_store()?;
    let runs = store.list_runs().context("failed to list runs")?;
    if runs.is_empty() {
        println!("(no runs)");
        return Ok(());
    }
    println!("{:<36}  {:<5} {:>20}  {:>6}  created", "id", "point", "mu", "degree");
    for run in runs {
        println!(
            "{:<36}  {:<5} {:>20.15}  {:>6}  {}",
            run.id, run.point.to_string(), run.mu, run.max_degree, run.created_at
        );
    }
    Ok(())
}

fn cmd_show(id: &str, stage: Option<Stage>) -> Result<()> {
    let store = open_store()?;
    let id = resolve(&store, id)?;
    let run = store.load_run(id).context("failed to load run")?;

    println!("id:         {}", run.id);
    println!("created:    {}", run.created_at);
    println!("point:      {} (mu = {})", run.point.kind(), run.point.mu());
    println!("max_degree: {}", run.config.max_degree);

    match stage {
        Some(stage) => {
            let poly = run.stages.get(stage);
            println!("stage:      {stage}");
            println!("{:>3}  {:>8}  {:>24}", "deg", "nonzero", "max |c|");
            for (degree, block) in poly.blocks().iter().enumerate() {
                let nonzero = block.iter().filter(|c| c.norm() > 0.0).count();
                println!("{degree:>3}  {nonzero:>8}  {:>24.16e}", poly.max_abs(degree));
            }
        }
        None => {
            let tables = cm_core::IndexTables::new(run.config.max_degree)
                .context("failed to build index tables")?;
            let table = format_cm_table(run.stages.get(Stage::CenterManifoldReal), &tables)
                .context("failed to format coefficient table")?;
            print!("{table}");
        }
    }
    Ok(())
}

fn cmd_ic(id: &str, cm_point: [f64; 4]) -> Result<()> {
    let store = open_store()?;
    let id = resolve(&store, id)?;
    let run = store.load_run(id).context("failed to load run")?;
    let mut cm = CenterManifold::from_stages(run.point, run.config, run.stages)
        .context("failed to rebuild the pipeline from the stored run")?;

    let local = cm
        .cm_point_to_local(&cm_point)
        .context("failed to map the center-manifold point")?;
    let [x, y, z, px, py, pz] = local;
    println!("x  = {x:.16e}");
    println!("y  = {y:.16e}");
    println!("z  = {z:.16e}");
    println!("px = {px:.16e}");
    println!("py = {py:.16e}");
    println!("pz = {pz:.16e}");
    Ok(())
}

fn cmd_export(id: &str, path: &Path) -> Result<()> {
    let store = open_store()?;
    let id = resolve(&store, id)?;
    store
        .export_json_file(id, path)
        .context("failed to export run")?;
    println!("exported {id} to {}", path.display());
    Ok(())
}

fn cmd_import(path: &Path) -> Result<()> {
    let store = open_store()?;
    let id = store
        .import_json_file(path)
        .context("failed to import JSON")?;
    println!("imported {id} from {}", path.display());
    Ok(())
}

fn cmd_delete(id: &str) -> Result<()> {
    let store = open_store()?;
    let id = resolve(&store, id)?;
    if store.delete_run(id).context("failed to delete run")? {
        println!("deleted {id}");
    } else {
        println!("run {id} not found");
    }
    Ok(())
}
