//! Native-only diagnostic tool: prints the registry and slot health of a
//! `UniverseManager` rooted at a given base directory. Not part of the
//! production (wasm32) embedder path — for local inspection and the kind
//! of ad hoc "what does the registry look like right now" question the
//! teacher's `decapod doctor`/`capabilities` commands answer for its own
//! domain.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use redstring_core::adapters::browser_kv::NativeBrowserKvAdapter;
use redstring_core::adapters::local_file::NativeLocalFileAdapter;
use redstring_core::manager::UniverseManager;
use redstring_core::status::StatusBus;

#[derive(Parser, Debug)]
#[clap(name = "redstring-diagnostic", about = "Inspect a native-adapter-backed universe registry")]
struct Cli {
    /// Base directory holding `local/` and `browser/` adapter roots.
    #[clap(long, default_value = ".redstring-diagnostic")]
    base_dir: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every universe's slot configuration and health.
    Status {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}

fn main() {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    let local = Arc::new(NativeLocalFileAdapter::new(cli.base_dir.join("local")));
    let browser = Arc::new(NativeBrowserKvAdapter::new(cli.base_dir.join("browser"), 50_000_000));
    let manager = UniverseManager::startup(HashMap::new(), None, HashMap::new(), local, browser, StatusBus::new());

    match cli.command {
        Command::Status { format } => {
            let snapshots = manager.snapshot_all();
            if format == "json" {
                let rows: Vec<_> = snapshots
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "slug": s.slug,
                            "name": s.name,
                            "sourceOfTruth": format!("{:?}", s.source_of_truth),
                            "localFileEnabled": s.local_file_enabled,
                            "gitRepoEnabled": s.git_repo_enabled,
                            "browserStorageEnabled": s.browser_storage_enabled,
                            "isActive": s.is_active,
                            "unhealthyTicks": s.unhealthy_ticks,
                        })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(rows));
            } else {
                for s in &snapshots {
                    println!(
                        "{}{} [{}] local={} git={} browser={} unhealthy_ticks={}",
                        if s.is_active { "* " } else { "  " },
                        s.slug,
                        s.name,
                        s.local_file_enabled,
                        s.git_repo_enabled,
                        s.browser_storage_enabled,
                        s.unhealthy_ticks
                    );
                }
            }
        }
    }
}
