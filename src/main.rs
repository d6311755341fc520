mod app;
mod concept;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::{Level, info};

use app::{ClickPolicy, Settings};
use concept::{GeminiExpander, MergePolicy, load_tree_file};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Credential for the generative model.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    #[arg(long, default_value = "gemini-2.0-flash")]
    model: String,

    /// What a primary click on a wedge does.
    #[arg(long, value_enum, default_value_t = ClickPolicy::ExpandLeaves)]
    click_policy: ClickPolicy,

    /// How expanded children are merged into the tree.
    #[arg(long, value_enum, default_value_t = MergePolicy::Replace)]
    merge_policy: MergePolicy,

    /// Seconds before an outstanding expansion is abandoned.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Concept to expand on startup.
    #[arg(long)]
    concept: Option<String>,

    /// JSON concept tree to start from instead of a blank canvas.
    #[arg(long)]
    tree: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    let initial_tree = args
        .tree
        .as_deref()
        .map(load_tree_file)
        .transpose()
        .context("failed to load the starting tree")?;
    if let Some(tree) = &initial_tree {
        info!(
            root = %tree.name,
            nodes = tree.node_count(),
            depth = tree.height(),
            "loaded starting tree"
        );
    }

    let timeout = Duration::from_secs(args.timeout_secs.max(1));
    let expander = GeminiExpander::new(args.model.clone(), timeout)
        .context("failed to build the model client")?;

    let settings = Settings {
        credential: args.api_key,
        click_policy: args.click_policy,
        merge_policy: args.merge_policy,
        timeout,
        initial_tree,
        initial_concept: args.concept,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Concept Sunburst",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::SunburstApp::new(
                cc,
                settings,
                Arc::new(expander),
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to run the window: {error}"))
}
