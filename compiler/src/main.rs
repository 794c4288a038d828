use clap::Parser;
use std::path::PathBuf;

use skfuse::diag::{DiagLevel, Diagnostic};
use skfuse::pass::StageId;
use skfuse::pipeline::{self, FusionConfig, FusionState};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Emit {
    /// Rewritten graph as indented text
    Graph,
    /// Rewritten graph as JSON
    Json,
    /// Rewritten graph as Graphviz DOT
    Dot,
    /// Scope membership after collect/check/split
    Scopes,
    /// What the pass stripped, split and fused
    Summary,
    /// Provenance of the input
    BuildInfo,
}

impl Emit {
    fn terminal(self) -> StageId {
        match self {
            Emit::Scopes => StageId::Split,
            _ => StageId::Refresh,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "skfuse",
    version,
    about = "Super-kernel fusion — folds scoped operators of a multi-stream compute graph into fused super nodes"
)]
struct Cli {
    /// Input graph (.sgd description or .json)
    graph: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = Emit::Summary)]
    emit: Emit,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Lowest event id for freshly minted signal/wait pairs
    #[arg(long, default_value_t = skfuse::id::FRESH_EVENT_BASE)]
    event_base: u32,

    /// Skip stage certificate checks
    #[arg(long)]
    no_verify: bool,

    /// Print stage timing and debug-level logs
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn print_diag(diag: &Diagnostic, verbose: bool) {
    if diag.level == DiagLevel::Info && !verbose {
        return;
    }
    eprintln!("skfuse: {}", diag);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        eprintln!("skfuse: graph = {}", cli.graph.display());
        eprintln!("skfuse: emit  = {:?}", cli.emit);
    }

    // ── Read and load graph ──
    let text = match std::fs::read_to_string(&cli.graph) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("skfuse: error: {}: {}", cli.graph.display(), e);
            std::process::exit(2);
        }
    };
    let graph = match pipeline::load_graph(&cli.graph, &text) {
        Ok(g) => g,
        Err(diags) => {
            for d in &diags {
                eprintln!("skfuse: {}", d);
            }
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!(
            "skfuse: loaded '{}' ({} nodes)",
            graph.name,
            graph.total_len()
        );
    }

    let provenance = pipeline::compute_provenance(&text, &graph);
    if cli.emit == Emit::BuildInfo {
        write_output(&cli, &provenance.to_json());
        return;
    }

    // ── Run stages ──
    let config = FusionConfig {
        event_base: cli.event_base,
        verify: !cli.no_verify,
        verbose: cli.verbose,
    };
    let mut state = FusionState::new(graph);
    state.provenance = Some(provenance);
    let verbose = cli.verbose;
    let result = pipeline::run_pipeline(&mut state, cli.emit.terminal(), &config, |_, diags| {
        for d in diags {
            print_diag(d, verbose);
        }
    });
    if let Err(e) = result {
        eprintln!(
            "skfuse: {} stage failed",
            skfuse::pass::descriptor(e.failing_stage).name
        );
        std::process::exit(1);
    }

    let rendered = match cli.emit {
        Emit::Graph => state.graph.to_string(),
        Emit::Json => match serde_json::to_string_pretty(&state.graph) {
            Ok(s) => s + "\n",
            Err(e) => {
                eprintln!("skfuse: error: cannot serialize graph: {}", e);
                std::process::exit(1);
            }
        },
        Emit::Dot => skfuse::dot::emit_dot(&state.graph),
        Emit::Scopes => pipeline::render_scopes(&state),
        Emit::Summary => pipeline::render_summary(&state),
        Emit::BuildInfo => String::new(),
    };
    write_output(&cli, &rendered);
}

fn write_output(cli: &Cli, text: &str) {
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("skfuse: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}
