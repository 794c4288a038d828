// pipeline.rs — Fusion state and stage orchestration
//
// Holds all stage artifacts next to the graph being rewritten and runs the
// minimal set of stages for a given terminal StageId.
//
// Preconditions: the graph must be loaded before calling run_pipeline.
// Postconditions: all artifacts for required stages are populated, or has_error is set.
// Failure modes: any stage returning a `FusionError` or failing its certificate.
// Side effects: rewrites `state.graph`; calls on_stage_complete after each stage
//               for immediate display.

use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::collect::ScopeContext;
use crate::diag::{codes, has_errors, Diagnostic};
use crate::eligibility::EligibilityReport;
use crate::error::FusionError;
use crate::fuse::{super_node_name, FusionOutcome};
use crate::graph::Graph;
use crate::id::FRESH_EVENT_BASE;
use crate::pass::{descriptor, required_stages, StageCert, StageId};
use crate::split::SplitRecord;

// ── Configuration ──────────────────────────────────────────────────────────

/// Knobs of one pipeline run.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Lowest id handed out for freshly minted synchronization pairs.
    pub event_base: u32,
    /// Check stage certificates after each rewriting stage.
    pub verify: bool,
    /// Print per-stage timing to stderr.
    pub verbose: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            event_base: FRESH_EVENT_BASE,
            verify: true,
            verbose: false,
        }
    }
}

// ── Artifact storage ───────────────────────────────────────────────────────

/// Provenance metadata for reproducible runs and cache-key use.
///
/// `source_hash`: SHA-256 of the raw input text.
/// `graph_fingerprint`: SHA-256 of the compact JSON of the loaded graph.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub graph_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the graph fingerprint (64 characters).
    pub fn graph_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.graph_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"graph_fingerprint\": \"{}\",\n  \"compiler_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.graph_fingerprint_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from the input text and the graph loaded from it.
pub fn compute_provenance(source: &str, graph: &Graph) -> Provenance {
    let canonical = serde_json::to_string(graph).unwrap_or_default();
    Provenance {
        source_hash: sha256(source.as_bytes()),
        graph_fingerprint: sha256(canonical.as_bytes()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Holds the graph, all stage artifacts and accumulated diagnostics.
pub struct FusionState {
    pub graph: Graph,
    pub context: Option<ScopeContext>,
    pub report: Option<EligibilityReport>,
    pub splits: Option<Vec<SplitRecord>>,
    pub outcomes: Option<Vec<FusionOutcome>>,
    /// Number of topological ids assigned by the refresher.
    pub topo_count: Option<usize>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl FusionState {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            context: None,
            report: None,
            splits: None,
            outcomes: None,
            topo_count: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

// ── Graph loading ──────────────────────────────────────────────────────────

/// Load a graph from `text`, choosing the format from `path`'s extension:
/// `.json` is the serde interchange form, anything else the description
/// language. The graph is named after the file stem.
pub fn load_graph(path: &Path, text: &str) -> Result<Graph, Vec<Diagnostic>> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");
    let graph = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str::<Graph>(text).map_err(|e| {
            vec![Diagnostic::error(
                codes::E0300,
                format!("invalid JSON graph: {}", e),
            )]
        })?
    } else {
        crate::build::load_source(name, text)?
    };
    graph
        .validate()
        .map_err(|e| vec![Diagnostic::from(&e)])?;
    Ok(graph)
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed in a stage.
/// The specific diagnostics are available in `FusionState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The stage that produced the error.
    pub failing_stage: StageId,
}

// ── Stage bookkeeping ──────────────────────────────────────────────────────

/// Per-stage post-processing: callback, accumulate, verbose, error check.
fn finish_stage(
    state: &mut FusionState,
    stage: StageId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    verbose: bool,
    on_stage_complete: &mut impl FnMut(StageId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_stage_complete(stage, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "skfuse: {} complete, {:.1}ms",
            descriptor(stage).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_stage: stage,
        });
    }
    Ok(())
}

/// Split a stage result into its artifact and diagnostics; a fatal error
/// becomes a single error diagnostic.
fn settle<T>(
    result: Result<T, FusionError>,
    diags_of: impl FnOnce(&mut T) -> Vec<Diagnostic>,
) -> (Option<T>, Vec<Diagnostic>) {
    match result {
        Ok(mut value) => {
            let diags = diags_of(&mut value);
            (Some(value), diags)
        }
        Err(e) => (None, vec![Diagnostic::from(&e)]),
    }
}

/// Append a certificate failure diagnostic when `cert` has failed obligations.
fn check_cert(stage: StageId, cert: &impl StageCert, diags: &mut Vec<Diagnostic>) {
    if cert.all_pass() {
        return;
    }
    diags.push(Diagnostic::error(
        codes::E0400,
        format!(
            "{} verification failed: {}",
            descriptor(stage).name,
            cert.failed().join(", ")
        ),
    ));
}

/// Error for a stage whose upstream artifact is absent.
fn missing_artifact(state: &mut FusionState, stage: StageId) -> PipelineError {
    state.has_error = true;
    state.diagnostics.push(Diagnostic::error(
        codes::E0400,
        format!(
            "{} stage ran without its upstream artifacts",
            descriptor(stage).name
        ),
    ));
    PipelineError {
        failing_stage: stage,
    }
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of stages to produce `terminal`.
///
/// Per-stage sequence: execute → certificate → on_stage_complete(callback) →
/// verbose → error check.
///
/// Preconditions: `state.graph` is loaded and valid.
/// Postconditions: artifacts for all stages in `required_stages(terminal)` are
///   populated, or `state.has_error` is true.
/// Failure modes: a fatal `FusionError` in any stage; a failed certificate.
/// Side effects: rewrites `state.graph`; calls `on_stage_complete` after each stage.
pub fn run_pipeline(
    state: &mut FusionState,
    terminal: StageId,
    config: &FusionConfig,
    mut on_stage_complete: impl FnMut(StageId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let verbose = config.verbose;
    for stage in required_stages(terminal) {
        let t = Instant::now();
        let diags = match stage {
            StageId::Collect => {
                let (context, diags) =
                    settle(crate::collect::collect_scopes(&mut state.graph), |r| {
                        std::mem::take(&mut r.diagnostics)
                    });
                state.context = context.map(|r| r.context);
                diags
            }
            StageId::Check => {
                let Some(ctx) = state.context.as_ref() else {
                    return Err(missing_artifact(state, stage));
                };
                let (report, diags) =
                    settle(crate::eligibility::check_eligibility(&state.graph, ctx), |r| {
                        std::mem::take(&mut r.diagnostics)
                    });
                state.report = report.map(|r| r.report);
                diags
            }
            StageId::Split => {
                let (Some(ctx), Some(report)) = (state.context.as_mut(), state.report.as_ref())
                else {
                    return Err(missing_artifact(state, stage));
                };
                let (splits, mut diags) = settle(
                    crate::split::split_scopes(&mut state.graph, ctx, report),
                    |r| std::mem::take(&mut r.diagnostics),
                );
                if splits.is_some() && config.verify {
                    let cert = crate::verify::verify_split(&state.graph, ctx);
                    check_cert(stage, &cert, &mut diags);
                }
                state.splits = splits.map(|r| r.splits);
                diags
            }
            StageId::Fuse => {
                let Some(ctx) = state.context.as_ref() else {
                    return Err(missing_artifact(state, stage));
                };
                let (fused, mut diags) = settle(
                    crate::fuse::fuse_scopes(&mut state.graph, ctx, config.event_base),
                    |r| std::mem::take(&mut r.diagnostics),
                );
                let outcomes = fused.map(|r| r.outcomes);
                if let (Some(outcomes), true) = (&outcomes, config.verify) {
                    let cert = crate::verify::verify_fuse(&state.graph, outcomes);
                    check_cert(stage, &cert, &mut diags);
                }
                state.outcomes = outcomes;
                diags
            }
            StageId::Refresh => {
                let count = crate::topo::refresh_topo_ids(&mut state.graph);
                state.topo_count = Some(count);
                let mut diags = Vec::new();
                if config.verify {
                    let cert = crate::verify::verify_refresh(&state.graph);
                    check_cert(stage, &cert, &mut diags);
                }
                diags
            }
        };
        finish_stage(
            state,
            stage,
            diags,
            t.elapsed(),
            verbose,
            &mut on_stage_complete,
        )?;
    }
    Ok(())
}

// ── Reports ────────────────────────────────────────────────────────────────

/// Scope listing after collect/check/split, one scope per line.
pub fn render_scopes(state: &FusionState) -> String {
    let mut out = String::new();
    let Some(ctx) = &state.context else {
        return out;
    };
    for (scope, members) in &ctx.scopes {
        let names: Vec<String> = members.iter().map(|&m| state.graph.name_of(m)).collect();
        let streams: Vec<String> = ctx
            .scope_streams
            .get(scope)
            .map(|s| s.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default();
        let status = match &state.report {
            Some(r) if r.tolerated.contains(scope) => "fusable (tolerated)",
            Some(r) if r.fusable.contains(scope) => "fusable",
            Some(_) => "split",
            None => "unchecked",
        };
        let _ = writeln!(
            out,
            "{}: [{}] streams [{}] {}",
            scope,
            names.join(", "),
            streams.join(", "),
            status
        );
    }
    for stripped in ctx.stripped.iter() {
        let _ = writeln!(
            out,
            "stripped: {} from '{}' (topo {})",
            stripped.name, stripped.scope, stripped.topo_id
        );
    }
    out
}

/// Human-readable account of what the pass did.
pub fn render_summary(state: &FusionState) -> String {
    let mut out = String::new();
    let stripped = state.context.as_ref().map_or(0, |c| c.stripped.len());
    let splits = state.splits.as_deref().unwrap_or(&[]);
    let outcomes = state.outcomes.as_deref().unwrap_or(&[]);
    let _ = writeln!(out, "graph '{}'", state.graph.name);
    let _ = writeln!(out, "  stripped: {}", stripped);
    let _ = writeln!(out, "  splits: {}", splits.len());
    for split in splits {
        let parts: Vec<&str> = split.parts.iter().map(|(n, _)| n.as_str()).collect();
        let _ = writeln!(out, "    {} -> {}", split.scope, parts.join(", "));
    }
    let _ = writeln!(out, "  fused: {}", outcomes.len());
    for o in outcomes {
        let _ = writeln!(
            out,
            "    {} <- '{}': {} member(s), {} in, {} out, stream {}, events -{} +{}",
            super_node_name(&o.scope),
            o.scope,
            o.members,
            o.inputs,
            o.outputs,
            o.stream,
            o.removed_events.len(),
            o.added_events.len()
        );
    }
    if let Some(n) = state.topo_count {
        let _ = writeln!(out, "  topo ids: {}", n);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────
