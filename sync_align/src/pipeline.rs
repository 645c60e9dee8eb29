use std::{
    io::Write,
    path::{Path, PathBuf},
};

use rayon::prelude::*;

use crate::{
    config::AlignConfig,
    conformance::{
        replay::{replay_with_mode, ReplayOutcome},
        replay_trace::ReplayTrace,
        sync_product::{build_sync_product, SyncProduct},
    },
    error::AlignError,
    event_log::import_log::import_log_file,
    petri_net::{
        import_pnml::import_pnml_from_path,
        petri_net_struct::{NetStatistics, PetriNet},
    },
    petri_net::export_pnml::export_petri_net_to_pnml,
    utils::output_file::{persist_all, stage_file, StagedFile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Files written for one trace
pub struct TraceFiles {
    /// Product net (`syncmodel-{i}.pnml`)
    pub product: PathBuf,
    /// Reachability constraint (`invariant-{i}.txt`)
    pub invariant: PathBuf,
    /// DOT rendering (`syncmodel-{i}.dot`), if requested
    pub dot: Option<PathBuf>,
    /// Size of the product net
    pub statistics: NetStatistics,
}

#[derive(Debug)]
/// Result for one trace of a log
pub struct TraceOutcome {
    /// Position of the trace in the log
    pub index: usize,
    /// Written files, or why the trace failed
    pub result: crate::Result<TraceFiles>,
}

fn stage_text(path: &Path, text: &str) -> crate::Result<StagedFile> {
    stage_file(path, |w| {
        write!(w, "{text}")?;
        Ok(())
    })
}

/// Writes nothing unless every file of the trace could be written
fn write_product(
    product: &SyncProduct,
    index: usize,
    out_dir: &Path,
    config: &AlignConfig,
) -> crate::Result<TraceFiles> {
    let product_path = out_dir.join(format!("syncmodel-{index}.pnml"));
    let invariant_path = out_dir.join(format!("invariant-{index}.txt"));
    let mut staged = vec![
        stage_file(&product_path, |w| {
            export_petri_net_to_pnml(&product.net, w)?;
            Ok(())
        })?,
        stage_text(&invariant_path, &product.constraint.render(&config.constraint))?,
    ];
    let dot = if config.write_dot {
        let dot_path = out_dir.join(format!("syncmodel-{index}.dot"));
        stage_dot(product, &dot_path)?.map(|file| {
            staged.push(file);
            dot_path
        })
    } else {
        None
    };
    persist_all(staged)?;
    Ok(TraceFiles {
        product: product_path,
        invariant: invariant_path,
        dot,
        statistics: product.net.statistics(),
    })
}

#[cfg(feature = "graphviz-export")]
fn stage_dot(product: &SyncProduct, path: &Path) -> crate::Result<Option<StagedFile>> {
    let dot = crate::petri_net::image_export::petri_net_to_dot(&product.net, None);
    stage_text(path, &dot).map(Some)
}

#[cfg(not(feature = "graphviz-export"))]
fn stage_dot(_product: &SyncProduct, path: &Path) -> crate::Result<Option<StagedFile>> {
    tracing::warn!(
        "Not writing {}: DOT export requires the `graphviz-export` feature",
        path.display()
    );
    Ok(None)
}

///
/// Load a model net, mark its silent transitions and check that it has a final marking
///
pub fn load_model<P: AsRef<Path>>(path: P, config: &AlignConfig) -> crate::Result<PetriNet> {
    let mut model = PetriNet::load_from_path(path)?;
    model.classify(&config.classify_options());
    Ok(model)
}

///
/// Build the synchronous product of `model` with every trace of `traces` and write the results to `out_dir`
///
/// Trace `i` produces `syncmodel-{i}.pnml` and `invariant-{i}.txt` (and `syncmodel-{i}.dot` if
/// [`AlignConfig::write_dot`] is set). A failing trace does not affect the others.
///
pub fn write_products<S: AsRef<str> + Sync>(
    model: &PetriNet,
    traces: &[Vec<S>],
    out_dir: &Path,
    config: &AlignConfig,
) -> Vec<TraceOutcome> {
    let process = |(index, trace): (usize, &Vec<S>)| {
        let product = build_sync_product(model, trace);
        let result = write_product(&product, index, out_dir, config);
        match &result {
            Ok(files) => tracing::info!(
                "Wrote {} ({} places, {} transitions, {} arcs)",
                files.product.display(),
                files.statistics.places,
                files.statistics.transitions,
                files.statistics.arcs
            ),
            Err(e) => tracing::warn!("Trace {index} failed: {e}"),
        }
        TraceOutcome { index, result }
    };
    if config.parallel {
        traces.par_iter().enumerate().map(process).collect()
    } else {
        traces.iter().enumerate().map(process).collect()
    }
}

///
/// Build and write the synchronous products for all traces of a log file
///
/// Fails before writing anything if `out_dir` does not exist or the model or log cannot be read.
///
pub fn build_products<P, Q, R>(
    model_path: P,
    log_path: Q,
    out_dir: R,
    config: &AlignConfig,
) -> crate::Result<Vec<TraceOutcome>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let out_dir = out_dir.as_ref();
    if !out_dir.is_dir() {
        return Err(AlignError::Usage(format!(
            "directory doesn't exist '{}'",
            out_dir.display()
        )));
    }
    let model = load_model(model_path, config)?;
    let traces = import_log_file(log_path)?;
    Ok(write_products(&model, &traces, out_dir, config))
}

///
/// Replay a marking-trace file against a product net file
///
/// Returns the product net (e.g. for rendering the fired transitions) and the replay result.
///
pub fn replay_files<P, Q>(
    product_path: P,
    trace_path: Q,
    config: &AlignConfig,
) -> crate::Result<(PetriNet, ReplayOutcome)>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let product = import_pnml_from_path(product_path)?;
    let trace = ReplayTrace::from_path(trace_path)?;
    let outcome = replay_with_mode(&product, &trace, config.replay_mode)?;
    Ok((product, outcome))
}

/// Size of the net in a PNML file
pub fn inspect<P: AsRef<Path>>(model_path: P) -> crate::Result<NetStatistics> {
    Ok(import_pnml_from_path(model_path)?.statistics())
}

#[cfg(feature = "graphviz-export")]
///
/// Explore the marking graph of a PNML net and write it as DOT
///
/// Returns the number of states and whether the exploration finished within [`AlignConfig::marking_graph_limit`].
pub fn write_marking_graph<P, Q>(
    model_path: P,
    out_path: Q,
    config: &AlignConfig,
) -> crate::Result<(usize, bool)>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    use crate::petri_net::{
        image_export::marking_graph_to_dot, marking_graph::build_marking_graph,
        petri_net_struct::PlaceKind,
    };
    use crate::utils::output_file::write_file_atomically;

    let mut net = import_pnml_from_path(model_path)?;
    if !net.places.iter().any(|p| p.kind == PlaceKind::Log) {
        net.classify(&config.classify_options());
    }
    let mg = build_marking_graph(&net, config.marking_graph_limit);
    let dot = marking_graph_to_dot(&mg);
    write_file_atomically(out_path, |w| {
        write!(w, "{dot}")?;
        Ok(())
    })?;
    Ok((mg.graph.node_count(), mg.complete))
}
