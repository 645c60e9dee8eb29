use std::{fs::File, io::Write, path::Path};

use graphviz_rust::{
    cmd::Format,
    dot_generator::{attr, edge, graph, id, node, node_id, stmt},
    dot_structures::*,
    printer::{DotPrinter, PrinterContext},
};
use petgraph::visit::EdgeRef;

use crate::conformance::replay::FiredTransitions;

use super::{
    marking_graph::MarkingGraph,
    petri_net_struct::{PetriNet, PlaceKind, Transition, TransitionKind},
};

const FIRED_FILL: &str = "firebrick1";
const FIRED_ARC: &str = "firebrick";

fn transition_color(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Log => "darkgoldenrod1",
        TransitionKind::Model => "lightskyblue",
        TransitionKind::Sync => "chartreuse",
        TransitionKind::Tau => "grey",
    }
}

fn place_color(kind: PlaceKind) -> &'static str {
    match kind {
        PlaceKind::Log => transition_color(TransitionKind::Log),
        PlaceKind::Model => transition_color(TransitionKind::Model),
    }
}

/// Backslashes and quote characters would end the escaped DOT string early
fn label_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_fired(fired: Option<&FiredTransitions>, t: &Transition) -> bool {
    fired.is_some_and(|f| f.contains_key(&t.id))
}

fn cluster(name: &str, stmts: Vec<Stmt>) -> Stmt {
    let mut all = vec![stmt!(attr!("style", "invis"))];
    all.extend(stmts);
    Stmt::Subgraph(Subgraph {
        id: id!(name),
        stmts: all,
    })
}

///
/// Build the DOT graph of a [`PetriNet`] (usually a synchronous product)
///
/// Log places and LOG transitions are grouped above the model, SYNC transitions sit between both.
/// Nodes are coloured by kind; transitions in `fired` (and their arcs) are highlighted.
///
pub fn petri_net_to_graph(net: &PetriNet, fired: Option<&FiredTransitions>) -> Graph {
    let place_node = |p: &super::petri_net_struct::Place| {
        let shape = if p.final_marking.unwrap_or_default() > 0 {
            "doublecircle"
        } else {
            "circle"
        };
        let label = if p.initial_marking > 0 {
            format!("{}\n{}", p.id, "●".repeat(p.initial_marking.min(3) as usize))
        } else {
            p.id.clone()
        };
        stmt!(node!(esc p.id; attr!("label", esc label_text(&label)), attr!("shape", shape), attr!("style", esc "filled,solid"), attr!("fillcolor", (place_color(p.kind))), attr!("fontname", esc "Courier-Bold")))
    };
    let transition_node = |t: &Transition| {
        let fill = if is_fired(fired, t) {
            FIRED_FILL
        } else {
            transition_color(t.kind)
        };
        stmt!(node!(esc t.id; attr!("label", esc label_text(&t.original_name)), attr!("shape", "box"), attr!("style", esc "filled,solid"), attr!("fillcolor", fill), attr!("fontname", esc "Courier-Bold")))
    };

    let log_nodes: Vec<Stmt> = net
        .places
        .iter()
        .filter(|p| p.kind == PlaceKind::Log)
        .map(place_node)
        .chain(
            net.transitions
                .iter()
                .filter(|t| t.kind == TransitionKind::Log)
                .map(transition_node),
        )
        .collect();
    let model_nodes: Vec<Stmt> = net
        .places
        .iter()
        .filter(|p| p.kind == PlaceKind::Model)
        .map(place_node)
        .chain(
            net.transitions
                .iter()
                .filter(|t| matches!(t.kind, TransitionKind::Model | TransitionKind::Tau))
                .map(transition_node),
        )
        .collect();
    let sync_nodes: Vec<Stmt> = net
        .transitions
        .iter()
        .filter(|t| t.kind == TransitionKind::Sync)
        .map(transition_node)
        .collect();

    let arcs: Vec<Stmt> = net
        .arcs
        .iter()
        .map(|arc| {
            let transition = net
                .transitions
                .iter()
                .find(|t| t.id == arc.source || t.id == arc.target);
            let color = match transition {
                Some(t) if is_fired(fired, t) => FIRED_ARC,
                Some(t) => transition_color(t.kind),
                None => "black",
            };
            stmt!(edge!(node_id!(esc arc.source) => node_id!(esc arc.target); attr!("penwidth", 2), attr!("color", color)))
        })
        .collect();

    let mut stmts = vec![stmt!(attr!("rankdir", "LR"))];
    if !log_nodes.is_empty() {
        stmts.push(cluster("cluster_log", log_nodes));
    }
    stmts.push(cluster("cluster_model", model_nodes));
    stmts.extend(sync_nodes);
    stmts.extend(arcs);

    let name = if net.id.is_empty() { "net" } else { &net.id };
    graph!(strict di id!(esc label_text(name)), stmts)
}

/// Render a [`PetriNet`] as DOT text (see [`petri_net_to_graph`])
pub fn petri_net_to_dot(net: &PetriNet, fired: Option<&FiredTransitions>) -> String {
    petri_net_to_graph(net, fired).print(&mut PrinterContext::default())
}

///
/// Build the DOT graph of a [`MarkingGraph`]
///
/// States are labeled with their marked places, edges with the transition name.
pub fn marking_graph_to_graph(mg: &MarkingGraph) -> Graph {
    let nodes = mg.graph.node_weights().map(|state| {
        let shape = if state.id == 0 { "doublecircle" } else { "ellipse" };
        stmt!(node!(esc format!("m{}", state.id); attr!("label", esc label_text(&state.to_string())), attr!("shape", shape)))
    });
    let edges = mg.graph.edge_references().map(|e| {
        let from = mg.graph[e.source()].id;
        let to = mg.graph[e.target()].id;
        let weight = e.weight();
        stmt!(edge!(node_id!(esc format!("m{from}")) => node_id!(esc format!("m{to}")); attr!("label", esc label_text(&weight.label)), attr!("color", (transition_color(weight.kind)))))
    });
    let stmts = std::iter::once(stmt!(attr!("rankdir", "LR")))
        .chain(nodes)
        .chain(edges)
        .collect();
    graph!(di id!("marking_graph"), stmts)
}

/// Render a [`MarkingGraph`] as DOT text
pub fn marking_graph_to_dot(mg: &MarkingGraph) -> String {
    marking_graph_to_graph(mg).print(&mut PrinterContext::default())
}

///
/// Export the image of a [`PetriNet`]
///
/// Also see [`export_petri_net_image_svg`] and [`export_petri_net_image_png`]
///
pub fn export_petri_net_image<P: AsRef<Path>>(
    net: &PetriNet,
    fired: Option<&FiredTransitions>,
    path: P,
    format: Format,
    dpi_factor: Option<f32>,
) -> Result<(), std::io::Error> {
    let mut g = petri_net_to_graph(net, fired);
    if let Some(dpi_fac) = dpi_factor {
        if let Graph::DiGraph { stmts, .. } = &mut g {
            stmts.insert(0, stmt!(attr!("dpi", (dpi_fac * 96.0))));
        }
    }
    let out = graphviz_rust::exec(g, &mut PrinterContext::default(), vec![format.into()])?;

    let mut f = File::create(path)?;
    f.write_all(&out)?;
    Ok(())
}

///
/// Export the image of a [`PetriNet`] as a SVG file
///
pub fn export_petri_net_image_svg<P: AsRef<Path>>(
    net: &PetriNet,
    fired: Option<&FiredTransitions>,
    path: P,
) -> Result<(), std::io::Error> {
    export_petri_net_image(net, fired, path, Format::Svg, None)
}

///
/// Export the image of a [`PetriNet`] as a PNG file
///
pub fn export_petri_net_image_png<P: AsRef<Path>>(
    net: &PetriNet,
    fired: Option<&FiredTransitions>,
    path: P,
) -> Result<(), std::io::Error> {
    export_petri_net_image(net, fired, path, Format::Png, Some(2.0))
}
