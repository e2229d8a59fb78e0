use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

/// An input dependency graph: node name → out-neighbor names.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<String, Vec<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn add_node(&mut self, name: &str, outs: Vec<String>) {
        self.nodes.insert(name.to_string(), outs);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("missing node {missing:?} for {from:?}")]
    MissingNode { from: String, missing: String },
    #[error("graph has circle: {0}")]
    Circle(String),
}

/// A node placed on the visualized map.
#[derive(Debug, Clone)]
pub struct MapNode {
    pub name: String,
    /// position within the layer, assigned after sorting
    pub x: usize,
    pub layer: usize,
    ins: IndexSet<String>,
    outs: IndexSet<String>,
    all_ins: IndexSet<String>,
    all_outs: IndexSet<String>,
    crit_ins: IndexSet<String>,
    crit_outs: IndexSet<String>,
}

impl MapNode {
    fn new(name: &str) -> Self {
        MapNode {
            name: name.to_string(),
            x: 0,
            layer: 0,
            ins: IndexSet::new(),
            outs: IndexSet::new(),
            all_ins: IndexSet::new(),
            all_outs: IndexSet::new(),
            crit_ins: IndexSet::new(),
            crit_outs: IndexSet::new(),
        }
    }

    fn sorted(set: &IndexSet<String>) -> Vec<String> {
        set.iter().cloned().sorted_unstable().collect()
    }

    pub fn ins(&self) -> Vec<String> {
        Self::sorted(&self.ins)
    }

    pub fn outs(&self) -> Vec<String> {
        Self::sorted(&self.outs)
    }

    pub fn all_ins(&self) -> Vec<String> {
        Self::sorted(&self.all_ins)
    }

    pub fn all_outs(&self) -> Vec<String> {
        Self::sorted(&self.all_outs)
    }

    pub fn crit_ins(&self) -> Vec<String> {
        Self::sorted(&self.crit_ins)
    }

    pub fn crit_outs(&self) -> Vec<String> {
        Self::sorted(&self.crit_outs)
    }
}

/// A visualized DAG: every node placed on a (layer, position) grid, with
/// direct, transitive and critical edges computed.
#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub nlayer: usize,
    pub nedge: usize,
    pub ncrit: usize,
    pub is_top_down: bool,
    nodes: IndexMap<String, MapNode>,
}

/// Checks that the graph is well-formed and free of cycles.
pub fn is_dag(g: &Graph) -> Result<bool, MapError> {
    let mut m = init_map(g)?;
    Ok(make_layers(&mut m).is_ok())
}

fn init_map(g: &Graph) -> Result<Map, MapError> {
    let mut nodes: IndexMap<String, MapNode> = g
        .nodes
        .keys()
        .map(|name| (name.clone(), MapNode::new(name)))
        .collect();

    let mut nedge = 0;
    for (in_name, outs) in &g.nodes {
        for out in outs {
            if !nodes.contains_key(out) {
                return Err(MapError::MissingNode {
                    from: in_name.clone(),
                    missing: out.clone(),
                });
            }
            nodes[out].ins.insert(in_name.clone());
            nodes[in_name].outs.insert(out.clone());
            nedge += 1;
        }
    }

    Ok(Map {
        height: 0,
        width: 0,
        nlayer: 0,
        nedge,
        ncrit: 0,
        is_top_down: true,
        nodes,
    })
}

fn make_layers(m: &mut Map) -> Result<Vec<Vec<String>>, MapError> {
    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut nhit: IndexMap<String, usize> =
        m.nodes.keys().map(|name| (name.clone(), 0)).collect();

    let mut cur: Vec<String> = m
        .nodes
        .values()
        .filter(|node| node.ins.is_empty())
        .map(|node| node.name.clone())
        .collect();

    let mut placed = 0;
    while !cur.is_empty() {
        for name in &cur {
            m.nodes[name].layer = layers.len();
        }
        placed += cur.len();

        let mut next = Vec::new();
        for name in &cur {
            let outs: Vec<String> =
                m.nodes[name].outs.iter().cloned().collect();
            for out in outs {
                let hits = &mut nhit[&out];
                *hits += 1;
                if *hits == m.nodes[&out].ins.len() {
                    next.push(out);
                }
            }
        }
        layers.push(std::mem::replace(&mut cur, next));
    }

    if placed != m.nodes.len() {
        let stuck: Vec<String> = m
            .nodes
            .values()
            .filter(|node| nhit[&node.name] < node.ins.len())
            .map(|node| node.name.clone())
            .sorted_unstable()
            .collect();
        let adj: IndexMap<String, Vec<String>> = m
            .nodes
            .values()
            .map(|node| {
                (node.name.clone(), node.outs.iter().cloned().collect())
            })
            .collect();
        let circle = super::shortest_circle(&adj, &stuck);
        assert!(!circle.is_empty(), "unplaced nodes but no circle");
        return Err(MapError::Circle(circle.join("->")));
    }

    m.nlayer = layers.len();
    Ok(layers)
}

fn build_alls(m: &mut Map, layers: &[Vec<String>]) {
    for layer in layers {
        for name in layer {
            let node_all_ins: Vec<String> =
                m.nodes[name].all_ins.iter().cloned().collect();
            let outs: Vec<String> =
                m.nodes[name].outs.iter().cloned().collect();

            for out in &outs {
                for in_name in &node_all_ins {
                    m.nodes[out].all_ins.insert(in_name.clone());
                    m.nodes[in_name].all_outs.insert(out.clone());
                }
                m.nodes[out].all_ins.insert(name.clone());
                m.nodes[name].all_outs.insert(out.clone());
            }
        }
    }
}

fn is_crit(m: &Map, from: &str, to: &str) -> bool {
    for via in &m.nodes[from].all_outs {
        if via == to {
            continue;
        }
        if m.nodes[via].all_outs.contains(to) {
            return false;
        }
    }
    true
}

fn build_crits(m: &mut Map) {
    let names: Vec<String> = m.nodes.keys().cloned().collect();
    let mut ncrit = 0;

    for name in &names {
        let outs: Vec<String> =
            m.nodes[name].outs.iter().cloned().collect();
        for out in outs {
            if !is_crit(m, name, &out) {
                continue;
            }
            m.nodes[name].crit_outs.insert(out.clone());
            m.nodes[&out].crit_ins.insert(name.clone());
            ncrit += 1;
        }
    }
    m.ncrit = ncrit;
}

fn place(m: &mut Map, layers: &[Vec<String>]) {
    let mut width = 0;
    for layer in layers {
        // busier nodes first, names breaking ties
        let ordered: Vec<String> = layer
            .iter()
            .cloned()
            .sorted_unstable_by_key(|name| {
                (
                    std::cmp::Reverse(m.nodes[name].crit_outs.len()),
                    name.clone(),
                )
            })
            .collect();
        width = width.max(ordered.len());
        for (x, name) in ordered.iter().enumerate() {
            m.nodes[name].x = x;
        }
    }
    m.width = width;
    m.height = m.nlayer;
}

impl Map {
    /// Builds the full map: layers, transitive edges, critical edges and
    /// grid positions.
    pub fn new(g: &Graph) -> Result<Map, MapError> {
        let mut m = init_map(g)?;
        let layers = make_layers(&mut m)?;
        build_alls(&mut m, &layers);
        build_crits(&mut m);
        place(&mut m, &layers);
        Ok(m)
    }

    pub fn node(&self, name: &str) -> Option<&MapNode> {
        self.nodes.get(name)
    }

    /// Nodes ordered by (layer, position).
    pub fn sorted_nodes(&self) -> Vec<&MapNode> {
        self.nodes
            .values()
            .sorted_unstable_by_key(|node| (node.layer, node.x))
            .collect()
    }

    /// Flips the map upside down, swapping every edge direction.
    pub fn reverse(&mut self) {
        let nlayer = self.nlayer;
        let width = self.width;
        for node in self.nodes.values_mut() {
            node.x = width - 1 - node.x;
            node.layer = nlayer - 1 - node.layer;
            std::mem::swap(&mut node.ins, &mut node.outs);
            std::mem::swap(&mut node.all_ins, &mut node.all_outs);
            std::mem::swap(&mut node.crit_ins, &mut node.crit_outs);
        }
        self.is_top_down = !self.is_top_down;
    }

    /// A canonical, serializable snapshot for the visualizer.
    pub fn dump(&self) -> MapDump {
        MapDump {
            height: self.height,
            width: self.width,
            nlayer: self.nlayer,
            nedge: self.nedge,
            ncrit: self.ncrit,
            is_top_down: self.is_top_down,
            nodes: self
                .sorted_nodes()
                .into_iter()
                .map(|node| NodeDump {
                    name: node.name.clone(),
                    x: node.x,
                    layer: node.layer,
                    ins: node.ins(),
                    outs: node.outs(),
                    crit_ins: node.crit_ins(),
                    crit_outs: node.crit_outs(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.dump())
            .expect("map dump serialization cannot fail")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapDump {
    pub height: usize,
    pub width: usize,
    pub nlayer: usize,
    pub nedge: usize,
    pub ncrit: usize,
    pub is_top_down: bool,
    pub nodes: Vec<NodeDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDump {
    pub name: String,
    pub x: usize,
    pub layer: usize,
    pub ins: Vec<String>,
    pub outs: Vec<String>,
    pub crit_ins: Vec<String>,
    pub crit_outs: Vec<String>,
}
