//! Initial social graph over local node indices.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;

use crate::{CoreError, CoreResult};

/// Undirected graph whose node weights are local indices `0..N-1`.
///
/// Edge `(a, b)` means "a follows b" at bootstrap, in insertion order.
#[derive(Debug, Clone)]
pub struct SocialGraph {
    graph: UnGraph<usize, ()>,
}

impl SocialGraph {
    /// Parses an edge list (`u,v` or `u v` per line, `#` comments).
    ///
    /// Node labels are relabelled `0..N-1` in order of first appearance.
    pub fn from_edge_list(raw: &str) -> CoreResult<Self> {
        let mut graph = UnGraph::new_undirected();
        let mut labels: HashMap<String, NodeIndex> = HashMap::new();

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();
            if fields.len() < 2 {
                return Err(CoreError::graph(format!("line {}: expected two node ids", line_no + 1)));
            }

            let mut node = |label: &str| {
                *labels.entry(label.to_string()).or_insert_with(|| {
                    let index = graph.node_count();
                    graph.add_node(index)
                })
            };
            let a = node(fields[0]);
            let b = node(fields[1]);
            graph.add_edge(a, b, ());
        }
        Ok(Self { graph })
    }

    /// Watts-Strogatz small world: ring lattice of degree `k`, each edge
    /// rewired with probability `p`.
    pub fn small_world<R: Rng + ?Sized>(n: usize, k: usize, p: f64, rng: &mut R) -> Self {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();

        let half_k = k / 2;
        for i in 0..n {
            for j in 1..=half_k {
                let neighbor = (i + j) % n;
                if neighbor != i && !graph.contains_edge(nodes[i], nodes[neighbor]) {
                    graph.add_edge(nodes[i], nodes[neighbor], ());
                }
            }
        }

        let edges: Vec<_> = graph.edge_indices().collect();
        for edge in edges {
            if rng.gen::<f64>() >= p {
                continue;
            }
            let Some((source, _)) = graph.edge_endpoints(edge) else {
                continue;
            };
            let source_id = graph[source];
            for _ in 0..n {
                let target = rng.gen_range(0..n);
                if target != source_id && !graph.contains_edge(nodes[source_id], nodes[target]) {
                    graph.remove_edge(edge);
                    graph.add_edge(nodes[source_id], nodes[target], ());
                    break;
                }
            }
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges as `(follower, followed)` local indices.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a], self.graph[b]))
            .collect()
    }
}
