//! Resolution diagnostics
//!
//! On failure the resolver hands back human-readable [`ConflictReport`]s and
//! a [`DotGraph`] of every candidate it considered, renderable with Graphviz.
//! Rejected candidates are drawn red; dependency edges whose specifier could
//! not be satisfied are dashed.

use std::collections::BTreeMap;
use std::fmt;

/// One dead end encountered during the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// The package the failure is attributed to.
    pub package: String,
    pub message: String,
}

impl ConflictReport {
    pub fn new(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Node {
    rejected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    from: String,
    to: String,
    label: String,
    failed: bool,
}

/// Dependency graph of the candidates a resolution considered, in Graphviz
/// Dot notation. Node identifiers are `name@version` (or a bare name when no
/// candidate was ever available).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DotGraph {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
}

impl DotGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate (or bare package name) as considered.
    pub fn add_node(&mut self, id: impl Into<String>) {
        self.nodes.entry(id.into()).or_default();
    }

    /// Mark a candidate as rejected by constraints.
    pub fn reject_node(&mut self, id: impl Into<String>) {
        self.nodes.entry(id.into()).or_default().rejected = true;
    }

    /// Record a dependency edge. `failed` marks a specifier that could not
    /// be satisfied.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        failed: bool,
    ) {
        let from = from.into();
        let to = to.into();
        self.add_node(from.clone());
        self.add_node(to.clone());
        let edge = Edge {
            from,
            to,
            label: label.into(),
            failed,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render in Dot notation.
    pub fn render(&self) -> String {
        let mut out = String::from("digraph image {\n  rankdir=LR;\n  node [shape=box];\n");

        for (id, node) in &self.nodes {
            if node.rejected {
                out.push_str(&format!(
                    "  \"{}\" [color=red, fontcolor=red];\n",
                    escape(id)
                ));
            } else {
                out.push_str(&format!("  \"{}\";\n", escape(id)));
            }
        }

        for edge in &self.edges {
            let attrs = if edge.failed {
                format!("label=\"{}\", style=dashed, color=red", escape(&edge.label))
            } else {
                format!("label=\"{}\"", escape(&edge.label))
            };
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [{}];\n",
                escape(&edge.from),
                escape(&edge.to),
                attrs
            ));
        }

        out.push_str("}\n");
        out
    }
}

impl fmt::Display for DotGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
