//! Hierarchical diagnosis-code taxonomy.
//!
//! Built once per process from a parent/child edge list and then read-only.
//! Ancestor sets, descendant counts and information content are precomputed
//! at construction so comparisons never walk the graph.

use std::collections::HashMap;

use anyhow::{Result, bail};

mod ic;
mod loader;
mod reconcile;

pub use ic::{IcMetric, SemanticMeasure, code_similarity, most_informative_common_ancestor};
pub use loader::{load_taxonomy, parse_edge_tsv};
pub use reconcile::{CodeMap, ReconcileReport, load_code_map, parse_code_map, reconcile_diagnoses};

#[derive(Debug, Clone)]
pub struct Taxonomy {
    codes: Vec<String>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    ancestors: Vec<Vec<usize>>,
    descendant_counts: Vec<usize>,
    leaf_counts: Vec<usize>,
    n_leaves: usize,
    ic_sanchez: Vec<f64>,
    ic_seco: Vec<f64>,
    max_ic_sanchez: f64,
    max_ic_seco: f64,
}

impl Taxonomy {
    pub fn from_edges<S: AsRef<str>>(edges: &[(S, S)]) -> Result<Self> {
        let mut codes: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut parents: Vec<Vec<usize>> = Vec::new();
        let mut children: Vec<Vec<usize>> = Vec::new();

        for (parent, child) in edges {
            let (parent, child) = (parent.as_ref().trim(), child.as_ref().trim());
            if parent.is_empty() || child.is_empty() {
                bail!("taxonomy edge with empty code");
            }
            if parent == child {
                bail!("taxonomy self-loop on '{}'", parent);
            }
            let p = intern(parent, &mut index, &mut codes, &mut parents, &mut children);
            let c = intern(child, &mut index, &mut codes, &mut parents, &mut children);
            if !children[p].contains(&c) {
                children[p].push(c);
                parents[c].push(p);
            }
        }

        let order = topological_order(&parents, &children)?;
        let n = codes.len();

        let mut ancestors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &node in &order {
            let mut set = vec![node];
            for &p in &parents[node] {
                set.extend_from_slice(&ancestors[p]);
            }
            set.sort_unstable();
            set.dedup();
            ancestors[node] = set;
        }

        let mut descendant_counts = vec![0usize; n];
        let mut leaf_counts = vec![0usize; n];
        let mut n_leaves = 0usize;
        for node in 0..n {
            let is_leaf = children[node].is_empty();
            if is_leaf {
                n_leaves += 1;
            }
            for &a in &ancestors[node] {
                descendant_counts[a] += 1;
                if is_leaf {
                    leaf_counts[a] += 1;
                }
            }
        }

        let ic_sanchez: Vec<f64> = (0..n)
            .map(|node| {
                let ratio = leaf_counts[node] as f64 / ancestors[node].len() as f64;
                let ic = -((ratio + 1.0) / (n_leaves as f64 + 1.0)).ln();
                ic.max(0.0)
            })
            .collect();
        let ic_seco: Vec<f64> = (0..n)
            .map(|node| {
                let ic = -(descendant_counts[node] as f64 / n as f64).ln();
                ic.max(0.0)
            })
            .collect();

        let max_ic_sanchez = ic_sanchez.iter().copied().fold(0.0, f64::max);
        let max_ic_seco = ic_seco.iter().copied().fold(0.0, f64::max);

        Ok(Self {
            codes,
            index,
            parents,
            children,
            ancestors,
            descendant_counts,
            leaf_counts,
            n_leaves,
            ic_sanchez,
            ic_seco,
            max_ic_sanchez,
            max_ic_seco,
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    pub fn code(&self, node: usize) -> &str {
        &self.codes[node]
    }

    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Sorted ancestor indices, including `node` itself.
    pub fn ancestors(&self, node: usize) -> &[usize] {
        &self.ancestors[node]
    }

    /// Number of descendants, including `node` itself.
    pub fn descendant_count(&self, node: usize) -> usize {
        self.descendant_counts[node]
    }

    /// Number of leaves reachable from `node` (itself when it is a leaf).
    pub fn leaf_count(&self, node: usize) -> usize {
        self.leaf_counts[node]
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.children[node].is_empty()
    }

    pub fn ic(&self, node: usize, metric: IcMetric) -> f64 {
        match metric {
            IcMetric::Sanchez => self.ic_sanchez[node],
            IcMetric::Seco => self.ic_seco[node],
        }
    }

    pub fn max_ic(&self, metric: IcMetric) -> f64 {
        match metric {
            IcMetric::Sanchez => self.max_ic_sanchez,
            IcMetric::Seco => self.max_ic_seco,
        }
    }
}

fn intern(
    code: &str,
    index: &mut HashMap<String, usize>,
    codes: &mut Vec<String>,
    parents: &mut Vec<Vec<usize>>,
    children: &mut Vec<Vec<usize>>,
) -> usize {
    if let Some(&idx) = index.get(code) {
        return idx;
    }
    let idx = codes.len();
    codes.push(code.to_string());
    parents.push(Vec::new());
    children.push(Vec::new());
    index.insert(code.to_string(), idx);
    idx
}

fn topological_order(parents: &[Vec<usize>], children: &[Vec<usize>]) -> Result<Vec<usize>> {
    let n = parents.len();
    let mut indegree: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut queue: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = queue.pop() {
        order.push(node);
        for &c in &children[node] {
            indegree[c] -= 1;
            if indegree[c] == 0 {
                queue.push(c);
            }
        }
    }
    if order.len() != n {
        bail!("taxonomy contains a cycle ({} nodes unreachable from roots)", n - order.len());
    }
    Ok(order)
}
