// Dense transition matrix built from a span's transition graph
//
// Vertices are indexed in lexicographic order so that the same graph always
// produces the same matrix. Rows without outgoing mass are turned into
// self-loops, which makes every dangling vertex an absorbing sink.

use crate::error::{AttributionError, Result};
use crate::summary::{graph_vertices, TransitionGraph};
use ndarray::Array2;
use std::collections::HashMap;

/// Rounding slack allowed on a row's total outgoing probability
pub const ROW_MASS_TOLERANCE: f64 = 1e-9;

/// Row-stochastic (up to residual mass) matrix over a span's subspans
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    vertices: Vec<String>,
    index: HashMap<String, usize>,
    matrix: Array2<f64>,
    sinks: Vec<bool>,
}

impl TransitionMatrix {
    /// Build the matrix, rejecting negative or non-finite probabilities and
    /// rows whose total mass exceeds 1
    pub fn from_graph(span: &str, graph: &TransitionGraph) -> Result<Self> {
        let vertices: Vec<String> = graph_vertices(graph)
            .into_iter()
            .map(str::to_string)
            .collect();
        let index: HashMap<String, usize> = vertices
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let n = vertices.len();
        let mut matrix = Array2::<f64>::zeros((n, n));
        for (from, edges) in graph {
            let i = index[from.as_str()];
            for (to, &probability) in edges {
                if !probability.is_finite() || probability < 0.0 {
                    return Err(AttributionError::InvalidProbability {
                        span: span.to_string(),
                        from: from.clone(),
                        to: to.clone(),
                        value: probability,
                    });
                }
                matrix[[i, index[to.as_str()]]] += probability;
            }
        }

        for (i, vertex) in vertices.iter().enumerate() {
            let mass = matrix.row(i).sum();
            if mass > 1.0 + ROW_MASS_TOLERANCE {
                return Err(AttributionError::RowMassExceedsOne {
                    span: span.to_string(),
                    vertex: vertex.clone(),
                    mass,
                });
            }
        }

        let mut sinks = vec![false; n];
        for i in 0..n {
            let row = matrix.row(i);
            let outgoing: f64 = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, p)| p)
                .sum();
            let self_loop = row[i];

            // dangling vertices and full self-loops absorb
            if outgoing == 0.0 && (self_loop == 0.0 || self_loop >= 1.0) {
                matrix[[i, i]] = 1.0;
                sinks[i] = true;
            }
        }

        Ok(Self {
            vertices,
            index,
            matrix,
            sinks,
        })
    }

    /// Vertex names in matrix order
    pub fn vertices(&self) -> &[String] {
        &self.vertices
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn is_sink(&self, i: usize) -> bool {
        self.sinks[i]
    }

    /// Indices of absorbing vertices, ascending
    pub fn sink_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.sinks[i]).collect()
    }

    /// Non-sink vertices from which some sink is reachable along positive edges
    pub fn transient_reaching_sink(&self) -> Vec<usize> {
        let n = self.len();
        let mut reaches = self.sinks.clone();
        let mut stack = self.sink_indices();

        // reverse search from the sinks
        while let Some(j) = stack.pop() {
            for i in 0..n {
                if !reaches[i] && self.matrix[[i, j]] > 0.0 {
                    reaches[i] = true;
                    stack.push(i);
                }
            }
        }

        (0..n).filter(|&i| reaches[i] && !self.sinks[i]).collect()
    }
}
