#![forbid(unsafe_code)]

//! Dependency graph resolution and cascade ordering.
//!
//! # Design
//!
//! The resolver inverts the source declarations of a schema's computed
//! properties into two reverse maps:
//!
//! - `by_property`: source name → dependents that re-announce on any scalar
//!   change of the source.
//! - `by_collection`: source name → change kind → dependents that
//!   re-announce on that structural change of the source collection.
//!
//! The maps are built once per schema and are read-only afterwards.
//!
//! # Invariants
//!
//! 1. Every source named by a declaration exists on the schema.
//! 2. The combined edge set is acyclic (checked with Kahn's algorithm).
//! 3. A cascade yields each dependent at most once, in breadth-first order,
//!    and never yields its origin, however many paths reach a dependent.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::error::SchemaError;
use crate::schema::{PropertyDescriptor, PropertyKind};
use crate::value::ChangeKind;

/// Reverse dependency maps of one schema.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    by_property: AHashMap<Arc<str>, Vec<Arc<str>>>,
    by_collection: AHashMap<Arc<str>, AHashMap<ChangeKind, Vec<Arc<str>>>>,
    edges: usize,
}

fn push_unique(list: &mut Vec<Arc<str>>, name: &Arc<str>) -> bool {
    if list.iter().any(|existing| existing == name) {
        return false;
    }
    list.push(Arc::clone(name));
    true
}

impl DependencyGraph {
    /// Resolve the reverse maps for `properties`.
    ///
    /// `index` maps every declared name to its position in `properties`.
    pub(crate) fn resolve(
        schema: &str,
        properties: &[PropertyDescriptor],
        index: &AHashMap<Arc<str>, usize>,
    ) -> Result<Self, SchemaError> {
        let mut graph = Self::default();

        for dependent in properties {
            for decl in dependent.sources() {
                let Some(&source_idx) = index.get(decl.source()) else {
                    return Err(SchemaError::UnknownSource {
                        schema: schema.to_owned(),
                        dependent: dependent.name().to_owned(),
                        source_name: decl.source().to_owned(),
                    });
                };

                match decl.kinds() {
                    None => {
                        let list = graph
                            .by_property
                            .entry(Arc::clone(decl.source_arc()))
                            .or_default();
                        if push_unique(list, dependent.name_arc()) {
                            graph.edges += 1;
                        }
                    }
                    Some(kinds) => {
                        if !matches!(properties[source_idx].kind(), PropertyKind::Collection) {
                            return Err(SchemaError::NotACollection {
                                dependent: dependent.name().to_owned(),
                                source_name: decl.source().to_owned(),
                            });
                        }
                        if kinds.is_empty() {
                            return Err(SchemaError::EmptyChangeKinds {
                                dependent: dependent.name().to_owned(),
                                source_name: decl.source().to_owned(),
                            });
                        }
                        let per_kind = graph
                            .by_collection
                            .entry(Arc::clone(decl.source_arc()))
                            .or_default();
                        for kind in kinds.kinds() {
                            if push_unique(per_kind.entry(kind).or_default(), dependent.name_arc())
                            {
                                graph.edges += 1;
                            }
                        }
                    }
                }
            }
        }

        graph.check_acyclic(schema, properties, index)?;
        Ok(graph)
    }

    /// Kahn's algorithm over every edge, regardless of change kind.
    fn check_acyclic(
        &self,
        schema: &str,
        properties: &[PropertyDescriptor],
        index: &AHashMap<Arc<str>, usize>,
    ) -> Result<(), SchemaError> {
        let count = properties.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];

        let collection_edges = self.by_collection.iter().flat_map(|(source, per_kind)| {
            per_kind
                .values()
                .flatten()
                .map(move |dependent| (source, dependent))
        });
        let property_edges = self
            .by_property
            .iter()
            .flat_map(|(source, dependents)| dependents.iter().map(move |d| (source, d)));

        for (source, dependent) in property_edges.chain(collection_edges) {
            let (Some(&from), Some(&to)) = (index.get(source), index.get(dependent)) else {
                continue;
            };
            if !successors[from].contains(&to) {
                successors[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &successors[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if visited == count {
            return Ok(());
        }
        let members = (0..count)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| properties[i].name().to_owned())
            .collect();
        Err(SchemaError::Cycle {
            schema: schema.to_owned(),
            members,
        })
    }

    /// Direct dependents of scalar changes on `source`.
    #[must_use]
    pub fn dependents(&self, source: &str) -> &[Arc<str>] {
        self.by_property
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Direct dependents of a `kind` change on the collection `source`.
    #[must_use]
    pub fn collection_dependents(&self, source: &str, kind: ChangeKind) -> &[Arc<str>] {
        self.by_collection
            .get(source)
            .and_then(|per_kind| per_kind.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of distinct `(source, kind?) → dependent` edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Every property that must re-announce after `origin` changed, in
    /// notification order. `origin` itself is not included.
    #[must_use]
    pub fn cascade(&self, origin: &str) -> Vec<Arc<str>> {
        let mut visited: AHashSet<&str> = AHashSet::new();
        visited.insert(origin);
        let mut queue = VecDeque::from([origin]);
        let mut out = Vec::new();
        self.walk(&mut visited, &mut queue, &mut out);
        out
    }

    /// Like [`cascade`](Self::cascade), seeded by a structural change of the
    /// collection `source` instead of a scalar write.
    #[must_use]
    pub fn cascade_collection(&self, source: &str, kind: ChangeKind) -> Vec<Arc<str>> {
        let mut visited: AHashSet<&str> = AHashSet::new();
        visited.insert(source);
        let mut queue = VecDeque::new();
        let mut out = Vec::new();
        for dependent in self.collection_dependents(source, kind) {
            if visited.insert(dependent) {
                out.push(Arc::clone(dependent));
                queue.push_back(&**dependent);
            }
        }
        self.walk(&mut visited, &mut queue, &mut out);
        out
    }

    fn walk<'a>(
        &'a self,
        visited: &mut AHashSet<&'a str>,
        queue: &mut VecDeque<&'a str>,
        out: &mut Vec<Arc<str>>,
    ) {
        while let Some(name) = queue.pop_front() {
            for dependent in self.dependents(name) {
                if visited.insert(dependent) {
                    out.push(Arc::clone(dependent));
                    queue.push_back(dependent);
                }
            }
        }
    }
}
