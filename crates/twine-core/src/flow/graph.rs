//! Dependency graph construction and execution planning.
//!
//! Edges come from two sources, unioned: explicit `depends_on` entries and
//! implicit data-flow references found in step input templates. Both are
//! validated against the step map; cycles are rejected before any execution
//! order exists.

use std::collections::{HashMap, HashSet};

use super::error::GraphError;
use super::spec::FlowSpec;
use super::template::extract_step_references;

/// Directed "must run before" graph over a flow's steps.
///
/// Nodes keep the spec's declaration order so planning is deterministic:
/// whenever several steps are runnable, the one declared first runs first.
/// The graph carries no runtime state and is discarded once an order exists.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    successors: HashMap<String, Vec<String>>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the graph for a spec, rejecting unknown references and cycles.
    pub fn build(spec: &FlowSpec) -> Result<Self, GraphError> {
        tracing::debug!(flow = %spec.name, "building dependency graph");

        let nodes: Vec<String> = spec.steps().map(|s| s.name.clone()).collect();
        let mut successors: HashMap<String, Vec<String>> = nodes
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut edge_count = 0;

        let mut add_edge = |from: &str, to: &str| {
            if seen.insert((from.to_string(), to.to_string())) {
                if let Some(out) = successors.get_mut(from) {
                    out.push(to.to_string());
                    edge_count += 1;
                }
            }
        };

        // Explicit dependencies
        for step in spec.steps() {
            for dep in &step.depends_on {
                if !spec.contains_step(dep) {
                    return Err(GraphError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                add_edge(dep, &step.name);
            }
        }

        // Implicit data-flow dependencies from input templates
        for step in spec.steps() {
            for template in step.inputs.values() {
                for reference in extract_step_references(template) {
                    if !spec.contains_step(&reference) {
                        return Err(GraphError::UnknownReference {
                            step: step.name.clone(),
                            reference,
                        });
                    }
                    add_edge(&reference, &step.name);
                }
            }
        }

        let graph = Self {
            nodes,
            successors,
            edge_count,
        };

        // Cycle probe; the planner re-checks defensively when asked again.
        graph.execution_order()?;

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edge_count,
            "dependency graph built"
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Predecessor-count ordering (Kahn's algorithm). Among steps with no
    /// remaining unresolved predecessors, the earliest-declared is emitted
    /// first, so the order is reproducible across runs.
    pub fn execution_order(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for targets in self.successors.values() {
            for to in targets {
                if let Some(degree) = in_degree.get_mut(to.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut emitted: HashSet<&str> = HashSet::new();

        while order.len() < self.nodes.len() {
            let runnable = self.nodes.iter().find(|name| {
                !emitted.contains(name.as_str())
                    && in_degree.get(name.as_str()).copied().unwrap_or(0) == 0
            });

            let Some(name) = runnable else {
                let members: Vec<String> = self
                    .nodes
                    .iter()
                    .filter(|n| !emitted.contains(n.as_str()))
                    .cloned()
                    .collect();
                return Err(GraphError::Cycle { members });
            };

            emitted.insert(name.as_str());
            order.push(name.clone());
            if let Some(targets) = self.successors.get(name.as_str()) {
                for to in targets {
                    if let Some(degree) = in_degree.get_mut(to.as_str()) {
                        *degree -= 1;
                    }
                }
            }
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::spec::FlowSpec;

    fn spec(yaml: &str) -> FlowSpec {
        FlowSpec::from_yaml(yaml).unwrap()
    }

    #[test]
    fn explicit_and_implicit_edges_are_unioned() {
        let spec = spec(
            r#"
name: "union"
steps:
  a:
    prompt: p
  b:
    prompt: p
    depends_on: [a]
    inputs:
      text: "${a.result}"
"#,
        );
        let graph = DependencyGraph::build(&spec).unwrap();
        // The a→b edge exists once even though it is declared both ways.
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.execution_order().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn implicit_reference_orders_steps_without_depends_on() {
        let spec = spec(
            r#"
name: "implicit"
steps:
  consumer:
    prompt: p
    inputs:
      text: "${producer.result}"
  producer:
    prompt: p
"#,
        );
        let order = DependencyGraph::build(&spec)
            .unwrap()
            .execution_order()
            .unwrap();
        assert_eq!(order, vec!["producer", "consumer"]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let spec = spec(
            r#"
name: "bad"
steps:
  a:
    prompt: p
    depends_on: [ghost]
"#,
        );
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(GraphError::UnknownDependency { step, dependency })
                if step == "a" && dependency == "ghost"
        ));
    }

    #[test]
    fn unknown_template_reference_is_rejected_at_build_time() {
        let spec = spec(
            r#"
name: "bad"
steps:
  a:
    prompt: p
    inputs:
      text: "${ghost.result}"
"#,
        );
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(GraphError::UnknownReference { step, reference })
                if step == "a" && reference == "ghost"
        ));
    }

    #[test]
    fn explicit_cycle_is_rejected() {
        let spec = spec(
            r#"
name: "cycle"
steps:
  a:
    prompt: p
    depends_on: [b]
  b:
    prompt: p
    depends_on: [a]
"#,
        );
        match DependencyGraph::build(&spec) {
            Err(GraphError::Cycle { members }) => {
                assert!(members.contains(&"a".to_string()));
                assert!(members.contains(&"b".to_string()));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn template_cycle_is_rejected() {
        let spec = spec(
            r#"
name: "cycle"
steps:
  a:
    prompt: p
    inputs:
      text: "${b.result}"
  b:
    prompt: p
    inputs:
      text: "${a.result}"
"#,
        );
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn every_edge_respects_the_order() {
        let spec = spec(
            r#"
name: "diamond"
steps:
  top:
    prompt: p
  left:
    prompt: p
    inputs:
      x: "${top.result}"
  right:
    prompt: p
    inputs:
      x: "${top.result}"
  bottom:
    prompt: p
    depends_on: [left, right]
"#,
        );
        let order = DependencyGraph::build(&spec)
            .unwrap()
            .execution_order()
            .unwrap();
        let pos = |n: &str| order.iter().position(|s| s == n).unwrap();
        assert!(pos("top") < pos("left"));
        assert!(pos("top") < pos("right"));
        assert!(pos("left") < pos("bottom"));
        assert!(pos("right") < pos("bottom"));
    }

    #[test]
    fn independent_steps_keep_declaration_order() {
        let spec = spec(
            r#"
name: "ties"
steps:
  charlie:
    prompt: p
  alpha:
    prompt: p
  bravo:
    prompt: p
"#,
        );
        let order = DependencyGraph::build(&spec)
            .unwrap()
            .execution_order()
            .unwrap();
        assert_eq!(order, vec!["charlie", "alpha", "bravo"]);
    }
}
