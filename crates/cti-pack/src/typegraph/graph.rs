use std::collections::BTreeSet;

use petgraph::{algo::kosaraju_scc, graphmap::DiGraphMap};

use super::{Shape, TypeGraph};

/// Detects declarations that participate in reference cycles, including
/// self-loops. Reported through compile statistics so callers can see
/// which declarations form recursive models.
pub fn recursive_declarations(type_graph: &TypeGraph) -> BTreeSet<String> {
  let mut graph = DiGraphMap::<&str, ()>::new();

  for (name, shape) in &type_graph.declarations {
    graph.add_node(name.as_str());
    let mut targets = Vec::new();
    collect_references(shape, &mut targets);
    for target in targets {
      if type_graph.declarations.contains_key(target) {
        graph.add_edge(name.as_str(), target, ());
      }
    }
  }

  kosaraju_scc(&graph)
    .into_iter()
    .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
    .flatten()
    .map(String::from)
    .collect()
}

fn collect_references<'a>(shape: &'a Shape, targets: &mut Vec<&'a str>) {
  if let Some(reference) = &shape.reference {
    targets.push(reference);
  }
  targets.extend(shape.inherits.iter().map(String::as_str));

  for property in shape.properties.values() {
    collect_references(&property.shape, targets);
  }
  for pattern in shape.pattern_properties.values() {
    collect_references(pattern, targets);
  }
  if let Some(items) = &shape.items {
    collect_references(items, targets);
  }
  for member in &shape.any_of {
    collect_references(member, targets);
  }
  if let Some(traits_schema) = &shape.traits_schema {
    collect_references(traits_schema, targets);
  }
}
