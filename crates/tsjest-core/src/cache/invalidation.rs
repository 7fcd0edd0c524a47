use std::path::{Path, PathBuf};

use super::DependencyGraph;

/// Reverse lookups over the dependency graph
pub struct InvalidationEngine<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> InvalidationEngine<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Files whose recorded import list contains `module`
    pub fn dependents_of(&self, module: &Path) -> Vec<PathBuf> {
        self.graph
            .iter()
            .filter(|(_, entry)| entry.resolved_module_names.iter().any(|m| m == module))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DependencyGraphEntry;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (path, deps) in edges {
            graph.insert_entry(
                PathBuf::from(path),
                DependencyGraphEntry::new(
                    format!("// {path}"),
                    deps.iter().map(PathBuf::from).collect(),
                ),
            );
        }
        graph
    }

    #[test]
    fn test_dependents_of() {
        let graph = graph(&[
            ("/p/a.spec.ts", &["/p/a.ts", "/p/util.ts"]),
            ("/p/b.spec.ts", &["/p/b.ts", "/p/util.ts"]),
        ]);
        let engine = InvalidationEngine::new(&graph);

        assert_eq!(
            engine.dependents_of(Path::new("/p/util.ts")),
            vec![PathBuf::from("/p/a.spec.ts"), PathBuf::from("/p/b.spec.ts")]
        );
        assert_eq!(
            engine.dependents_of(Path::new("/p/a.ts")),
            vec![PathBuf::from("/p/a.spec.ts")]
        );
        assert!(engine.dependents_of(Path::new("/p/other.ts")).is_empty());
    }
}
