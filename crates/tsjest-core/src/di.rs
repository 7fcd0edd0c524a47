use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use crate::fs::{FileSystem, RealFileSystem};
use crate::transformer::FallbackTransformer;
use crate::typescript::CompilerRegistry;
use std::sync::Arc;

/// Dependency injection container
/// Holds the shared collaborators every configuration set and compiler is wired with
#[derive(Clone)]
pub struct Container {
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
    file_system: Arc<dyn FileSystem>,
    compilers: CompilerRegistry,
    fallback_transformer: Option<Arc<dyn FallbackTransformer>>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(compilers: CompilerRegistry) -> Self {
        Container {
            diagnostic_handler: Arc::new(ConsoleDiagnosticHandler::new()),
            file_system: Arc::new(RealFileSystem::new()),
            compilers,
            fallback_transformer: None,
        }
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        compilers: CompilerRegistry,
        diagnostic_handler: Arc<dyn DiagnosticHandler>,
        file_system: Arc<dyn FileSystem>,
    ) -> Self {
        Container {
            diagnostic_handler,
            file_system,
            compilers,
            fallback_transformer: None,
        }
    }

    /// Chain a transformer that post-processes compiled output
    pub fn with_fallback_transformer(mut self, transformer: Arc<dyn FallbackTransformer>) -> Self {
        self.fallback_transformer = Some(transformer);
        self
    }

    /// Get the diagnostic handler
    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    /// Get the file system
    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    pub fn compilers(&self) -> &CompilerRegistry {
        &self.compilers
    }

    pub fn fallback_transformer(&self) -> Option<&Arc<dyn FallbackTransformer>> {
        self.fallback_transformer.as_ref()
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    /// Get the warning count
    pub fn warning_count(&self) -> usize {
        self.diagnostic_handler.warning_count()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("compilers", &self.compilers)
            .field(
                "fallback_transformer",
                &self.fallback_transformer.as_ref().map(|t| t.name().to_string()),
            )
            .finish_non_exhaustive()
    }
}
