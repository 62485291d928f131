use std::collections::HashMap;
use std::sync::Arc;

use deckhand_core::tools::Tool;

use crate::content_check::QaContentCheckTool;
use crate::research::ResearchRouteSourcesTool;
use crate::visual_check::QaVisualCheckTool;

/// Tool lookup table. Built once at startup and shared behind an Arc;
/// registration is write-once-read-many with last-write-wins on a name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Registry pre-loaded with the built-in QA and research tools.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ResearchRouteSourcesTool));
    registry.register(Arc::new(QaContentCheckTool));
    registry.register(Arc::new(QaVisualCheckTool));
    registry
}
