//! Tool registry with lookup by definition name or id.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use pcommon::Registry;
use pprovider::ToolDefinition;

use crate::{FunctionTool, Tool, ToolError, ToolExecutionContext, ToolInvocationResult};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Registry<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the loop control tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    pub fn register_fn<F, Fut>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(String, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolInvocationResult, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(definition, handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Resolves by name first, then by definition id.
    pub fn resolve(&self, name_or_id: &str) -> Option<Arc<dyn Tool>> {
        self.get(name_or_id).or_else(|| {
            self.tools
                .find(|tool| tool.definition().id == name_or_id)
                .cloned()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// All definitions, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Definitions for the given names or ids, in request order. Unknown entries are skipped.
    pub fn definitions_for<S: AsRef<str>>(&self, names_or_ids: &[S]) -> Vec<ToolDefinition> {
        names_or_ids
            .iter()
            .filter_map(|key| self.resolve(key.as_ref()))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn update_project_root(&self, project_root: &Path) {
        for tool in self.tools.values() {
            tool.update_project_root(project_root);
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
