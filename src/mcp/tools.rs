use async_trait::async_trait;
use serde_json::{Map, Value};

use super::types::Tool;

/// The closed set of tools this server can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    FacebookPosts,
    FacebookComments,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::FacebookPosts, ToolKind::FacebookComments];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::FacebookPosts => "scrape_facebook_posts",
            ToolKind::FacebookComments => "scrape_facebook_comments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn definition(&self) -> Tool;

    /// Run the tool. Tool-domain failures are part of the returned text, so
    /// this never fails.
    async fn call(&self, arguments: Map<String, Value>) -> String;
}

/// Registration table binding each [`ToolKind`] to its handler.
/// Listing preserves registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a handler, replacing any earlier handler of the same kind.
    pub fn register<T: ToolHandler + 'static>(&mut self, tool: T) {
        self.tools.retain(|existing| existing.kind() != tool.kind());
        self.tools.push(Box::new(tool));
    }

    pub fn get_tool(&self, kind: ToolKind) -> Option<&dyn ToolHandler> {
        self.tools
            .iter()
            .find(|tool| tool.kind() == kind)
            .map(|tool| tool.as_ref())
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.kind().name()).collect()
    }

    /// Look up a tool by its protocol name and run it.
    /// `None` when no registered tool has that name.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Option<String> {
        let tool = ToolKind::from_name(name).and_then(|kind| self.get_tool(kind))?;
        Some(tool.call(arguments).await)
    }
}
