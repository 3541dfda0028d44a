//! Tool descriptors the model may ask to invoke.
//!
//! A [`ToolSet`] is bound to an invocation; the dispatcher sends its
//! definitions to the backend and hands back the model's tool calls untouched.
//! Running those calls is up to the caller, with [`ToolSet::execute_call`]
//! as the usual way to do it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use switchboard_core::types::{ToolCall, ToolDefinition};
use tracing::{debug, warn};

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// A callable tool described to the model by name, description and a JSON
/// Schema for its parameters.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool (e.g. `"get_standings"`).
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the parameters,
    /// `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Run the tool. The returned string is what the model reads.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    /// The definition sent to the backend.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// ToolSet
// ─────────────────────────────────────────────

/// Tools bound to one invocation, keyed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        debug!(tool = tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Names of all tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions of all tools, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Run the tool a model asked for.
    ///
    /// Always produces a string: unknown tools, malformed arguments and tool
    /// failures come back as `Error: ...` text the model can read.
    pub async fn execute_call(&self, call: &ToolCall) -> String {
        let name = call.name();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "tool not found");
            return format!("Error: Tool '{name}' not found");
        };

        let params = match parse_arguments(&call.function.arguments) {
            Ok(params) => params,
            Err(e) => {
                warn!(tool = name, error = %e, "invalid tool arguments");
                return format!("Error: Invalid arguments for {name}: {e}");
            }
        };

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                format!("Error executing {name}: {e}")
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tools.keys()).finish()
    }
}

/// Decode a tool call's JSON argument string. Blank means no arguments.
fn parse_arguments(arguments: &str) -> Result<HashMap<String, Value>, serde_json::Error> {
    if arguments.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_str(arguments)
}

// ─────────────────────────────────────────────
// Result envelope
// ─────────────────────────────────────────────

/// Wrap a tool's output in the `{data, sourceUrls?, meta?}` envelope.
///
/// `sourceUrls` and `meta` are left out when empty.
pub fn format_tool_result(data: Value, source_urls: &[String], meta: Option<Value>) -> String {
    let mut envelope = Map::new();
    envelope.insert("data".to_string(), data);
    if !source_urls.is_empty() {
        envelope.insert("sourceUrls".to_string(), json!(source_urls));
    }
    if let Some(meta) = meta.filter(|m| !is_empty_value(m)) {
        envelope.insert("meta".to_string(), meta);
    }
    Value::Object(envelope).to_string()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}
