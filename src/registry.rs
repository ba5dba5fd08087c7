use std::panic::{self, AssertUnwindSafe};

use agent_provider::{ToolCallRequest, ToolDefinition};
use serde_json::{json, Map, Value};

use crate::error::{ToolError, ToolResult};
use crate::tools::{Tool, ToolContext, BUILTIN_TOOLS, PARAMETER_TYPE};

/// Key the tool-call assembler uses for argument text that was not valid JSON.
const RAW_ARGUMENTS_KEY: &str = "_raw";

/// Ordered set of tools exposed to the model. Also the dispatch boundary:
/// nothing a tool does escapes [`ToolRegistry::dispatch`] except a
/// [`ToolResult`].
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Every tool in the built-in registration list, in list order.
    pub fn builtin(ctx: ToolContext) -> Self {
        Self::new(BUILTIN_TOOLS.iter().map(|build| build(ctx.clone())).collect())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .map(|tool| &**tool)
    }

    /// JSON-schema tool definitions handed to the model collaborator.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| definition_for(&**tool)).collect()
    }

    pub fn dispatch(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.get(&call.tool_name) else {
            return Err(ToolError::UnknownTool {
                name: call.tool_name.clone(),
                available: self.names().into_iter().map(str::to_string).collect(),
            });
        };

        if let Some(raw) = call.arguments.get(RAW_ARGUMENTS_KEY) {
            return Err(ToolError::InvalidArguments {
                message: format!("arguments are not a JSON object: {raw}"),
                hint: "send the arguments as a single JSON object".to_string(),
            });
        }

        tracing::debug!(tool = %call.tool_name, call_id = %call.call_id, "dispatching tool call");
        match panic::catch_unwind(AssertUnwindSafe(|| tool.call(&call.arguments))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|message| (*message).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(tool = %call.tool_name, %message, "tool panicked");
                Err(ToolError::internal(format!(
                    "{} failed unexpectedly: {message}",
                    call.tool_name
                )))
            }
        }
    }
}

fn definition_for(tool: &dyn Tool) -> ToolDefinition {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for parameter in tool.parameters() {
        properties.insert(
            parameter.name.to_string(),
            json!({
                "type": PARAMETER_TYPE,
                "description": parameter.description,
            }),
        );
        if parameter.required {
            required.push(Value::String(parameter.name.to_string()));
        }
    }

    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        }),
    }
}
