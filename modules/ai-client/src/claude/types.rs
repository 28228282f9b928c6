use serde::{Deserialize, Serialize};

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Tool Definition
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolDefinitionWire {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// =============================================================================
// Chat Request
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinitionWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4096,
            messages: Vec::new(),
            system: None,
            temperature: None,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn messages(mut self, messages: Vec<WireMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Force the model to answer through a single tool, which constrains the
    /// output to the tool's input schema.
    pub fn forced_tool(mut self, tool: ToolDefinitionWire) -> Self {
        self.tool_choice = Some(serde_json::json!({ "type": "tool", "name": tool.name.clone() }));
        self.tools = Some(vec![tool]);
        self
    }
}

// =============================================================================
// Chat Response
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub content: Vec<ContentBlock>,
}
