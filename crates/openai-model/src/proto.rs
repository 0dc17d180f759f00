use serde::{Deserialize, Serialize};
use whatski_model::{
    AssistantTool, MessageId, MessageRole, Run, RunId, RunRequest, RunStatus,
    ThreadId, ThreadMessage,
};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct LastError {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: RunStatus,
    pub last_error: Option<LastError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: TextContent,
    },
    // Images and refusals carry no text the chat can display.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateThreadRequest {}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateMessageRequest {
    role: MessageRole,
    content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: AssistantTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateRunRequest {
    assistant_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_message_request(content: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        role: MessageRole::User,
        content: content.to_owned(),
    }
}

#[inline]
pub fn create_run_request(
    req: &RunRequest,
    config: &OpenAIConfig,
) -> CreateRunRequest {
    CreateRunRequest {
        assistant_id: config.assistant_id.clone(),
        tools: req.tools.iter().map(|&r#type| Tool { r#type }).collect(),
    }
}

impl From<ThreadObject> for ThreadId {
    #[inline]
    fn from(thread: ThreadObject) -> Self {
        ThreadId::new(thread.id)
    }
}

impl From<RunObject> for Run {
    #[inline]
    fn from(run: RunObject) -> Self {
        Run {
            id: RunId::new(run.id),
            status: run.status,
            last_error: run.last_error.map(|err| match err.code {
                Some(code) => format!("{code}: {}", err.message),
                None => err.message,
            }),
        }
    }
}

impl From<MessageObject> for ThreadMessage {
    fn from(msg: MessageObject) -> Self {
        let text = msg
            .content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value),
                ContentPart::Other => None,
            })
            .collect();
        ThreadMessage {
            id: MessageId::new(msg.id),
            role: msg.role,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_run_request() {
        let config =
            OpenAIConfigBuilder::with_credentials("xxx", "asst_ski").build();
        let req = create_run_request(&RunRequest::default(), &config);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "assistant_id": "asst_ski",
                "tools": [{ "type": "file_search" }]
            })
        );

        let req = create_run_request(&RunRequest { tools: vec![] }, &config);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "assistant_id": "asst_ski" })
        );
    }

    #[test]
    fn test_create_message_request() {
        let req = create_message_request("Hi");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "role": "user", "content": "Hi" })
        );
    }

    #[test]
    fn test_failed_run() {
        let run: RunObject =
            serde_json::from_str(include_str!("../fixtures/run_failed.json"))
                .unwrap();
        let run = Run::from(run);
        assert_eq!(run.id.as_str(), "run_abc123");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.last_error.as_deref(),
            Some("server_error: Sorry, something went wrong.")
        );
    }

    #[test]
    fn test_message_list() {
        let list: MessageList = serde_json::from_str(include_str!(
            "../fixtures/message_list.json"
        ))
        .unwrap();
        let messages: Vec<ThreadMessage> =
            list.data.into_iter().map(Into::into).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.as_str(), "msg_3");
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(
            messages[0].text,
            "Try a wide-waisted powder ski like the Volkl Blaze."
        );
        assert_eq!(messages[1].role, MessageRole::User);
    }
}
