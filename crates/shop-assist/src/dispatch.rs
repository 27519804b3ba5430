//! One chat turn's function-dispatch loop.
//!
//! State machine per turn:
//!
//! ```text
//! AwaitingToolDecision ──(no tool call)──────────────▶ Done
//!        │
//!        ▼
//!  ToolExecuting ──(empty result, multi-word term)──▶ ToolRetrying
//!        │                                               │
//!        └──────────────▶ AwaitingFinalAnswer ◀──────────┘
//!                                │
//!                                ▼
//!                              Done
//! ```
//!
//! The model either answers directly or requests exactly one tool
//! call. An empty result for a multi-word search term is retried once
//! with the first word alone; when that rescue succeeds, the
//! substituted term is carried into the result payload so the final
//! answer can disclose it. The loop never executes more than two tool
//! passes, and a completion-provider failure yields a graceful apology
//! instead of an error.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use shop_assist_core::Result;

use crate::completion::{
    ChatMessage, CompletionBackend, CompletionParams, Role, ToolChoice,
};
use crate::config::{AssistantConfig, CompletionConfig};
use crate::tools::{declarations, ToolExecutor, ToolInvocation, ToolKind};

/// Words in a user message that bias the first completion toward the
/// products tool. An optimization, not a correctness requirement.
const PRODUCT_HINT_WORDS: &[&str] = &[
    "product", "pasta", "cheese", "wine", "oil", "vinegar", "food", "buy", "purchase", "price",
];

/// Guidance appended before the second completion so the model formats
/// the tool result instead of re-answering from scratch.
const FORMATTING_GUIDANCE: &str = "Format the tool result above into a helpful, conversational \
answer for the customer. Mention concrete names and prices where present. If the result \
contains an `alternativeSearch` field, say that nothing matched the original request and that \
these results are for the alternative term instead.";

/// Shown when the completion backend is unreachable. The turn still
/// succeeds from the caller's point of view.
const APOLOGY: &str =
    "I apologize, I am experiencing technical difficulties. Please try again in a moment.";

/// One executed tool call, for observability.
#[derive(Debug, Clone)]
pub struct ToolTraceEntry {
    pub tool: String,
    pub arguments: serde_json::Value,
    pub result_total: usize,
    /// The substituted term when the alternative-search retry rescued
    /// an empty result.
    pub alternative_search: Option<String>,
}

/// The outcome of a chat turn: the final assistant message plus the
/// trace of tool calls that produced it.
#[derive(Debug, Clone)]
pub struct ChatTurnOutcome {
    pub message: ChatMessage,
    pub tool_trace: Vec<ToolTraceEntry>,
}

/// Drives one conversation turn against the completion backend and the
/// retrieval tools.
pub struct Dispatcher {
    backend: Arc<dyn CompletionBackend>,
    executor: ToolExecutor,
    completion: CompletionConfig,
    system_prompt: String,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        executor: ToolExecutor,
        completion: CompletionConfig,
        assistant: &AssistantConfig,
    ) -> Self {
        Self {
            backend,
            executor,
            completion,
            system_prompt: assistant.system_prompt.clone(),
        }
    }

    /// Run one turn. `messages` is the conversation so far, ending
    /// with the user's latest message.
    pub async fn run_chat_turn(&self, mut messages: Vec<ChatMessage>) -> Result<ChatTurnOutcome> {
        self.install_system_prompt(&mut messages);

        let params = CompletionParams {
            temperature: self.completion.temperature,
            max_tokens: self.completion.max_tokens,
            top_p: self.completion.top_p,
            tools: declarations(),
            tool_choice: Some(self.bias_tool_choice(&messages)),
        };

        let first = match self.backend.complete(&messages, &params).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "completion backend failed on tool decision");
                return Ok(apology_outcome());
            }
        };

        let Some(tool_call) = first.first_tool_call().cloned() else {
            // Direct answer, no tool round trip.
            return Ok(ChatTurnOutcome {
                message: first,
                tool_trace: Vec::new(),
            });
        };

        // ToolExecuting. Argument parse failures are turn-level
        // errors; the loop does not try to repair them.
        let invocation = ToolInvocation::parse(&tool_call.function.name, &tool_call.function.arguments)?;
        info!(tool = invocation.kind().name(), "executing tool call");
        let mut outcome = self.executor.execute(&invocation).await?;

        // ToolRetrying: one alternative-search pass at most.
        let mut alternative_search = None;
        if outcome.total == 0 {
            if let Some(first_word) = first_word_of_multiword(invocation.search_term()) {
                let retried = self
                    .executor
                    .execute(&invocation.with_search_term(&first_word))
                    .await?;
                if retried.total > 0 {
                    info!(term = %first_word, "alternative search rescued empty result");
                    outcome = retried;
                    alternative_search = Some(first_word);
                }
            }
        }

        let mut payload = outcome.payload.clone();
        if let Some(term) = &alternative_search {
            payload["alternativeSearch"] = json!(term);
        }

        let trace = ToolTraceEntry {
            tool: tool_call.function.name.clone(),
            arguments: serde_json::from_str(&tool_call.function.arguments)
                .unwrap_or_else(|_| json!({})),
            result_total: outcome.total,
            alternative_search,
        };

        // AwaitingFinalAnswer: feed the call and its result back and
        // ask for the formatted response, with no tools this time.
        let call_id = tool_call.id.clone();
        messages.push(ChatMessage::assistant_tool_call(tool_call));
        messages.push(ChatMessage::tool(call_id, payload.to_string()));
        messages.push(ChatMessage::system(FORMATTING_GUIDANCE));

        let final_params = CompletionParams {
            temperature: self.completion.temperature,
            max_tokens: self.completion.max_tokens,
            top_p: self.completion.top_p,
            tools: Vec::new(),
            tool_choice: None,
        };

        let message = match self.backend.complete(&messages, &final_params).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "completion backend failed on final answer");
                return Ok(ChatTurnOutcome {
                    message: ChatMessage::assistant(APOLOGY),
                    tool_trace: vec![trace],
                });
            }
        };

        Ok(ChatTurnOutcome {
            message,
            tool_trace: vec![trace],
        })
    }

    /// The system prompt always wins: replace an existing system
    /// message's content, or prepend one.
    fn install_system_prompt(&self, messages: &mut Vec<ChatMessage>) {
        match messages.iter_mut().find(|m| m.role == Role::System) {
            Some(system) => system.content = Some(self.system_prompt.clone()),
            None => messages.insert(0, ChatMessage::system(self.system_prompt.clone())),
        }
    }

    /// Force the products tool when the latest user message contains a
    /// product-category word; otherwise let the model choose.
    fn bias_tool_choice(&self, messages: &[ChatMessage]) -> ToolChoice {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.as_deref())
            .unwrap_or_default()
            .to_lowercase();

        let hinted = PRODUCT_HINT_WORDS
            .iter()
            .any(|word| last_user.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *word));

        if hinted {
            ToolChoice::Function(ToolKind::GetProducts.name().to_string())
        } else {
            ToolChoice::Auto
        }
    }
}

fn apology_outcome() -> ChatTurnOutcome {
    ChatTurnOutcome {
        message: ChatMessage::assistant(APOLOGY),
        tool_trace: Vec::new(),
    }
}

/// The first word of a multi-word search term; `None` when the term is
/// missing or already a single word.
fn first_word_of_multiword(term: Option<&str>) -> Option<String> {
    let term = term?;
    let mut words = term.split_whitespace();
    let first = words.next()?;
    words.next().map(|_| first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_word_only_for_multiword_terms() {
        assert_eq!(
            first_word_of_multiword(Some("extra virgin olive oil")),
            Some("extra".to_string())
        );
        assert_eq!(first_word_of_multiword(Some("parmigiano")), None);
        assert_eq!(first_word_of_multiword(None), None);
    }
}
