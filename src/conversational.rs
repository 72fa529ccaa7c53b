//! Conversational interaction handler
//!
//! Turns free text into at most one tool call and runs it through the
//! registry's confirmation gate. With a completion client configured the model
//! picks the tool; without one the intent parser does. Either way a
//! state-changing tool stops at `requires_confirmation` and only runs through
//! [`ChatService::process_confirmation`].

use crate::completion::{ChatMessage, CompletionClient, FunctionToolCall};
use crate::error::BankingError;
use crate::intent::parse_intent;
use crate::tools::{PendingOperation, ToolOutcome, ToolOutput, ToolRegistry};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = r#"You are a professional banking assistant. You help users with:
- Checking account balances
- Viewing transaction history
- Making deposits
- Making withdrawals
- Transferring money between accounts

Always be clear, professional, and security-conscious. For financial operations (deposit, withdraw, transfer), the system will automatically request confirmation before executing.

Use the provided tools to perform banking operations:
- For balance checks: use get_balance
- For transaction history: use get_transaction_history
- For deposits: use deposit (requires confirmation)
- For withdrawals: use withdraw (requires confirmation)
- For transfers: use transfer (requires confirmation)

Extract parameters from natural language:
- Amounts are in USD (e.g., $100, 50 dollars, 25.50)
- Account IDs are numeric strings"#;

const SUMMARY_PROMPT: &str = r#"You are a professional banking assistant. Present the tool results in a natural, conversational way.

When presenting:
- Balance information: show the amount clearly with currency formatting
- Transaction history: summarize key details (date, type, amount, recipient)
- Be friendly and helpful
- Suggest relevant next actions when appropriate

Format monetary amounts as currency (e.g., $1,234.56)."#;

const REPHRASE_HINT: &str =
    "I'm not sure how to help with that. Could you rephrase your question?";

/// Response for one chat turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<PendingOperation>,
}

impl ChatResponse {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            data: None,
            requires_confirmation: false,
            confirmation: None,
        }
    }

    fn pending(operation: PendingOperation) -> Self {
        Self {
            reply: operation.prompt.clone(),
            data: None,
            requires_confirmation: true,
            confirmation: Some(operation),
        }
    }

    fn executed(reply: String, output: ToolOutput) -> Self {
        Self {
            reply,
            data: output.data,
            requires_confirmation: false,
            confirmation: None,
        }
    }

    fn apology(error: &BankingError) -> Self {
        Self::reply(format!(
            "I encountered an error while processing your request: {}",
            error.user_message()
        ))
    }
}

/// Templated summary used when the model cannot phrase the result.
fn format_tool_output(output: &ToolOutput) -> String {
    if output.success {
        output.message.clone()
    } else {
        format!("I encountered an error: {}", output.message)
    }
}

fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(trimmed)
}

pub struct ChatService {
    registry: Arc<ToolRegistry>,
    completion: Option<Arc<dyn CompletionClient>>,
}

impl ChatService {
    pub fn new(registry: Arc<ToolRegistry>, completion: Option<Arc<dyn CompletionClient>>) -> Self {
        match &completion {
            Some(client) => info!(model = client.model(), "Chat service using completion API"),
            None => warn!("No completion client configured, chat falls back to intent parsing"),
        }
        Self {
            registry,
            completion,
        }
    }

    pub async fn process_message(&self, user_id: Uuid, message: &str) -> Result<ChatResponse> {
        let message = message.trim();
        if message.is_empty() {
            return Err(BankingError::Validation("message cannot be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(BankingError::Validation(format!(
                "message too long (maximum {} characters)",
                MAX_MESSAGE_CHARS
            )));
        }

        info!(user_id = %user_id, "Processing chat message");

        match &self.completion {
            Some(client) => self.process_with_model(client.as_ref(), user_id, message).await,
            None => self.process_with_intents(user_id, message).await,
        }
    }

    async fn process_with_model(
        &self,
        client: &dyn CompletionClient,
        user_id: Uuid,
        message: &str,
    ) -> Result<ChatResponse> {
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(message)];
        let assistant = client
            .complete(&messages, &self.registry.definitions())
            .await?;

        let Some(call) = assistant.tool_calls.first() else {
            let reply = assistant.text().unwrap_or(REPHRASE_HINT);
            return Ok(ChatResponse::reply(reply));
        };

        if assistant.tool_calls.len() > 1 {
            warn!(
                count = assistant.tool_calls.len(),
                "Model requested several tools, running the first only"
            );
        }

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %call.function.name, error = %e, "Unparseable tool arguments");
                return Ok(ChatResponse::apology(&BankingError::InvalidToolInput(
                    "the request details could not be read".to_string(),
                )));
            }
        };

        let outcome = match self
            .registry
            .execute_tool(&call.function.name, user_id, &arguments, false)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = %call.function.name, error = %e, "Tool call failed");
                return Ok(ChatResponse::apology(&e));
            }
        };

        match outcome {
            ToolOutcome::ConfirmationRequired(pending) => Ok(ChatResponse::pending(pending)),
            ToolOutcome::Executed(output) => {
                let reply = self
                    .summarize(client, message, &assistant, call, &output)
                    .await;
                Ok(ChatResponse::executed(reply, output))
            }
        }
    }

    /// Second completion phrasing the tool result. Falls back to a template.
    async fn summarize(
        &self,
        client: &dyn CompletionClient,
        message: &str,
        assistant: &ChatMessage,
        call: &FunctionToolCall,
        output: &ToolOutput,
    ) -> String {
        let payload = match &output.data {
            Some(data) => data.to_string(),
            None => json!({ "success": output.success, "message": output.message }).to_string(),
        };

        let messages = vec![
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(message),
            assistant.clone(),
            ChatMessage::tool_result(call, payload),
        ];

        match client.complete(&messages, &[]).await {
            Ok(reply) => match reply.text() {
                Some(text) => text.to_string(),
                None => {
                    warn!("Summary completion was empty, using template");
                    format_tool_output(output)
                }
            },
            Err(e) => {
                warn!(error = %e, "Summary completion failed, using template");
                format_tool_output(output)
            }
        }
    }

    async fn process_with_intents(&self, user_id: Uuid, message: &str) -> Result<ChatResponse> {
        let call = match parse_intent(message).into_tool_call() {
            Ok(call) => call,
            Err(e) => return Ok(ChatResponse::reply(e.user_message())),
        };

        match self.registry.execute_call(user_id, call, false).await {
            Ok(ToolOutcome::ConfirmationRequired(pending)) => Ok(ChatResponse::pending(pending)),
            Ok(ToolOutcome::Executed(output)) => {
                let reply = format_tool_output(&output);
                Ok(ChatResponse::executed(reply, output))
            }
            Err(e) => {
                warn!(error = %e, "Tool call failed");
                Ok(ChatResponse::apology(&e))
            }
        }
    }

    /// Second half of the confirmation protocol.
    ///
    /// A declined operation never reaches the tool. An accepted one goes back
    /// through the gate with `confirmed` set, carrying the token issued with
    /// the proposal.
    pub async fn process_confirmation(
        &self,
        user_id: Uuid,
        tool_name: &str,
        arguments: &Value,
        confirmed: bool,
        token: Option<&str>,
    ) -> Result<ChatResponse> {
        info!(user_id = %user_id, tool = tool_name, confirmed, "Processing confirmation");

        if !confirmed {
            return Ok(ChatResponse::reply("Operation cancelled."));
        }

        match self
            .registry
            .execute_confirmed(tool_name, user_id, arguments, token)
            .await
        {
            Ok(ToolOutcome::Executed(output)) => {
                info!(tool = tool_name, "Confirmed operation completed");
                let reply = format_tool_output(&output);
                Ok(ChatResponse::executed(reply, output))
            }
            Ok(ToolOutcome::ConfirmationRequired(pending)) => Ok(ChatResponse::pending(pending)),
            Err(e) if e.is_user_facing() => {
                warn!(tool = tool_name, error = %e, "Confirmed operation rejected");
                Ok(ChatResponse::reply(format!("Operation failed: {}", e.user_message())))
            }
            Err(e) => {
                error!(tool = tool_name, error = %e, "Confirmed operation failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditStore;
    use crate::completion::{FunctionCall, Role, ToolDefinition};
    use crate::error::AiErrorKind;
    use crate::ledger::{InMemoryLedger, LedgerClient};
    use crate::tools::ConfirmationGate;
    use crate::transaction::TransactionService;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Completion client replaying canned replies in order.
    struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<ChatMessage>>>,
        requests: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedCompletion {
        fn new(replies: Vec<Result<ChatMessage>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedCompletion {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<ChatMessage> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BankingError::Upstream(AiErrorKind::Unavailable)))
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![FunctionToolCall {
                id: "call_1".to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            tool_call_id: None,
            name: None,
        }
    }

    async fn create_test_chat(
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> (ChatService, Arc<TransactionService>, Uuid) {
        let ledger = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        ledger.ensure_system_account().await.unwrap();
        let service = Arc::new(TransactionService::new(
            Arc::new(ledger),
            Arc::new(InMemoryAuditStore::new()),
        ));
        let user = service
            .open_account("alice@example.com", "Alice", "hash")
            .await
            .unwrap();
        let gate = ConfirmationGate::new(
            "chat-test-secret-with-at-least-32-bytes",
            Duration::from_secs(300),
            true,
        );
        let registry = Arc::new(ToolRegistry::banking(service.clone(), gate));
        (ChatService::new(registry, completion), service, user.id)
    }

    #[tokio::test]
    async fn test_plain_reply_is_returned_verbatim() {
        let model = ScriptedCompletion::new(vec![
            Ok(ChatMessage::assistant("Hello! How can I help?")),
            Ok(ChatMessage::assistant("   ")),
        ]);
        let (chat, _, user) = create_test_chat(Some(model.clone())).await;

        let response = chat.process_message(user, "hi").await.unwrap();
        assert_eq!(response.reply, "Hello! How can I help?");
        assert!(!response.requires_confirmation);

        let response = chat.process_message(user, "hmm").await.unwrap();
        assert_eq!(response.reply, REPHRASE_HINT);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].1, 5);
        assert_eq!(requests[0].0[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_deposit_is_proposed_then_confirmed() {
        let model = ScriptedCompletion::new(vec![Ok(tool_call("deposit", r#"{"amount": 50}"#))]);
        let (chat, service, user) = create_test_chat(Some(model.clone())).await;

        let response = chat.process_message(user, "deposit $50").await.unwrap();
        assert!(response.requires_confirmation);
        assert_eq!(response.reply, "Do you want to deposit $50.00?");
        assert_eq!(service.get_balance(user).await.unwrap(), 0);
        assert_eq!(model.request_count(), 1);

        let pending = response.confirmation.unwrap();

        let declined = chat
            .process_confirmation(user, &pending.tool_name, &pending.arguments, false, None)
            .await
            .unwrap();
        assert_eq!(declined.reply, "Operation cancelled.");
        assert_eq!(service.get_balance(user).await.unwrap(), 0);

        let accepted = chat
            .process_confirmation(
                user,
                &pending.tool_name,
                &pending.arguments,
                true,
                Some(&pending.token),
            )
            .await
            .unwrap();
        assert_eq!(accepted.reply, "Successfully deposited $50.00");
        assert_eq!(service.get_balance(user).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_confirmation_for_a_different_call_is_refused() {
        let model = ScriptedCompletion::new(vec![Ok(tool_call("withdraw", r#"{"amount": "5"}"#))]);
        let (chat, service, user) = create_test_chat(Some(model)).await;
        service.deposit(user, 10_000).await.unwrap();

        let pending = chat
            .process_message(user, "withdraw 5")
            .await
            .unwrap()
            .confirmation
            .unwrap();

        let response = chat
            .process_confirmation(user, "withdraw", &json!({"amount": 100}), true, Some(&pending.token))
            .await
            .unwrap();
        assert!(response.reply.starts_with("Operation failed"));
        assert_eq!(service.get_balance(user).await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_read_only_tool_is_summarised() {
        let model = ScriptedCompletion::new(vec![
            Ok(tool_call("get_balance", "")),
            Ok(ChatMessage::assistant("You have $0.00 available.")),
        ]);
        let (chat, _, user) = create_test_chat(Some(model.clone())).await;

        let response = chat.process_message(user, "balance?").await.unwrap();
        assert_eq!(response.reply, "You have $0.00 available.");
        assert_eq!(response.data.unwrap()["balance_cents"], 0);

        let requests = model.requests.lock().unwrap();
        let (summary, tool_count) = &requests[1];
        assert_eq!(*tool_count, 0);
        let roles: Vec<Role> = summary.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(summary[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_summary_failure_uses_template() {
        let model = ScriptedCompletion::new(vec![
            Ok(tool_call("get_balance", "{}")),
            Err(BankingError::Upstream(AiErrorKind::RateLimited)),
        ]);
        let (chat, _, user) = create_test_chat(Some(model)).await;

        let response = chat.process_message(user, "balance?").await.unwrap();
        assert_eq!(response.reply, "Current balance: $0.00");
    }

    #[tokio::test]
    async fn test_bad_arguments_and_tool_errors_become_apologies() {
        let model = ScriptedCompletion::new(vec![
            Ok(tool_call("deposit", "{not json")),
            Ok(tool_call("open_vault", "{}")),
        ]);
        let (chat, _, user) = create_test_chat(Some(model)).await;

        let response = chat.process_message(user, "deposit").await.unwrap();
        assert!(response.reply.starts_with("I encountered an error"));
        assert!(!response.requires_confirmation);

        let response = chat.process_message(user, "open the vault").await.unwrap();
        assert!(response.reply.contains("open_vault"));
    }

    #[tokio::test]
    async fn test_upstream_errors_are_sanitized() {
        let model = ScriptedCompletion::new(vec![Err(BankingError::Upstream(AiErrorKind::Auth))]);
        let (chat, _, user) = create_test_chat(Some(model)).await;

        let err = chat.process_message(user, "hello").await.unwrap_err();
        assert_eq!(err.user_message(), "AI service authentication error");
    }

    #[tokio::test]
    async fn test_message_length_limits() {
        let (chat, _, user) = create_test_chat(None).await;

        assert!(matches!(
            chat.process_message(user, "   ").await,
            Err(BankingError::Validation(_))
        ));
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            chat.process_message(user, &long).await,
            Err(BankingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_intent_fallback_goes_through_the_gate() {
        let (chat, service, user) = create_test_chat(None).await;

        let response = chat
            .process_message(user, "deposit $20 please")
            .await
            .unwrap();
        assert!(response.requires_confirmation);
        assert_eq!(service.get_balance(user).await.unwrap(), 0);

        let pending = response.confirmation.unwrap();
        chat.process_confirmation(user, "deposit", &pending.arguments, true, Some(&pending.token))
            .await
            .unwrap();
        assert_eq!(service.get_balance(user).await.unwrap(), 2_000);

        let response = chat.process_message(user, "what's my balance").await.unwrap();
        assert_eq!(response.reply, "Current balance: $20.00");

        let response = chat.process_message(user, "tell me a joke").await.unwrap();
        assert!(response.reply.contains("didn't understand"));
    }
}
