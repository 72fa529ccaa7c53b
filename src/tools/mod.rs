//! Tool trait and registry
//!
//! The banking catalog is fixed: two read-only tools and three money-moving
//! tools that only run after an explicit confirmation of the exact call.
//! Arguments are parsed once, at the registry boundary, into a typed
//! [`ToolCall`].

pub mod confirmation;

pub use confirmation::ConfirmationGate;

use crate::completion::ToolDefinition;
use crate::error::BankingError;
use crate::models::{dollars_to_cents, format_cents, AccountId, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::transaction::TransactionService;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const GET_BALANCE: &str = "get_balance";
pub const GET_HISTORY: &str = "get_transaction_history";
pub const DEPOSIT: &str = "deposit";
pub const WITHDRAW: &str = "withdraw";
pub const TRANSFER: &str = "transfer";

/// A validated tool invocation. Amounts are minor units.
///
/// The serialized form is the canonical representation confirmation tokens
/// are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    GetBalance,
    #[serde(rename = "get_transaction_history")]
    GetHistory { limit: u32 },
    Deposit { amount: i64 },
    Withdraw { amount: i64 },
    Transfer { amount: i64, to_account_id: AccountId },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetBalance => GET_BALANCE,
            ToolCall::GetHistory { .. } => GET_HISTORY,
            ToolCall::Deposit { .. } => DEPOSIT,
            ToolCall::Withdraw { .. } => WITHDRAW,
            ToolCall::Transfer { .. } => TRANSFER,
        }
    }

    /// Arguments in the shape the tool schemas describe (dollars, string ids).
    pub fn to_arguments(&self) -> Value {
        match self {
            ToolCall::GetBalance => json!({}),
            ToolCall::GetHistory { limit } => json!({ "limit": limit }),
            ToolCall::Deposit { amount } | ToolCall::Withdraw { amount } => {
                json!({ "amount": cents_to_dollars(*amount) })
            }
            ToolCall::Transfer {
                amount,
                to_account_id,
            } => json!({
                "amount": cents_to_dollars(*amount),
                "to_account_id": to_account_id.to_string(),
            }),
        }
    }

    pub fn confirmation_prompt(&self) -> String {
        match self {
            ToolCall::Deposit { amount } => {
                format!("Do you want to deposit {}?", format_cents(*amount))
            }
            ToolCall::Withdraw { amount } => {
                format!("Do you want to withdraw {}?", format_cents(*amount))
            }
            ToolCall::Transfer {
                amount,
                to_account_id,
            } => format!(
                "Do you want to transfer {} to account {}?",
                format_cents(*amount),
                to_account_id
            ),
            _ => "Please confirm this operation.".to_string(),
        }
    }
}

fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

//
// ================= Outcomes =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub message: String,
}

/// A proposed money movement awaiting the user's decision. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub tool_name: String,
    pub arguments: Value,
    pub prompt: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Executed(ToolOutput),
    ConfirmationRequired(PendingOperation),
}

//
// ================= Argument parsing =================
//

fn arguments_object(arguments: &Value) -> Result<&serde_json::Map<String, Value>> {
    match arguments {
        Value::Object(map) => Ok(map),
        _ => Err(BankingError::InvalidToolInput(
            "arguments must be a JSON object".to_string(),
        )),
    }
}

/// Dollar amount given as a JSON number or numeric string, in minor units.
pub fn parse_dollars(value: Option<&Value>) -> Result<i64> {
    let text = match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            return Err(BankingError::InvalidToolInput(
                "invalid amount: must be a number".to_string(),
            ))
        }
        None => {
            return Err(BankingError::InvalidToolInput(
                "missing required argument 'amount'".to_string(),
            ))
        }
    };

    let cents = dollars_to_cents(&text).ok_or_else(|| {
        BankingError::InvalidToolInput(format!("invalid amount '{}'", text))
    })?;
    if cents <= 0 {
        return Err(BankingError::InvalidToolInput(
            "invalid amount: must be at least $0.01".to_string(),
        ));
    }
    Ok(cents)
}

fn parse_account_id(value: Option<&Value>) -> Result<AccountId> {
    let parsed = match value {
        Some(Value::String(s)) => s.trim().parse::<AccountId>().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        Some(_) => None,
        None => {
            return Err(BankingError::InvalidToolInput(
                "missing required argument 'to_account_id'".to_string(),
            ))
        }
    };

    match parsed {
        Some(id) if id > 0 => Ok(id),
        _ => Err(BankingError::InvalidToolInput(
            "invalid destination account ID".to_string(),
        )),
    }
}

fn parse_limit(value: Option<&Value>) -> u32 {
    let limit = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match limit {
        Some(n) => n.clamp(1, MAX_PAGE_LIMIT as i64) as u32,
        None => DEFAULT_PAGE_LIMIT,
    }
}

//
// ================= Tools =================
//

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall>;

    /// `idempotency_key` comes from a verified confirmation and becomes the
    /// ledger transfer id of a money-moving call.
    async fn execute(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        idempotency_key: Option<u128>,
    ) -> Result<ToolOutput>;
}

fn mismatched(tool: &str) -> BankingError {
    BankingError::InvalidToolInput(format!("call does not belong to tool '{}'", tool))
}

pub struct BalanceTool {
    service: Arc<TransactionService>,
}

#[async_trait::async_trait]
impl Tool for BalanceTool {
    fn name(&self) -> &'static str {
        GET_BALANCE
    }

    fn description(&self) -> &'static str {
        "Get the current account balance for the authenticated user. Returns balance in USD and cents."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall> {
        if !arguments.is_null() {
            arguments_object(arguments)?;
        }
        Ok(ToolCall::GetBalance)
    }

    async fn execute(&self, user_id: Uuid, call: &ToolCall, _: Option<u128>) -> Result<ToolOutput> {
        if *call != ToolCall::GetBalance {
            return Err(mismatched(self.name()));
        }

        let balance = self.service.get_balance(user_id).await?;
        let formatted = format_cents(balance);

        Ok(ToolOutput {
            success: true,
            data: Some(json!({
                "balance_cents": balance,
                "balance_usd": cents_to_dollars(balance),
                "balance_formatted": formatted,
            })),
            message: format!("Current balance: {}", formatted),
        })
    }
}

pub struct HistoryTool {
    service: Arc<TransactionService>,
}

#[async_trait::async_trait]
impl Tool for HistoryTool {
    fn name(&self) -> &'static str {
        GET_HISTORY
    }

    fn description(&self) -> &'static str {
        "Retrieve recent transaction history for the authenticated user. Returns a paginated list of transactions."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Number of transactions to retrieve (default: 10, max: 100)",
                    "default": DEFAULT_PAGE_LIMIT,
                    "minimum": 1,
                    "maximum": MAX_PAGE_LIMIT,
                }
            },
            "required": []
        })
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall> {
        let limit = if arguments.is_null() {
            DEFAULT_PAGE_LIMIT
        } else {
            parse_limit(arguments_object(arguments)?.get("limit"))
        };
        Ok(ToolCall::GetHistory { limit })
    }

    async fn execute(&self, user_id: Uuid, call: &ToolCall, _: Option<u128>) -> Result<ToolOutput> {
        let ToolCall::GetHistory { limit } = call else {
            return Err(mismatched(self.name()));
        };

        let transactions = self
            .service
            .get_history(user_id, 1, *limit as i64)
            .await?;
        let count = transactions.len();

        Ok(ToolOutput {
            success: true,
            data: Some(json!({ "transactions": transactions, "count": count })),
            message: format!("Retrieved {} transactions", count),
        })
    }
}

pub struct DepositTool {
    service: Arc<TransactionService>,
}

#[async_trait::async_trait]
impl Tool for DepositTool {
    fn name(&self) -> &'static str {
        DEPOSIT
    }

    fn description(&self) -> &'static str {
        "Deposit money into the user's account. Requires confirmation before execution. Amount must be in USD (e.g., 100.50)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to deposit in USD (e.g., 100.50). Will be converted to cents internally.",
                    "minimum": 0.01,
                }
            },
            "required": ["amount"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall> {
        let args = arguments_object(arguments)?;
        Ok(ToolCall::Deposit {
            amount: parse_dollars(args.get("amount"))?,
        })
    }

    async fn execute(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        idempotency_key: Option<u128>,
    ) -> Result<ToolOutput> {
        let ToolCall::Deposit { amount } = call else {
            return Err(mismatched(self.name()));
        };

        let receipt = self
            .service
            .deposit_with_key(user_id, *amount, idempotency_key)
            .await?;
        Ok(ToolOutput {
            success: true,
            data: Some(serde_json::to_value(&receipt)?),
            message: format!("Successfully deposited {}", format_cents(*amount)),
        })
    }
}

pub struct WithdrawTool {
    service: Arc<TransactionService>,
}

#[async_trait::async_trait]
impl Tool for WithdrawTool {
    fn name(&self) -> &'static str {
        WITHDRAW
    }

    fn description(&self) -> &'static str {
        "Withdraw money from the user's account. Requires confirmation before execution. Amount must be in USD. Validates sufficient balance."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to withdraw in USD (e.g., 50.00). Will be converted to cents internally.",
                    "minimum": 0.01,
                }
            },
            "required": ["amount"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall> {
        let args = arguments_object(arguments)?;
        Ok(ToolCall::Withdraw {
            amount: parse_dollars(args.get("amount"))?,
        })
    }

    async fn execute(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        idempotency_key: Option<u128>,
    ) -> Result<ToolOutput> {
        let ToolCall::Withdraw { amount } = call else {
            return Err(mismatched(self.name()));
        };

        let receipt = self
            .service
            .withdraw_with_key(user_id, *amount, idempotency_key)
            .await?;
        Ok(ToolOutput {
            success: true,
            data: Some(serde_json::to_value(&receipt)?),
            message: format!("Successfully withdrew {}", format_cents(*amount)),
        })
    }
}

pub struct TransferTool {
    service: Arc<TransactionService>,
}

#[async_trait::async_trait]
impl Tool for TransferTool {
    fn name(&self) -> &'static str {
        TRANSFER
    }

    fn description(&self) -> &'static str {
        "Transfer money to another account. Requires confirmation before execution. Validates destination account exists and sender has sufficient balance."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to transfer in USD (e.g., 75.50). Will be converted to cents internally.",
                    "minimum": 0.01,
                },
                "to_account_id": {
                    "type": "string",
                    "description": "Destination account ID (numeric string, e.g., '1761461878756072')",
                }
            },
            "required": ["amount", "to_account_id"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn parse(&self, arguments: &Value) -> Result<ToolCall> {
        let args = arguments_object(arguments)?;
        Ok(ToolCall::Transfer {
            amount: parse_dollars(args.get("amount"))?,
            to_account_id: parse_account_id(args.get("to_account_id"))?,
        })
    }

    async fn execute(
        &self,
        user_id: Uuid,
        call: &ToolCall,
        idempotency_key: Option<u128>,
    ) -> Result<ToolOutput> {
        let ToolCall::Transfer {
            amount,
            to_account_id,
        } = call
        else {
            return Err(mismatched(self.name()));
        };

        let receipt = self
            .service
            .transfer_with_key(user_id, *to_account_id, *amount, idempotency_key)
            .await?;
        Ok(ToolOutput {
            success: true,
            data: Some(serde_json::to_value(&receipt)?),
            message: format!(
                "Successfully transferred {} to account {}",
                format_cents(*amount),
                to_account_id
            ),
        })
    }
}

//
// ================= Registry =================
//

/// Immutable tool table. Built once and shared behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
    gate: ConfirmationGate,
}

impl ToolRegistry {
    pub fn banking(service: Arc<TransactionService>, gate: ConfirmationGate) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(BalanceTool {
                service: service.clone(),
            }),
            Arc::new(HistoryTool {
                service: service.clone(),
            }),
            Arc::new(DepositTool {
                service: service.clone(),
            }),
            Arc::new(WithdrawTool {
                service: service.clone(),
            }),
            Arc::new(TransferTool { service }),
        ];

        let order = tools.iter().map(|t| t.name()).collect();
        let tools = tools.into_iter().map(|t| (t.name(), t)).collect();

        Self { tools, order, gate }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.order.clone()
    }

    /// Catalog in the function-calling format of the completion service.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.get(name)
            .ok_or_else(|| BankingError::ToolNotFound(name.to_string()))
    }

    /// Run a tool by name. State-changing tools come back as
    /// `ConfirmationRequired` unless `confirmed` is set.
    pub async fn execute_tool(
        &self,
        name: &str,
        user_id: Uuid,
        arguments: &Value,
        confirmed: bool,
    ) -> Result<ToolOutcome> {
        let tool = self.lookup(name)?;
        let call = tool.parse(arguments)?;
        self.dispatch(tool, user_id, call, confirmed, None).await
    }

    /// Run a previously proposed operation the user has accepted.
    pub async fn execute_confirmed(
        &self,
        name: &str,
        user_id: Uuid,
        arguments: &Value,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let tool = self.lookup(name)?;
        let call = tool.parse(arguments)?;
        self.dispatch(tool, user_id, call, true, token).await
    }

    /// Run an already typed call through the same gate.
    pub async fn execute_call(
        &self,
        user_id: Uuid,
        call: ToolCall,
        confirmed: bool,
    ) -> Result<ToolOutcome> {
        let tool = self.lookup(call.name())?;
        self.dispatch(tool, user_id, call, confirmed, None).await
    }

    async fn dispatch(
        &self,
        tool: Arc<dyn Tool>,
        user_id: Uuid,
        call: ToolCall,
        confirmed: bool,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let mut idempotency_key = None;
        if tool.requires_confirmation() {
            if !confirmed {
                let (token, expires_at) = self.gate.issue(user_id, &call)?;
                info!(tool = tool.name(), user_id = %user_id, "Confirmation required");
                return Ok(ToolOutcome::ConfirmationRequired(PendingOperation {
                    tool_name: tool.name().to_string(),
                    arguments: call.to_arguments(),
                    prompt: call.confirmation_prompt(),
                    token,
                    expires_at,
                }));
            }
            idempotency_key = self.gate.verify(user_id, &call, token)?;
        }

        info!(tool = tool.name(), user_id = %user_id, "Executing tool");
        let output = tool.execute(user_id, &call, idempotency_key).await?;
        Ok(ToolOutcome::Executed(output))
    }
}
