use banking_orchestrator::{
    audit::{AuditStore, InMemoryAuditStore, PgAuditStore},
    completion::{CompletionClient, OpenRouterClient},
    config::AppConfig,
    conversational::{ChatResponse, ChatService},
    ledger::LedgerClient,
    tools::{ConfirmationGate, ToolRegistry},
    TransactionService,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    info!("Banking console starting");
    info!(ledger = %config.ledger_address, "Ledger address");

    let audit: Arc<dyn AuditStore> = match &config.database_url {
        Some(url) => {
            let store = PgAuditStore::connect_lazy(
                url,
                config.database_max_connections,
                config.database_acquire_timeout,
            )?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, audit records are kept in memory only");
            Arc::new(InMemoryAuditStore::new())
        }
    };

    let ledger = LedgerClient::connect(
        &config.ledger_address,
        &config.resolve_policy,
        &config.connect_policy,
    )
    .await?;

    let service = Arc::new(TransactionService::new(Arc::new(ledger), audit));
    let gate = ConfirmationGate::new(
        config.confirmation_secret.as_bytes(),
        config.confirmation_ttl,
        config.confirmation_require_token,
    );
    let registry = Arc::new(ToolRegistry::banking(service.clone(), gate));

    let completion: Option<Arc<dyn CompletionClient>> = match &config.openrouter_api_key {
        Some(key) => Some(Arc::new(OpenRouterClient::new(
            key.clone(),
            config.openrouter_model.clone(),
            config.openrouter_base_url.clone(),
            config.completion_timeout,
        )?)),
        None => None,
    };
    let chat = ChatService::new(registry, completion);

    // First argument: an existing user id, or an email to sign in or register
    let user_id = match std::env::args().nth(1) {
        Some(arg) => match Uuid::parse_str(&arg) {
            Ok(id) => id,
            Err(_) => sign_in(&service, &arg).await?,
        },
        None => sign_in(&service, "demo@example.com").await?,
    };

    println!("Signed in as {}. Type 'quit' to exit.", user_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let response = match chat.process_message(user_id, line).await {
            Ok(response) => response,
            Err(e) => {
                println!("{}", e.user_message());
                continue;
            }
        };
        print_response(&response);

        let Some(pending) = response.confirmation else {
            continue;
        };

        stdout.write_all(b"Confirm? [y/N] ").await?;
        stdout.flush().await?;
        let answer = lines.next_line().await?.unwrap_or_default();
        let confirmed = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");

        match chat
            .process_confirmation(
                user_id,
                &pending.tool_name,
                &pending.arguments,
                confirmed,
                Some(&pending.token),
            )
            .await
        {
            Ok(response) => print_response(&response),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    info!("Banking console stopped");
    Ok(())
}

/// Existing user for `email`, or a freshly opened account.
async fn sign_in(service: &TransactionService, email: &str) -> banking_orchestrator::Result<Uuid> {
    if let Some(user) = service.find_user_by_email(email).await? {
        println!("Welcome back, {} (account {})", user.display_name, user.account_id);
        return Ok(user.id);
    }

    let name = email.split('@').next().unwrap_or("customer");
    let user = service.open_account(email, name, "").await?;
    println!("Opened account {} for {}", user.account_id, user.email);
    Ok(user.id)
}

fn print_response(response: &ChatResponse) {
    println!("{}", response.reply);
}
