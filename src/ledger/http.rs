//! JSON gateway in front of the ledger service.

use super::types::{Account, AccountError, Transfer, TransferError};
use super::Ledger;
use crate::error::BankingError;
use crate::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct HttpLedger {
    client: Client,
    base_url: String,
}

impl HttpLedger {
    /// `address` is `host:port` or a full URL.
    pub fn new(address: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BankingError::LedgerUnavailable(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url(address),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Ledger request");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                BankingError::LedgerUnavailable(format!("Ledger request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                BankingError::LedgerUnavailable(format!("Ledger returned {} for {}", status, path))
            } else {
                BankingError::LedgerRejected(format!(
                    "Ledger returned {} for {}: {}",
                    status, path, text
                ))
            });
        }

        response.json::<R>().await.map_err(|e| {
            BankingError::LedgerRejected(format!("Invalid ledger response for {}: {}", path, e))
        })
    }
}

fn base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[async_trait::async_trait]
impl Ledger for HttpLedger {
    async fn create_accounts(&self, accounts: &[Account]) -> Result<Vec<AccountError>> {
        self.post_json("/accounts/create", accounts).await
    }

    async fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<TransferError>> {
        self.post_json("/transfers/create", transfers).await
    }

    async fn lookup_accounts(&self, ids: &[u128]) -> Result<Vec<Account>> {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.post_json("/accounts/lookup", &ids).await
    }
}
