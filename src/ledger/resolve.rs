//! Ledger address resolution.

use crate::retry::RetryPolicy;
use std::net::IpAddr;
use tracing::{info, warn};

pub const DEFAULT_LEDGER_PORT: u16 = 3000;

/// Split `host[:port]`, defaulting the port. Bracketed IPv6 is accepted.
pub fn split_host_port(address: &str) -> (String, u16) {
    let address = address.trim();

    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_LEDGER_PORT);
            return (host.to_string(), port);
        }
    }

    if address.parse::<IpAddr>().is_ok() {
        return (address.to_string(), DEFAULT_LEDGER_PORT);
    }

    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (address.to_string(), DEFAULT_LEDGER_PORT),
        },
        None => (address.to_string(), DEFAULT_LEDGER_PORT),
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Resolve a ledger address to `ip:port`.
///
/// IP literals are returned without a lookup. Lookup failures are retried
/// under `policy`; when every attempt fails the unresolved address is returned
/// and the connection attempt is left to report the real problem.
pub async fn resolve_address(address: &str, policy: &RetryPolicy) -> String {
    let (host, port) = split_host_port(address);

    if host.parse::<IpAddr>().is_ok() {
        return join_host_port(&host, port);
    }

    let target = join_host_port(&host, port);
    let lookup = policy
        .run("ledger address resolution", |_| {
            let target = target.clone();
            async move {
                let mut addrs = tokio::net::lookup_host(target.as_str()).await?;
                addrs.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no addresses found for {}", target),
                    )
                })
            }
        })
        .await;

    match lookup {
        Ok(resolved) => {
            info!(address, resolved = %resolved, "Resolved ledger address");
            resolved.to_string()
        }
        Err(e) => {
            warn!(
                address,
                error = %e,
                "Failed to resolve ledger address, using it unresolved"
            );
            target
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("ledger:3001"), ("ledger".to_string(), 3001));
        assert_eq!(split_host_port("ledger"), ("ledger".to_string(), 3000));
        assert_eq!(split_host_port("10.1.2.3"), ("10.1.2.3".to_string(), 3000));
        assert_eq!(split_host_port("[::1]:4000"), ("::1".to_string(), 4000));
        assert_eq!(split_host_port("::1"), ("::1".to_string(), 3000));
    }

    #[tokio::test]
    async fn test_ip_literal_is_returned_unchanged() {
        let resolved = resolve_address("127.0.0.1:3000", &RetryPolicy::none()).await;
        assert_eq!(resolved, "127.0.0.1:3000");

        let resolved = resolve_address("[::1]:3000", &RetryPolicy::none()).await;
        assert_eq!(resolved, "[::1]:3000");
    }

    #[tokio::test]
    async fn test_unresolvable_host_falls_back() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let resolved = resolve_address("no-such-host.invalid:3000", &policy).await;
        assert_eq!(resolved, "no-such-host.invalid:3000");
    }
}
