use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::H256,
};
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::{error::RelayError, models::TransactionView};

pub const DEFAULT_REGISTRY_URL: &str = "https://chainid.network/chains.json";

// Placeholder public registries use for an Infura project key.
pub const API_KEY_PLACEHOLDER: &str = "INFURA_API_KEY";

#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_transaction(&self, hash: H256) -> Result<TransactionView, RelayError>;

    async fn is_reachable(&self) -> bool;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub name: String,
    #[serde(default)]
    pub rpc: Vec<String>,
}

// RPC URLs usable for `name`, with the API key placeholder resolved.
pub fn candidate_urls(chains: &[ChainInfo], name: &str, api_key: Option<&str>) -> Vec<String> {
    let Some(chain) = chains.iter().find(|chain| chain.name == name) else {
        return Vec::new();
    };

    chain
        .rpc
        .iter()
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .filter_map(|url| match (url.contains(API_KEY_PLACEHOLDER), api_key) {
            (false, _) => Some(url.clone()),
            (true, None) => None,
            (true, Some(key)) => Some(
                url.replace(&format!("${{{API_KEY_PLACEHOLDER}}}"), key)
                    .replace(API_KEY_PLACEHOLDER, key),
            ),
        })
        // Templates for other providers' keys cannot be filled in.
        .filter(|url| !url.contains("${"))
        .collect()
}

pub struct EndpointRegistry {
    client: reqwest::Client,
    url: String,
}

impl EndpointRegistry {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn fetch_chains(&self) -> Result<Vec<ChainInfo>, RelayError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(format!("fetching {}", self.url))
                } else {
                    RelayError::ChainUnavailable(format!("unable to fetch chains.json: {e}"))
                }
            })?;

        response
            .json::<Vec<ChainInfo>>()
            .await
            .map_err(|e| RelayError::ChainUnavailable(format!("unable to decode chains.json: {e}")))
    }

    // Picks one usable endpoint for `network` uniformly at random.
    pub async fn resolve(&self, network: &str, api_key: Option<&str>) -> Result<String, RelayError> {
        let chains = self.fetch_chains().await?;
        let candidates = candidate_urls(&chains, network, api_key);
        tracing::debug!(network, candidates = candidates.len(), "Resolved RPC candidates");

        candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| RelayError::EndpointNotFound(network.to_string()))
    }
}

pub struct ChainClient {
    provider: Provider<Http>,
    timeout: Duration,
}

impl ChainClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RelayError::Config(format!("invalid RPC URL {rpc_url}: {e}")))?;
        Ok(Self { provider, timeout })
    }

    // Connects to `rpc_url` when given, otherwise to an endpoint from the registry.
    pub async fn connect(
        network: &str,
        rpc_url: Option<&str>,
        registry: &EndpointRegistry,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let url = match rpc_url {
            Some(url) => url.to_string(),
            None => registry.resolve(network, api_key).await?,
        };
        // The URL may embed the API key, so it stays out of info-level logs.
        tracing::info!(network, "Chain client configured");
        tracing::debug!("RPC URL: {}", url);
        Self::new(&url, timeout)
    }
}

#[async_trait]
impl TransactionSource for ChainClient {
    async fn fetch_transaction(&self, hash: H256) -> Result<TransactionView, RelayError> {
        let tx = tokio::time::timeout(self.timeout, self.provider.get_transaction(hash))
            .await
            .map_err(|_| RelayError::Timeout(format!("eth_getTransactionByHash {hash:#x}")))?
            .map_err(|e| RelayError::ChainUnavailable(format!("failed to get transaction: {e}")))?
            .ok_or(RelayError::TransactionNotFound(hash))?;

        Ok(TransactionView::from(tx))
    }

    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.provider.get_block_number()).await {
            Ok(Ok(block)) => {
                tracing::debug!(%block, "Chain RPC reachable");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Chain RPC error: {}", e);
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U256};

    fn registry_json() -> &'static str {
        r#"[
            {"name": "Ethereum Mainnet", "chainId": 1, "rpc": [
                "https://mainnet.infura.io/v3/${INFURA_API_KEY}",
                "wss://mainnet.infura.io/ws/v3/${INFURA_API_KEY}",
                "https://eth-mainnet.alchemyapi.io/v2/${ALCHEMY_API_KEY}",
                "https://api.mycryptoapi.com/eth",
                "https://cloudflare-eth.com"
            ]},
            {"name": "Sepolia", "chainId": 11155111, "rpc": []}
        ]"#
    }

    fn chains() -> Vec<ChainInfo> {
        serde_json::from_str(registry_json()).unwrap()
    }

    #[test]
    fn placeholder_urls_dropped_without_key() {
        let urls = candidate_urls(&chains(), "Ethereum Mainnet", None);
        assert_eq!(
            urls,
            vec!["https://api.mycryptoapi.com/eth", "https://cloudflare-eth.com"]
        );
    }

    #[test]
    fn placeholder_substituted_with_key() {
        let urls = candidate_urls(&chains(), "Ethereum Mainnet", Some("k3y"));
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://mainnet.infura.io/v3/k3y");
        assert!(urls.iter().all(|u| !u.starts_with("wss://")));
    }

    #[test]
    fn unknown_or_empty_network_has_no_candidates() {
        assert!(candidate_urls(&chains(), "Nowhere", None).is_empty());
        assert!(candidate_urls(&chains(), "Sepolia", Some("k3y")).is_empty());
    }

    #[tokio::test]
    async fn resolve_picks_from_registry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/chains.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(registry_json())
            .expect(2)
            .create_async()
            .await;

        let registry =
            EndpointRegistry::new(format!("{}/chains.json", server.url()), Duration::from_secs(5))
                .unwrap();
        let url = registry.resolve("Ethereum Mainnet", None).await.unwrap();
        assert!(url == "https://api.mycryptoapi.com/eth" || url == "https://cloudflare-eth.com");

        let err = registry.resolve("Sepolia", None).await.unwrap_err();
        assert!(matches!(err, RelayError::EndpointNotFound(name) if name == "Sepolia"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn registry_outage_is_chain_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/chains.json")
            .with_status(503)
            .create_async()
            .await;

        let registry =
            EndpointRegistry::new(format!("{}/chains.json", server.url()), Duration::from_secs(5))
                .unwrap();
        let err = registry.resolve("Ethereum Mainnet", None).await.unwrap_err();
        assert!(matches!(err, RelayError::ChainUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_transaction_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":null}"#)
            .create_async()
            .await;

        let client = ChainClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let hash = H256::repeat_byte(0x11);
        let err = client.fetch_transaction(hash).await.unwrap_err();
        assert!(matches!(err, RelayError::TransactionNotFound(h) if h == hash));
    }

    #[tokio::test]
    async fn unmined_transaction_is_reported_pending() {
        let mut server = mockito::Server::new_async().await;
        let hash = format!("0x{}", "22".repeat(32));
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 0,
            "result": {
                "hash": hash,
                "nonce": "0x1",
                "blockHash": null,
                "blockNumber": null,
                "transactionIndex": null,
                "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "to": "0x4242424242424242424242424242424242424242",
                "value": "0x470de4df820000",
                "gasPrice": "0x3b9aca00",
                "gas": "0x5208",
                "input": "0x",
                "v": "0x1b",
                "r": "0x1",
                "s": "0x1"
            }
        });
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = ChainClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let view = client
            .fetch_transaction(H256::repeat_byte(0x22))
            .await
            .unwrap();
        assert!(view.pending);
        assert_eq!(view.value, U256::from(20_000_000_000_000_000u64));
        assert_eq!(view.recipient, Some(Address::repeat_byte(0x42)));
    }

    #[tokio::test]
    async fn rpc_error_is_chain_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32000,"message":"boom"}}"#)
            .create_async()
            .await;

        let client = ChainClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_transaction(H256::repeat_byte(0x33))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ChainUnavailable(_)));
        assert!(!client.is_reachable().await);
    }
}
