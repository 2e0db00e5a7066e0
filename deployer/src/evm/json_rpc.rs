use std::fmt::Debug;

use async_trait::async_trait;
use error_stack::Report;
use ethers::providers::{Http, JsonRpcClient, ProviderError};
use ethers::types::{Address, BlockNumber, Bytes, U256};
use ethers::utils::serialize;
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::retry::{with_retry, RetryPolicy};
use crate::url::Url;

type Result<T> = error_stack::Result<T, ProviderError>;

/// Read access to the state of an EVM chain.
#[automock]
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn code_at(&self, address: Address) -> Result<Bytes>;
    async fn gas_price(&self) -> Result<U256>;
    async fn transaction_count(&self, address: Address) -> Result<U256>;
    async fn balance(&self, address: Address) -> Result<U256>;
    /// Executes a read-only call against the latest block and returns the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

#[derive(Clone)]
pub struct Client<P>
where
    P: JsonRpcClient,
{
    provider: P,
    retry_policy: RetryPolicy,
}

impl<P> Client<P>
where
    P: JsonRpcClient,
{
    pub fn new(provider: P, retry_policy: RetryPolicy) -> Self {
        Client {
            provider,
            retry_policy,
        }
    }

    pub async fn request<T, R>(&self, method: &str, params: T) -> Result<R>
    where
        T: Debug + Serialize + Clone + Send + Sync,
        R: DeserializeOwned + Send,
    {
        with_retry(
            || self.provider.request(method, params.clone()),
            self.retry_policy,
        )
        .await
        .map_err(Into::into)
        .map_err(Report::from)
    }
}

impl Client<Http> {
    pub fn new_http(url: &Url, retry_policy: RetryPolicy) -> Self {
        Client::new(Http::new(url.to_standard_url()), retry_policy)
    }
}

#[async_trait]
impl<P> ChainReader for Client<P>
where
    P: JsonRpcClient + Send + Sync + 'static,
{
    async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.request(
            "eth_getCode",
            [serialize(&address), serialize(&BlockNumber::Latest)],
        )
        .await
    }

    async fn gas_price(&self) -> Result<U256> {
        self.request("eth_gasPrice", ()).await
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        self.request(
            "eth_getTransactionCount",
            [serialize(&address), serialize(&BlockNumber::Latest)],
        )
        .await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.request(
            "eth_getBalance",
            [serialize(&address), serialize(&BlockNumber::Latest)],
        )
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.request(
            "eth_call",
            [
                json!({ "to": to, "data": data }),
                serialize(&BlockNumber::Latest),
            ],
        )
        .await
    }
}
