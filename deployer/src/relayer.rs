use async_trait::async_trait;
use error_stack::{report, Result, ResultExt};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::to_checksum;
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("failed to reach the relayer")]
    Request,
    #[error("invalid relayer response")]
    InvalidResponse,
    #[error("relayer rejected the transaction: {0}")]
    Rejected(String),
}

/// A transaction handed to a relay service instead of being submitted by the local wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRequest {
    /// Axelar id of the destination chain
    pub chain: String,
    pub to: String,
    pub calldata: String,
    pub value: String,
}

impl RelayRequest {
    pub fn new(chain_axelar_id: &str, to: Address, calldata: &Bytes, value: U256) -> Self {
        RelayRequest {
            chain: chain_axelar_id.to_string(),
            to: to_checksum(&to, None),
            calldata: calldata.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    relay_id: Option<Value>,
}

#[automock]
#[async_trait]
pub trait Relayer: Send + Sync {
    /// Submits the request and returns the id the relay service assigned to it.
    async fn relay(&self, request: &RelayRequest) -> Result<String, Error>;
}

pub struct HttpRelayer {
    url: Url,
    client: Client,
}

impl HttpRelayer {
    pub fn new(url: Url) -> Self {
        HttpRelayer {
            url,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Relayer for HttpRelayer {
    async fn relay(&self, request: &RelayRequest) -> Result<String, Error> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .change_context(Error::Request)
            .attach_printable_lazy(|| self.url.to_string())?
            .text()
            .await
            .change_context(Error::Request)?;

        let relay_id = parse_response(&response)?;
        info!(chain = request.chain, relay_id, "transaction relayed");

        Ok(relay_id)
    }
}

pub(crate) fn parse_response(response: &str) -> Result<String, Error> {
    let response: RelayResponse = serde_json::from_str(response)
        .change_context(Error::InvalidResponse)
        .attach_printable_lazy(|| response.to_string())?;

    match (response.error, response.relay_id) {
        (Some(error), _) if !error.is_null() => Err(report!(Error::Rejected(display(&error)))),
        (_, Some(relay_id)) if !relay_id.is_null() => Ok(display(&relay_id)),
        _ => Err(report!(Error::InvalidResponse)),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethers::types::{Address, Bytes, U256};
    use serde_json::json;

    use super::{parse_response, Error, RelayRequest};

    #[test]
    fn request_should_serialize_value_as_decimal_string() {
        let request = RelayRequest::new(
            "Avalanche",
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap(),
            &Bytes::from(vec![0x12, 0x34]),
            U256::exp10(18),
        );

        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "chain": "Avalanche",
                "to": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                "calldata": "0x1234",
                "value": "1000000000000000000",
            })
        );
    }

    #[test]
    fn relay_id_should_be_returned() {
        assert_eq!(parse_response(r#"{"relayId":"abc-1"}"#).unwrap(), "abc-1");
        assert_eq!(parse_response(r#"{"relayId":42}"#).unwrap(), "42");
    }

    #[test]
    fn error_field_should_be_reported() {
        let err = parse_response(r#"{"error":"insufficient funds","relayId":"abc"}"#).unwrap_err();
        assert_eq!(
            err.current_context(),
            &Error::Rejected("insufficient funds".to_string())
        );

        let err = parse_response("not json").unwrap_err();
        assert_eq!(err.current_context(), &Error::InvalidResponse);

        let err = parse_response("{}").unwrap_err();
        assert_eq!(err.current_context(), &Error::InvalidResponse);
    }
}
