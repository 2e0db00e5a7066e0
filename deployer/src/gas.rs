use chains_config::{ChainConfig, RawGasOptions};
use error_stack::{bail, report, Result, ResultExt};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, U256};
use num_traits::ToPrimitive;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::evm::json_rpc::ChainReader;

const GAS_LIMIT: &str = "gasLimit";
const GAS_PRICE: &str = "gasPrice";
const MAX_PRIORITY_FEE_PER_GAS: &str = "maxPriorityFeePerGas";
const MAX_FEE_PER_GAS: &str = "maxFeePerGas";
const GAS_PRICE_ADJUSTMENT: &str = "gasPriceAdjustment";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid gas option field {0}")]
    InvalidGasField(String),
    #[error("failed to retrieve the gas price on chain {0}")]
    Network(String),
}

/// Validated gas settings for a single transaction. Unset fields are filled in by the wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
}

impl GasOptions {
    pub fn is_eip1559(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }

    /// Builds a transaction carrying these gas settings. Fee market fields select an EIP-1559
    /// transaction, a legacy transaction is built otherwise.
    pub fn transaction(&self, to: Option<Address>, data: Bytes, value: U256) -> TypedTransaction {
        if self.is_eip1559() {
            let mut tx = Eip1559TransactionRequest::new().data(data).value(value);
            tx.to = to.map(Into::into);
            tx.gas = self.gas_limit;
            tx.max_fee_per_gas = self.max_fee_per_gas;
            tx.max_priority_fee_per_gas = self.max_priority_fee_per_gas;
            tx.into()
        } else {
            let mut tx = TransactionRequest::new().data(data).value(value);
            tx.to = to.map(Into::into);
            tx.gas = self.gas_limit;
            tx.gas_price = self.gas_price;
            tx.into()
        }
    }
}

/// Resolves the gas options of a transaction from the layered configuration.
///
/// Layers replace each other as a whole, they are never merged field by field:
/// explicit override > contract options > chain options > none. Offline runs read the
/// `staticGasOptions` layers instead, since no gas price can be sampled.
pub struct GasPolicyResolver<R> {
    reader: R,
}

impl<R> GasPolicyResolver<R>
where
    R: ChainReader,
{
    pub fn new(reader: R) -> Self {
        GasPolicyResolver { reader }
    }

    pub async fn resolve(
        &self,
        chain: &ChainConfig,
        override_options: Option<&RawGasOptions>,
        contract_name: Option<&str>,
        offline: bool,
    ) -> Result<GasOptions, Error> {
        let raw = select_layer(chain, override_options, contract_name, offline);
        let (mut options, adjustment) = parse(&raw)?;

        if let (Some(adjustment), None) = (adjustment, options.gas_price) {
            let sampled = self
                .reader
                .gas_price()
                .await
                .change_context(Error::Network(chain.name.clone()))?;

            options.gas_price = Some(adjust(sampled, adjustment).ok_or_else(|| {
                report!(Error::InvalidGasField(GAS_PRICE_ADJUSTMENT.to_string()))
                    .attach_printable(format!("cannot apply {adjustment} to {sampled}"))
            })?);
        }

        info!(
            chain = chain.name,
            gas_options = serde_json::to_string(&options).unwrap_or_default(),
            "resolved gas options"
        );

        Ok(options)
    }
}

pub fn select_layer(
    chain: &ChainConfig,
    override_options: Option<&RawGasOptions>,
    contract_name: Option<&str>,
    offline: bool,
) -> RawGasOptions {
    let contract = contract_name.and_then(|name| chain.contract(name));

    let layer = if offline {
        override_options
            .or(contract.and_then(|contract| contract.static_gas_options.as_ref()))
            .or(chain.static_gas_options.as_ref())
    } else {
        override_options
            .or(contract.and_then(|contract| contract.gas_options.as_ref()))
            .or(chain.gas_options.as_ref())
    };

    layer.cloned().unwrap_or_default()
}

fn parse(raw: &RawGasOptions) -> Result<(GasOptions, Option<f64>), Error> {
    let mut options = GasOptions::default();
    let mut adjustment = None;

    for (field, value) in raw.iter() {
        match field.as_str() {
            GAS_LIMIT => options.gas_limit = Some(parse_amount(field, value)?),
            GAS_PRICE => options.gas_price = Some(parse_amount(field, value)?),
            MAX_PRIORITY_FEE_PER_GAS => {
                options.max_priority_fee_per_gas = Some(parse_amount(field, value)?)
            }
            MAX_FEE_PER_GAS => options.max_fee_per_gas = Some(parse_amount(field, value)?),
            GAS_PRICE_ADJUSTMENT => adjustment = Some(parse_factor(field, value)?),
            _ => bail!(Error::InvalidGasField(field.clone())),
        }
    }

    Ok((options, adjustment))
}

fn parse_amount(field: &str, value: &Value) -> Result<U256, Error> {
    let amount = match value {
        Value::Number(number) => number.as_u64().map(U256::from).or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0)
                .and_then(|float| float.to_u128())
                .map(U256::from)
        }),
        Value::String(string) => {
            let string = string.trim();
            match string.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16).ok(),
                None => U256::from_dec_str(string).ok(),
            }
        }
        _ => None,
    };

    amount.ok_or_else(|| {
        report!(Error::InvalidGasField(field.to_string())).attach_printable(value.to_string())
    })
}

fn parse_factor(field: &str, value: &Value) -> Result<f64, Error> {
    let factor = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(string) => string.trim().parse::<f64>().ok(),
        _ => None,
    };

    factor
        .filter(|factor| factor.is_finite() && *factor > 0.0)
        .ok_or_else(|| {
            report!(Error::InvalidGasField(field.to_string())).attach_printable(value.to_string())
        })
}

/// `floor(gas_price * adjustment)`
fn adjust(gas_price: U256, adjustment: f64) -> Option<U256> {
    if gas_price > U256::from(u128::MAX) {
        return None;
    }

    (gas_price.as_u128().to_f64()? * adjustment)
        .floor()
        .to_u128()
        .map(U256::from)
}
