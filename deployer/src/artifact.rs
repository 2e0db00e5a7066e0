use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use error_stack::{bail, report, Result, ResultExt};
use ethers::abi::{encode, Token};
use ethers::types::{Bytes, H256};
use ethers::utils::keccak256;
use serde::Deserialize;
use thiserror::Error;

/// Chain family whose code hash is not the keccak256 of the deployed code.
const POLYGON_ZKEVM: &str = "polygon-zkevm";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("failed to read the contract artifact")]
    Read,
    #[error("invalid contract artifact")]
    Parse,
    #[error("contract artifact has no bytecode")]
    MissingBytecode,
    #[error("contract bytecode is empty")]
    EmptyBytecode,
    #[error("chain {0} uses a custom bytecode hash derivation and is not supported")]
    UnsupportedHashScheme(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    // foundry wraps the bytecode together with its link references
    Object { object: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    bytecode: Option<RawBytecode>,
    deployed_bytecode: Option<RawBytecode>,
}

/// Compiled contract as produced by hardhat or foundry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub contract_name: String,
    pub bytecode: Bytes,
    pub deployed_bytecode: Option<Bytes>,
}

impl Artifact {
    /// Resolves `artifact_path` to the artifact file of the contract. A directory is expected to
    /// follow the `<dir>/<Contract>.sol/<Contract>.json` layout.
    pub fn path(artifact_path: &Path, contract_name: &str) -> PathBuf {
        if artifact_path.extension().is_some_and(|ext| ext == "json") {
            artifact_path.to_path_buf()
        } else {
            artifact_path
                .join(format!("{contract_name}.sol"))
                .join(format!("{contract_name}.json"))
        }
    }

    pub fn load(artifact_path: &Path, contract_name: &str) -> Result<Self, Error> {
        let path = Self::path(artifact_path, contract_name);

        let content = fs::read_to_string(&path)
            .change_context(Error::Read)
            .attach_printable_lazy(|| path.display().to_string())?;

        Self::parse(contract_name, &content).attach_printable_lazy(|| path.display().to_string())
    }

    pub fn parse(contract_name: &str, content: &str) -> Result<Self, Error> {
        let raw: RawArtifact = serde_json::from_str(content).change_context(Error::Parse)?;

        let bytecode = raw
            .bytecode
            .map(decode)
            .transpose()?
            .ok_or_else(|| report!(Error::MissingBytecode))?;
        let deployed_bytecode = raw
            .deployed_bytecode
            .map(decode)
            .transpose()?
            .filter(|code| !code.is_empty());

        Ok(Artifact {
            contract_name: contract_name.to_string(),
            bytecode,
            deployed_bytecode,
        })
    }

    /// Creation code followed by the ABI encoded constructor arguments.
    pub fn init_code(&self, constructor_args: &[Token]) -> Bytes {
        [self.bytecode.as_ref(), encode(constructor_args).as_slice()]
            .concat()
            .into()
    }

    /// Hash the deployed contract is expected to have. Falls back to the creation code when the
    /// artifact carries no runtime code.
    pub fn predeploy_codehash(&self, chain_axelar_id: &str) -> Result<H256, Error> {
        code_hash(
            self.deployed_bytecode.as_ref().unwrap_or(&self.bytecode),
            chain_axelar_id,
        )
    }
}

pub fn code_hash(code: &Bytes, chain_axelar_id: &str) -> Result<H256, Error> {
    if code.is_empty() {
        bail!(Error::EmptyBytecode);
    }

    if chain_axelar_id.eq_ignore_ascii_case(POLYGON_ZKEVM) {
        bail!(Error::UnsupportedHashScheme(chain_axelar_id.to_string()));
    }

    Ok(H256::from(keccak256(code)))
}

fn decode(raw: RawBytecode) -> Result<Bytes, Error> {
    let hex = match raw {
        RawBytecode::Hex(hex) => hex,
        RawBytecode::Object { object } => object,
    };

    Bytes::from_str(hex.trim()).change_context(Error::Parse)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::str::FromStr;

    use ethers::abi::Token;
    use ethers::types::{Address, Bytes, H256};
    use serde_json::json;
    use tempfile::TempDir;

    use super::{code_hash, Artifact, Error};

    #[test]
    fn artifact_path_should_follow_the_hardhat_layout() {
        assert_eq!(
            Artifact::path(Path::new("artifacts/contracts"), "Operators"),
            Path::new("artifacts/contracts/Operators.sol/Operators.json")
        );
        assert_eq!(
            Artifact::path(Path::new("out/Multisig.json"), "Operators"),
            Path::new("out/Multisig.json")
        );
    }

    #[test]
    fn hardhat_and_foundry_artifacts_should_be_normalized() {
        let hardhat = Artifact::parse(
            "Operators",
            &json!({ "bytecode": "0x6080", "deployedBytecode": "0x60aa" }).to_string(),
        )
        .unwrap();
        let foundry = Artifact::parse(
            "Operators",
            &json!({
                "bytecode": { "object": "6080", "linkReferences": {} },
                "deployedBytecode": { "object": "0x60aa" }
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(hardhat, foundry);
        assert_eq!(hardhat.bytecode, Bytes::from_str("0x6080").unwrap());
        assert_eq!(
            hardhat.deployed_bytecode,
            Some(Bytes::from_str("0x60aa").unwrap())
        );
    }

    #[test]
    fn artifact_without_bytecode_should_be_rejected() {
        let err = Artifact::parse("Operators", r#"{ "abi": [] }"#).unwrap_err();
        assert_eq!(err.current_context(), &Error::MissingBytecode);

        let err = Artifact::parse("Operators", r#"{ "bytecode": "0xzz" }"#).unwrap_err();
        assert_eq!(err.current_context(), &Error::Parse);
    }

    #[test]
    fn load_should_read_from_disk() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Multisig.sol");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Multisig.json"), r#"{ "bytecode": "0x00" }"#).unwrap();

        let artifact = Artifact::load(tmp.path(), "Multisig").unwrap();
        assert_eq!(artifact.bytecode, Bytes::from(vec![0u8]));
        assert_eq!(artifact.deployed_bytecode, None);

        let err = Artifact::load(tmp.path(), "Operators").unwrap_err();
        assert_eq!(err.current_context(), &Error::Read);
    }

    #[test]
    fn init_code_should_append_encoded_constructor_args() {
        let artifact = Artifact::parse("Operators", r#"{ "bytecode": "0x6080" }"#).unwrap();
        let owner = Address::from_low_u64_be(0xff);

        let init_code = artifact.init_code(&[Token::Address(owner)]);

        assert_eq!(init_code.len(), 34);
        assert_eq!(&init_code[..2], &[0x60, 0x80]);
        assert_eq!(init_code[33], 0xff);
        assert_eq!(artifact.init_code(&[]), artifact.bytecode);
    }

    #[test]
    fn predeploy_codehash_should_prefer_deployed_bytecode() {
        let artifact = Artifact::parse(
            "Operators",
            &json!({ "bytecode": "0x6080", "deployedBytecode": "0x00" }).to_string(),
        )
        .unwrap();

        assert_eq!(
            artifact.predeploy_codehash("ethereum").unwrap(),
            H256::from_str("0xbc36789e7a1e281436464229828f817d6612f7b477d66591ff96a9e064bcc98a")
                .unwrap()
        );

        let without_runtime_code = Artifact::parse(
            "Operators",
            &json!({ "bytecode": "0x00", "deployedBytecode": "0x" }).to_string(),
        )
        .unwrap();
        assert_eq!(
            without_runtime_code.predeploy_codehash("ethereum").unwrap(),
            artifact.predeploy_codehash("ethereum").unwrap()
        );
    }

    #[test]
    fn code_hash_should_reject_empty_code_and_unsupported_chains() {
        let code = Bytes::from(vec![0u8]);

        assert_eq!(
            code_hash(&Bytes::new(), "ethereum").unwrap_err().current_context(),
            &Error::EmptyBytecode
        );
        assert_eq!(
            code_hash(&code, "Polygon-zkEVM").unwrap_err().current_context(),
            &Error::UnsupportedHashScheme("Polygon-zkEVM".to_string())
        );
    }
}
