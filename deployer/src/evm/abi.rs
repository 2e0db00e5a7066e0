//! Bindings for the contracts the deployer talks to. Only the functions that are actually called
//! are declared.

pub mod deployer {
    use ethers::contract::abigen;

    abigen!(
        IDeployer,
        r#"[
            function deploy(bytes bytecode, bytes32 salt) external payable returns (address)
            function deployedAddress(bytes bytecode, address sender, bytes32 salt) external view returns (address)
        ]"#
    );
}

pub mod multisig {
    use ethers::contract::abigen;

    abigen!(
        IMultisig,
        r#"[
            function executeContract(address target, bytes callData, uint256 nativeValue) external payable returns (bytes)
            function withdraw(address recipient, uint256 amount) external
            function executeMultisigProposal(address target, bytes callData, uint256 nativeValue) external payable
            function isSigner(address account) external view returns (bool)
            function getSignerVotesCount(bytes32 topic) external view returns (uint256)
            function hasSignerVoted(address signer, bytes32 topic) external view returns (bool)
            function signerThreshold() external view returns (uint256)
            function signerEpoch() external view returns (uint256)
            function signerAccounts() external view returns (address[])
        ]"#
    );
}

pub mod gateway {
    use ethers::contract::abigen;

    abigen!(
        IAxelarGateway,
        r#"[
            function setTokenMintLimits(string[] symbols, uint256[] limits) external
            function transferMintLimiter(address newMintLimiter) external
            function tokenAddresses(string symbol) external view returns (address)
            function tokenMintLimit(string symbol) external view returns (uint256)
        ]"#
    );
}

pub mod its {
    use ethers::contract::abigen;

    abigen!(
        IInterchainTokenService,
        r#"[
            function setFlowLimits(bytes32[] tokenIds, uint256[] flowLimits) external
            function validTokenManagerAddress(bytes32 tokenId) external view returns (address)
            function isOperator(address addr) external view returns (bool)
        ]"#
    );
}

pub mod token_manager {
    use ethers::contract::abigen;

    abigen!(
        ITokenManager,
        r#"[
            function flowLimit() external view returns (uint256)
        ]"#
    );
}
