// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger network configuration and deployed contract addresses.

/// Addresses of the contracts the engine talks to on one network.
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    /// Identity registry (`checkHash` / `registeredUsers`)
    pub identity_registry: &'static str,
    /// Salary-based loan contract
    pub loan_contract: &'static str,
    /// Settlement token (PYUSD) the loan contract disburses
    pub settlement_token: &'static str,
}

/// EVM network configuration.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    /// Short key used in configuration (`LEDGER_NETWORK`)
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
    /// Deployed contracts
    pub contracts: ContractAddresses,
}

/// Horizen testnet (default deployment).
pub const HORIZEN_TESTNET: NetworkConfig = NetworkConfig {
    key: "horizen",
    name: "Horizen Testnet",
    chain_id: 845320009,
    rpc_url: "https://horizen-rpc-testnet.appchain.base.org",
    explorer_url: "https://horizen-explorer-testnet.appchain.base.org",
    contracts: ContractAddresses {
        identity_registry: "0x964D28b5cC79af30210AC59AAd93a80E140Bd0cd",
        loan_contract: "0x4e6AE06ed9812C007Ec45C6b152389924C405b64",
        settlement_token: "0x1A463De40d1a508574a0Bd668Fbd063a5f161933",
    },
};

/// Celo Sepolia testnet.
pub const CELO_SEPOLIA: NetworkConfig = NetworkConfig {
    key: "celo-sepolia",
    name: "Celo Sepolia",
    chain_id: 11142220,
    rpc_url: "https://forno.celo-sepolia.celo-testnet.org",
    explorer_url: "https://celo-sepolia.blockscout.com",
    contracts: ContractAddresses {
        identity_registry: "0x964D28b5cC79af30210AC59AAd93a80E140Bd0cd",
        loan_contract: "0xA0F8E21B7DeafB489563B5428e42d26745c9EA52",
        settlement_token: "0x8fd308C3F8596b5d4b563dc530DD84eBE69da656",
    },
};

/// Ethereum Sepolia testnet.
pub const ETHEREUM_SEPOLIA: NetworkConfig = NetworkConfig {
    key: "sepolia",
    name: "Ethereum Sepolia",
    chain_id: 11155111,
    rpc_url: "https://sepolia.drpc.org",
    explorer_url: "https://sepolia.etherscan.io",
    contracts: ContractAddresses {
        identity_registry: "0x964D28b5cC79af30210AC59AAd93a80E140Bd0cd",
        loan_contract: "0xF50c0F7c0Baa07bB8A2d3730B71639493956611F",
        settlement_token: "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9",
    },
};

/// Kadena chainweb EVM testnet (chain 20).
pub const KADENA_TESTNET: NetworkConfig = NetworkConfig {
    key: "kadena",
    name: "Kadena EVM Testnet",
    chain_id: 5920,
    rpc_url: "https://evm-testnet.chainweb.com/chainweb/0.0/evm-testnet/chain/20/evm/rpc",
    explorer_url: "https://chain-20.evm-testnet-blockscout.chainweb.com",
    contracts: ContractAddresses {
        identity_registry: "0x964D28b5cC79af30210AC59AAd93a80E140Bd0cd",
        loan_contract: "0xA0F8E21B7DeafB489563B5428e42d26745c9EA52",
        settlement_token: "0x8fd308C3F8596b5d4b563dc530DD84eBE69da656",
    },
};

/// Every network this build knows about.
pub const SUPPORTED_NETWORKS: [NetworkConfig; 4] =
    [HORIZEN_TESTNET, CELO_SEPOLIA, ETHEREUM_SEPOLIA, KADENA_TESTNET];

/// Decimals of the PYUSD settlement token.
pub const SETTLEMENT_TOKEN_DECIMALS: u8 = 6;

/// Look up a network by its configuration key (case-insensitive).
pub fn network_by_key(raw: &str) -> Result<NetworkConfig, String> {
    let key = raw.trim().to_ascii_lowercase();
    SUPPORTED_NETWORKS
        .iter()
        .find(|n| n.key == key)
        .copied()
        .ok_or_else(|| {
            let known: Vec<&str> = SUPPORTED_NETWORKS.iter().map(|n| n.key).collect();
            format!("Unknown network `{raw}`; expected one of {}", known.join(", "))
        })
}
