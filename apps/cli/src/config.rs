use std::{collections::HashMap, fs, path::Path};

#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: String,
    pub chain_id: u64,
    pub contract_address: String,
    pub confirmation_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            chain_id: 11_155_111,
            contract_address: String::new(),
            confirmation_timeout_seconds: 120,
        }
    }
}

pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("rpc_url").and_then(|v| v.as_str()) {
                settings.rpc_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("chain_id").and_then(|v| v.as_integer()) {
                settings.chain_id = v as u64;
            }
            if let Some(v) = file_cfg.get("contract_address").and_then(|v| v.as_str()) {
                settings.contract_address = v.to_string();
            }
            if let Some(v) = file_cfg
                .get("confirmation_timeout_seconds")
                .and_then(|v| v.as_integer())
            {
                settings.confirmation_timeout_seconds = v as u64;
            }
        }
    }

    if let Ok(v) = std::env::var("DAPP_RPC_URL") {
        settings.rpc_url = v;
    }
    if let Ok(v) = std::env::var("DAPP_CHAIN_ID") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.chain_id = parsed;
        }
    }
    if let Ok(v) = std::env::var("DAPP_CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }
    if let Ok(v) = std::env::var("DAPP_CONFIRMATION_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.confirmation_timeout_seconds = parsed;
        }
    }

    settings
}
