use std::sync::OnceLock;
use std::{env, str::FromStr, time::Duration};

use alloy::primitives::Address;
use dotenv::dotenv;

#[derive(Clone, Debug)]
pub struct FeatureFlags {
    pub print_raw_logs: bool,
}

/// Historical paging and real-time retry knobs.
#[derive(Clone, Debug)]
pub struct IngestSettings {
    pub start_block: u64,
    pub log_chunk_size: u64,
    pub sub_retry_max_attempts: u32,
    pub sub_retry_base_delay: Duration,
    pub merge_buffer: usize,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub ws_rpc_url: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub fee_collector: Address,
    pub http_bind: String,
    pub ingest: IngestSettings,
    pub flags: FeatureFlags,
}

impl Config {
    pub fn load() -> eyre::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `load()` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ws_rpc_url = lookup("WS_RPC_URL")
            .unwrap_or_else(|| "ws://127.0.0.1:8545".to_string());
        if !(ws_rpc_url.starts_with("ws://")
            || ws_rpc_url.starts_with("wss://"))
        {
            eyre::bail!(
                "WS_RPC_URL must start with ws:// or wss://, got: {}",
                ws_rpc_url
            );
        }
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| eyre::eyre!("DATABASE_URL is required"))?;

        let fee_s = lookup("FEE_COLLECTOR_ADDRESS")
            .ok_or_else(|| eyre::eyre!("FEE_COLLECTOR_ADDRESS is required"))?;
        if !fee_s.starts_with("0x") {
            eyre::bail!(
                "FEE_COLLECTOR_ADDRESS must start with 0x, got: {}",
                fee_s
            );
        }
        if fee_s.len() != 42 {
            eyre::bail!(
                "FEE_COLLECTOR_ADDRESS must be a 20-byte hex address (42 chars with 0x), got len {}: {}",
                fee_s.len(),
                fee_s
            );
        }
        let fee_collector = Address::from_str(&fee_s)
            .map_err(|e| eyre::eyre!("Invalid FEE_COLLECTOR_ADDRESS: {}", e))?;

        let start_block = lookup("START_BLOCK")
            .ok_or_else(|| eyre::eyre!("START_BLOCK is required"))?;
        let start_block = start_block.parse::<u64>().map_err(|e| {
            eyre::eyre!("Invalid START_BLOCK {:?}: {}", start_block, e)
        })?;

        let log_chunk_size: u64 = parse_or(&lookup, "LOG_CHUNK_SIZE", 2000)?;
        if log_chunk_size == 0 {
            eyre::bail!("LOG_CHUNK_SIZE must be at least 1");
        }
        let sub_retry_max_attempts: u32 =
            parse_or(&lookup, "SUB_RETRY_MAX_ATTEMPTS", 3)?;
        if sub_retry_max_attempts == 0 {
            eyre::bail!("SUB_RETRY_MAX_ATTEMPTS must be at least 1");
        }
        let base_ms: u64 = parse_or(&lookup, "SUB_RETRY_BASE_DELAY_MS", 1000)?;
        let merge_buffer: usize = parse_or(&lookup, "MERGE_BUFFER", 1024)?;
        let db_max_connections: u32 =
            parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;

        let http_bind = lookup("HTTP_BIND")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        let flags = FeatureFlags {
            print_raw_logs: lookup("PRINT_RAW_LOGS").as_deref() == Some("1"),
        };

        Ok(Self {
            ws_rpc_url,
            database_url,
            db_max_connections,
            fee_collector,
            http_bind,
            ingest: IngestSettings {
                start_block,
                log_chunk_size,
                sub_retry_max_attempts,
                sub_retry_base_delay: Duration::from_millis(base_ms),
                merge_buffer: merge_buffer.max(1),
            },
            flags,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> eyre::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| eyre::eyre!("Invalid {} {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load `.env` plus the process environment into the global config. Call once at startup.
pub fn init_from_env() -> eyre::Result<&'static Config> {
    dotenv().ok();
    let cfg = Config::load()?;
    Ok(CONFIG.get_or_init(|| cfg))
}
