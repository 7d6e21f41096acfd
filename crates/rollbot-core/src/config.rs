use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChatId, Network, NetworkSelection},
    errors::Error,
    routing::Routing,
    Result,
};

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub rollbar_mainnet_token: String,
    pub rollbar_testnet_token: String,

    // Destinations
    pub routing: Routing,
    pub command_chats: Vec<i64>,

    // Scan loop
    pub network: NetworkSelection,
    pub pages_to_check: u32,
    pub check_interval: Duration,

    // Backend
    pub rollbar_api_base: String,
    pub rollbar_web_base: String,
    pub http_timeout: Duration,

    // Storage
    pub data_dir: PathBuf,

    // Telegram limits
    pub telegram_safe_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = required(&get, "TELEGRAM_BOT_TOKEN")?;
        let rollbar_mainnet_token = required(&get, "ROLLBAR_MAINNET_TOKEN")?;
        let rollbar_testnet_token = required(&get, "ROLLBAR_TESTNET_TOKEN")?;

        let routing = Routing {
            critical: required_chat(&get, "ROLLBAR_CHAT_CRITICAL")?,
            error: required_chat(&get, "ROLLBAR_CHAT_ERROR")?,
            warning: required_chat(&get, "ROLLBAR_CHAT_WARNING")?,
            info: required_chat(&get, "ROLLBAR_CHAT_INFO")?,
            testnet: required_chat(&get, "ROLLBAR_CHAT_TESTNET")?,
        };
        let command_chats = parse_csv_i64(get("ROLLBOT_COMMAND_CHATS"));

        // Default matches the historical CLI default.
        let network = match get("NETWORK") {
            Some(v) => v.parse::<NetworkSelection>()?,
            None => NetworkSelection::Testnet,
        };

        let pages_to_check = parse_u64(&get, "ROLLBAR_PAGES_TO_CHECK")?.unwrap_or(5);
        if pages_to_check == 0 || pages_to_check > u32::MAX as u64 {
            return Err(Error::Config(
                "ROLLBAR_PAGES_TO_CHECK must be a positive integer".to_string(),
            ));
        }
        let wait_secs = parse_u64(&get, "ROLLBAR_WAIT_SECONDS")?.unwrap_or(10);
        if wait_secs == 0 {
            return Err(Error::Config(
                "ROLLBAR_WAIT_SECONDS must be at least 1".to_string(),
            ));
        }

        let rollbar_api_base = get("ROLLBAR_API_BASE")
            .unwrap_or_else(|| "https://api.rollbar.com/api/1".to_string())
            .trim_end_matches('/')
            .to_string();
        let rollbar_web_base = get("ROLLBAR_WEB_BASE")
            .unwrap_or_else(|| "https://rollbar.com".to_string())
            .trim_end_matches('/')
            .to_string();
        let http_timeout =
            Duration::from_secs(parse_u64(&get, "ROLLBAR_HTTP_TIMEOUT_SECS")?.unwrap_or(10));

        let data_dir = get("ROLLBOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let telegram_safe_limit = parse_u64(&get, "TELEGRAM_SAFE_LIMIT")?.unwrap_or(4000) as usize;

        Ok(Self {
            telegram_bot_token,
            rollbar_mainnet_token,
            rollbar_testnet_token,
            routing,
            command_chats,
            network,
            pages_to_check: pages_to_check as u32,
            check_interval: Duration::from_secs(wait_secs),
            rollbar_api_base,
            rollbar_web_base,
            http_timeout,
            data_dir,
            telegram_safe_limit,
        })
    }

    pub fn rollbar_token(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.rollbar_mainnet_token,
            Network::Testnet => &self.rollbar_testnet_token,
        }
    }

    /// Append-only log of reported item ids.
    pub fn ledger_path(&self, network: Network) -> PathBuf {
        self.data_dir
            .join(format!("rollbar_reported_ids{}.csv", network.file_suffix()))
    }

    /// Externally edited exclusion pattern list.
    pub fn exclusion_path(&self, network: Network) -> PathBuf {
        self.data_dir
            .join(format!("rollbar_exclusion_filter{}.csv", network.file_suffix()))
    }

    /// Id of the network's heartbeat message.
    pub fn status_message_path(&self, network: Network) -> PathBuf {
        self.data_dir
            .join(format!("rollbar_{}_message_id.csv", network.as_str()))
    }

    pub fn is_command_chat(&self, chat_id: ChatId) -> bool {
        self.command_chats.contains(&chat_id.0)
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key).ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn required_chat(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<ChatId> {
    let raw = required(get, key)?;
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Config(format!("{key} must be a numeric chat id, got {raw:?}")))
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
pub(crate) fn test_config(data_dir: impl Into<PathBuf>) -> Config {
    Config {
        telegram_bot_token: "x".to_string(),
        rollbar_mainnet_token: "main-token".to_string(),
        rollbar_testnet_token: "test-token".to_string(),
        routing: crate::routing::test_routing(),
        command_chats: vec![100, 200],
        network: NetworkSelection::Both,
        pages_to_check: 5,
        check_interval: Duration::from_secs(10),
        rollbar_api_base: "https://api.rollbar.com/api/1".to_string(),
        rollbar_web_base: "https://rollbar.com".to_string(),
        http_timeout: Duration::from_secs(10),
        data_dir: data_dir.into(),
        telegram_safe_limit: 4000,
    }
}
