//! Rollbar adapter: pages of recent occurrences from the `instances` endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use rollbot_core::{
    config::Config,
    domain::{Item, Network, Severity},
    errors::Error,
    ports::ItemSource,
    Result,
};

#[derive(Clone, Debug)]
pub struct RollbarClient {
    api_base: String,
    mainnet_token: String,
    testnet_token: String,
    http: reqwest::Client,
}

impl RollbarClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("rollbar http client: {e}")))?;
        Ok(Self {
            api_base: cfg.rollbar_api_base.clone(),
            mainnet_token: cfg.rollbar_token(Network::Mainnet).to_string(),
            testnet_token: cfg.rollbar_token(Network::Testnet).to_string(),
            http,
        })
    }

    fn token(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_token,
            Network::Testnet => &self.testnet_token,
        }
    }
}

#[async_trait]
impl ItemSource for RollbarClient {
    async fn fetch_page(&self, network: Network, page: u32) -> Result<Vec<Item>> {
        let url = format!("{}/instances/", self.api_base);
        let resp = self
            .http
            .get(&url)
            .query(&[("page", page)])
            .header("X-Rollbar-Access-Token", self.token(network))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("rollbar request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "rollbar {network} page {page} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("rollbar read error: {e}")))?;
        let items = decode_instances(&body)?;
        tracing::debug!(%network, page, count = items.len(), "fetched rollbar page");
        Ok(items)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<InstancePage>,
}

#[derive(Debug, Default, Deserialize)]
struct InstancePage {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: u64,
    data: InstanceData,
}

#[derive(Debug, Deserialize)]
struct InstanceData {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    message: Option<MessageBody>,
    #[serde(default)]
    trace: Option<Trace>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Trace {
    #[serde(default)]
    exception: Option<TraceException>,
}

#[derive(Debug, Deserialize)]
struct TraceException {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Body {
    fn text(&self) -> String {
        if let Some(body) = self.message.as_ref().and_then(|m| m.body.as_ref()) {
            return body.clone();
        }
        match self.trace.as_ref().and_then(|t| t.exception.as_ref()) {
            Some(exc) => match (&exc.class, &exc.message) {
                (Some(class), Some(msg)) => format!("{class}: {msg}"),
                (Some(class), None) => class.clone(),
                (None, Some(msg)) => msg.clone(),
                (None, None) => String::new(),
            },
            None => String::new(),
        }
    }
}

impl From<Instance> for Item {
    fn from(inst: Instance) -> Self {
        let data = inst.data;
        Item {
            id: inst.id,
            uuid: data.uuid.unwrap_or_default(),
            severity: Severity::parse(data.level.as_deref().unwrap_or("")),
            environment: data.environment.unwrap_or_default(),
            timestamp: data.timestamp.unwrap_or_default(),
            message: data.body.map(|b| b.text()).unwrap_or_default(),
        }
    }
}

/// Decode an `instances` response body, newest first as served.
pub fn decode_instances(body: &str) -> Result<Vec<Item>> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| Error::Transport(format!("rollbar decode error: {e}")))?;
    Ok(envelope
        .result
        .map(|page| page.instances.into_iter().map(Item::from).collect())
        .unwrap_or_default())
}
