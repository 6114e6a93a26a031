//! HTTP/JSON backend client used by the gateway binary.
//!
//! # Responsibilities
//! - Connect: a `GET /ping` answered with 2xx within the connect timeout
//! - Liveness: re-probe `/ping` periodically; the first failure is the
//!   client's fatal error event
//! - Domain calls the gateway itself needs (authenticate, entry lookup,
//!   token resolution)
//!
//! # Design Decisions
//! - One client type serves every kind; the kind only selects the endpoint
//! - A probe failure ends the client; recovery is the supervisor's job

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::backend::client::{
    AuthCache, BackendCallError, BackendClient, BackendConnector, ClientEvent, ConnectError,
    EntryMetadata, JobExecution, KeyDirectory, MetadataIndex, Placement, Streaming,
};
use crate::backend::kind::BackendKind;
use crate::config::BackendEndpoint;
use crate::resilience::timeouts::with_connect_timeout;
use crate::security::{Credentials, Principal};

/// Creates `HttpBackendClient`s for one backend kind.
pub struct HttpBackendConnector {
    kind: BackendKind,
    base: Url,
    connect_timeout: Duration,
    probe_interval: Duration,
    http: reqwest::Client,
}

impl HttpBackendConnector {
    pub fn new(
        kind: BackendKind,
        endpoint: &BackendEndpoint,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let unreachable = |reason: String| ConnectError::Unreachable {
            target: endpoint.url.clone(),
            reason,
        };
        let mut base = Url::parse(&endpoint.url).map_err(|e| unreachable(e.to_string()))?;
        // `Url::join` replaces the last segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("storage-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| unreachable(e.to_string()))?;

        Ok(Self {
            kind,
            base,
            connect_timeout,
            probe_interval: Duration::from_secs(endpoint.probe_interval_secs),
            http,
        })
    }

    async fn establish(&self) -> Result<Arc<HttpBackendClient>, ConnectError> {
        let client = HttpBackendClient {
            kind: self.kind,
            base: self.base.clone(),
            http: self.http.clone(),
            probe_interval: self.probe_interval,
            request_timeout: self.connect_timeout,
        };
        let target = self.base.to_string();
        with_connect_timeout(&target, self.connect_timeout, async {
            client.ping().await.map_err(|reason| ConnectError::Unreachable {
                target: target.clone(),
                reason,
            })
        })
        .await?;
        Ok(Arc::new(client))
    }
}

/// A live HTTP backend client.
pub struct HttpBackendClient {
    kind: BackendKind,
    base: Url,
    http: reqwest::Client,
    probe_interval: Duration,
    request_timeout: Duration,
}

impl HttpBackendClient {
    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base.join(path).map_err(|e| e.to_string())
    }

    async fn ping(&self) -> Result<(), String> {
        let url = self.endpoint("ping")?;
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("ping returned {}", response.status()))
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, BackendCallError> {
        let url = self.endpoint(path).map_err(BackendCallError::Failed)?;
        self.http
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendCallError::Failed(e.to_string()))
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    fn describe(&self) -> String {
        format!("{} {}", self.kind, self.base)
    }

    async fn closed(&self) -> ClientEvent {
        let mut ticker = tokio::time::interval(self.probe_interval);
        // The first tick completes immediately; connect already probed.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(reason) = self.ping().await {
                return ClientEvent::Error(reason);
            }
        }
    }
}

#[async_trait]
impl AuthCache for HttpBackendClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, BackendCallError> {
        let response = self.post_json("authenticate", credentials).await?;
        match response.status() {
            StatusCode::OK => response
                .json::<Principal>()
                .await
                .map_err(|e| BackendCallError::Failed(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(
                BackendCallError::Rejected(format!("auth cache returned {}", response.status())),
            ),
            other => Err(BackendCallError::Failed(format!("auth cache returned {other}"))),
        }
    }
}

#[async_trait]
impl MetadataIndex for HttpBackendClient {
    async fn entry(&self, key: &str) -> Result<Option<EntryMetadata>, BackendCallError> {
        let mut url = self.endpoint("entries").map_err(BackendCallError::Failed)?;
        url.query_pairs_mut().append_pair("key", key);
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| BackendCallError::Failed(e.to_string()))?;
        match response.status() {
            StatusCode::OK => response
                .json::<EntryMetadata>()
                .await
                .map(Some)
                .map_err(|e| BackendCallError::Failed(e.to_string())),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(BackendCallError::Failed(format!("metadata index returned {other}"))),
        }
    }
}

#[derive(Serialize)]
struct TokenLookup<'a> {
    token: &'a str,
}

#[async_trait]
impl KeyDirectory for HttpBackendClient {
    async fn resolve_token(&self, token: &str) -> Result<Option<Principal>, BackendCallError> {
        let response = self.post_json("tokens/resolve", &TokenLookup { token }).await?;
        match response.status() {
            StatusCode::OK => response
                .json::<Principal>()
                .await
                .map(Some)
                .map_err(|e| BackendCallError::Failed(e.to_string())),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(BackendCallError::Failed(format!("key directory returned {other}"))),
        }
    }
}

impl Placement for HttpBackendClient {}
impl JobExecution for HttpBackendClient {}
impl Streaming for HttpBackendClient {}

macro_rules! http_connector_for {
    ($($contract:ident),* $(,)?) => {
        $(
            #[async_trait]
            impl BackendConnector<dyn $contract> for HttpBackendConnector {
                async fn connect(&self) -> Result<Arc<dyn $contract>, ConnectError> {
                    let client: Arc<dyn $contract> = self.establish().await?;
                    Ok(client)
                }
            }
        )*
    };
}

http_connector_for!(Placement, MetadataIndex, AuthCache, JobExecution, Streaming, KeyDirectory);
