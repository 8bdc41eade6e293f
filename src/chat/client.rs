// src/chat/client.rs
// HTTP client for the streaming chat endpoints

use std::time::Duration;

use reqwest::{header, Client, Response};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::error::ChatError;
use super::types::ChatPayload;
use crate::config::ClothoConfig;
use crate::stream::{SnapshotSink, StreamController, StreamMode, StreamOutcome, TailPolicy};

/// Which service answers the question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatService {
    /// Analysis backend, plain text body by default
    Backend,
    /// Agent service, `data: {json}` records
    Agent,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    backend_url: String,
    agent_url: String,
    backend_mode: StreamMode,
    tail: TailPolicy,
    apology: String,
}

impl ChatClient {
    pub fn from_config(config: &ClothoConfig) -> Result<Self, ChatError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            http,
            backend_url: join_url(&config.api_url, &config.chat_path)?,
            agent_url: join_url(&config.agent_url, &config.agent_path)?,
            backend_mode: config.stream_mode,
            tail: TailPolicy::from_flag(config.flush_tail),
            apology: config.apology.clone(),
        })
    }

    pub fn endpoint(&self, service: ChatService) -> &str {
        match service {
            ChatService::Backend => &self.backend_url,
            ChatService::Agent => &self.agent_url,
        }
    }

    pub fn mode(&self, service: ChatService) -> StreamMode {
        match service {
            ChatService::Backend => self.backend_mode,
            ChatService::Agent => StreamMode::PrefixedJson,
        }
    }

    /// POST the payload and check the status before any body is read
    pub async fn open(&self, service: ChatService, payload: &ChatPayload) -> Result<Response, ChatError> {
        let url = self.endpoint(service);
        info!("Opening chat stream: POST {}", url);

        let response = self
            .http
            .post(url)
            .header(header::ACCEPT, "text/event-stream, text/plain")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
            error!("Chat service error: {} - {}", status, body);
            return Err(ChatError::Status { status, body });
        }

        Ok(response)
    }

    /// Ask and stream the reply into `sink`. Never fails: transport errors
    /// end as the apology message in the outcome.
    pub async fn stream_reply<K>(
        &self,
        service: ChatService,
        payload: &ChatPayload,
        sink: &mut K,
        cancel: Option<CancellationToken>,
    ) -> StreamOutcome
    where
        K: SnapshotSink + ?Sized,
    {
        let mut controller = StreamController::new(self.mode(service))
            .with_tail_policy(self.tail)
            .with_apology(self.apology.clone());
        if let Some(token) = cancel {
            controller = controller.with_cancellation(token);
        }

        match self.open(service, payload).await {
            Ok(response) => controller.run(response.bytes_stream(), sink).await,
            Err(e) => controller.fail(&e, sink),
        }
    }
}

fn join_url(base: &str, path: &str) -> Result<String, ChatError> {
    let base = base.trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ChatError::InvalidUrl(base.to_string()));
    }
    if path.is_empty() {
        return Ok(base.to_string());
    }
    Ok(format!("{}/{}", base, path.trim_start_matches('/')))
}
