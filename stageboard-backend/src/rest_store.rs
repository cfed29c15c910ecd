/// Item Store and Stage Registry over the hosted backend's JSON routes:
///   GET  {board}/stages
///   GET  {board}/items              -> { stageKey: [Item, ...], ... }
///   POST {board}/move    {id, stage}
///   POST {board}/reorder {stage, ids}
///
/// Writes carry an `Idempotency-Key` header so a retried request is not
/// applied twice.
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stageboard_core::op::OpKey;
use stageboard_core::registry::default_stages;
use stageboard_core::storage::{ItemStore, StageRegistry, StoreError};
use stageboard_core::types::{BoardKind, Item, Stage};
use std::collections::BTreeMap;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Serialize)]
struct MoveBody<'a> {
    id: &'a str,
    stage: &'a str,
}

#[derive(Debug, Serialize)]
struct ReorderBody<'a> {
    stage: &'a str,
    ids: &'a [String],
}

#[derive(Clone)]
struct RestClient {
    client: reqwest::Client,
    board_url: String,
    api_token: Option<String>,
}

impl RestClient {
    fn new(board_url: &str, api_token: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            board_url: board_url.trim_end_matches('/').to_string(),
            api_token: api_token.map(str::to_string),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.board_url, route)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T, StoreError> {
        let request = self.authorize(self.client.get(self.url(route)));
        let response = checked(request.send().await.map_err(network_error)?).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("{}: {}", route, e)))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        route: &str,
        key: &OpKey,
        body: &B,
    ) -> Result<(), StoreError> {
        let request = self
            .authorize(self.client.post(self.url(route)))
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(body);
        checked(request.send().await.map_err(network_error)?).await?;
        Ok(())
    }
}

fn network_error(e: reqwest::Error) -> StoreError {
    StoreError::Network(e.to_string())
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(status_error(status.as_u16(), &text))
}

/// 4xx means the backend refused the write; anything else is transport trouble.
fn status_error(status: u16, body: &str) -> StoreError {
    let body = body.trim();
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };
    if (400..500).contains(&status) {
        StoreError::Rejected(message)
    } else {
        StoreError::Network(message)
    }
}

pub struct RestItemStore {
    rest: RestClient,
}

impl RestItemStore {
    pub fn new(board_url: &str, api_token: Option<&str>) -> Self {
        Self {
            rest: RestClient::new(board_url, api_token),
        }
    }
}

#[async_trait]
impl ItemStore for RestItemStore {
    async fn list_items_grouped_by_stage(&self) -> Result<BTreeMap<String, Vec<Item>>, StoreError> {
        self.rest.get("items").await
    }

    async fn update_item_stage(
        &self,
        key: &OpKey,
        item_id: &str,
        stage_key: &str,
    ) -> Result<(), StoreError> {
        log::debug!("[stageboard.rest.move] {} -> {} ({})", item_id, stage_key, key);
        self.rest
            .post(
                "move",
                key,
                &MoveBody {
                    id: item_id,
                    stage: stage_key,
                },
            )
            .await
    }

    async fn reorder_stage_items(
        &self,
        key: &OpKey,
        stage_key: &str,
        ordered_ids: &[String],
    ) -> Result<(), StoreError> {
        log::debug!(
            "[stageboard.rest.reorder] {} ({} items, {})",
            stage_key,
            ordered_ids.len(),
            key
        );
        self.rest
            .post(
                "reorder",
                key,
                &ReorderBody {
                    stage: stage_key,
                    ids: ordered_ids,
                },
            )
            .await
    }
}

/// Stages from the backend. A board the backend has no stages for yet
/// gets the preset for its kind.
pub struct RestStageRegistry {
    rest: RestClient,
    kind: BoardKind,
}

impl RestStageRegistry {
    pub fn new(board_url: &str, api_token: Option<&str>, kind: BoardKind) -> Self {
        Self {
            rest: RestClient::new(board_url, api_token),
            kind,
        }
    }
}

#[async_trait]
impl StageRegistry for RestStageRegistry {
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        let stages: Vec<Stage> = self.rest.get("stages").await?;
        if stages.is_empty() {
            log::info!(
                "[stageboard.rest.stages] Backend has no stages, using {:?} presets",
                self.kind
            );
            return Ok(default_stages(self.kind));
        }
        Ok(stages)
    }
}
