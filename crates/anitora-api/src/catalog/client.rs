use reqwest::Client;

use super::error::CatalogError;
use super::types::{CatalogListResponse, CatalogNode};
use crate::traits::{CatalogItem, CatalogService, RankingKind};

/// Shared fields parameter for catalog anime queries.
const ANIME_FIELDS: &str =
    "id,title,main_picture,synopsis,mean,num_episodes,status,rank,popularity";

/// Client for the MAL-style catalog REST API (client-id auth, read-only).
pub struct CatalogClient {
    base_url: String,
    client_id: String,
    nsfw: bool,
    http: Client,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>, nsfw: bool) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            nsfw,
            http: Client::new(),
        }
    }

    fn nsfw_str(&self) -> &'static str {
        if self.nsfw {
            "true"
        } else {
            "false"
        }
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "catalog API error");
            Err(CatalogError::Api {
                status,
                message: body,
            })
        }
    }

    async fn fetch_list(&self, url: String, query: &[(&str, &str)]) -> Result<Vec<CatalogItem>, CatalogError> {
        let resp = self
            .http
            .get(url)
            .header("X-MAL-CLIENT-ID", &self.client_id)
            .query(query)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let list: CatalogListResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(list.data.into_iter().map(|n| n.node.into_item()).collect())
    }
}

impl CatalogService for CatalogClient {
    type Error = CatalogError;

    async fn ranking(&self, kind: RankingKind, limit: u32) -> Result<Vec<CatalogItem>, CatalogError> {
        self.fetch_list(
            format!("{}/v2/anime/ranking", self.base_url),
            &[
                ("ranking_type", kind.as_query_str()),
                ("limit", &limit.to_string()),
                ("fields", ANIME_FIELDS),
                ("nsfw", self.nsfw_str()),
            ],
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        self.fetch_list(
            format!("{}/v2/anime", self.base_url),
            &[
                ("q", query),
                ("limit", "10"),
                ("fields", ANIME_FIELDS),
                ("nsfw", self.nsfw_str()),
            ],
        )
        .await
    }

    async fn details(&self, id: i64) -> Result<Option<CatalogItem>, CatalogError> {
        let resp = self
            .http
            .get(format!("{}/v2/anime/{id}", self.base_url))
            .header("X-MAL-CLIENT-ID", &self.client_id)
            .query(&[("fields", ANIME_FIELDS)])
            .send()
            .await?;

        // An unknown id is not an error, just an absent item.
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }

        let resp = Self::check_response(resp).await?;
        let node: CatalogNode = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(Some(node.into_item()))
    }
}
