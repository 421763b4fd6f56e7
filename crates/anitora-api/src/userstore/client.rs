use reqwest::Client;
use serde_json::json;

use super::error::UserStoreError;
use super::types::{encode_value, ListDocumentsResponse};
use crate::traits::{DocumentPatch, RemoteUserStore, UserDocument, Value};

const PAGE_SIZE: &str = "300";

/// Client for the Firestore REST v1 document API.
///
/// Watchlist mirror documents live at `users/{user_id}/watchlist/{item_id}`
/// under the configured project.
pub struct UserStoreClient {
    base_url: String,
    project_id: String,
    token: Option<String>,
    http: Client,
}

impl UserStoreClient {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            token: None,
            http: Client::new(),
        }
    }

    /// Attach the signed-in user's ID token as a bearer credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    fn collection_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}/watchlist", self.documents_root())
    }

    fn document_url(&self, user_id: &str, item_id: i64) -> String {
        format!("{}/{item_id}", self.collection_url(user_id))
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, UserStoreError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "user store API error");
            Err(UserStoreError::Api {
                status,
                message: body,
            })
        }
    }

    /// PATCH the given fields. One `updateMask.fieldPaths` per field gives
    /// Firestore's merge semantics: unlisted fields stay untouched.
    async fn patch_fields(
        &self,
        user_id: &str,
        item_id: i64,
        fields: Vec<(String, Value)>,
    ) -> Result<(), UserStoreError> {
        let mask: Vec<(&str, &str)> = fields
            .iter()
            .map(|(name, _)| ("updateMask.fieldPaths", name.as_str()))
            .collect();

        let mut body_fields = serde_json::Map::new();
        for (name, value) in &fields {
            body_fields.insert(name.clone(), encode_value(value));
        }

        let resp = self
            .apply_auth(self.http.patch(self.document_url(user_id, item_id)))
            .query(&mask)
            .json(&json!({ "fields": body_fields }))
            .send()
            .await?;

        Self::check_response(resp).await?;
        Ok(())
    }
}

impl RemoteUserStore for UserStoreClient {
    type Error = UserStoreError;

    async fn upsert_fields(
        &self,
        user_id: &str,
        item_id: i64,
        patch: DocumentPatch,
    ) -> Result<(), UserStoreError> {
        self.patch_fields(user_id, item_id, patch.into_fields())
            .await
    }

    async fn update_field(
        &self,
        user_id: &str,
        item_id: i64,
        field: &str,
        value: Value,
    ) -> Result<(), UserStoreError> {
        self.patch_fields(user_id, item_id, vec![(field.to_owned(), value)])
            .await
    }

    async fn delete_document(&self, user_id: &str, item_id: i64) -> Result<(), UserStoreError> {
        let resp = self
            .apply_auth(self.http.delete(self.document_url(user_id, item_id)))
            .send()
            .await?;

        // 404 means the document is already gone.
        if resp.status().as_u16() == 404 {
            return Ok(());
        }
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn fetch_all_documents(&self, user_id: &str) -> Result<Vec<UserDocument>, UserStoreError> {
        let url = self.collection_url(user_id);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("pageSize", PAGE_SIZE)];
            if let Some(token) = &page_token {
                query.push(("pageToken", token));
            }

            let resp = self
                .apply_auth(self.http.get(&url))
                .query(&query)
                .send()
                .await?;

            let resp = Self::check_response(resp).await?;
            let page: ListDocumentsResponse = resp
                .json()
                .await
                .map_err(|e| UserStoreError::Parse(e.to_string()))?;

            documents.extend(
                page.documents
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| d.into_user_document()),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }
}
