use reqwest::Client;
use serde::Serialize;

/// Client for the identity provider's backend API.
///
/// Only used to write internal identifiers back into the provider's
/// public metadata. The local database stays the source of truth; the
/// provider's copy is a denormalized convenience for its own ecosystem.
pub struct ClerkClient {
    http_client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Metadata update rejected with status {0}")]
    Rejected(u16),
}

/// Body for the metadata merge endpoint.
#[derive(Debug, Serialize)]
struct MetadataUpdate<'a> {
    public_metadata: PublicMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PublicMetadata<'a> {
    #[serde(rename = "userDbId")]
    user_db_id: &'a str,
    #[serde(rename = "isAdmin")]
    is_admin: bool,
}

impl ClerkClient {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Merge the internal record ID and admin flag into the provider's
    /// public metadata for the given subject.
    pub async fn set_user_metadata(
        &self,
        external_id: &str,
        user_db_id: &str,
        is_admin: bool,
    ) -> Result<(), PropagationError> {
        let url = format!("{}/v1/users/{}/metadata", self.api_base, external_id);

        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(&self.secret_key)
            .json(&MetadataUpdate {
                public_metadata: PublicMetadata { user_db_id, is_admin },
            })
            .send()
            .await
            .map_err(|e| PropagationError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PropagationError::Rejected(response.status().as_u16()));
        }

        tracing::debug!("Propagated metadata for user {}", external_id);
        Ok(())
    }
}
