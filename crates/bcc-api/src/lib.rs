//! Typed Rust client for the Baidu Cloud Compute (BCC) instance API.
//!
//! Covers the subset needed for managing cluster nodes:
//! instances (create, get, delete).

mod types;

pub use types::*;

const API_PREFIX: &str = "/v2";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bcc api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("bcc api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    /// True when the API answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the BCC REST API.
///
/// Request signing is out of scope: `authorization` is sent verbatim in the
/// `Authorization` header of every request.
#[derive(Clone)]
pub struct BccClient {
    endpoint: String,
    authorization: String,
    http: reqwest::Client,
}

impl BccClient {
    pub fn new(endpoint: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            authorization: authorization.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.endpoint)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Instances ────────────────────────────────────────────────────

    /// Create `req.purchase_count` instances; returns the new instance ids.
    pub async fn create_instances(&self, req: &CreateInstanceRequest) -> Result<Vec<String>> {
        let client_token = uuid::Uuid::new_v4().to_string();
        let resp = self
            .http
            .post(self.url("/instance"))
            .query(&[("clientToken", client_token.as_str())])
            .header("Authorization", &self.authorization)
            .json(req)
            .send()
            .await?;

        let body: CreateInstanceResponse = Self::check(resp, "create instance")
            .await?
            .json()
            .await?;
        Ok(body.instance_ids)
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        let resp = self
            .http
            .get(self.url(&format!("/instance/{instance_id}")))
            .header("Authorization", &self.authorization)
            .send()
            .await?;

        let body: GetInstanceResponse = Self::check(resp, "get instance")
            .await?
            .json()
            .await?;
        Ok(body.instance)
    }

    pub async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/instance/{instance_id}")))
            .header("Authorization", &self.authorization)
            .send()
            .await?;

        Self::check(resp, "delete instance").await?;
        Ok(())
    }
}
