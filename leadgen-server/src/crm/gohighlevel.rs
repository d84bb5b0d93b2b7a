//! GoHighLevel (LeadConnector) contacts API client

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{ContactPayload, CrmClient, CrmError};

const USER_AGENT: &str = concat!("leadgen-server/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2021-07-28";

#[derive(Debug, Deserialize)]
struct CreateContactResponse {
    contact: CreatedContact,
}

#[derive(Debug, Deserialize)]
struct CreatedContact {
    id: String,
}

pub struct GoHighLevelClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoHighLevelClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, CrmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CrmError::Setup(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn contacts_url(&self) -> String {
        format!("{}/contacts/", self.base_url)
    }

    fn workflow_url(&self, contact_id: &str, workflow_id: &str) -> String {
        format!("{}/contacts/{}/workflow/{}", self.base_url, contact_id, workflow_id)
    }
}

#[async_trait]
impl CrmClient for GoHighLevelClient {
    async fn create_contact(&self, payload: &ContactPayload) -> Result<String, CrmError> {
        let response = self
            .http_client
            .post(self.contacts_url())
            .bearer_auth(&self.api_key)
            .header("Version", API_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %error_text, "CRM contact API error response");
            return Err(CrmError::Api(status.as_u16(), error_text));
        }

        let created: CreateContactResponse = response
            .json()
            .await
            .map_err(|e| CrmError::Parse(e.to_string()))?;
        Ok(created.contact.id)
    }

    async fn add_to_workflow(&self, contact_id: &str, workflow_id: &str) -> Result<(), CrmError> {
        let response = self
            .http_client
            .post(self.workflow_url(contact_id, workflow_id))
            .bearer_auth(&self.api_key)
            .header("Version", API_VERSION)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CrmError::Api(status.as_u16(), error_text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client =
            GoHighLevelClient::new("https://services.leadconnectorhq.com/", "key".to_string()).unwrap();
        assert_eq!(client.contacts_url(), "https://services.leadconnectorhq.com/contacts/");
        assert_eq!(
            client.workflow_url("c1", "w2"),
            "https://services.leadconnectorhq.com/contacts/c1/workflow/w2"
        );
    }

    #[test]
    fn test_contact_id_parsed_from_nested_object() {
        let parsed: CreateContactResponse =
            serde_json::from_str(r#"{"contact":{"id":"abc","email":"x@y.z"},"traceId":"t"}"#).unwrap();
        assert_eq!(parsed.contact.id, "abc");
        assert!(serde_json::from_str::<CreateContactResponse>(r#"{"id":"abc"}"#).is_err());
    }
}
