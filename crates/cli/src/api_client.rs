use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use vaxtrack_core::{DashboardStats, VaccinationRecord};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    /// URL of a single record; the ID is percent-encoded as one path segment.
    fn record_url(&self, cert_id: &str) -> Result<Url> {
        let mut url = self.url("/v1/vaccinations")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("server URL cannot carry a path"))?
            .push(cert_id);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let url = self.url("/v1/vaccinations")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    pub async fn get_record(&self, cert_id: &str) -> Result<VaccinationRecord> {
        let url = self.record_url(cert_id)?;
        let response: RecordResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.record)
    }

    pub async fn list_records(&self) -> Result<Vec<VaccinationRecord>> {
        let url = self.url("/v1/vaccinations")?;
        let response: RecordListResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.records)
    }

    pub async fn delete_record(&self, cert_id: &str) -> Result<MessageResponse> {
        let url = self.record_url(cert_id)?;
        self.send_json(self.http.delete(url)).await
    }

    pub async fn bulk_import(&self, records: Vec<Value>) -> Result<BulkImportResponse> {
        let url = self.url("/v1/vaccinations/bulk")?;
        let body = BulkImportRequest { records };
        self.send_json(self.http.post(url).json(&body)).await
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let url = self.url("/v1/dashboard")?;
        let response: DashboardResponse = self.send_json(self.http.get(url)).await?;
        Ok(response.stats)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/v1/health")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("health request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("health check failed ({status}): {body}");
        }

        Ok(response.json::<HealthResponse>().await?)
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub state: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub vaccine_type: String,
    pub dose: String,
    pub date_administered: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administering_officer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub cert_id: String,
    pub record: VaccinationRecord,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: VaccinationRecord,
}

#[derive(Debug, Deserialize)]
struct RecordListResponse {
    records: Vec<VaccinationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct BulkImportRequest {
    records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportResponse {
    pub message: String,
    pub inserted: usize,
    pub errors: usize,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    stats: DashboardStats,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
