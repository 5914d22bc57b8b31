//! Typed façade over the fleet backend's HTTP API.
//!
//! [`DashboardApi`] is the seam the orchestrator and dispatchers talk to;
//! [`ApiClient`] implements it over any [`HttpClient`].

mod error;
pub mod types;

pub use error::{ApiError, extract_detail};
pub use types::*;

use crate::fetch::HttpClient;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Read and write calls the dashboard makes against the backend.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET /clusters`: bins with their truck assignment.
    async fn clusters(&self) -> Result<Vec<Bin>, ApiError>;
    /// `GET /bin_fill_levels`
    async fn fill_levels(&self) -> Result<Vec<FillLevel>, ApiError>;
    /// `GET /routes`
    async fn routes(&self) -> Result<Vec<Route>, ApiError>;
    /// `GET /optimization_summary`
    async fn summary(&self) -> Result<Summary, ApiError>;
    /// `GET /model_info`
    async fn model_info(&self) -> Result<ModelInfo, ApiError>;

    async fn predict_bin(&self, req: &PredictRequest) -> Result<PredictResponse, ApiError>;
    async fn update_bin(&self, req: &UpdateBinRequest) -> Result<UpdateBinAck, ApiError>;
    async fn cluster_bins(&self, req: &ClusterRequest) -> Result<(), ApiError>;
    async fn optimize_routes(&self, req: &OptimizeRequest) -> Result<(), ApiError>;
}

pub struct ApiClient<C> {
    http: C,
    base_url: Url,
}

impl<C: HttpClient> ApiClient<C> {
    pub fn new(http: C, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    async fn send(&self, req: Request, path: &'static str) -> Result<Vec<u8>, ApiError> {
        let method = req.method().clone();
        let resp = self.http.execute(req).await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        debug!(%method, path, status = status.as_u16(), bytes = body.len(), "Backend responded");

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }
        Ok(body.to_vec())
    }

    async fn get<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, ApiError> {
        let req = Request::new(Method::GET, self.url(path)?);
        let body = self.send(req, path).await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { path, source })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &'static str,
        payload: &B,
    ) -> Result<Vec<u8>, ApiError> {
        let mut req = Request::new(Method::POST, self.url(path)?);
        let body = serde_json::to_vec(payload).map_err(ApiError::Encode)?;
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());
        self.send(req, path).await
    }
}

#[async_trait]
impl<C: HttpClient> DashboardApi for ApiClient<C> {
    async fn clusters(&self) -> Result<Vec<Bin>, ApiError> {
        self.get("/clusters").await
    }

    async fn fill_levels(&self) -> Result<Vec<FillLevel>, ApiError> {
        self.get("/bin_fill_levels").await
    }

    async fn routes(&self) -> Result<Vec<Route>, ApiError> {
        self.get("/routes").await
    }

    async fn summary(&self) -> Result<Summary, ApiError> {
        self.get("/optimization_summary").await
    }

    async fn model_info(&self) -> Result<ModelInfo, ApiError> {
        self.get("/model_info").await
    }

    async fn predict_bin(&self, req: &PredictRequest) -> Result<PredictResponse, ApiError> {
        let path = "/predict_bin";
        let body = self.post(path, req).await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { path, source })
    }

    async fn update_bin(&self, req: &UpdateBinRequest) -> Result<UpdateBinAck, ApiError> {
        let path = "/update_bin";
        let body = self.post(path, req).await?;
        match serde_json::from_slice(&body) {
            Ok(ack) => Ok(ack),
            Err(error) => {
                warn!(path, %error, "Unexpected update acknowledgement, ignoring it");
                Ok(UpdateBinAck::default())
            }
        }
    }

    async fn cluster_bins(&self, req: &ClusterRequest) -> Result<(), ApiError> {
        self.post("/cluster_bins", req).await.map(|_| ())
    }

    async fn optimize_routes(&self, req: &OptimizeRequest) -> Result<(), ApiError> {
        self.post("/optimize_routes", req).await.map(|_| ())
    }
}
