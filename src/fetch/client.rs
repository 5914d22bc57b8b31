use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for every backend call.
///
/// Wrappers such as [`ApiKey`](crate::fetch::auth::ApiKey) decorate an inner
/// client and forward the (possibly modified) request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
