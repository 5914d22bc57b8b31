//! Mutation dispatchers: one per operator form.
//!
//! Each dispatcher issues a single write call and keeps its own
//! [`FormStatus`]; failures stay in that status and never reach the
//! dashboard's `error`. All but [`PredictDispatcher`] request a dashboard
//! refresh after a successful write.

use crate::api::{
    ApiError, ClusterRequest, DashboardApi, OptimizeRequest, PredictRequest, UpdateBinAck,
    UpdateBinRequest,
};
use crate::orchestrator::{RefreshHandle, RefreshOutcome};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Per-form submission state.
#[derive(Debug, Clone, PartialEq)]
pub struct FormStatus<T> {
    pub in_flight: bool,
    pub error: Option<String>,
    /// Result of the last successful submission.
    pub last: Option<T>,
}

impl<T> Default for FormStatus<T> {
    fn default() -> Self {
        Self {
            in_flight: false,
            error: None,
            last: None,
        }
    }
}

struct StatusCell<T>(watch::Sender<FormStatus<T>>);

impl<T: Clone> StatusCell<T> {
    fn new() -> Self {
        Self(watch::channel(FormStatus::default()).0)
    }

    fn begin(&self) {
        self.0.send_modify(|s| {
            s.in_flight = true;
            s.error = None;
        });
    }

    fn settle(&self, form: &'static str, result: &Result<T, ApiError>) {
        self.0.send_modify(|s| {
            s.in_flight = false;
            match result {
                Ok(value) => s.last = Some(value.clone()),
                Err(e) => {
                    warn!(form, error = %e, "Submission failed");
                    s.error = Some(e.to_string());
                }
            }
        });
    }

    fn snapshot(&self) -> FormStatus<T> {
        self.0.borrow().clone()
    }
}

/// A write that succeeded, with the refresh it set off.
#[derive(Debug)]
pub struct Dispatched<T> {
    pub response: T,
    pub refresh: JoinHandle<RefreshOutcome>,
}

/// Full/not-full prediction. Has no effect on stored bins, so it never
/// refreshes the dashboard.
pub struct PredictDispatcher {
    api: Arc<dyn DashboardApi>,
    status: StatusCell<bool>,
}

impl PredictDispatcher {
    pub fn new(api: Arc<dyn DashboardApi>) -> Self {
        Self {
            api,
            status: StatusCell::new(),
        }
    }

    /// Returns whether the backend predicts the bin to be full.
    #[tracing::instrument(skip(self), fields(area = %req.area_type, weather = %req.weather))]
    pub async fn submit(&self, req: PredictRequest) -> Result<bool, ApiError> {
        self.status.begin();
        let result = self.api.predict_bin(&req).await.map(|r| r.is_full);
        self.status.settle("predict", &result);
        if let Ok(is_full) = result {
            info!(is_full, "Prediction received");
        }
        result
    }

    pub fn status(&self) -> FormStatus<bool> {
        self.status.snapshot()
    }
}

pub struct UpdateBinDispatcher {
    api: Arc<dyn DashboardApi>,
    refresh: RefreshHandle,
    status: StatusCell<UpdateBinAck>,
}

impl UpdateBinDispatcher {
    pub fn new(api: Arc<dyn DashboardApi>, refresh: RefreshHandle) -> Self {
        Self {
            api,
            refresh,
            status: StatusCell::new(),
        }
    }

    #[tracing::instrument(skip_all, fields(bin_id = req.id))]
    pub async fn submit(
        &self,
        req: UpdateBinRequest,
    ) -> Result<Dispatched<UpdateBinAck>, ApiError> {
        self.status.begin();
        let result = self.api.update_bin(&req).await;
        self.status.settle("update_bin", &result);
        let ack = result?;
        info!(fields = ?ack.updated_fields, "Bin updated");
        Ok(Dispatched {
            response: ack,
            refresh: self.refresh.request(),
        })
    }

    pub fn status(&self) -> FormStatus<UpdateBinAck> {
        self.status.snapshot()
    }
}

pub struct ClusterDispatcher {
    api: Arc<dyn DashboardApi>,
    refresh: RefreshHandle,
    status: StatusCell<()>,
}

impl ClusterDispatcher {
    pub fn new(api: Arc<dyn DashboardApi>, refresh: RefreshHandle) -> Self {
        Self {
            api,
            refresh,
            status: StatusCell::new(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, truck_count: NonZeroU32) -> Result<Dispatched<()>, ApiError> {
        self.status.begin();
        let result = self.api.cluster_bins(&ClusterRequest { truck_count }).await;
        self.status.settle("cluster", &result);
        result?;
        info!("Bins reclustered");
        Ok(Dispatched {
            response: (),
            refresh: self.refresh.request(),
        })
    }

    pub fn status(&self) -> FormStatus<()> {
        self.status.snapshot()
    }
}

pub struct OptimizeDispatcher {
    api: Arc<dyn DashboardApi>,
    refresh: RefreshHandle,
    status: StatusCell<()>,
}

impl OptimizeDispatcher {
    pub fn new(api: Arc<dyn DashboardApi>, refresh: RefreshHandle) -> Self {
        Self {
            api,
            refresh,
            status: StatusCell::new(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, req: OptimizeRequest) -> Result<Dispatched<()>, ApiError> {
        self.status.begin();
        let result = self.api.optimize_routes(&req).await;
        self.status.settle("optimize", &result);
        result?;
        info!("Routes optimized");
        Ok(Dispatched {
            response: (),
            refresh: self.refresh.request(),
        })
    }

    pub fn status(&self) -> FormStatus<()> {
        self.status.snapshot()
    }
}

/// The four forms of the dashboard sidebar, wired to one backend and one
/// dashboard.
pub struct Dispatchers {
    pub predict: PredictDispatcher,
    pub update_bin: UpdateBinDispatcher,
    pub cluster: ClusterDispatcher,
    pub optimize: OptimizeDispatcher,
}

impl Dispatchers {
    pub fn new(api: Arc<dyn DashboardApi>, refresh: RefreshHandle) -> Self {
        Self {
            predict: PredictDispatcher::new(api.clone()),
            update_bin: UpdateBinDispatcher::new(api.clone(), refresh.clone()),
            cluster: ClusterDispatcher::new(api.clone(), refresh.clone()),
            optimize: OptimizeDispatcher::new(api, refresh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AreaType, Weather};
    use crate::color::RED;
    use crate::orchestrator::{Dashboard, RefreshOptions, ViewState};
    use crate::render::render_map;
    use crate::testing::{FakeApi, bin};
    use serde_json::json;

    async fn mounted(api: &Arc<FakeApi>) -> (Dashboard, Dispatchers) {
        let dashboard = Dashboard::mount(api.clone(), RefreshOptions::default());
        dashboard
            .subscribe()
            .wait_for(|s| !s.loading)
            .await
            .unwrap();
        let dispatchers = Dispatchers::new(api.clone(), dashboard.refresh_handle());
        (dashboard, dispatchers)
    }

    fn marker_color(view: &ViewState, id: i64) -> crate::color::Color {
        render_map(&view.bins, &view.routes)
            .markers
            .into_iter()
            .find(|m| m.bin_id == id)
            .unwrap()
            .color
    }

    #[tokio::test]
    async fn test_update_bin_refreshes_and_turns_marker_red() {
        let api = FakeApi::with_summary(12, 3);
        api.set_bins(vec![bin(5, Some(20.0)), bin(6, Some(10.0))]);
        let (dashboard, forms) = mounted(&api).await;
        let reads_before = api.read_calls();

        let dispatched = forms
            .update_bin
            .submit(UpdateBinRequest::new(5).fill_percent(91.0))
            .await
            .unwrap();
        assert_eq!(dispatched.response.updated_bin, Some(5));
        assert_eq!(dispatched.refresh.await.unwrap(), RefreshOutcome::Applied);

        assert_eq!(api.read_calls(), reads_before + 4);
        assert_eq!(marker_color(&dashboard.view(), 5), RED);
        assert_eq!(
            api.writes(),
            vec![("/update_bin", json!({ "Bin_ID": 5, "Fill_Level": 91.0 }))]
        );
        assert_eq!(forms.update_bin.status().error, None);
        assert!(!forms.update_bin.status().in_flight);
    }

    #[tokio::test]
    async fn test_predict_does_not_refresh() {
        let api = FakeApi::with_summary(1, 1);
        api.set_predict_full(true);
        let (_dashboard, forms) = mounted(&api).await;
        let reads_before = api.read_calls();

        let req = PredictRequest {
            area_type: AreaType::Commercial,
            hours_since_collection: 30.0,
            weather: Weather::Rain,
        };
        assert!(forms.predict.submit(req).await.unwrap());
        tokio::task::yield_now().await;

        assert_eq!(api.read_calls(), reads_before);
        assert_eq!(forms.predict.status().last, Some(true));
    }

    #[tokio::test]
    async fn test_failure_stays_local_to_form() {
        let api = FakeApi::with_summary(1, 1);
        let (dashboard, forms) = mounted(&api).await;
        let reads_before = api.read_calls();

        api.fail("/cluster_bins", "Bin data is empty");
        let err = forms
            .cluster
            .submit(NonZeroU32::new(3).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bin data is empty");
        assert_eq!(
            forms.cluster.status().error.as_deref(),
            Some("Bin data is empty")
        );
        assert_eq!(dashboard.view().error, None);
        assert_eq!(api.read_calls(), reads_before);

        let dispatched = forms
            .optimize
            .submit(OptimizeRequest::default())
            .await
            .unwrap();
        assert_eq!(dispatched.refresh.await.unwrap(), RefreshOutcome::Applied);
        assert_eq!(forms.optimize.status().error, None);
        assert_eq!(
            forms.cluster.status().error.as_deref(),
            Some("Bin data is empty")
        );
    }

    #[tokio::test]
    async fn test_cluster_success_refreshes() {
        let api = FakeApi::with_summary(1, 1);
        let (_dashboard, forms) = mounted(&api).await;

        let dispatched = forms
            .cluster
            .submit(NonZeroU32::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(dispatched.refresh.await.unwrap(), RefreshOutcome::Applied);
        assert_eq!(api.writes(), vec![("/cluster_bins", json!({ "num_trucks": 2 }))]);
        assert_eq!(forms.cluster.status().last, Some(()));
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_submit() {
        let api = FakeApi::with_summary(1, 1);
        let (_dashboard, forms) = mounted(&api).await;

        api.fail("/optimize_routes", "no bins");
        assert!(forms.optimize.submit(OptimizeRequest::default()).await.is_err());
        api.clear_failures();
        forms
            .optimize
            .submit(OptimizeRequest::default())
            .await
            .unwrap();
        assert_eq!(forms.optimize.status().error, None);
    }

    #[tokio::test]
    async fn test_refresh_after_unmount_is_noop() {
        let api = FakeApi::with_summary(1, 1);
        let (dashboard, forms) = mounted(&api).await;
        dashboard.unmount();

        let dispatched = forms
            .cluster
            .submit(NonZeroU32::new(1).unwrap())
            .await
            .unwrap();
        assert_eq!(dispatched.refresh.await.unwrap(), RefreshOutcome::Unmounted);
    }
}
