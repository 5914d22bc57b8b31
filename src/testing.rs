//! In-memory backend used by unit tests.

use crate::api::{
    ApiError, AreaType, Bin, ClusterRequest, DashboardApi, FillLevel, ModelInfo, OptimizeRequest,
    PredictRequest, PredictResponse, RawCoordinate, Route, Summary, TruckId, UpdateBinAck,
    UpdateBinRequest,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

pub fn bin(id: i64, fill: Option<f64>) -> Bin {
    Bin {
        id,
        area_type: AreaType::Residential,
        fill_percent: fill,
        latitude: Some(21.0 + id as f64 / 100.0),
        longitude: Some(72.0 + id as f64 / 100.0),
        truck_assignment: Some(TruckId::Number((id % 3).into())),
    }
}

pub fn route(coords: &[(f64, f64)]) -> Route {
    Route::from_coords(
        coords
            .iter()
            .map(|&(lat, lon)| RawCoordinate::Pair([lat, lon]))
            .collect(),
    )
}

#[derive(Default)]
struct Backend {
    bins: Vec<Bin>,
    routes: Vec<Route>,
    summary: Option<Summary>,
    failures: HashMap<&'static str, String>,
    gates: VecDeque<oneshot::Receiver<()>>,
    writes: Vec<(&'static str, serde_json::Value)>,
    predict_full: bool,
}

/// Fake [`DashboardApi`] whose data, failures and timing tests control.
pub struct FakeApi {
    backend: Mutex<Backend>,
    // (reads started, reads finished)
    reads: watch::Sender<(usize, usize)>,
}

impl FakeApi {
    pub fn with_summary(total_bins: u64, total_trucks: u64) -> Arc<Self> {
        let backend = Backend {
            summary: Some(Summary {
                total_bins,
                total_trucks,
            }),
            ..Default::default()
        };
        Arc::new(Self {
            backend: Mutex::new(backend),
            reads: watch::channel((0, 0)).0,
        })
    }

    pub fn set_bins(&self, bins: Vec<Bin>) {
        self.backend.lock().unwrap().bins = bins;
    }

    pub fn bins(&self) -> Vec<Bin> {
        self.backend.lock().unwrap().bins.clone()
    }

    pub fn set_routes(&self, routes: Vec<Route>) {
        self.backend.lock().unwrap().routes = routes;
    }

    pub fn routes(&self) -> Vec<Route> {
        self.backend.lock().unwrap().routes.clone()
    }

    pub fn set_predict_full(&self, full: bool) {
        self.backend.lock().unwrap().predict_full = full;
    }

    /// Makes every call to `path` fail with `detail` until cleared.
    pub fn fail(&self, path: &'static str, detail: &str) {
        self.backend
            .lock()
            .unwrap()
            .failures
            .insert(path, detail.to_string());
    }

    pub fn clear_failures(&self) {
        self.backend.lock().unwrap().failures.clear();
    }

    /// Parks the next `/clusters` read until the returned sender fires.
    pub fn hold_next_read(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.backend.lock().unwrap().gates.push_back(rx);
        tx
    }

    pub fn read_calls(&self) -> usize {
        self.reads.borrow().0
    }

    pub fn writes(&self) -> Vec<(&'static str, serde_json::Value)> {
        self.backend.lock().unwrap().writes.clone()
    }

    pub async fn wait_for_reads(&self, started: usize) {
        let mut rx = self.reads.subscribe();
        let _ = rx.wait_for(|(n, _)| *n >= started).await;
    }

    pub async fn wait_for_finished_reads(&self, finished: usize) {
        let mut rx = self.reads.subscribe();
        let _ = rx.wait_for(|(_, n)| *n >= finished).await;
    }

    fn check(&self, path: &'static str) -> Result<(), ApiError> {
        match self.backend.lock().unwrap().failures.get(path) {
            Some(detail) => Err(ApiError::Backend {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: Some(detail.clone()),
            }),
            None => Ok(()),
        }
    }

    fn read<T>(&self, path: &'static str, f: impl FnOnce(&Backend) -> T) -> Result<T, ApiError> {
        self.reads.send_modify(|(started, _)| *started += 1);
        let result = self.check(path).map(|_| f(&self.backend.lock().unwrap()));
        self.reads.send_modify(|(_, finished)| *finished += 1);
        result
    }

    fn write(&self, path: &'static str, payload: serde_json::Value) -> Result<(), ApiError> {
        self.check(path)?;
        self.backend.lock().unwrap().writes.push((path, payload));
        Ok(())
    }
}

#[async_trait]
impl DashboardApi for FakeApi {
    async fn clusters(&self) -> Result<Vec<Bin>, ApiError> {
        self.reads.send_modify(|(started, _)| *started += 1);
        let (bins, gate) = {
            let mut backend = self.backend.lock().unwrap();
            (backend.bins.clone(), backend.gates.pop_front())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let result = self.check("/clusters").map(|_| bins);
        self.reads.send_modify(|(_, finished)| *finished += 1);
        result
    }

    async fn fill_levels(&self) -> Result<Vec<FillLevel>, ApiError> {
        self.read("/bin_fill_levels", |b| {
            b.bins
                .iter()
                .map(|bin| FillLevel {
                    id: bin.id,
                    fill_percent: bin.fill_percent,
                })
                .collect()
        })
    }

    async fn routes(&self) -> Result<Vec<Route>, ApiError> {
        self.read("/routes", |b| b.routes.clone())
    }

    async fn summary(&self) -> Result<Summary, ApiError> {
        self.read("/optimization_summary", |b| {
            b.summary.clone().unwrap_or(Summary {
                total_bins: b.bins.len() as u64,
                total_trucks: 0,
            })
        })
    }

    async fn model_info(&self) -> Result<ModelInfo, ApiError> {
        self.read("/model_info", |b| ModelInfo {
            classification_model: Some("RandomForestClassifier".into()),
            clustering_model: Some("KMeans".into()),
            data_rows: Some(b.bins.len() as u64),
        })
    }

    async fn predict_bin(&self, req: &PredictRequest) -> Result<PredictResponse, ApiError> {
        self.write("/predict_bin", serde_json::to_value(req).unwrap())?;
        Ok(PredictResponse {
            is_full: self.backend.lock().unwrap().predict_full,
        })
    }

    async fn update_bin(&self, req: &UpdateBinRequest) -> Result<UpdateBinAck, ApiError> {
        self.write("/update_bin", serde_json::to_value(req).unwrap())?;
        let mut backend = self.backend.lock().unwrap();
        if let Some(fill) = req.fill_percent {
            for bin in backend.bins.iter_mut().filter(|b| b.id == req.id) {
                bin.fill_percent = Some(fill);
            }
        }
        Ok(UpdateBinAck {
            status: Some("success".into()),
            updated_bin: Some(req.id),
            updated_fields: Vec::new(),
        })
    }

    async fn cluster_bins(&self, req: &ClusterRequest) -> Result<(), ApiError> {
        self.write("/cluster_bins", serde_json::to_value(req).unwrap())
    }

    async fn optimize_routes(&self, req: &OptimizeRequest) -> Result<(), ApiError> {
        self.write("/optimize_routes", serde_json::to_value(req).unwrap())
    }
}
