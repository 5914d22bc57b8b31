//! CLI entry point for the fleet dashboard.
//!
//! Mounts the dashboard against the backend, keeps it refreshed, and exposes
//! the operator forms (update bin, cluster, optimize routes, predict) as
//! subcommands.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use fleet_dashboard::api::{
    AreaType, DEFAULT_DEPOT, DashboardApi, OptimizeRequest, PredictRequest, UpdateBinRequest,
    Weather,
};
use fleet_dashboard::config::DashboardConfig;
use fleet_dashboard::color::FillBand;
use fleet_dashboard::dispatch::{Dispatched, Dispatchers, PredictDispatcher};
use fleet_dashboard::orchestrator::{Dashboard, RefreshOrdering, RefreshOutcome, ViewState};
use fleet_dashboard::output::{append_record, log_panels, print_json, print_pretty, write_json};
use fleet_dashboard::render::MapPane;
use fleet_dashboard::stats::DashboardStats;
use std::ffi::OsStr;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fleet_dashboard")]
#[command(about = "Operator dashboard for a waste-collection fleet", long_about = None)]
struct Cli {
    /// Override the refresh interval in seconds
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Discard refresh results older than one already shown
    #[arg(long, global = true, default_value_t = false)]
    sequenced: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the dashboard and log every refresh until Ctrl+C
    Watch {
        /// Number of refreshes to show before exiting (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_samples: usize,

        /// CSV file to append a stats row to after each refresh
        #[arg(short, long)]
        record: Option<String>,
    },
    /// Load the dashboard once and print it
    Snapshot {
        /// Write the map pane as JSON to this file
        #[arg(long)]
        json: Option<String>,

        /// CSV file to append a stats row to
        #[arg(long)]
        csv: Option<String>,
    },
    /// List current bin fill levels
    FillLevels {
        /// Print the levels as JSON instead of one log line per bin
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Predict whether a bin is full
    Predict {
        #[arg(long, default_value = "residential")]
        area: AreaType,

        /// Hours since the bin was last collected
        #[arg(long, default_value_t = 12.0)]
        hours: f64,

        #[arg(long, default_value = "clear")]
        weather: Weather,
    },
    /// Update one bin; omitted fields are left unchanged
    UpdateBin {
        #[arg(long)]
        id: i64,

        /// New fill level in percent
        #[arg(long)]
        fill: Option<f64>,

        /// Hours since last collection
        #[arg(long)]
        hours: Option<f64>,

        #[arg(long)]
        weather: Option<Weather>,
    },
    /// Recompute truck clusters
    Cluster {
        /// Number of trucks to cluster bins into
        #[arg(short, long, default_value = "2")]
        trucks: NonZeroU32,
    },
    /// Recompute truck routes
    Optimize {
        #[arg(long, default_value_t = DEFAULT_DEPOT.0)]
        depot_lat: f64,

        #[arg(long, default_value_t = DEFAULT_DEPOT.1)]
        depot_lon: f64,

        #[arg(long, default_value = "2")]
        trucks_per_area: NonZeroU32,

        /// Ask the backend to save route maps
        #[arg(long, default_value_t = false)]
        save_maps: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env()?;
    if let Some(secs) = cli.interval.filter(|s| *s > 0) {
        config.refresh.interval = Duration::from_secs(secs);
    }
    if cli.sequenced {
        config.refresh.ordering = RefreshOrdering::Sequenced;
    }
    info!(config = ?config, "Configuration loaded");

    let api: Arc<dyn DashboardApi> = Arc::new(config.client()?);

    match cli.command {
        Commands::Watch {
            num_samples,
            record,
        } => {
            watch(api, &config, num_samples, record.as_deref()).await?;
        }
        Commands::Snapshot { json, csv } => {
            let dashboard = Dashboard::mount(api, config.refresh);
            let view = settled(&dashboard).await;
            log_panels(&view);

            let stats = DashboardStats::from_view(&view);
            print_pretty(&stats);
            if let Some(path) = csv {
                append_record(&path, &stats)?;
            }
            if let Some(path) = json {
                write_json(&path, &MapPane::for_view(&view))?;
                info!(path, "Map pane exported");
            }
            dashboard.unmount();

            if let Some(error) = view.error {
                bail!("dashboard refresh failed: {error}");
            }
        }
        Commands::FillLevels { json } => {
            let levels = api.fill_levels().await?;
            info!(total = levels.len(), "Fill levels fetched");
            if json {
                print_json(&levels)?;
                return Ok(());
            }
            for level in &levels {
                info!(
                    bin_id = level.id,
                    fill = level.fill_percent,
                    band = ?FillBand::of(level.fill_percent),
                    "Bin"
                );
            }
        }
        Commands::Predict {
            area,
            hours,
            weather,
        } => {
            let form = PredictDispatcher::new(api);
            let req = PredictRequest {
                area_type: area,
                hours_since_collection: hours,
                weather,
            };
            let is_full = form.submit(req).await?;
            info!(
                prediction = if is_full { "Full" } else { "Not Full" },
                "Prediction"
            );
        }
        Commands::UpdateBin {
            id,
            fill,
            hours,
            weather,
        } => {
            let req = UpdateBinRequest {
                id,
                fill_percent: fill,
                hours_since_collection: hours,
                weather,
            };
            let dashboard = Dashboard::mount(api.clone(), config.refresh);
            settled(&dashboard).await;
            let forms = Dispatchers::new(api, dashboard.refresh_handle());
            let dispatched = forms.update_bin.submit(req).await?;
            info!(fields = ?dispatched.response.updated_fields, "Update acknowledged");
            show_after(&dashboard, dispatched).await?;
        }
        Commands::Cluster { trucks } => {
            let dashboard = Dashboard::mount(api.clone(), config.refresh);
            settled(&dashboard).await;
            let forms = Dispatchers::new(api, dashboard.refresh_handle());
            let dispatched = forms.cluster.submit(trucks).await?;
            show_after(&dashboard, dispatched).await?;
        }
        Commands::Optimize {
            depot_lat,
            depot_lon,
            trucks_per_area,
            save_maps,
        } => {
            let req = OptimizeRequest {
                depot_lat,
                depot_lon,
                trucks_per_area,
                save_maps,
            };
            let dashboard = Dashboard::mount(api.clone(), config.refresh);
            settled(&dashboard).await;
            let forms = Dispatchers::new(api, dashboard.refresh_handle());
            let dispatched = forms.optimize.submit(req).await?;
            show_after(&dashboard, dispatched).await?;
        }
    }

    Ok(())
}

/// Waits until no refresh is in flight and returns the view.
async fn settled(dashboard: &Dashboard) -> ViewState {
    let mut rx = dashboard.subscribe();
    match rx.wait_for(|s| !s.loading).await {
        Ok(view) => view.clone(),
        Err(_) => dashboard.view(),
    }
}

/// Waits for the refresh a mutation set off and logs the resulting view.
async fn show_after<T>(dashboard: &Dashboard, dispatched: Dispatched<T>) -> Result<()> {
    match dispatched.refresh.await? {
        RefreshOutcome::Applied => {
            let view = settled(dashboard).await;
            log_panels(&view);
        }
        RefreshOutcome::Failed(error) => warn!(%error, "Refresh after mutation failed"),
        other => info!(outcome = ?other, "Refresh after mutation not applied"),
    }
    Ok(())
}

/// Keeps the dashboard mounted, logging each settled view, until the sample
/// limit is reached or Ctrl+C is pressed.
#[tracing::instrument(skip(api, config, record))]
async fn watch(
    api: Arc<dyn DashboardApi>,
    config: &DashboardConfig,
    num_samples: usize,
    record: Option<&str>,
) -> Result<()> {
    let dashboard = Dashboard::mount(api, config.refresh);
    let mut rx = dashboard.subscribe();

    if num_samples == 0 {
        info!(
            interval_secs = config.refresh.interval.as_secs(),
            "Watching indefinitely. Press Ctrl+C to stop."
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut sample_count = 0;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, unmounting");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                if view.loading {
                    continue;
                }

                sample_count += 1;
                log_panels(&view);
                let stats = DashboardStats::from_view(&view);
                info!(
                    sample = sample_count,
                    high_fill_pct = stats.high_fill_pct(),
                    "Dashboard sample"
                );
                if let Some(path) = record {
                    if let Err(e) = append_record(path, &stats) {
                        error!(path, error = %e, "Failed to record stats");
                    }
                }

                if num_samples > 0 && sample_count >= num_samples {
                    break;
                }
            }
        }
    }

    dashboard.unmount();
    info!(samples = sample_count, "Finished watching");
    Ok(())
}
