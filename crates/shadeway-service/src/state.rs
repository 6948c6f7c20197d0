//! Application state for the HTTP service.
//!
//! Handlers reach the [`ShadeRouter`] through this state. Route planning is
//! CPU bound and may block on building downloads, so handlers hand the router
//! to `spawn_blocking` rather than calling it on the async executor.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shadeway_lib::{
    load_geojson, BuildingSource, OverpassSource, ShadeRouter, ShadewayConfig, StaticSource,
};

/// Environment variable naming a GeoJSON building file to serve instead of
/// querying Overpass.
pub const BUILDINGS_PATH_ENV: &str = "SHADEWAY_BUILDINGS";

/// Shared application state for all axum handlers.
///
/// Cheaply cloneable; share it via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    router: Arc<ShadeRouter>,
    request_timeout: Duration,
}

impl AppState {
    /// Wrap a constructed router. The request budget comes from
    /// `performance.max_request_timeout_secs`.
    pub fn new(router: ShadeRouter) -> Self {
        let timeout = Duration::from_secs(router.config().performance.max_request_timeout_secs);
        Self::with_request_timeout(router, timeout)
    }

    pub fn with_request_timeout(router: ShadeRouter, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                router: Arc::new(router),
                request_timeout,
            }),
        }
    }

    /// Build the router from [`ShadewayConfig::from_env`].
    ///
    /// Buildings come from the GeoJSON file named by `SHADEWAY_BUILDINGS` when
    /// set, otherwise from the configured Overpass endpoints.
    pub fn from_env() -> shadeway_lib::Result<Self> {
        let config = ShadewayConfig::from_env()?;
        let source: Arc<dyn BuildingSource> = match env::var(BUILDINGS_PATH_ENV) {
            Ok(path) => {
                let buildings = load_geojson(Path::new(&path))?;
                tracing::info!(
                    path = %path,
                    buildings = buildings.len(),
                    "serving buildings from file"
                );
                Arc::new(StaticSource::new(buildings))
            }
            Err(_) => {
                let source = OverpassSource::new(&config.osm, &config.performance)?;
                tracing::info!(
                    endpoints = source.endpoints().len(),
                    "serving buildings from Overpass"
                );
                Arc::new(source)
            }
        };
        Ok(Self::new(ShadeRouter::new(config, source)?))
    }

    pub fn router(&self) -> &ShadeRouter {
        &self.inner.router
    }

    /// A handle that can be moved into a blocking task.
    pub fn router_arc(&self) -> Arc<ShadeRouter> {
        Arc::clone(&self.inner.router)
    }

    /// How long a handler waits for planning before answering 504.
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cell_size", &self.router().config().grid.cell_size_degrees)
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}
