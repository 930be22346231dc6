use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::report::SiteStatus;
use crate::services::weather_service::WeatherClient;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: WeatherClient,
    /// Map of site_id to the state of its latest fit
    pub sites: Arc<RwLock<HashMap<String, SiteStatus>>>,
    pub started: Instant,
}

impl AppState {
    /// Every configured site starts as `Pending`.
    pub fn new(config: Arc<Config>, client: WeatherClient) -> Self {
        let sites = config
            .sites
            .iter()
            .map(|s| (s.id.clone(), SiteStatus::Pending))
            .collect();
        Self {
            config,
            client,
            sites: Arc::new(RwLock::new(sites)),
            started: Instant::now(),
        }
    }

    pub fn set_status(&self, site_id: &str, status: SiteStatus) {
        if let Ok(mut map) = self.sites.write() {
            map.insert(site_id.to_string(), status);
        }
    }

    /// Marks a site `Running` unless a fit is already in flight.
    ///
    /// Check and update happen under one write lock. `Err` carries the
    /// start time of the run that holds the site.
    pub fn try_start(&self, site_id: &str) -> Result<DateTime<Utc>, DateTime<Utc>> {
        let now = Utc::now();
        let Ok(mut map) = self.sites.write() else {
            return Ok(now);
        };
        if let Some(SiteStatus::Running { since }) = map.get(site_id) {
            return Err(*since);
        }
        map.insert(site_id.to_string(), SiteStatus::Running { since: now });
        Ok(now)
    }

    pub fn get_status(&self, site_id: &str) -> Option<SiteStatus> {
        if let Ok(map) = self.sites.read() {
            map.get(site_id).cloned()
        } else {
            None
        }
    }

    pub fn all(&self) -> HashMap<String, SiteStatus> {
        if let Ok(map) = self.sites.read() {
            map.clone()
        } else {
            HashMap::new()
        }
    }
}

/// Router state; handlers pick `State<AppState>` or `State<Arc<Config>>`.
#[derive(Clone, Debug)]
pub struct SharedState {
    pub app: AppState,
}

impl FromRef<SharedState> for AppState {
    fn from_ref(shared: &SharedState) -> Self {
        shared.app.clone()
    }
}

impl FromRef<SharedState> for Arc<Config> {
    fn from_ref(shared: &SharedState) -> Self {
        shared.app.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<Config> {
        Arc::new(
            serde_json::from_str(
                r#"{
                    "server": { "port": 0 },
                    "sites": [
                        { "id": "a", "name": "A", "latitude": 50.0, "longitude": 4.0, "profile_path": "a.csv" },
                        { "id": "b", "name": "B", "latitude": 45.0, "longitude": 7.0, "profile_path": "b.csv" }
                    ]
                }"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sites_start_pending_and_update() {
        let state = AppState::new(config(), WeatherClient::new().unwrap());
        assert_eq!(state.all().len(), 2);
        assert_eq!(state.get_status("a").map(|s| s.label()), Some("PENDING"));
        assert!(state.get_status("zzz").is_none());

        state.set_status("a", SiteStatus::Failed { message: "boom".into(), at: Utc::now() });
        let shared = state.clone();
        assert_eq!(shared.get_status("a").map(|s| s.label()), Some("FAILED"), "Clones share the map");
    }

    #[test]
    fn test_try_start_claims_site_once() {
        let state = AppState::new(config(), WeatherClient::new().unwrap());
        let since = state.try_start("a").expect("Pending site can start");
        assert_eq!(state.get_status("a").map(|s| s.label()), Some("RUNNING"));
        assert_eq!(state.clone().try_start("a"), Err(since), "Second claim must see the first run");
        assert!(state.try_start("b").is_ok(), "Sites are claimed independently");

        state.set_status("a", SiteStatus::Failed { message: "boom".into(), at: Utc::now() });
        assert!(state.try_start("a").is_ok(), "Finished sites can be refit");
    }
}
