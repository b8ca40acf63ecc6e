//! Nearby feed: a feed controller gated on a location fix.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use super::controller::FeedController;
use super::coordinator::FeedQueryCoordinator;
use super::observer::Subscription;
use super::state::FeedSnapshot;
use crate::error::FeedError;
use crate::models::{FeedDomain, FeedParams};
use crate::ports::{Coordinates, LocationProvider};
use crate::sync::lock;

/// Decimal places kept from a location fix. Three places is roughly 100m,
/// enough to keep GPS jitter from minting a new cache key on every refresh.
const COORDINATE_PRECISION: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum LocationStatus {
    Unknown,
    Acquiring,
    Acquired { latitude: f64, longitude: f64 },
    Denied,
}

fn round_coordinate(value: f64) -> f64 {
    let factor = 10f64.powi(COORDINATE_PRECISION);
    (value * factor).round() / factor
}

pub struct NearbyFeedController {
    feed: Arc<FeedController>,
    location: Arc<dyn LocationProvider>,
    base_params: FeedParams,
    status: Mutex<LocationStatus>,
}

impl NearbyFeedController {
    pub fn new(
        base_params: FeedParams,
        coordinator: Arc<FeedQueryCoordinator>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            feed: Arc::new(FeedController::new(
                FeedDomain::Nearby,
                base_params.clone(),
                coordinator,
            )),
            location,
            base_params,
            status: Mutex::new(LocationStatus::Unknown),
        }
    }

    pub fn feed(&self) -> &Arc<FeedController> {
        &self.feed
    }

    pub fn location_status(&self) -> LocationStatus {
        *lock(&self.status)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.feed.snapshot()
    }

    pub fn subscribe(&self, listener: impl Fn(&FeedSnapshot) + Send + Sync + 'static) -> Subscription {
        self.feed.subscribe(listener)
    }

    /// Acquire a fix, then fetch the first page around it. A refused
    /// permission lands in `error` with `PermissionDenied` and never fetches.
    pub async fn refresh(&self) -> FeedSnapshot {
        if !self.feed.begin_refresh() {
            return self.feed.snapshot();
        }
        *lock(&self.status) = LocationStatus::Acquiring;
        debug!("Acquiring location for nearby feed");

        let position = match self.location.current_position().await {
            Ok(position) => position,
            Err(e) => {
                if e == FeedError::PermissionDenied {
                    *lock(&self.status) = LocationStatus::Denied;
                    info!("Location permission denied; nearby feed unavailable");
                } else {
                    *lock(&self.status) = LocationStatus::Unknown;
                }
                return self.feed.fail(&e);
            }
        };

        let Coordinates { latitude, longitude } = position;
        *lock(&self.status) = LocationStatus::Acquired {
            latitude,
            longitude,
        };
        self.feed.retarget(self.params_for(position));
        self.feed.refresh_after_begin().await
    }

    /// Next page around the last fix. Never re-acquires location.
    pub async fn load_more(&self) -> FeedSnapshot {
        self.feed.load_more().await
    }

    /// Forget the last fix along with the feed, and go back to the
    /// location-free params.
    pub fn reset(&self) {
        *lock(&self.status) = LocationStatus::Unknown;
        self.feed.set_params(self.base_params.clone());
        self.feed.reset();
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }

    fn params_for(&self, position: Coordinates) -> FeedParams {
        self.base_params
            .clone()
            .with("lat", round_coordinate(position.latitude))
            .with("lng", round_coordinate(position.longitude))
    }
}
