//! Access to the user's current position.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::coordinates::WGS84Coordinate;

/// Platform error codes, numbered like the W3C geolocation API.
pub const PERMISSION_DENIED: u16 = 1;
pub const POSITION_UNAVAILABLE: u16 = 2;
pub const TIMEOUT: u16 = 3;

/// Settings handed to the platform with every position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOptions {
  pub enable_high_accuracy: bool,
  pub timeout: Duration,
  /// Oldest cached fix the platform may answer with.
  pub maximum_age: Duration,
}

impl Default for PositionOptions {
  fn default() -> Self {
    Self {
      enable_high_accuracy: true,
      timeout: Duration::from_secs(10),
      maximum_age: Duration::from_secs(5 * 60),
    }
  }
}

/// A failure as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionError {
  pub code: u16,
  pub message: String,
}

impl PositionError {
  #[must_use]
  pub fn new(code: u16, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
    }
  }
}

/// Errors of [`Geolocator::current_location`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
  #[error("Geolocation is not supported on this device.")]
  Unsupported,
  #[error("Location permission denied.")]
  PermissionDenied,
  #[error("Location information is unavailable.")]
  PositionUnavailable,
  #[error("Location request timed out.")]
  Timeout,
  #[error("Unable to determine location: {0}")]
  Other(String),
}

impl From<PositionError> for GeolocationError {
  fn from(error: PositionError) -> Self {
    match error.code {
      PERMISSION_DENIED => GeolocationError::PermissionDenied,
      POSITION_UNAVAILABLE => GeolocationError::PositionUnavailable,
      TIMEOUT => GeolocationError::Timeout,
      code => GeolocationError::Other(format!("code {code}: {}", error.message)),
    }
  }
}

/// The platform's positioning capability.
#[async_trait::async_trait]
pub trait PositionProvider: Send + Sync {
  /// Human-readable name of the provider
  fn name(&self) -> &str;

  /// Whether the platform can position at all.
  fn is_supported(&self) -> bool {
    true
  }

  /// One position fix.
  async fn current_position(
    &self,
    options: &PositionOptions,
  ) -> Result<WGS84Coordinate, PositionError>;
}

/// Always answers with the same fix, e.g. from configuration or the command line.
pub struct FixedPosition {
  position: WGS84Coordinate,
}

impl FixedPosition {
  #[must_use]
  pub fn new(position: WGS84Coordinate) -> Self {
    Self { position }
  }
}

#[async_trait::async_trait]
impl PositionProvider for FixedPosition {
  fn name(&self) -> &'static str {
    "Fixed position"
  }

  async fn current_position(
    &self,
    _options: &PositionOptions,
  ) -> Result<WGS84Coordinate, PositionError> {
    Ok(self.position)
  }
}

/// A platform without positioning.
pub struct NoPositioning;

#[async_trait::async_trait]
impl PositionProvider for NoPositioning {
  fn name(&self) -> &'static str {
    "No positioning"
  }

  fn is_supported(&self) -> bool {
    false
  }

  async fn current_position(
    &self,
    _options: &PositionOptions,
  ) -> Result<WGS84Coordinate, PositionError> {
    Err(PositionError::new(POSITION_UNAVAILABLE, "no positioning hardware"))
  }
}

/// Single-flight wrapper around a [`PositionProvider`]. Clones share the in-flight flag.
#[derive(Clone)]
pub struct Geolocator {
  provider: Arc<dyn PositionProvider>,
  options: PositionOptions,
  locating: Arc<AtomicBool>,
}

impl Geolocator {
  #[must_use]
  pub fn new(provider: Arc<dyn PositionProvider>) -> Self {
    Self::with_options(provider, PositionOptions::default())
  }

  #[must_use]
  pub fn with_options(provider: Arc<dyn PositionProvider>, options: PositionOptions) -> Self {
    Self {
      provider,
      options,
      locating: Arc::new(AtomicBool::new(false)),
    }
  }

  /// True while a request is outstanding.
  #[must_use]
  pub fn is_getting_location(&self) -> bool {
    self.locating.load(Ordering::Acquire)
  }

  /// Claims the in-flight slot. The returned request holds it until it finishes or is
  /// dropped, so it can run on another task.
  ///
  /// Returns `Ok(None)` if another request is still outstanding.
  ///
  /// # Errors
  /// [`GeolocationError::Unsupported`] if the platform cannot position.
  pub fn begin(&self) -> Result<Option<LocationRequest>, GeolocationError> {
    if !self.provider.is_supported() {
      warn!("{}: geolocation unsupported", self.provider.name());
      return Err(GeolocationError::Unsupported);
    }

    let Some(guard) = LocatingGuard::acquire(&self.locating) else {
      debug!("Location request already in progress");
      return Ok(None);
    };

    Ok(Some(LocationRequest {
      provider: self.provider.clone(),
      options: self.options,
      _guard: guard,
    }))
  }

  /// Asks the platform for the current position.
  ///
  /// Returns `Ok(None)` without touching the platform if another request is still
  /// outstanding.
  ///
  /// # Errors
  /// See [`Geolocator::begin`] and [`LocationRequest::run`].
  pub async fn current_location(&self) -> Result<Option<WGS84Coordinate>, GeolocationError> {
    match self.begin()? {
      Some(request) => request.run().await.map(Some),
      None => Ok(None),
    }
  }
}

/// A claimed position request.
pub struct LocationRequest {
  provider: Arc<dyn PositionProvider>,
  options: PositionOptions,
  _guard: LocatingGuard,
}

impl LocationRequest {
  /// Runs the platform call, bounded by the configured timeout.
  ///
  /// # Errors
  /// The platform error, or [`GeolocationError::Timeout`] once the timeout expires.
  pub async fn run(self) -> Result<WGS84Coordinate, GeolocationError> {
    debug!("Requesting position from {}", self.provider.name());
    let result = tokio::time::timeout(
      self.options.timeout,
      self.provider.current_position(&self.options),
    )
    .await;

    match result {
      Ok(Ok(position)) => {
        info!("Got user location {position}");
        Ok(position)
      }
      Ok(Err(e)) => {
        let error = GeolocationError::from(e);
        warn!("Location request failed: {error}");
        Err(error)
      }
      Err(_) => {
        warn!("Location request timed out after {:?}", self.options.timeout);
        Err(GeolocationError::Timeout)
      }
    }
  }
}

/// Holds the in-flight flag and releases it when dropped, also on cancellation.
struct LocatingGuard {
  flag: Arc<AtomicBool>,
}

impl LocatingGuard {
  fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self { flag: flag.clone() })
  }
}

impl Drop for LocatingGuard {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
  }
}


#[cfg(test)]
mod tests {
  use super::test_utils::GatedPosition;
  use super::*;

  #[test]
  fn default_options() {
    let options = PositionOptions::default();
    assert!(options.enable_high_accuracy);
    assert_eq!(options.timeout, Duration::from_secs(10));
    assert_eq!(options.maximum_age, Duration::from_secs(300));
  }

  #[test]
  fn platform_codes_map_to_errors() {
    assert_eq!(
      GeolocationError::from(PositionError::new(1, "denied")),
      GeolocationError::PermissionDenied
    );
    assert_eq!(
      GeolocationError::from(PositionError::new(2, "")),
      GeolocationError::PositionUnavailable
    );
    assert_eq!(
      GeolocationError::from(PositionError::new(3, "")),
      GeolocationError::Timeout
    );
    assert!(matches!(
      GeolocationError::from(PositionError::new(42, "weird")),
      GeolocationError::Other(msg) if msg.contains("weird")
    ));
  }

  #[tokio::test]
  async fn fixed_position_resolves() {
    let position = WGS84Coordinate::new(-1.29, 36.82);
    let locator = Geolocator::new(Arc::new(FixedPosition::new(position)));
    assert_eq!(locator.current_location().await, Ok(Some(position)));
    assert!(!locator.is_getting_location());
  }

  #[tokio::test]
  async fn unsupported_platform() {
    let locator = Geolocator::new(Arc::new(NoPositioning));
    assert_eq!(
      locator.current_location().await,
      Err(GeolocationError::Unsupported)
    );
    assert!(!locator.is_getting_location());
  }

  #[tokio::test]
  async fn second_request_while_pending_is_a_noop() {
    let position = WGS84Coordinate::new(0.5, 35.3);
    let provider = GatedPosition::new(Ok(position));
    let locator = Geolocator::new(provider.clone());

    let first = tokio::spawn({
      let locator = locator.clone();
      async move { locator.current_location().await }
    });
    while !locator.is_getting_location() {
      tokio::task::yield_now().await;
    }

    assert_eq!(locator.current_location().await, Ok(None));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    provider.release.notify_one();
    assert_eq!(first.await.unwrap(), Ok(Some(position)));
    assert!(!locator.is_getting_location());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn platform_error_releases_flag() {
    let provider = GatedPosition::new(Err(PositionError::new(PERMISSION_DENIED, "nope")));
    provider.release.notify_one();
    let locator = Geolocator::new(provider.clone());
    assert_eq!(
      locator.current_location().await,
      Err(GeolocationError::PermissionDenied)
    );
    assert!(!locator.is_getting_location());
  }

  #[tokio::test]
  async fn claimed_request_holds_the_slot_until_dropped() {
    let provider = GatedPosition::new(Ok(WGS84Coordinate::new(0.5, 35.3)));
    let locator = Geolocator::new(provider.clone());

    let request = locator.begin().unwrap().unwrap();
    assert!(locator.is_getting_location());
    assert!(locator.begin().unwrap().is_none());

    drop(request);
    assert!(!locator.is_getting_location());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_platform_times_out() {
    let provider = GatedPosition::new(Ok(WGS84Coordinate::new(0.0, 0.0)));
    let locator = Geolocator::new(provider.clone());
    assert_eq!(
      locator.current_location().await,
      Err(GeolocationError::Timeout)
    );
    assert!(!locator.is_getting_location());
  }
}
