//! Content resolution bridge.
//!
//! An abstract playlist item is resolved into a [`Resource`] by a
//! [`ResourceResolver`]. Resolution is a stream: it may first need network or
//! DRM setup, and it may yield updated resources later (for example refreshed
//! metadata or a new token-protected URL).

use crate::{media_time::MediaTime, media_time::TimeRange, player::NativeError};
use crate::platform::PlatformSendSync;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque resource-loading hook (DRM key delivery, URL signing).
///
/// The core stores and attaches delegates but never inspects them.
pub trait ResourceLoaderDelegate: PlatformSendSync + fmt::Debug {}

/// Descriptive metadata attached to a resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Time ranges the viewer must not seek into (editorial blocks).
    pub blocked_time_ranges: Vec<TimeRange>,
    pub extra: HashMap<String, String>,
}

/// Per-item playback configuration applied to the native item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemConfiguration {
    /// Position playback starts from; `None` for the default position.
    pub start_time: Option<MediaTime>,
    pub preferred_forward_buffer: Option<Duration>,
    pub preferred_peak_bitrate: Option<f64>,
}

/// A concrete playable resource.
#[derive(Clone, Default)]
pub struct Resource {
    pub url: String,
    pub delegate: Option<Arc<dyn ResourceLoaderDelegate>>,
    pub metadata: ResourceMetadata,
    pub configuration: ItemConfiguration,
}

impl Resource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn ResourceLoaderDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_metadata(mut self, metadata: ResourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_configuration(mut self, configuration: ItemConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Whether a native item created for `self` can keep playing `other`
    /// without being reloaded: same URL, same delegate instance and the same
    /// item configuration. Metadata is not compared.
    pub fn is_playback_equivalent(&self, other: &Resource) -> bool {
        let same_delegate = match (&self.delegate, &other.delegate) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        };
        self.url == other.url && same_delegate && self.configuration == other.configuration
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url)
            .field("has_delegate", &self.delegate.is_some())
            .field("metadata", &self.metadata)
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// Stream of resolved resources. An `Err` item ends resolution with a failure.
pub type ResourceStream = BoxStream<'static, Result<Resource, NativeError>>;

/// Resolves an abstract item into playable resources.
pub trait ResourceResolver: PlatformSendSync {
    /// Start resolution. Called once per item insertion; the core keeps the
    /// native item in sync with the latest value the stream yields.
    fn resolve(&self) -> ResourceStream;
}
