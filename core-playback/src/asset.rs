//! Playlist items and resource resolution.
//!
//! A [`PlayerItem`] is the caller's description of something to play: a
//! stable identifier plus a [`ResourceResolver`] that produces the concrete
//! resource. [`AssetStore`] tracks where resolution stands for every listed
//! item and hands the queue reconciler the [`NativeAsset`] each item should be
//! played with.

use crate::item_state::{ItemError, CORE_ERROR_DOMAIN};
use crate::tracking::TrackerAdapter;
use bridge_traits::{NativeAsset, NativeError, Resource, ResourceResolver, ResourceStream};
use futures::{stream, FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// Items
// ============================================================================

/// Caller-chosen identifier of a playlist item. Identity across list updates
/// is by identifier, not by content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One entry of the player's item list.
#[derive(Clone)]
pub struct PlayerItem {
    id: ItemId,
    resolver: Arc<dyn ResourceResolver>,
    trackers: Vec<Arc<dyn TrackerAdapter>>,
}

impl PlayerItem {
    pub fn new(id: impl Into<ItemId>, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            id: id.into(),
            resolver,
            trackers: Vec::new(),
        }
    }

    /// Item playing a fixed, already known resource.
    pub fn from_resource(id: impl Into<ItemId>, resource: Resource) -> Self {
        Self::new(id, Arc::new(StaticResolver::new(resource)))
    }

    /// Item playing the resource at `url`.
    pub fn from_url(id: impl Into<ItemId>, url: impl Into<String>) -> Self {
        Self::from_resource(id, Resource::new(url))
    }

    /// Item whose resolution fails with `error`.
    pub fn unavailable(id: impl Into<ItemId>, error: NativeError) -> Self {
        Self::new(id, Arc::new(FailingResolver::new(error)))
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TrackerAdapter>) -> Self {
        self.trackers.push(tracker);
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn resolver(&self) -> &Arc<dyn ResourceResolver> {
        &self.resolver
    }

    pub fn trackers(&self) -> &[Arc<dyn TrackerAdapter>] {
        &self.trackers
    }
}

impl fmt::Debug for PlayerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerItem")
            .field("id", &self.id)
            .field("trackers", &self.trackers.len())
            .finish()
    }
}

// ============================================================================
// Resolvers
// ============================================================================

/// Resolver yielding one fixed resource.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    resource: Resource,
}

impl StaticResolver {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

impl ResourceResolver for StaticResolver {
    fn resolve(&self) -> ResourceStream {
        stream::iter([Ok(self.resource.clone())]).boxed()
    }
}

/// Resolver that always fails.
#[derive(Debug, Clone)]
pub struct FailingResolver {
    error: NativeError,
}

impl FailingResolver {
    pub fn new(error: NativeError) -> Self {
        Self { error }
    }
}

impl ResourceResolver for FailingResolver {
    fn resolve(&self) -> ResourceStream {
        stream::iter([Err(self.error.clone())]).boxed()
    }
}

/// Creates a resolver fed by hand: nothing is resolved until the returned
/// [`ResourceSender`] publishes a value, and later values replace earlier ones.
pub fn resource_channel() -> (ResourceSender, ChannelResolver) {
    let (tx, rx) = watch::channel(None);
    (ResourceSender { tx }, ChannelResolver { rx })
}

/// Publishing half of [`resource_channel`].
#[derive(Debug)]
pub struct ResourceSender {
    tx: watch::Sender<Option<Result<Resource, NativeError>>>,
}

impl ResourceSender {
    pub fn send(&self, value: Result<Resource, NativeError>) {
        self.tx.send_replace(Some(value));
    }
}

/// Resolver half of [`resource_channel`].
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    rx: watch::Receiver<Option<Result<Resource, NativeError>>>,
}

impl ResourceResolver for ChannelResolver {
    fn resolve(&self) -> ResourceStream {
        let mut rx = self.rx.clone();
        rx.mark_changed();
        stream::unfold(rx, |mut rx| async move {
            loop {
                rx.changed().await.ok()?;
                let value = rx.borrow_and_update().clone();
                if let Some(value) = value {
                    return Some((value, rx));
                }
            }
        })
        .boxed()
    }
}

// ============================================================================
// Resolution state
// ============================================================================

/// Where resolution of an item stands.
#[derive(Debug, Clone)]
pub enum AssetState {
    Loading,
    Ready(Resource),
    Failed(ItemError),
}

impl AssetState {
    /// The native asset that represents this state in the native queue.
    pub fn native_asset(&self) -> NativeAsset {
        match self {
            AssetState::Loading => NativeAsset::Loading,
            AssetState::Ready(resource) => NativeAsset::Resource(resource.clone()),
            AssetState::Failed(_) => NativeAsset::Unavailable,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match self {
            AssetState::Failed(error) => Some(error),
            _ => None,
        }
    }

    fn from_result(result: Result<Resource, NativeError>) -> Self {
        match result {
            Ok(resource) => AssetState::Ready(resource),
            Err(error) => AssetState::Failed(ItemError::from(&error)),
        }
    }
}

/// Error recorded when a resolver stream ends without producing anything.
pub fn empty_resolution_error() -> ItemError {
    ItemError::new(CORE_ERROR_DOMAIN, -2, "The item did not provide any content")
}

/// Outcome of starting resolution of an item.
pub struct Resolution {
    /// State known right away.
    pub initial: AssetState,
    /// Remaining updates, if the resolver may still produce some.
    pub updates: Option<ResourceStream>,
}

/// Starts resolving `item`, consuming whatever the resolver can produce
/// without waiting so that immediately available resources skip the loading
/// placeholder.
pub fn start_resolution(item: &PlayerItem) -> Resolution {
    let mut updates = item.resolver.resolve();
    let mut initial = AssetState::Loading;
    loop {
        match updates.next().now_or_never() {
            Some(Some(result)) => {
                let failed = result.is_err();
                initial = AssetState::from_result(result);
                if failed {
                    return Resolution {
                        initial,
                        updates: None,
                    };
                }
            }
            Some(None) => {
                if matches!(initial, AssetState::Loading) {
                    initial = AssetState::Failed(empty_resolution_error());
                }
                return Resolution {
                    initial,
                    updates: None,
                };
            }
            None => {
                return Resolution {
                    initial,
                    updates: Some(updates),
                }
            }
        }
    }
}

/// Resolution state of every listed item, tagged with a generation so that
/// updates from a superseded resolution are ignored.
#[derive(Debug, Default)]
pub struct AssetStore {
    states: HashMap<ItemId, (u64, AssetState)>,
    next_generation: u64,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolution and returns its generation.
    pub fn begin(&mut self, id: ItemId, initial: AssetState) -> u64 {
        self.next_generation += 1;
        self.states.insert(id, (self.next_generation, initial));
        self.next_generation
    }

    /// Applies a resolver update. Returns the new state unless the update
    /// belongs to a superseded resolution.
    pub fn apply(
        &mut self,
        id: &ItemId,
        generation: u64,
        result: Result<Resource, NativeError>,
    ) -> Option<&AssetState> {
        let (current_generation, state) = self.states.get_mut(id)?;
        if *current_generation != generation {
            return None;
        }
        *state = AssetState::from_result(result);
        Some(state)
    }

    /// Records that a resolver stream ended. Only matters if it never
    /// produced anything.
    pub fn finish(&mut self, id: &ItemId, generation: u64) -> Option<&AssetState> {
        let (current_generation, state) = self.states.get_mut(id)?;
        if *current_generation != generation || !matches!(state, AssetState::Loading) {
            return None;
        }
        *state = AssetState::Failed(empty_resolution_error());
        Some(state)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.states.contains_key(id)
    }

    pub fn state(&self, id: &ItemId) -> Option<&AssetState> {
        self.states.get(id).map(|(_, state)| state)
    }

    pub fn native_asset(&self, id: &ItemId) -> NativeAsset {
        self.state(id)
            .map(AssetState::native_asset)
            .unwrap_or(NativeAsset::Loading)
    }

    /// Drops state of items no longer listed.
    pub fn retain(&mut self, listed: &[ItemId]) {
        self.states.retain(|id, _| listed.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_resolution_is_immediate() {
        let item = PlayerItem::from_url("a", "https://cdn/a.m3u8");
        let resolution = start_resolution(&item);

        assert!(matches!(resolution.initial, AssetState::Ready(ref r) if r.url == "https://cdn/a.m3u8"));
        assert!(resolution.updates.is_none());
    }

    #[test]
    fn test_failing_resolution() {
        let error = NativeError::new("TokenErrorDomain", 401)
            .with_user_info(NativeError::LOCALIZED_DESCRIPTION_KEY, "Token expired");
        let resolution = start_resolution(&PlayerItem::unavailable("c", error));

        let state = resolution.initial;
        assert_eq!(state.error().map(|e| e.message.as_str()), Some("Token expired"));
        assert!(matches!(state.native_asset(), NativeAsset::Unavailable));
    }

    #[tokio::test]
    async fn test_channel_resolution_is_pending_until_sent() {
        let (sender, resolver) = resource_channel();
        let item = PlayerItem::new("live", Arc::new(resolver));

        let resolution = start_resolution(&item);
        assert!(matches!(resolution.initial, AssetState::Loading));
        let mut updates = resolution.updates.unwrap();

        sender.send(Ok(Resource::new("https://cdn/live.m3u8")));
        let resource = updates.next().await.unwrap().unwrap();
        assert_eq!(resource.url, "https://cdn/live.m3u8");

        sender.send(Ok(Resource::new("https://cdn/live-2.m3u8")));
        let resource = updates.next().await.unwrap().unwrap();
        assert_eq!(resource.url, "https://cdn/live-2.m3u8");
    }

    #[test]
    fn test_channel_resolution_with_value_already_sent() {
        let (sender, resolver) = resource_channel();
        sender.send(Ok(Resource::new("https://cdn/a.m3u8")));

        let resolution = start_resolution(&PlayerItem::new("a", Arc::new(resolver)));
        assert!(matches!(resolution.initial, AssetState::Ready(_)));
        assert!(resolution.updates.is_some());
    }

    #[test]
    fn test_store_ignores_superseded_generations() {
        let mut store = AssetStore::new();
        let id = ItemId::new("a");
        let first = store.begin(id.clone(), AssetState::Loading);
        let second = store.begin(id.clone(), AssetState::Loading);

        assert!(store
            .apply(&id, first, Ok(Resource::new("https://old")))
            .is_none());
        assert!(store
            .apply(&id, second, Ok(Resource::new("https://new")))
            .is_some());
        assert!(matches!(store.native_asset(&id), NativeAsset::Resource(r) if r.url == "https://new"));
    }

    #[test]
    fn test_store_finish_without_content_fails() {
        let mut store = AssetStore::new();
        let id = ItemId::new("a");
        let generation = store.begin(id.clone(), AssetState::Loading);

        let state = store.finish(&id, generation).cloned();
        assert_eq!(state.and_then(|s| s.error().cloned()), Some(empty_resolution_error()));

        store.retain(&[]);
        assert!(!store.contains(&id));
        assert!(matches!(store.native_asset(&id), NativeAsset::Loading));
    }
}
