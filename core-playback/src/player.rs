//! # Player Facade
//!
//! [`Player`] is the public entry point. All state lives in a single actor
//! task that owns the seek coordinator, the queue reconciler and the item
//! list; the handle only sends commands and reads published snapshots. This
//! serialises every mutation on one context without locks.
//!
//! ## Event flow
//!
//! ```text
//! Player handle ──commands──▶ actor ◀──NativeEvent── NativeQueuePlayer
//!                              │
//!                              ├──▶ watch<PlayerProperties>
//!                              └──▶ EventBus (CoreEvent)
//! ```
//!
//! Native notifications are drained before commands so that commands always
//! act on the latest known native state.

use crate::asset::{self, AssetState, AssetStore, ItemId, PlayerItem, Resolution};
use crate::config::PlayerConfiguration;
use crate::error::{PlaybackError, Result};
use crate::idle_timer::{IdleTimerLease, IdleTimerService};
use crate::item_state::{localized_resource_loading_error, ItemState};
use crate::media_selection::{native_option_id, MediaSelection, MediaSelectionOption};
use crate::navigation::{self, InsertPosition, NavigationContext, ReturnAction};
use crate::properties::{is_buffering, PlaybackState, PlayerProperties};
use crate::queue::{AssetUpdate, ItemTransition, QueueReconciler};
use crate::seek::{SeekCompletion, SeekContext, SeekCoordinator, SeekPosition};
use crate::stream::StreamType;
use crate::tracking::TrackerLifecycle;
use bridge_traits::{
    MediaCharacteristic, MediaTime, NativeError, NativeEvent, NativeItemId, NativeQueuePlayer,
    Resource, TimeRange,
};
use core_runtime::config::CoreConfig;
use core_runtime::logging::redact_url;
use core_runtime::events::{
    CoreEvent, EventBus, EventStream, ItemEvent, PlaybackEvent, QueueEvent,
};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Commands
// ============================================================================

enum ResolverUpdate {
    Value(std::result::Result<Resource, NativeError>),
    Finished,
}

enum Command {
    Items {
        reply: oneshot::Sender<Vec<PlayerItem>>,
    },
    SetItems {
        items: Vec<PlayerItem>,
        reply: oneshot::Sender<()>,
    },
    Insert {
        item: PlayerItem,
        position: InsertPosition,
        reply: oneshot::Sender<bool>,
    },
    Move {
        id: ItemId,
        position: InsertPosition,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: ItemId,
        reply: oneshot::Sender<bool>,
    },
    AdvanceToNext {
        reply: oneshot::Sender<bool>,
    },
    ReturnToPrevious {
        reply: oneshot::Sender<bool>,
    },
    SetCurrentItem {
        id: ItemId,
        reply: oneshot::Sender<bool>,
    },
    Play {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    SetMuted {
        muted: bool,
        reply: oneshot::Sender<()>,
    },
    SetAllowsExternalPlayback {
        allowed: bool,
        reply: oneshot::Sender<()>,
    },
    Seek {
        position: SeekPosition,
        smooth: bool,
        completion: SeekCompletion,
    },
    Skip {
        forward: bool,
        reply: oneshot::Sender<bool>,
    },
    Restart {
        reply: oneshot::Sender<bool>,
    },
    SelectMediaOption {
        characteristic: MediaCharacteristic,
        selection: MediaSelectionOption,
        reply: oneshot::Sender<Result<()>>,
    },
    AssetUpdated {
        id: ItemId,
        generation: u64,
        update: ResolverUpdate,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// Player handle
// ============================================================================

/// Handle to a player instance.
///
/// Dropping the last handle shuts the player down.
pub struct Player {
    commands: mpsc::UnboundedSender<Command>,
    properties: watch::Receiver<PlayerProperties>,
    events: EventBus,
    configuration: PlayerConfiguration,
    idle_timer: IdleTimerService,
}

impl Player {
    /// Creates a player driving `core.native_player`.
    ///
    /// Must be called from within a Tokio runtime; the player's actor task is
    /// spawned on it.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Configuration`] for invalid player configuration
    /// - [`PlaybackError::Runtime`] for invalid core configuration or when no
    ///   runtime is available
    pub fn new(core: CoreConfig, configuration: PlayerConfiguration) -> Result<Self> {
        let idle_timer = IdleTimerService::new(core.idle_timer.clone());
        Self::with_idle_timer_service(core, configuration, idle_timer)
    }

    /// Like [`Player::new`], sharing an idle timer lease counter with other
    /// players.
    pub fn with_idle_timer_service(
        core: CoreConfig,
        configuration: PlayerConfiguration,
        idle_timer: IdleTimerService,
    ) -> Result<Self> {
        core.validate()?;
        configuration.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            core_runtime::Error::NoRuntime(error.to_string())
        })?;

        let native = core.native_player.clone();
        let events = EventBus::new(core.event_buffer_size);
        let native_events = native.subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (properties_tx, properties) = watch::channel(PlayerProperties::default());

        native.set_muted(configuration.is_muted);
        native.set_allows_external_playback(configuration.allows_external_playback);

        let actor = PlayerActor {
            seeks: SeekCoordinator::new(
                events.clone(),
                configuration.seek_retry_limit,
                configuration.end_tolerance_window,
                configuration.smooth_seeking_enabled,
            ),
            native,
            configuration: configuration.clone(),
            items: Vec::new(),
            assets: AssetStore::new(),
            resolutions: HashMap::new(),
            queue: QueueReconciler::new(),
            seek_item: None,
            trackers: TrackerLifecycle::new(),
            idle_timer: idle_timer.clone(),
            lease: None,
            loading_errors: HashMap::new(),
            legible_automatic: false,
            events: events.clone(),
            published: PlayerProperties::default(),
            properties: properties_tx,
            commands: commands.downgrade(),
        };
        runtime.spawn(actor.run(command_rx, native_events));
        info!(
            navigation = ?configuration.navigation_mode,
            "Player started"
        );

        Ok(Self {
            commands,
            properties,
            events,
            configuration,
            idle_timer,
        })
    }

    pub fn configuration(&self) -> &PlayerConfiguration {
        &self.configuration
    }

    pub fn idle_timer(&self) -> &IdleTimerService {
        &self.idle_timer
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Latest properties snapshot.
    pub fn properties(&self) -> PlayerProperties {
        self.properties.borrow().clone()
    }

    /// Receiver notified whenever the properties change.
    pub fn watch(&self) -> watch::Receiver<PlayerProperties> {
        self.properties.clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn can_advance_to_next_item(&self) -> bool {
        let properties = self.properties.borrow();
        navigation::can_advance(&navigation_context(&properties))
    }

    pub fn can_return_to_previous_item(&self) -> bool {
        let properties = self.properties.borrow();
        properties.current_item.is_some()
            && navigation::return_action(
                self.configuration.navigation_mode,
                &navigation_context(&properties),
            ) != ReturnAction::Disallowed
    }

    pub fn can_skip_backward(&self) -> bool {
        let properties = self.properties.borrow();
        navigation::skip_backward_target(
            &navigation_context(&properties),
            self.configuration.backward_skip_interval,
        )
        .is_some()
    }

    pub fn can_skip_forward(&self) -> bool {
        let properties = self.properties.borrow();
        navigation::skip_forward_target(
            &navigation_context(&properties),
            self.configuration.forward_skip_interval,
        )
        .is_some()
    }

    pub fn can_restart(&self) -> bool {
        let properties = self.properties.borrow();
        properties.current_item.is_some() && navigation::can_restart(properties.stream_type)
    }

    // ------------------------------------------------------------------------
    // Item list
    // ------------------------------------------------------------------------

    pub async fn items(&self) -> Result<Vec<PlayerItem>> {
        self.request(|reply| Command::Items { reply }).await
    }

    /// Replaces the item list. Items keep their native counterpart when their
    /// identifier is listed again, and the current item keeps playing if it
    /// is still listed. Duplicate identifiers after the first are ignored.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn set_items(&self, items: Vec<PlayerItem>) -> Result<()> {
        self.request(|reply| Command::SetItems { items, reply }).await
    }

    /// Inserts an item. Returns `false` when the item is already listed or
    /// the reference item is not.
    pub async fn insert(&self, item: PlayerItem, position: InsertPosition) -> Result<bool> {
        self.request(|reply| Command::Insert {
            item,
            position,
            reply,
        })
        .await
    }

    /// Appends an item at the end of the list.
    pub async fn append(&self, item: PlayerItem) -> Result<bool> {
        self.insert(item, InsertPosition::After(None)).await
    }

    /// Moves a listed item. Returns `false` when nothing changed.
    pub async fn move_item(&self, id: ItemId, position: InsertPosition) -> Result<bool> {
        self.request(|reply| Command::Move {
            id,
            position,
            reply,
        })
        .await
    }

    pub async fn remove(&self, id: ItemId) -> Result<bool> {
        self.request(|reply| Command::Remove { id, reply }).await
    }

    pub async fn remove_all_items(&self) -> Result<()> {
        self.set_items(Vec::new()).await
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Moves to the next listed item. Returns `false` when there is none.
    pub async fn advance_to_next_item(&self) -> Result<bool> {
        self.request(|reply| Command::AdvanceToNext { reply }).await
    }

    /// Moves to the previous item or restarts the current one, depending on
    /// the navigation mode. Returns `false` when neither is possible.
    pub async fn return_to_previous_item(&self) -> Result<bool> {
        self.request(|reply| Command::ReturnToPrevious { reply }).await
    }

    /// Starts playing the listed item `id`.
    pub async fn set_current_item(&self, id: ItemId) -> Result<bool> {
        self.request(|reply| Command::SetCurrentItem { id, reply }).await
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Starts playback. After the last item ended, playback restarts that
    /// item.
    pub async fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Toggles between play and pause.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.properties.borrow().playback_state == PlaybackState::Playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| Command::SetMuted { muted, reply }).await
    }

    pub async fn set_allows_external_playback(&self, allowed: bool) -> Result<()> {
        self.request(|reply| Command::SetAllowsExternalPlayback { allowed, reply })
            .await
    }

    // ------------------------------------------------------------------------
    // Seeking
    // ------------------------------------------------------------------------

    /// Seeks the current item and waits for the outcome: `true` when the seek
    /// reached its target, `false` when a later request superseded it.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidArgument`] when the target is not a finite time.
    #[instrument(skip(self), fields(target_secs = position.time.seconds()))]
    pub async fn seek(&self, position: SeekPosition, smooth: bool) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.seek_with_completion(position, smooth, move |finished| {
            let _ = tx.send(finished);
        })?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)
    }

    /// Seeks the current item and reports the outcome to `completion`.
    ///
    /// Shares one request queue with [`Player::seek`].
    pub fn seek_with_completion<F>(&self, position: SeekPosition, smooth: bool, completion: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        position.validate()?;
        self.commands
            .send(Command::Seek {
                position,
                smooth,
                completion: Box::new(completion),
            })
            .map_err(|_| PlaybackError::PlayerClosed)
    }

    /// Skips back by the configured interval. Returns `false` when the
    /// current stream cannot be sought.
    pub async fn skip_backward(&self) -> Result<bool> {
        self.request(|reply| Command::Skip {
            forward: false,
            reply,
        })
        .await
    }

    /// Skips ahead by the configured interval. Returns `false` when the
    /// current stream cannot be sought or the skip would reach the live edge.
    pub async fn skip_forward(&self) -> Result<bool> {
        self.request(|reply| Command::Skip {
            forward: true,
            reply,
        })
        .await
    }

    /// Seeks the current item back to its start.
    pub async fn restart(&self) -> Result<bool> {
        self.request(|reply| Command::Restart { reply }).await
    }

    // ------------------------------------------------------------------------
    // Media selection
    // ------------------------------------------------------------------------

    /// Applies a media selection to the current item.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidArgument`] when the current item offers no such
    /// characteristic or option.
    pub async fn select_media_option(
        &self,
        characteristic: MediaCharacteristic,
        selection: MediaSelectionOption,
    ) -> Result<()> {
        self.request(|reply| Command::SelectMediaOption {
            characteristic,
            selection,
            reply,
        })
        .await?
    }

    pub fn selected_media_option(&self, characteristic: MediaCharacteristic) -> Option<MediaSelectionOption> {
        self.properties
            .borrow()
            .media_selection
            .selected(characteristic)
            .cloned()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Stops the player: trackers are disabled, the idle timer lease is
    /// released, the native queue is cleared and the actor exits. Later
    /// commands fail with [`PlaybackError::PlayerClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| PlaybackError::PlayerClosed)?;
        response.await.map_err(|_| PlaybackError::PlayerClosed)
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("configuration", &self.configuration)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

fn navigation_context(properties: &PlayerProperties) -> NavigationContext<'_> {
    NavigationContext {
        previous: properties.previous_items.last(),
        next: properties.next_items.first(),
        stream_type: properties.stream_type,
        time: properties.time,
        seekable: properties.seekable_time_range,
    }
}

// ============================================================================
// Actor
// ============================================================================

struct PlayerActor {
    native: Arc<dyn NativeQueuePlayer>,
    configuration: PlayerConfiguration,
    items: Vec<PlayerItem>,
    assets: AssetStore,
    resolutions: HashMap<ItemId, JoinHandle<()>>,
    queue: QueueReconciler,
    seeks: SeekCoordinator,
    /// Native item the pending seeks target.
    seek_item: Option<NativeItemId>,
    trackers: TrackerLifecycle,
    idle_timer: IdleTimerService,
    lease: Option<IdleTimerLease>,
    loading_errors: HashMap<NativeItemId, NativeError>,
    legible_automatic: bool,
    events: EventBus,
    published: PlayerProperties,
    properties: watch::Sender<PlayerProperties>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl PlayerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut native_events: broadcast::Receiver<NativeEvent>,
    ) {
        let mut native_open = true;
        self.publish();

        loop {
            tokio::select! {
                biased;

                event = native_events.recv(), if native_open => match event {
                    Ok(event) => self.handle_native_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Native events lagged, resynchronising");
                        self.on_queue_changed();
                    }
                    Err(RecvError::Closed) => {
                        warn!("Native player event stream closed");
                        native_open = false;
                    }
                },

                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All player handles dropped");
                        self.shutdown();
                        break;
                    }
                },
            }
            self.publish();
        }
        info!("Player stopped");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Items { reply } => {
                let _ = reply.send(self.items.clone());
            }
            Command::SetItems { items, reply } => {
                self.apply_items(items);
                self.respond(reply, ());
            }
            Command::Insert {
                item,
                position,
                reply,
            } => {
                let mut items = self.items.clone();
                let changed = navigation::insert(&mut items, item, &position);
                if changed {
                    self.apply_items(items);
                }
                self.respond(reply, changed);
            }
            Command::Move {
                id,
                position,
                reply,
            } => {
                let mut items = self.items.clone();
                let changed = navigation::move_item(&mut items, &id, &position);
                if changed {
                    self.apply_items(items);
                }
                self.respond(reply, changed);
            }
            Command::Remove { id, reply } => {
                let mut items = self.items.clone();
                let changed = navigation::remove(&mut items, &id);
                if changed {
                    self.apply_items(items);
                }
                self.respond(reply, changed);
            }
            Command::AdvanceToNext { reply } => {
                let advanced = self.advance_to_next();
                self.respond(reply, advanced);
            }
            Command::ReturnToPrevious { reply } => {
                let returned = self.return_to_previous();
                self.respond(reply, returned);
            }
            Command::SetCurrentItem { id, reply } => {
                let jumped = self.queue.jump(self.native.as_ref(), &id, &self.assets);
                self.respond(reply, jumped);
            }
            Command::Play { reply } => {
                if let Some(stopped) = self.queue.stopped_at().cloned() {
                    debug!(item_id = %stopped, "Restarting stopped item");
                    self.queue.jump(self.native.as_ref(), &stopped, &self.assets);
                }
                self.native.play();
                self.respond(reply, ());
            }
            Command::Pause { reply } => {
                self.native.pause();
                self.respond(reply, ());
            }
            Command::SetMuted { muted, reply } => {
                self.native.set_muted(muted);
                self.respond(reply, ());
            }
            Command::SetAllowsExternalPlayback { allowed, reply } => {
                self.configuration.allows_external_playback = allowed;
                self.native.set_allows_external_playback(allowed);
                self.respond(reply, ());
            }
            Command::Seek {
                position,
                smooth,
                completion,
            } => self.submit_seek(position, smooth, Some(completion)),
            Command::Skip { forward, reply } => {
                let skipped = self.skip(forward);
                self.respond(reply, skipped);
            }
            Command::Restart { reply } => {
                let restarted = self.restart();
                self.respond(reply, restarted);
            }
            Command::SelectMediaOption {
                characteristic,
                selection,
                reply,
            } => {
                let result = self.select_media_option(characteristic, selection);
                self.respond(reply, result);
            }
            Command::AssetUpdated {
                id,
                generation,
                update,
            } => self.on_asset_updated(id, generation, update),
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    /// Publishes the outcome of a command before replying, so callers see
    /// its effect in [`Player::properties`] as soon as they resume.
    fn respond<T>(&mut self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn apply_items(&mut self, items: Vec<PlayerItem>) {
        let mut seen = HashSet::new();
        let items: Vec<PlayerItem> = items
            .into_iter()
            .filter(|item| {
                let unique = seen.insert(item.id().clone());
                if !unique {
                    warn!(item_id = %item.id(), "Ignoring duplicate item");
                }
                unique
            })
            .collect();

        let previous = std::mem::take(&mut self.items);
        for item in &items {
            let unchanged = previous.iter().any(|old| {
                old.id() == item.id() && Arc::ptr_eq(old.resolver(), item.resolver())
            });
            if !unchanged || !self.assets.contains(item.id()) {
                self.start_resolution(item);
            }
        }

        let ids: Vec<ItemId> = items.iter().map(|item| item.id().clone()).collect();
        self.resolutions.retain(|id, task| {
            let listed = ids.contains(id);
            if !listed {
                task.abort();
            }
            listed
        });
        self.assets.retain(&ids);
        self.items = items;

        self.queue.reconcile(self.native.as_ref(), &ids, &self.assets);
        self.on_queue_changed();
    }

    fn start_resolution(&mut self, item: &PlayerItem) {
        if let Some(task) = self.resolutions.remove(item.id()) {
            task.abort();
        }

        let Resolution { initial, updates } = asset::start_resolution(item);
        if let AssetState::Failed(error) = &initial {
            self.emit(CoreEvent::Item(ItemEvent::ResolutionFailed {
                item_id: item.id().to_string(),
                message: error.message.clone(),
            }));
        }
        let generation = self.assets.begin(item.id().clone(), initial);

        let Some(mut updates) = updates else {
            return;
        };
        let commands = self.commands.clone();
        let id = item.id().clone();
        let task = tokio::spawn(async move {
            while let Some(result) = updates.next().await {
                let Some(sender) = commands.upgrade() else {
                    return;
                };
                let command = Command::AssetUpdated {
                    id: id.clone(),
                    generation,
                    update: ResolverUpdate::Value(result),
                };
                if sender.send(command).is_err() {
                    return;
                }
            }
            if let Some(sender) = commands.upgrade() {
                let _ = sender.send(Command::AssetUpdated {
                    id,
                    generation,
                    update: ResolverUpdate::Finished,
                });
            }
        });
        self.resolutions.insert(item.id().clone(), task);
    }

    fn on_asset_updated(&mut self, id: ItemId, generation: u64, update: ResolverUpdate) {
        let state = match update {
            ResolverUpdate::Value(result) => self.assets.apply(&id, generation, result),
            ResolverUpdate::Finished => {
                self.resolutions.remove(&id);
                self.assets.finish(&id, generation)
            }
        };
        let Some(state) = state.cloned() else {
            return;
        };
        match state {
            AssetState::Failed(error) => {
                warn!(item_id = %id, error = %error, "Item resolution failed");
                let event = ItemEvent::ResolutionFailed {
                    item_id: id.to_string(),
                    message: error.message,
                };
                self.emit(CoreEvent::Item(event));
            }
            AssetState::Ready(resource) => {
                debug!(item_id = %id, url = %redact_url(&resource.url), "Resource resolved");
            }
            AssetState::Loading => {}
        }

        let resume_at = self.native.current_time();
        match self.queue.update_asset(self.native.as_ref(), &id, &self.assets) {
            AssetUpdate::Reloaded {
                was_placeholder: false,
            } if resume_at.is_numeric() && resume_at > MediaTime::ZERO => {
                debug!(item_id = %id, resume_secs = resume_at.seconds(), "Resuming reloaded item");
                self.submit_seek(SeekPosition::to(resume_at), false, None);
            }
            update => debug!(item_id = %id, ?update, "Asset updated"),
        }
        self.on_queue_changed();
    }

    fn advance_to_next(&mut self) -> bool {
        let native = self.native.as_ref();
        let next = self.queue.next_ids(native).into_iter().next();
        let Some(next) = next else {
            return false;
        };

        let upcoming = native
            .items()
            .get(1)
            .and_then(|item| self.queue.entry_for_native(*item))
            .map(|entry| entry.item_id.clone());
        if upcoming.as_ref() == Some(&next) && native.current_item().is_some() {
            native.advance_to_next_item();
        } else {
            self.queue.jump(native, &next, &self.assets);
        }
        true
    }

    fn return_to_previous(&mut self) -> bool {
        let properties = self.compute_properties();
        if properties.current_item.is_none() {
            return false;
        }
        let action = navigation::return_action(
            self.configuration.navigation_mode,
            &navigation_context(&properties),
        );
        debug!(?action, "Returning to previous item");
        match action {
            ReturnAction::PreviousItem(id) => self.queue.jump(self.native.as_ref(), &id, &self.assets),
            ReturnAction::RestartCurrent => self.restart(),
            ReturnAction::Disallowed => false,
        }
    }

    fn skip(&mut self, forward: bool) -> bool {
        let properties = self.compute_properties();
        let context = navigation_context(&properties);
        let target = if forward {
            navigation::skip_forward_target(&context, self.configuration.forward_skip_interval)
        } else {
            navigation::skip_backward_target(&context, self.configuration.backward_skip_interval)
        };
        match target {
            Some(target) => {
                self.submit_seek(SeekPosition::to(target), true, None);
                true
            }
            None => false,
        }
    }

    fn restart(&mut self) -> bool {
        let properties = self.compute_properties();
        if properties.current_item.is_none() || !navigation::can_restart(properties.stream_type) {
            return false;
        }
        let start = properties.seekable_time_range.start();
        let start = if start.is_numeric() { start } else { MediaTime::ZERO };
        self.submit_seek(SeekPosition::to(start), false, None);
        true
    }

    fn submit_seek(&mut self, position: SeekPosition, smooth: bool, completion: Option<SeekCompletion>) {
        let context = self.seek_context();
        self.seek_item = self.native.current_item();
        if let Err(error) = self
            .seeks
            .submit(self.native.as_ref(), &context, position, smooth, completion)
        {
            warn!(error = %error, "Seek rejected");
        }
    }

    fn select_media_option(
        &mut self,
        characteristic: MediaCharacteristic,
        selection: MediaSelectionOption,
    ) -> Result<()> {
        let properties = self.compute_properties();
        let native_item = self.native.current_item().ok_or_else(|| {
            PlaybackError::InvalidArgument("no current item to select media for".to_string())
        })?;
        let group = properties
            .media_selection
            .group(characteristic)
            .filter(|group| group.supports(&selection))
            .ok_or_else(|| {
                PlaybackError::InvalidArgument(format!(
                    "unsupported {characteristic:?} selection: {selection:?}"
                ))
            })?;
        debug!(characteristic = ?group.characteristic, ?selection, "Selecting media option");

        self.native
            .select_media_option(native_item, characteristic, native_option_id(&selection))?;
        if characteristic == MediaCharacteristic::Legible {
            self.legible_automatic = selection == MediaSelectionOption::Automatic;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        info!("Shutting down player");
        self.trackers.shutdown(&self.published);
        self.lease = None;
        self.seeks.cancel_all();
        for (_, task) in self.resolutions.drain() {
            task.abort();
        }
        self.items.clear();
        self.assets.retain(&[]);
        self.queue.clear(self.native.as_ref());
        self.native.pause();
    }

    // ------------------------------------------------------------------------
    // Native events
    // ------------------------------------------------------------------------

    fn handle_native_event(&mut self, event: NativeEvent) {
        match event {
            NativeEvent::CurrentItemChanged { .. } | NativeEvent::ItemsChanged => {
                self.on_queue_changed();
            }
            NativeEvent::ItemDidPlayToEnd { item } => {
                self.queue.mark_ended(item);
                if let Some(entry) = self.queue.entry_for_native(item) {
                    let item_id = entry.item_id.to_string();
                    self.emit(CoreEvent::Item(ItemEvent::Ended { item_id }));
                }
            }
            NativeEvent::ItemFailedToPlayToEnd { item, error } => {
                warn!(native = %item, error = %error, "Item failed to play to end");
            }
            NativeEvent::ResourceLoadingFailed { item, error } => {
                let error = localized_resource_loading_error(error);
                warn!(native = %item, error = %error, "Resource loading failed");
                self.loading_errors.insert(item, error);
            }
            NativeEvent::SeekCompleted { seek, finished } => {
                let context = self.seek_context();
                self.seeks
                    .on_completed(self.native.as_ref(), &context, seek, finished);
            }
            NativeEvent::ItemStatusChanged { .. }
            | NativeEvent::ErrorLogEntryAdded { .. }
            | NativeEvent::TimeRangesChanged { .. }
            | NativeEvent::BufferingChanged { .. }
            | NativeEvent::RateChanged { .. }
            | NativeEvent::MediaSelectionChanged { .. }
            | NativeEvent::ExternalPlaybackChanged { .. }
            | NativeEvent::MuteChanged { .. } => {}
        }
    }

    fn on_queue_changed(&mut self) {
        let native = self.native.as_ref();
        self.queue.sync(native);

        let current = native.current_item();
        if self.seeks.is_seeking() && current != self.seek_item {
            debug!("Current item changed, cancelling pending seeks");
            self.seeks.cancel_all();
            self.seek_item = None;
        }

        let natives = native.items();
        self.loading_errors.retain(|item, _| natives.contains(item));

        if let Some(transition) = self.queue.observe_current(native) {
            debug!(?transition, "Item transition");
            match transition {
                ItemTransition::Stop(id) => {
                    self.emit(CoreEvent::Queue(QueueEvent::Stopped {
                        item_id: id.to_string(),
                    }));
                }
                ItemTransition::Advance(_) => {
                    self.legible_automatic = false;
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn seek_context(&self) -> SeekContext {
        let current = self.native.current_item();
        let seekable = current
            .and_then(|item| self.native.item_snapshot(item))
            .map(|snapshot| TimeRange::union(&snapshot.seekable_time_ranges))
            .unwrap_or(TimeRange::INVALID);
        let blocked = current
            .and_then(|item| self.queue.entry_for_native(item))
            .and_then(|entry| entry.content.resource())
            .map(|resource| resource.metadata.blocked_time_ranges.clone())
            .unwrap_or_default();
        SeekContext { seekable, blocked }
    }

    fn compute_properties(&self) -> PlayerProperties {
        let native = self.native.as_ref();
        let native_current = native.current_item();
        let snapshot = native_current.and_then(|item| native.item_snapshot(item));
        let current_item = self.queue.current_item_id(native);

        let item_state = match &current_item {
            None => ItemState::Unknown,
            Some(id) => match (self.assets.state(id), native_current, &snapshot) {
                (Some(AssetState::Failed(error)), _, _) => ItemState::Failed(error.clone()),
                (_, None, _) => ItemState::Ended,
                (_, Some(item), Some(snapshot)) => {
                    ItemState::from_snapshot(snapshot, self.loading_errors.get(&item))
                }
                (_, Some(_), None) => ItemState::Unknown,
            },
        };

        let (seekable_time_range, duration) = match &snapshot {
            Some(snapshot) => (TimeRange::union(&snapshot.seekable_time_ranges), snapshot.duration),
            None => (TimeRange::INVALID, MediaTime::INVALID),
        };
        let stream_type = StreamType::classify(&seekable_time_range, duration);
        let rate = native.rate();
        let time = if native_current.is_some() {
            native.current_time()
        } else {
            MediaTime::INVALID
        };

        let mut media_selection = snapshot
            .as_ref()
            .map(|snapshot| MediaSelection::from_native(&snapshot.media_selection))
            .unwrap_or_default();
        if self.legible_automatic {
            media_selection.mark_automatic(MediaCharacteristic::Legible);
        }

        PlayerProperties {
            items: self.items.iter().map(|item| item.id().clone()).collect(),
            current_index: self.queue.current_index(native),
            previous_items: self.queue.previous_ids(native),
            next_items: self.queue.next_ids(native),
            is_buffering: is_buffering(rate, &item_state, snapshot.as_ref()),
            playback_state: PlaybackState::derive(current_item.is_some(), &item_state, rate),
            current_item,
            item_state,
            stream_type,
            seekable_time_range,
            duration,
            time,
            rate,
            is_seeking: self.seeks.is_seeking(),
            seek_target: self.seeks.seek_target(),
            is_muted: native.is_muted(),
            is_external_playback_active: native.is_external_playback_active(),
            allows_external_playback: self.configuration.allows_external_playback,
            media_selection,
        }
    }

    fn publish(&mut self) {
        let properties = self.compute_properties();

        if properties.playback_state == PlaybackState::Playing {
            if self.lease.is_none() {
                self.lease = Some(self.idle_timer.acquire());
            }
        } else {
            self.lease = None;
        }

        let current = properties
            .current_item
            .as_ref()
            .and_then(|id| self.items.iter().find(|item| item.id() == id));
        self.trackers.on_properties(current, &properties);

        for event in property_events(&self.published, &properties) {
            self.emit(event);
        }
        self.published = properties.clone();
        self.properties.send_if_modified(|published| {
            if *published == properties {
                return false;
            }
            *published = properties;
            true
        });
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine.
        let _ = self.events.emit(event);
    }
}

/// Events describing the change from `old` to `new`.
fn property_events(old: &PlayerProperties, new: &PlayerProperties) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    let current_id = new.current_item.as_ref().map(ItemId::to_string);

    if old.items != new.items {
        events.push(CoreEvent::Queue(QueueEvent::ItemsChanged {
            item_ids: new.items.iter().map(ItemId::to_string).collect(),
        }));
    }

    let current_changed = old.current_item != new.current_item;
    if current_changed {
        events.push(CoreEvent::Queue(QueueEvent::CurrentItemChanged {
            previous: old.current_item.as_ref().map(ItemId::to_string),
            current: current_id.clone(),
            index: new.current_index,
        }));
    }

    if let Some(item_id) = &current_id {
        if current_changed || old.item_state != new.item_state {
            match &new.item_state {
                ItemState::ReadyToPlay => events.push(CoreEvent::Item(ItemEvent::Ready {
                    item_id: item_id.clone(),
                })),
                ItemState::Failed(error) => events.push(CoreEvent::Item(ItemEvent::Failed {
                    item_id: item_id.clone(),
                    domain: error.domain.clone(),
                    code: error.code,
                    message: error.message.clone(),
                })),
                ItemState::Unknown | ItemState::Ended => {}
            }
        }
    }

    if old.playback_state != new.playback_state {
        events.push(CoreEvent::Playback(PlaybackEvent::StateChanged {
            item_id: current_id.clone(),
            state: new.playback_state.as_str().to_string(),
        }));
    }

    if old.is_buffering != new.is_buffering {
        events.push(CoreEvent::Playback(PlaybackEvent::BufferingChanged {
            is_buffering: new.is_buffering,
        }));
    }

    if old.stream_type != new.stream_type {
        events.push(CoreEvent::Playback(PlaybackEvent::StreamTypeChanged {
            item_id: current_id,
            stream_type: new.stream_type.as_str().to_string(),
        }));
    }

    events
}
