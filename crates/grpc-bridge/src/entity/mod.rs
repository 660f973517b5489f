//! Entity projection
//!
//! One [`BridgeEntity`] exists per discovered identity. It listens on its own
//! identity's topics, keeps the host registries in step with its discovery
//! config, and writes its rendered state to the host state store.
//!
//! Kind-specific behavior lives behind [`EntityKind`], implemented by the
//! closed set of kinds in [`KindState`].

pub mod binary_sensor;
pub mod event;
pub mod sensor;
pub mod switch;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bridge_core::consts::{DOMAIN, EVENT_STATE_CHANGED};
use bridge_core::{
    AvailableMessage, BridgeError, BridgeResult, ConfigMessage, DeviceInfo, DiscoveryKey,
    EntityCategory, EntityConfig, EventMessage, Identity, PlatformKind, StateMessage,
};
use bridge_dispatcher::{TopicFuture, Unsubscribe};
use bridge_host::{entity_registry, Context, DeviceIdentifier, STATE_UNAVAILABLE};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::data::BridgeData;
use crate::topics::{Directive, Discovered, Signal, Topic};
use crate::websocket::{ActiveConnection, OutgoingMessage};

use binary_sensor::BinarySensorKind;
use event::EventKind;
use sensor::SensorKind;
use switch::SwitchKind;

/// Display attributes every kind carries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayAttributes {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub device_class: Option<String>,
    pub entity_category: Option<EntityCategory>,
    pub unit_of_measurement: Option<String>,
    pub options: Option<Vec<String>>,
}

/// Behavior that differs between entity kinds
pub trait EntityKind: Send {
    fn platform(&self) -> PlatformKind;

    /// Apply the kind-specific part of a discovery config
    ///
    /// Runs after the shared display attributes were read from `config`, and
    /// may override them. On error nothing must have changed.
    fn apply_config(
        &mut self,
        unique_id: &str,
        config: &EntityConfig,
        display: &mut DisplayAttributes,
    ) -> BridgeResult<()>;

    /// Replace the value from a state message
    fn apply_state(
        &mut self,
        unique_id: &str,
        state: Option<&Value>,
        display: &DisplayAttributes,
    );

    /// Map a declared entity category
    fn category_for(&self, raw: &str) -> Option<EntityCategory> {
        EntityCategory::parse(raw)
    }

    /// Whether the entity can send commands back to its connection
    fn is_bidirectional(&self) -> bool {
        false
    }

    /// Host state of an available entity
    fn render_state(&self) -> String;

    /// Kind-specific state attributes
    fn render_attributes(&self, _attributes: &mut HashMap<String, Value>) {}
}

/// The closed set of entity kinds
#[derive(Debug)]
pub enum KindState {
    Sensor(SensorKind),
    BinarySensor(BinarySensorKind),
    Switch(SwitchKind),
    Event(EventKind),
}

impl KindState {
    pub fn new(platform: PlatformKind, initial_state: Option<&Value>) -> Self {
        match platform {
            PlatformKind::Sensor => KindState::Sensor(SensorKind::default()),
            PlatformKind::BinarySensor => KindState::BinarySensor(BinarySensorKind::default()),
            PlatformKind::Switch => KindState::Switch(SwitchKind::new(initial_state)),
            PlatformKind::Event => KindState::Event(EventKind::default()),
        }
    }

    pub fn as_kind(&self) -> &dyn EntityKind {
        match self {
            KindState::Sensor(kind) => kind,
            KindState::BinarySensor(kind) => kind,
            KindState::Switch(kind) => kind,
            KindState::Event(kind) => kind,
        }
    }

    pub fn as_kind_mut(&mut self) -> &mut dyn EntityKind {
        match self {
            KindState::Sensor(kind) => kind,
            KindState::BinarySensor(kind) => kind,
            KindState::Switch(kind) => kind,
            KindState::Event(kind) => kind,
        }
    }
}

/// Render a raw JSON state value the way the host shows it
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Where a bidirectional entity sends its commands
#[derive(Debug, Clone)]
struct ConnectionLink {
    message_id: u64,
    connection: Arc<ActiveConnection>,
}

/// Action run once removal has finished
type DeferredAction = Box<dyn FnOnce() -> TopicFuture + Send>;

struct EntityInner {
    config: EntityConfig,
    device_info: Option<DeviceInfo>,
    display: DisplayAttributes,
    available: bool,
    kind: KindState,
    extra_attributes: Map<String, Value>,
    link: Option<ConnectionLink>,
}

impl EntityInner {
    /// Reapply a full discovery config
    fn apply_discovery_config(
        &mut self,
        unique_id: &str,
        config: &EntityConfig,
    ) -> BridgeResult<()> {
        let mut display = DisplayAttributes {
            name: config.name.clone(),
            icon: config.icon.clone(),
            device_class: config.device_class.clone(),
            entity_category: config
                .entity_category
                .as_deref()
                .and_then(|raw| self.kind.as_kind().category_for(raw)),
            unit_of_measurement: config.unit_of_measurement.clone(),
            options: self.display.options.clone(),
        };
        self.kind
            .as_kind_mut()
            .apply_config(unique_id, config, &mut display)?;
        self.display = display;
        self.config = config.clone();
        Ok(())
    }

    fn render(&self) -> (String, HashMap<String, Value>) {
        let kind = self.kind.as_kind();
        let mut attributes: HashMap<String, Value> = self
            .extra_attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        kind.render_attributes(&mut attributes);

        let display = &self.display;
        let mut set = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                attributes.insert(key.to_string(), Value::from(value.as_str()));
            }
        };
        set("friendly_name", &display.name);
        set("icon", &display.icon);
        set("device_class", &display.device_class);
        set("unit_of_measurement", &display.unit_of_measurement);
        if let Some(options) = &display.options {
            attributes.insert("options".to_string(), Value::from(options.clone()));
        }

        let state = if self.available {
            kind.render_state()
        } else {
            STATE_UNAVAILABLE.to_string()
        };
        (state, attributes)
    }
}

/// A discovered remote object projected into the host
pub struct BridgeEntity {
    identity: Identity,
    key: DiscoveryKey,
    unique_id: String,
    platform: PlatformKind,
    entity_id: String,
    data: Arc<BridgeData>,
    inner: Mutex<EntityInner>,
    subscriptions: Mutex<Vec<Unsubscribe>>,
    on_remove: Mutex<Vec<DeferredAction>>,
    removed: AtomicBool,
}

impl BridgeEntity {
    /// Build an entity from its first discovery message
    ///
    /// Registers the entity with the host entity registry. The entity does
    /// not listen to anything until [`BridgeEntity::activate`] runs.
    pub fn new(
        platform: PlatformKind,
        data: Arc<BridgeData>,
        discovered: &Discovered,
    ) -> BridgeResult<Arc<Self>> {
        let message = &discovered.message;
        let identity = message.identity.clone();
        let unique_id = identity.unique_id();

        let mut inner = EntityInner {
            config: EntityConfig::default(),
            device_info: message.device_info.clone(),
            display: DisplayAttributes::default(),
            available: true,
            kind: KindState::new(platform, message.state.as_ref()),
            extra_attributes: Map::new(),
            link: None,
        };
        inner.apply_discovery_config(&unique_id, &message.config)?;

        if platform.is_stateful() {
            if let Some(state) = &message.state {
                let inner = &mut inner;
                inner
                    .kind
                    .as_kind_mut()
                    .apply_state(&unique_id, Some(state), &inner.display);
            }
            inner.extra_attributes = message.attributes.clone().unwrap_or_default();
        }
        if inner.kind.as_kind().is_bidirectional() {
            inner.link = Some(ConnectionLink {
                message_id: message.id,
                connection: discovered.connection.clone(),
            });
        }

        let suggested = inner
            .display
            .name
            .clone()
            .unwrap_or_else(|| identity.entity_slug.clone());
        let entry = data.hass.entity_registry.get_or_create(
            platform.as_str(),
            DOMAIN,
            &unique_id,
            Some(suggested.as_str()),
            Some(data.entry.entry_id.as_str()),
        );

        Ok(Arc::new(Self {
            key: identity.discovery_key(),
            identity,
            unique_id,
            platform,
            entity_id: entry.entity_id.clone(),
            data,
            inner: Mutex::new(inner),
            subscriptions: Mutex::new(Vec::new()),
            on_remove: Mutex::new(Vec::new()),
            removed: AtomicBool::new(false),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, EntityInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start listening on this identity's topics and write the first state
    pub fn activate(self: &Arc<Self>) {
        let mut subscriptions = vec![
            self.listen(Topic::Updated(self.key.clone()), |entity, signal| async move {
                entity.handle_discovery_signal(signal).await
            }),
            self.listen(
                Topic::ConfigChanged(self.identity.clone()),
                |entity, signal| async move {
                    if let Signal::Config(msg) = signal {
                        entity.handle_config_update(&msg);
                    }
                },
            ),
            self.listen(
                Topic::AvailabilityChanged(self.identity.clone()),
                |entity, signal| async move {
                    if let Signal::Available(msg) = signal {
                        entity.handle_availability_update(&msg);
                    }
                },
            ),
        ];
        if self.platform.is_stateful() {
            subscriptions.push(self.listen(
                Topic::StateChanged(self.identity.clone()),
                |entity, signal| async move {
                    if let Signal::State(msg) = signal {
                        entity.handle_state_update(&msg);
                    }
                },
            ));
        } else {
            subscriptions.push(self.listen(
                Topic::EventFired(self.identity.clone()),
                |entity, signal| async move {
                    if let Signal::Event(msg) = signal {
                        entity.handle_event(&msg);
                    }
                },
            ));
        }
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(subscriptions);

        self.subscribe_lost_connection();
        let device_info = self.lock().device_info.clone();
        self.update_device(device_info.as_ref());
        self.sync_registry();
        self.write_state();
        debug!(entity_id = %self.entity_id, identity = %self.identity, "Entity active");
    }

    /// Subscribe a handler that holds the entity only while it runs
    fn listen<F, Fut>(self: &Arc<Self>, topic: Topic, handler: F) -> Unsubscribe
    where
        F: Fn(Arc<Self>, Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        self.data.bus.subscribe(topic, move |signal| {
            let pending = weak.upgrade().map(|entity| handler(entity, signal));
            async move {
                if let Some(pending) = pending {
                    pending.await;
                }
            }
        })
    }

    // --- update operations ---

    async fn handle_discovery_signal(self: Arc<Self>, signal: Signal) {
        match signal {
            Signal::Update(discovered, Directive::Update) => {
                self.handle_discovery_update(&discovered);
            }
            Signal::Update(discovered, Directive::Retype) => {
                let bus = self.data.bus.clone();
                let mut message = (*discovered.message).clone();
                message.remove = false;
                let connection = discovered.connection.clone();
                self.on_remove(Box::new(move || {
                    Box::pin(async move {
                        let discovered = Discovered::new(message, connection);
                        bus.publish(&Topic::Discovery, Signal::Add(discovered))
                            .await;
                    }) as TopicFuture
                }));
                self.remove().await;
            }
            Signal::Update(_, Directive::Remove) | Signal::Teardown => {
                self.remove().await;
            }
            other => debug!(entity_id = %self.entity_id, signal = ?other, "Ignoring signal"),
        }
    }

    /// Reapply config and device info from a discovery message
    fn handle_discovery_update(self: &Arc<Self>, discovered: &Discovered) {
        let message = &discovered.message;
        {
            let mut inner = self.lock();
            if let Err(e) = inner.apply_discovery_config(&self.unique_id, &message.config) {
                warn!(entity_id = %self.entity_id, error = %e, "Ignoring discovery update");
                return;
            }
            inner.device_info = message.device_info.clone();
        }
        self.update_device(message.device_info.as_ref());

        if self.is_bidirectional() {
            let previous = {
                let mut inner = self.lock();
                inner.available = true;
                inner.link.replace(ConnectionLink {
                    message_id: message.id,
                    connection: discovered.connection.clone(),
                })
            };
            if let Some(previous) = previous {
                previous.connection.unsubscribe(previous.message_id);
            }
            self.subscribe_lost_connection();
        }

        self.sync_registry();
        self.write_state();
    }

    /// Sparse config update: only fields carried and non-empty change
    pub fn handle_config_update(&self, msg: &ConfigMessage) {
        let Some(config) = &msg.config else {
            return;
        };
        {
            let mut inner = self.lock();
            if let Some(name) = non_empty(&config.name) {
                inner.display.name = Some(name);
            }
            if let Some(icon) = non_empty(&config.icon) {
                inner.display.icon = Some(icon);
            }
            if let Some(options) = config.options.as_ref().filter(|o| !o.is_empty()) {
                inner.display.options = Some(options.clone());
            }
            if self.platform.is_stateful() {
                if let Some(device_class) = non_empty(&config.device_class) {
                    inner.display.device_class = Some(device_class);
                }
            }
        }
        self.sync_registry();
        self.write_state();
    }

    pub fn handle_availability_update(&self, msg: &AvailableMessage) {
        self.lock().available = msg.is_available();
        self.write_state();
    }

    /// Wholesale state replacement
    pub fn handle_state_update(&self, msg: &StateMessage) {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner
                .kind
                .as_kind_mut()
                .apply_state(&self.unique_id, msg.state.as_ref(), &inner.display);
            inner.extra_attributes = msg.attributes.clone().unwrap_or_default();
        }
        self.write_state();
    }

    /// Trigger an event entity
    pub fn handle_event(&self, msg: &EventMessage) {
        let data = msg.event_data.clone().unwrap_or_default();
        {
            let mut inner = self.lock();
            let KindState::Event(event) = &mut inner.kind else {
                warn!(entity_id = %self.entity_id, "Event received for a non-event entity");
                return;
            };
            event.trigger(&msg.event_type, data.clone());
        }
        self.data
            .hass
            .bus
            .fire(msg.event_type.as_str(), Value::Object(data));
        self.write_state();
    }

    fn handle_lost_connection(&self) {
        info!(entity_id = %self.entity_id, "Connection lost, marking unavailable");
        self.lock().available = false;
        self.write_state();
    }

    fn subscribe_lost_connection(self: &Arc<Self>) {
        let Some(link) = self.lock().link.clone() else {
            return;
        };
        let weak = Arc::downgrade(self);
        link.connection.subscribe(
            link.message_id,
            Arc::new(move || {
                if let Some(entity) = weak.upgrade() {
                    entity.handle_lost_connection();
                }
            }),
        );
    }

    // --- host projection ---

    /// Attach to, or detach from, the device described by `device_info`
    fn update_device(&self, device_info: Option<&DeviceInfo>) {
        let registry = &self.data.hass.entity_registry;
        let Some(info) = device_info else {
            if let Err(e) = registry.update(&self.entity_id, |e| e.device_id = None) {
                debug!(entity_id = %self.entity_id, error = %e, "No registry entry to detach");
            }
            return;
        };

        let (domain, id) = self.identity.device_identifier();
        let devices = &self.data.hass.device_registry;
        let device = devices.get_or_create(
            &[DeviceIdentifier::new(domain, id)],
            Some(self.data.entry.entry_id.as_str()),
            info.name.as_deref(),
        );
        let info = info.clone();
        let device = devices
            .update(&device.id, move |d| {
                let fields = [
                    (&mut d.name, info.name),
                    (&mut d.manufacturer, info.manufacturer),
                    (&mut d.model, info.model),
                    (&mut d.sw_version, info.sw_version),
                    (&mut d.hw_version, info.hw_version),
                    (&mut d.suggested_area, info.suggested_area),
                    (&mut d.configuration_url, info.configuration_url),
                ];
                for (field, value) in fields {
                    if value.is_some() {
                        *field = value;
                    }
                }
            })
            .unwrap_or(device);

        let device_id = device.id.clone();
        if let Err(e) = registry.update(&self.entity_id, |e| e.device_id = Some(device_id)) {
            debug!(entity_id = %self.entity_id, error = %e, "No registry entry to link");
        }
    }

    /// Mirror display attributes into the entity registry entry
    fn sync_registry(&self) {
        let display = self.lock().display.clone();
        let result = self.data.hass.entity_registry.update(&self.entity_id, |e| {
            e.original_name = display.name;
            e.original_icon = display.icon;
            e.original_device_class = display.device_class;
            e.entity_category = display.entity_category.map(|c| match c {
                EntityCategory::Config => entity_registry::EntityCategory::Config,
                EntityCategory::Diagnostic => entity_registry::EntityCategory::Diagnostic,
            });
            e.unit_of_measurement = display.unit_of_measurement;
        });
        if let Err(e) = result {
            debug!(entity_id = %self.entity_id, error = %e, "Registry entry missing");
        }
    }

    /// Write the rendered state to the host
    pub fn write_state(&self) {
        if self.is_removed() {
            return;
        }
        let (state, attributes) = self.lock().render();
        self.data
            .hass
            .states
            .set(&self.entity_id, state, attributes, Context::new());
    }

    // --- commands ---

    pub async fn turn_on(&self) -> BridgeResult<()> {
        self.send_state_command(true).await
    }

    pub async fn turn_off(&self) -> BridgeResult<()> {
        self.send_state_command(false).await
    }

    /// Ask the remote side to change state
    ///
    /// Local state is left alone until the remote reports back.
    async fn send_state_command(&self, state: bool) -> BridgeResult<()> {
        let link = if self.is_bidirectional() {
            self.lock().link.clone()
        } else {
            None
        };
        let Some(link) = link else {
            return Err(BridgeError::NotBidirectional(self.unique_id.clone()));
        };
        debug!(entity_id = %self.entity_id, state, "Sending state command");
        link.connection
            .send(OutgoingMessage::event(
                link.message_id,
                json!({"type": EVENT_STATE_CHANGED, "state": state}),
            ))
            .await
    }

    // --- removal ---

    /// Queue an action to run after removal completes
    pub fn on_remove(&self, action: Box<dyn FnOnce() -> TopicFuture + Send>) {
        self.on_remove
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }

    /// Tear the entity down
    ///
    /// Stops listening, drops the lost-connection callback, forgets the
    /// identity in the discovery registry, removes the registry entry and
    /// the state, then runs the queued actions. Removing twice does nothing.
    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    pub async fn remove(self: &Arc<Self>) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(identity = %self.identity, "Removing entity");

        let subscriptions =
            std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(|e| e.into_inner()));
        for subscription in subscriptions {
            subscription.cancel();
        }
        let link = self.lock().link.take();
        if let Some(link) = link {
            link.connection.unsubscribe(link.message_id);
        }

        self.data.discovered.remove(&self.key);
        let registry = &self.data.hass.entity_registry;
        if let Some(entity_id) =
            registry.get_entity_id(self.platform.as_str(), DOMAIN, &self.unique_id)
        {
            registry.remove(&entity_id);
        }
        self.data.hass.states.remove(&self.entity_id, Context::new());
        self.data
            .entities
            .remove_if(&self.key, |_, entity| Arc::ptr_eq(entity, self));

        let actions = std::mem::take(&mut *self.on_remove.lock().unwrap_or_else(|e| e.into_inner()));
        for action in actions {
            action().await;
        }
    }

    // --- accessors ---

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn key(&self) -> &DiscoveryKey {
        &self.key
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn is_bidirectional(&self) -> bool {
        self.lock().kind.as_kind().is_bidirectional()
    }

    pub fn display(&self) -> DisplayAttributes {
        self.lock().display.clone()
    }

    pub fn config(&self) -> EntityConfig {
        self.lock().config.clone()
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.lock().device_info.clone()
    }

    pub fn extra_attributes(&self) -> Map<String, Value> {
        self.lock().extra_attributes.clone()
    }

    /// Message id commands are tagged with, for bidirectional entities
    pub fn message_id(&self) -> Option<u64> {
        self.lock().link.as_ref().map(|link| link.message_id)
    }

    /// Run `f` against the kind state
    pub fn with_kind<R>(&self, f: impl FnOnce(&KindState) -> R) -> R {
        f(&self.lock().kind)
    }
}

impl std::fmt::Debug for BridgeEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeEntity")
            .field("identity", &self.identity)
            .field("platform", &self.platform)
            .field("entity_id", &self.entity_id)
            .field("removed", &self.is_removed())
            .finish()
    }
}
