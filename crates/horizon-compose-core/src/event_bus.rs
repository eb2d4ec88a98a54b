//! Named-channel publish/subscribe bus.
//!
//! The bus decouples the component tree from the hook barrier: widgets report
//! lifecycle completion on `Widget<Phase>` channels, the barrier listens and
//! announces container-level phases on `Container<Phase>` channels.
//!
//! Channels must be registered with [`EventBus::channel`] before anyone can
//! listen on them. Subscribing to or emitting on an unknown channel is a
//! silent no-op.
//!
//! # Example
//!
//! ```
//! use horizon_compose_core::{EventBus, Payload};
//!
//! let bus = EventBus::new();
//! let channel = bus.channel("ContainerOnMounted");
//!
//! let id = bus.on("ContainerOnMounted", |_payload| {
//!     println!("container mounted");
//! });
//! assert!(id.is_some());
//!
//! channel.emit(Payload::Empty);
//! channel.clear_callbacks();
//! assert_eq!(bus.listener_count("ContainerOnMounted"), 0);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::hooks::HookToken;
use crate::logging::targets;
use crate::model::Container;

new_key_type! {
    /// Identifies one subscription on one channel.
    ///
    /// Returned by [`EventBus::on`] and accepted by [`EventBus::off`].
    pub struct ConnectionId;
}

/// The value delivered to every listener of an emission.
#[derive(Clone)]
pub enum Payload {
    /// No arguments.
    Empty,
    /// A widget reporting that it finished a lifecycle phase.
    Hook(HookToken),
    /// The container that just finished creation.
    Container(Arc<Container>),
    /// Free-form data for application channels.
    Json(serde_json::Value),
}

impl Payload {
    /// The hook token carried by this payload, if any.
    pub fn hook_token(&self) -> Option<HookToken> {
        match self {
            Self::Hook(token) => Some(*token),
            _ => None,
        }
    }

    /// The container carried by this payload, if any.
    pub fn container(&self) -> Option<&Arc<Container>> {
        match self {
            Self::Container(container) => Some(container),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Hook(token) => f.debug_tuple("Hook").field(token).finish(),
            Self::Container(container) => f.debug_tuple("Container").field(&container.name()).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

type Callback = Arc<dyn Fn(&Payload) + Send + Sync>;

#[derive(Default)]
struct ChannelData {
    callbacks: SlotMap<ConnectionId, Callback>,
    // slot keys get reused, so registration order is tracked separately
    order: Vec<ConnectionId>,
}

impl ChannelData {
    fn snapshot(&self) -> Vec<Callback> {
        self.order
            .iter()
            .filter_map(|id| self.callbacks.get(*id).cloned())
            .collect()
    }
}

/// A cloneable handle to a set of named channels.
///
/// All clones share the same channels. Listeners run synchronously on the
/// emitting thread, in registration order. The listener list is snapshotted
/// before dispatch, so a listener may subscribe, unsubscribe or clear
/// channels (including its own) without deadlocking.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<String, ChannelData>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, replacing any existing channel of the same name.
    ///
    /// Replacing drops every listener of the previous channel.
    pub fn channel(&self, name: impl Into<String>) -> Channel {
        let name = name.into();
        self.channels
            .lock()
            .insert(name.clone(), ChannelData::default());
        tracing::debug!(target: targets::BUS, channel = %name, "channel registered");
        Channel {
            bus: self.clone(),
            name,
        }
    }

    /// Whether a channel of this name is registered.
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.lock().contains_key(name)
    }

    /// Subscribe to a channel.
    ///
    /// Returns `None` when the channel is not registered.
    pub fn on<F>(&self, name: &str, callback: F) -> Option<ConnectionId>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(name)?;
        let id = channel.callbacks.insert(Arc::new(callback));
        channel.order.push(id);
        Some(id)
    }

    /// Remove one subscription. Returns `true` if it existed.
    pub fn off(&self, name: &str, id: ConnectionId) -> bool {
        let mut channels = self.channels.lock();
        let Some(channel) = channels.get_mut(name) else {
            return false;
        };
        channel.order.retain(|existing| *existing != id);
        channel.callbacks.remove(id).is_some()
    }

    /// Invoke every listener of `name` with `payload`.
    ///
    /// Returns the number of listeners invoked.
    #[tracing::instrument(skip(self, payload), target = "horizon_compose_core::event_bus", level = "trace")]
    pub fn emit(&self, name: &str, payload: Payload) -> usize {
        let listeners = match self.channels.lock().get(name) {
            Some(channel) => channel.snapshot(),
            None => {
                tracing::trace!(target: targets::BUS, "emit on unregistered channel ignored");
                return 0;
            }
        };
        tracing::trace!(target: targets::BUS, listener_count = listeners.len(), "emitting");
        for listener in &listeners {
            listener(&payload);
        }
        listeners.len()
    }

    /// Drop every listener of a channel while keeping the channel registered.
    pub fn clear_callbacks(&self, name: &str) {
        if let Some(channel) = self.channels.lock().get_mut(name) {
            channel.callbacks.clear();
            channel.order.clear();
        }
    }

    /// Unregister a channel and all its listeners.
    pub fn remove_channel(&self, name: &str) -> bool {
        self.channels.lock().remove(name).is_some()
    }

    /// Number of listeners on a channel (zero for unknown channels).
    pub fn listener_count(&self, name: &str) -> usize {
        self.channels
            .lock()
            .get(name)
            .map_or(0, |channel| channel.callbacks.len())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.lock();
        let mut names: Vec<&String> = channels.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("channels", &names).finish()
    }
}

/// Owner handle for one registered channel.
#[derive(Clone, Debug)]
pub struct Channel {
    bus: EventBus,
    name: String,
}

impl Channel {
    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to this channel.
    pub fn on<F>(&self, callback: F) -> Option<ConnectionId>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.bus.on(&self.name, callback)
    }

    /// Emit on this channel.
    pub fn emit(&self, payload: Payload) -> usize {
        self.bus.emit(&self.name, payload)
    }

    /// Drop every listener, keeping the channel registered.
    pub fn clear_callbacks(&self) {
        self.bus.clear_callbacks(&self.name);
    }

    /// Unregister the channel.
    pub fn off(self) -> bool {
        self.bus.remove_channel(&self.name)
    }
}
