//! Lifecycle phases and the hook barrier.
//!
//! Every top-level widget reports each lifecycle phase on its `Widget<Phase>`
//! channel. The [`HookBarrier`] counts those reports and, once every
//! top-level widget of the current build has reported a phase, fires the
//! matching `Container<Phase>` channel exactly once.
//!
//! Reports carry the [`Generation`] of the build that produced the widget;
//! reports from an older build are ignored.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::event_bus::{ConnectionId, EventBus, Payload};
use crate::logging::targets;
use crate::model::Container;

/// Channel announcing that a freshly built container finished `onCreated`.
pub const CONTAINER_CHANGED: &str = "ContainerOnChange";

/// The six lifecycle phases a rendering layer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecyclePhase {
    /// Before the component is created.
    BeforeCreate,
    /// The component was created.
    Created,
    /// Before the component is mounted.
    BeforeMount,
    /// The component was mounted.
    Mounted,
    /// Before the component is destroyed.
    BeforeDestroy,
    /// The component was destroyed.
    Destroyed,
}

impl LifecyclePhase {
    /// All phases in the order a rendering layer runs them.
    pub const ALL: [LifecyclePhase; 6] = [
        Self::BeforeCreate,
        Self::Created,
        Self::BeforeMount,
        Self::Mounted,
        Self::BeforeDestroy,
        Self::Destroyed,
    ];

    /// Hook name as used in metadata event maps and controllers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "onBeforeCreate",
            Self::Created => "onCreated",
            Self::BeforeMount => "onBeforeMount",
            Self::Mounted => "onMounted",
            Self::BeforeDestroy => "onBeforeDestroy",
            Self::Destroyed => "onDestroyed",
        }
    }

    /// Parse a hook name such as `"onMounted"`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }

    /// Channel on which top-level widgets report this phase.
    pub fn widget_channel(self) -> &'static str {
        match self {
            Self::BeforeCreate => "WidgetOnBeforeCreate",
            Self::Created => "WidgetOnCreated",
            Self::BeforeMount => "WidgetOnBeforeMount",
            Self::Mounted => "WidgetOnMounted",
            Self::BeforeDestroy => "WidgetOnBeforeDestroy",
            Self::Destroyed => "WidgetOnDestroyed",
        }
    }

    /// Channel on which the barrier announces the container-level phase.
    pub fn container_channel(self) -> &'static str {
        match self {
            Self::BeforeCreate => "ContainerOnBeforeCreate",
            Self::Created => "ContainerOnCreated",
            Self::BeforeMount => "ContainerOnBeforeMount",
            Self::Mounted => "ContainerOnMounted",
            Self::BeforeDestroy => "ContainerOnBeforeDestroy",
            Self::Destroyed => "ContainerOnDestroyed",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build generation. Advanced every time the planned index is reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a top-level widget emits when it finishes a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookToken {
    /// The phase that completed.
    pub phase: LifecyclePhase,
    /// The build the reporting widget belongs to.
    pub generation: Generation,
}

struct BarrierState {
    generation: Generation,
    expected: usize,
    counters: [usize; 6],
    subscriptions: Vec<(LifecyclePhase, ConnectionId)>,
    container: Weak<Container>,
}

struct BarrierInner {
    bus: EventBus,
    state: Mutex<BarrierState>,
}

/// Counts per-phase widget reports and fires container-level phases.
#[derive(Clone)]
pub struct HookBarrier {
    inner: Arc<BarrierInner>,
}

impl HookBarrier {
    /// Create a barrier on `bus`, registering all widget and container
    /// phase channels plus [`CONTAINER_CHANGED`].
    pub fn new(bus: EventBus) -> Self {
        for phase in LifecyclePhase::ALL {
            bus.channel(phase.widget_channel());
            bus.channel(phase.container_channel());
        }
        bus.channel(CONTAINER_CHANGED);

        Self {
            inner: Arc::new(BarrierInner {
                bus,
                state: Mutex::new(BarrierState {
                    generation: Generation::default(),
                    expected: 0,
                    counters: [0; 6],
                    subscriptions: Vec::new(),
                    container: Weak::new(),
                }),
            }),
        }
    }

    /// Prepare for a new build: zero every counter, record how many
    /// top-level widgets must report, and (re)subscribe to the widget
    /// channels.
    pub fn arm(&self, generation: Generation, expected: usize) {
        let stale = {
            let mut state = self.inner.state.lock();
            state.generation = generation;
            state.expected = expected;
            state.counters = [0; 6];
            state.container = Weak::new();
            std::mem::take(&mut state.subscriptions)
        };
        for (phase, id) in stale {
            self.inner.bus.off(phase.widget_channel(), id);
        }

        let mut subscriptions = Vec::with_capacity(LifecyclePhase::ALL.len());
        for phase in LifecyclePhase::ALL {
            let weak = Arc::downgrade(&self.inner);
            let id = self.inner.bus.on(phase.widget_channel(), move |payload| {
                if let (Some(inner), Some(token)) = (weak.upgrade(), payload.hook_token()) {
                    HookBarrier { inner }.record(token);
                }
            });
            if let Some(id) = id {
                subscriptions.push((phase, id));
            }
        }
        self.inner.state.lock().subscriptions = subscriptions;

        tracing::debug!(target: targets::HOOKS, %generation, expected, "hook barrier armed");
    }

    /// Remember the container announced on [`CONTAINER_CHANGED`].
    pub fn attach(&self, container: &Arc<Container>) {
        self.inner.state.lock().container = Arc::downgrade(container);
    }

    /// Current count for a phase.
    pub fn count(&self, phase: LifecyclePhase) -> usize {
        self.inner.state.lock().counters[phase.index()]
    }

    /// Number of top-level widgets captured at the last build.
    pub fn expected(&self) -> usize {
        self.inner.state.lock().expected
    }

    /// Generation the barrier currently accepts.
    pub fn generation(&self) -> Generation {
        self.inner.state.lock().generation
    }

    /// Count one widget report; fire the container phase when complete.
    pub fn record(&self, token: HookToken) {
        let container = {
            let mut state = self.inner.state.lock();
            if token.generation != state.generation {
                tracing::warn!(
                    target: targets::HOOKS,
                    phase = %token.phase,
                    token = %token.generation,
                    current = %state.generation,
                    "ignoring hook report from a previous build"
                );
                return;
            }
            let expected = state.expected;
            let counter = &mut state.counters[token.phase.index()];
            *counter += 1;
            if *counter != expected {
                return;
            }
            *counter = 0;
            state
                .subscriptions
                .retain(|(phase, _)| *phase != token.phase);
            state.container.upgrade()
        };

        let phase = token.phase;
        tracing::debug!(target: targets::HOOKS, %phase, "all top-level widgets reported");
        let bus = &self.inner.bus;
        bus.emit(phase.container_channel(), Payload::Empty);
        bus.clear_callbacks(phase.widget_channel());
        bus.clear_callbacks(phase.container_channel());

        if phase == LifecyclePhase::Created {
            match container {
                Some(container) => {
                    bus.emit(CONTAINER_CHANGED, Payload::Container(container));
                }
                None => tracing::warn!(
                    target: targets::HOOKS,
                    "container dropped before onCreated completed"
                ),
            }
        }
    }
}

impl fmt::Debug for HookBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("HookBarrier")
            .field("generation", &state.generation)
            .field("expected", &state.expected)
            .field("counters", &state.counters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(phase: LifecyclePhase, generation: Generation) -> Payload {
        Payload::Hook(HookToken { phase, generation })
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(LifecyclePhase::Created.as_str(), "onCreated");
        assert_eq!(LifecyclePhase::Created.widget_channel(), "WidgetOnCreated");
        assert_eq!(
            LifecyclePhase::BeforeDestroy.container_channel(),
            "ContainerOnBeforeDestroy"
        );
        assert_eq!(
            LifecyclePhase::from_name("onMounted"),
            Some(LifecyclePhase::Mounted)
        );
        assert_eq!(LifecyclePhase::from_name("mounted"), None);
    }

    #[test]
    fn test_barrier_fires_once_after_all_reports() {
        let bus = EventBus::new();
        let barrier = HookBarrier::new(bus.clone());
        let generation = Generation::default().next();
        barrier.arm(generation, 3);

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        bus.on("ContainerOnMounted", move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, generation));
        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, generation));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(barrier.count(LifecyclePhase::Mounted), 2);

        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, generation));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(barrier.count(LifecyclePhase::Mounted), 0);

        // both channels were cleared
        assert_eq!(bus.listener_count("WidgetOnMounted"), 0);
        assert_eq!(bus.listener_count("ContainerOnMounted"), 0);
        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, generation));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let bus = EventBus::new();
        let barrier = HookBarrier::new(bus.clone());
        let old = Generation::default().next();
        let current = old.next();
        barrier.arm(current, 1);

        bus.emit("WidgetOnCreated", token(LifecyclePhase::Created, old));
        assert_eq!(barrier.count(LifecyclePhase::Created), 0);

        bus.emit("WidgetOnCreated", token(LifecyclePhase::Created, current));
        assert_eq!(bus.listener_count("WidgetOnCreated"), 0);
    }

    #[test]
    fn test_rearm_does_not_double_subscribe() {
        let bus = EventBus::new();
        let barrier = HookBarrier::new(bus.clone());
        let first = Generation::default().next();
        barrier.arm(first, 2);
        let second = first.next();
        barrier.arm(second, 2);

        assert_eq!(bus.listener_count("WidgetOnMounted"), 1);
        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, second));
        assert_eq!(barrier.count(LifecyclePhase::Mounted), 1);
    }

    #[test]
    fn test_phases_count_independently() {
        let bus = EventBus::new();
        let barrier = HookBarrier::new(bus.clone());
        let generation = Generation::default().next();
        barrier.arm(generation, 2);

        bus.emit("WidgetOnBeforeMount", token(LifecyclePhase::BeforeMount, generation));
        bus.emit("WidgetOnMounted", token(LifecyclePhase::Mounted, generation));
        assert_eq!(barrier.count(LifecyclePhase::BeforeMount), 1);
        assert_eq!(barrier.count(LifecyclePhase::Mounted), 1);
        assert_eq!(barrier.count(LifecyclePhase::Created), 0);
    }
}
