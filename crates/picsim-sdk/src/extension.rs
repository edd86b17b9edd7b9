//! Extension descriptors: host-defined implementations of a role
//!
//! A descriptor maps a role to a set of override closures plus an
//! optional constructor, and acts as a reusable constructor value:
//! [`InterfaceDescriptor::instantiate`] /
//! [`SinkDescriptor::instantiate`] build a paired host object and
//! return it as a host-owned handle ready for adoption.
//!
//! Descriptors chain: one may extend another of the same role. On
//! instantiation, constructors run base-first, so a parent's state is
//! initialized before the child's. At dispatch time the derived-most
//! override wins, falling through the chain and finally to the role's
//! no-op default, so an omitted method never fails.

use std::any::Any;
use std::sync::Arc;

use crate::handle::{HostHandle, InterfaceHandle, SinkHandle};
use crate::roles::{Interface, SignalSink};

// ============================================================================
// Constructor arguments and instance state
// ============================================================================

/// One argument to an extension constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Integer argument
    Int(i64),
    /// String argument
    Str(String),
    /// Boolean argument
    Bool(bool),
}

/// Positional arguments passed to an extension constructor chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionArgs(Vec<ArgValue>);

impl ExtensionArgs {
    /// No arguments.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Integer argument at `index`, if present and an integer.
    pub fn int(&self, index: usize) -> Option<i64> {
        match self.0.get(index) {
            Some(ArgValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// String argument at `index`, if present and a string.
    pub fn str(&self, index: usize) -> Option<&str> {
        match self.0.get(index) {
            Some(ArgValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    /// Boolean argument at `index`, if present and a boolean.
    pub fn bool(&self, index: usize) -> Option<bool> {
        match self.0.get(index) {
            Some(ArgValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ArgValue>> for ExtensionArgs {
    fn from(args: Vec<ArgValue>) -> Self {
        Self(args)
    }
}

impl From<i64> for ExtensionArgs {
    fn from(v: i64) -> Self {
        Self(vec![ArgValue::Int(v)])
    }
}

/// Per-instance state record produced by the constructor chain.
///
/// Holds one slot per constructing descriptor, base-most first.
/// Overrides retrieve their data by type; the derived-most slot of a
/// given type wins.
#[derive(Default)]
pub struct ExtensionState {
    slots: Vec<Box<dyn Any + Send>>,
}

impl ExtensionState {
    /// Borrow the derived-most slot of type `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.slots.iter().rev().find_map(|s| s.downcast_ref())
    }

    /// Mutably borrow the derived-most slot of type `T`.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.slots.iter_mut().rev().find_map(|s| s.downcast_mut())
    }

    /// Number of constructed slots (one per constructing descriptor).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

type ConstructFn = Arc<dyn Fn(&ExtensionArgs) -> Box<dyn Any + Send> + Send + Sync>;
type HookFn = Arc<dyn Fn(&mut ExtensionState) + Send + Sync>;
type NamedHookFn = Arc<dyn Fn(&mut ExtensionState, &str) + Send + Sync>;
type StateHookFn = Arc<dyn Fn(&mut ExtensionState, char) + Send + Sync>;

// ============================================================================
// Interface descriptors
// ============================================================================

/// Host-declared implementation of the `Interface` role.
pub struct InterfaceDescriptor {
    name: String,
    parent: Option<Arc<InterfaceDescriptor>>,
    construct: Option<ConstructFn>,
    on_simulation_has_stopped: Option<HookFn>,
    on_new_processor: Option<NamedHookFn>,
    on_new_module: Option<NamedHookFn>,
    on_update: Option<HookFn>,
}

impl InterfaceDescriptor {
    /// Start building a descriptor with the given debug name.
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            inner: InterfaceDescriptor {
                name: name.into(),
                parent: None,
                construct: None,
                on_simulation_has_stopped: None,
                on_new_processor: None,
                on_new_module: None,
                on_update: None,
            },
        }
    }

    /// Descriptor debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct an instance, running the constructor chain base-first,
    /// and return it as a host-owned handle.
    pub fn instantiate(self: &Arc<Self>, args: ExtensionArgs) -> InterfaceHandle {
        HostHandle::new(Box::new(InterfaceInstance {
            descriptor: Arc::clone(self),
            state: build_state(self.constructor_chain(), &args),
        }))
    }

    /// Constructors along the parent chain, base-most first.
    fn constructor_chain(&self) -> Vec<ConstructFn> {
        let mut chain = match &self.parent {
            Some(p) => p.constructor_chain(),
            None => Vec::new(),
        };
        if let Some(c) = &self.construct {
            chain.push(Arc::clone(c));
        }
        chain
    }

    fn find_simulation_has_stopped(&self) -> Option<HookFn> {
        self.on_simulation_has_stopped
            .clone()
            .or_else(|| self.parent.as_ref()?.find_simulation_has_stopped())
    }

    fn find_new_processor(&self) -> Option<NamedHookFn> {
        self.on_new_processor
            .clone()
            .or_else(|| self.parent.as_ref()?.find_new_processor())
    }

    fn find_new_module(&self) -> Option<NamedHookFn> {
        self.on_new_module
            .clone()
            .or_else(|| self.parent.as_ref()?.find_new_module())
    }

    fn find_update(&self) -> Option<HookFn> {
        self.on_update
            .clone()
            .or_else(|| self.parent.as_ref()?.find_update())
    }
}

/// Builder for [`InterfaceDescriptor`].
pub struct InterfaceBuilder {
    inner: InterfaceDescriptor,
}

impl InterfaceBuilder {
    /// Extend an existing descriptor. The parent's constructor runs
    /// first and its overrides back any the child omits.
    pub fn extending(mut self, parent: &Arc<InterfaceDescriptor>) -> Self {
        self.inner.parent = Some(Arc::clone(parent));
        self
    }

    /// Set the construction step producing this level's state slot.
    pub fn construct<T: Any + Send>(
        mut self,
        f: impl Fn(&ExtensionArgs) -> T + Send + Sync + 'static,
    ) -> Self {
        self.inner.construct = Some(Arc::new(move |args| Box::new(f(args))));
        self
    }

    /// Override `simulation_has_stopped`.
    pub fn on_simulation_has_stopped(
        mut self,
        f: impl Fn(&mut ExtensionState) + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_simulation_has_stopped = Some(Arc::new(f));
        self
    }

    /// Override `new_processor`.
    pub fn on_new_processor(
        mut self,
        f: impl Fn(&mut ExtensionState, &str) + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_new_processor = Some(Arc::new(f));
        self
    }

    /// Override `new_module`.
    pub fn on_new_module(
        mut self,
        f: impl Fn(&mut ExtensionState, &str) + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_new_module = Some(Arc::new(f));
        self
    }

    /// Override `update`.
    pub fn on_update(mut self, f: impl Fn(&mut ExtensionState) + Send + Sync + 'static) -> Self {
        self.inner.on_update = Some(Arc::new(f));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Arc<InterfaceDescriptor> {
        Arc::new(self.inner)
    }
}

struct InterfaceInstance {
    descriptor: Arc<InterfaceDescriptor>,
    state: ExtensionState,
}

impl Interface for InterfaceInstance {
    fn simulation_has_stopped(&mut self) {
        if let Some(f) = self.descriptor.find_simulation_has_stopped() {
            f(&mut self.state);
        }
    }

    fn new_processor(&mut self, name: &str) {
        if let Some(f) = self.descriptor.find_new_processor() {
            f(&mut self.state, name);
        }
    }

    fn new_module(&mut self, name: &str) {
        if let Some(f) = self.descriptor.find_new_module() {
            f(&mut self.state, name);
        }
    }

    fn update(&mut self) {
        if let Some(f) = self.descriptor.find_update() {
            f(&mut self.state);
        }
    }
}

// ============================================================================
// Signal sink descriptors
// ============================================================================

/// Host-declared implementation of the `SignalSink` role.
pub struct SinkDescriptor {
    name: String,
    parent: Option<Arc<SinkDescriptor>>,
    construct: Option<ConstructFn>,
    on_set_sink_state: Option<StateHookFn>,
    on_release: Option<HookFn>,
}

impl SinkDescriptor {
    /// Start building a descriptor with the given debug name.
    pub fn builder(name: impl Into<String>) -> SinkBuilder {
        SinkBuilder {
            inner: SinkDescriptor {
                name: name.into(),
                parent: None,
                construct: None,
                on_set_sink_state: None,
                on_release: None,
            },
        }
    }

    /// Descriptor debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct an instance, running the constructor chain base-first,
    /// and return it as a host-owned handle.
    pub fn instantiate(self: &Arc<Self>, args: ExtensionArgs) -> SinkHandle {
        HostHandle::new(Box::new(SinkInstance {
            descriptor: Arc::clone(self),
            state: build_state(self.constructor_chain(), &args),
        }))
    }

    fn constructor_chain(&self) -> Vec<ConstructFn> {
        let mut chain = match &self.parent {
            Some(p) => p.constructor_chain(),
            None => Vec::new(),
        };
        if let Some(c) = &self.construct {
            chain.push(Arc::clone(c));
        }
        chain
    }

    fn find_set_sink_state(&self) -> Option<StateHookFn> {
        self.on_set_sink_state
            .clone()
            .or_else(|| self.parent.as_ref()?.find_set_sink_state())
    }

    fn find_release(&self) -> Option<HookFn> {
        self.on_release
            .clone()
            .or_else(|| self.parent.as_ref()?.find_release())
    }
}

/// Builder for [`SinkDescriptor`].
pub struct SinkBuilder {
    inner: SinkDescriptor,
}

impl SinkBuilder {
    /// Extend an existing descriptor. The parent's constructor runs
    /// first and its overrides back any the child omits.
    pub fn extending(mut self, parent: &Arc<SinkDescriptor>) -> Self {
        self.inner.parent = Some(Arc::clone(parent));
        self
    }

    /// Set the construction step producing this level's state slot.
    pub fn construct<T: Any + Send>(
        mut self,
        f: impl Fn(&ExtensionArgs) -> T + Send + Sync + 'static,
    ) -> Self {
        self.inner.construct = Some(Arc::new(move |args| Box::new(f(args))));
        self
    }

    /// Override `set_sink_state`.
    pub fn on_set_sink_state(
        mut self,
        f: impl Fn(&mut ExtensionState, char) + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_set_sink_state = Some(Arc::new(f));
        self
    }

    /// Override `release`.
    pub fn on_release(mut self, f: impl Fn(&mut ExtensionState) + Send + Sync + 'static) -> Self {
        self.inner.on_release = Some(Arc::new(f));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Arc<SinkDescriptor> {
        Arc::new(self.inner)
    }
}

struct SinkInstance {
    descriptor: Arc<SinkDescriptor>,
    state: ExtensionState,
}

impl SignalSink for SinkInstance {
    fn set_sink_state(&mut self, state: char) {
        if let Some(f) = self.descriptor.find_set_sink_state() {
            f(&mut self.state, state);
        }
    }

    fn release(&mut self) {
        if let Some(f) = self.descriptor.find_release() {
            f(&mut self.state);
        }
    }
}

fn build_state(chain: Vec<ConstructFn>, args: &ExtensionArgs) -> ExtensionState {
    ExtensionState {
        slots: chain.into_iter().map(|c| c(args)).collect(),
    }
}
