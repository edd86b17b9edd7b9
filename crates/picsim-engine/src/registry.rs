//! Processor type registry
//!
//! Maps processor type names to constructor descriptors. Registries are
//! explicit, instantiable objects so independent simulation sessions
//! (and tests) can coexist; a process-wide default registry carrying
//! the built-in types exists for convenience.
//!
//! Iteration order over a registry is unspecified and must not be
//! relied on.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::pic14;
use crate::processor::Processor;

type BuildFn = Arc<dyn Fn(&str) -> Processor + Send + Sync>;

/// Constructor descriptor for one processor type.
///
/// A constructor may answer to several aliases (family variants that
/// share a model).
pub struct ProcessorConstructor {
    names: Vec<String>,
    build: BuildFn,
}

impl ProcessorConstructor {
    /// Create a descriptor for the given aliases.
    pub fn new(
        names: &[&str],
        build: impl Fn(&str) -> Processor + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            build: Arc::new(build),
        })
    }

    /// Type name aliases this constructor answers to.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Construct a processor instance with the given name.
    pub fn construct(&self, name: &str) -> Processor {
        (self.build)(name)
    }
}

impl std::fmt::Debug for ProcessorConstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConstructor")
            .field("names", &self.names)
            .finish()
    }
}

/// Registry of processor constructors, keyed by type name.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    by_name: FxHashMap<String, Arc<ProcessorConstructor>>,
    constructors: Vec<Arc<ProcessorConstructor>>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in processor types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ProcessorConstructor::new(
            &["p16f887", "p16f884", "p16f882"],
            |name| pic14::construct(name, "p16f887"),
        ));
        registry
    }

    /// Register a constructor under all of its aliases. A later
    /// registration of an already-used alias wins.
    pub fn register(&mut self, constructor: Arc<ProcessorConstructor>) {
        for name in constructor.names() {
            self.by_name.insert(name.clone(), Arc::clone(&constructor));
        }
        self.constructors.push(constructor);
    }

    /// Look up a constructor by type name. Absent types are `None`,
    /// never an error.
    pub fn find_by_type(&self, type_name: &str) -> Option<Arc<ProcessorConstructor>> {
        self.by_name.get(type_name).cloned()
    }

    /// All registered constructors, in unspecified order.
    pub fn constructors(&self) -> impl Iterator<Item = &Arc<ProcessorConstructor>> {
        self.constructors.iter()
    }

    /// Number of registered constructors.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

static DEFAULT_REGISTRY: Lazy<RwLock<ProcessorRegistry>> =
    Lazy::new(|| RwLock::new(ProcessorRegistry::with_builtins()));

/// The process-wide default registry, preloaded with built-in types.
pub fn default_registry() -> &'static RwLock<ProcessorRegistry> {
    &DEFAULT_REGISTRY
}

/// Look up a type in the process-wide default registry.
pub fn find_by_type(type_name: &str) -> Option<Arc<ProcessorConstructor>> {
    DEFAULT_REGISTRY.read().find_by_type(type_name)
}
