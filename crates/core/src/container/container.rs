use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use crate::config::{ContainerConfig, CycleDetection};
use crate::container::in_flight::{ChainContext, ChainId};
use crate::container::key::TypeKey;
use crate::container::registry::{Constructor, Instance, Registry};
use crate::errors::{BoxError, ContainerError, ResolutionTrace};

/// Type-keyed component container.
///
/// Components are registered during bootstrap either as ready instances or as
/// constructors, and resolved lazily by key. A resolved component is cached and
/// shared by every later resolver of the same key.
///
/// The handle is cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: RwLock<Registry>,
    config: ContainerConfig,
}

/// Outcome of the lookup phase of a resolution
enum Resolution {
    Ready(Instance),
    Construct {
        constructor: Constructor,
        mark: InFlightMark,
    },
}

/// Clears an in-flight mark when the resolution that set it ends, however it ends
struct InFlightMark {
    container: Container,
    key: TypeKey,
    chain: ChainId,
    armed: bool,
}

impl InFlightMark {
    /// The mark was already cleared together with the publish
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightMark {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut registry = self
            .container
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.in_flight.unmark(self.key, self.chain);
    }
}

/// A constructor invocation, run on its own worker thread
struct ConstructorJob {
    container: Container,
    key: TypeKey,
    constructor: Constructor,
    chain: ChainContext,
}

impl ConstructorJob {
    fn run(self) -> Result<Instance, ContainerError> {
        let ConstructorJob {
            container,
            key,
            constructor,
            chain,
        } = self;

        let _entered = chain.clone().enter();
        tracing::debug!("Invoking constructor for '{}'", key);

        match panic::catch_unwind(AssertUnwindSafe(|| constructor(&container))) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(source)) => Err(container.constructor_failed(key, &chain, source)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Constructor for '{}' panicked: {}", key, message);
                Err(ContainerError::ConstructorPanicked {
                    key,
                    message,
                    trace: container.trace(chain.path.clone()),
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Container {
    /// Create an empty container with the default configuration
    pub fn new() -> Self {
        Self::from_config(ContainerConfig::default())
    }

    /// Create an empty container with a validated configuration
    pub fn with_config(config: ContainerConfig) -> Result<Self, ContainerError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: ContainerConfig) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    pub(crate) fn read_registry(&self) -> Result<RwLockReadGuard<'_, Registry>, ContainerError> {
        self.inner
            .registry
            .read()
            .map_err(|_| ContainerError::lock_poisoned("container_registry"))
    }

    fn write_registry(&self) -> Result<RwLockWriteGuard<'_, Registry>, ContainerError> {
        self.inner
            .registry
            .write()
            .map_err(|_| ContainerError::lock_poisoned("container_registry"))
    }

    /// Store a ready instance, replacing any previous instance for the key
    pub fn register_instance_raw(&self, key: TypeKey, instance: Instance) -> Result<(), ContainerError> {
        let mut registry = self.write_registry()?;
        registry.components.insert(key, instance);
        tracing::debug!("Registered instance for '{}'", key);
        Ok(())
    }

    /// Store a constructor, replacing any previous constructor for the key
    pub fn register_constructor_raw(
        &self,
        key: TypeKey,
        constructor: Constructor,
    ) -> Result<(), ContainerError> {
        let mut registry = self.write_registry()?;
        registry.constructors.insert(key, constructor);
        tracing::debug!("Registered constructor for '{}'", key);
        Ok(())
    }

    /// Registered as an instance or a constructor
    pub fn is_registered(&self, key: &TypeKey) -> bool {
        self.read_registry()
            .map(|registry| registry.is_registered(key))
            .unwrap_or(false)
    }

    /// An instance has been registered or published for the key
    pub fn is_instantiated(&self, key: &TypeKey) -> bool {
        self.read_registry()
            .map(|registry| registry.components.contains(key))
            .unwrap_or(false)
    }

    /// A constructor for the key is running on some call chain
    pub fn is_in_flight(&self, key: &TypeKey) -> bool {
        self.read_registry()
            .map(|registry| registry.in_flight.is_in_flight(key))
            .unwrap_or(false)
    }

    pub fn registered_keys(&self) -> Vec<TypeKey> {
        self.read_registry()
            .map(|registry| registry.registered_keys())
            .unwrap_or_default()
    }

    /// Resolve a component by key, constructing and publishing it on first request.
    ///
    /// Blocks until the component is available, its constructor fails or panics,
    /// or the configured resolve timeout elapses. A timed-out constructor keeps
    /// running; whatever it produces later is discarded.
    pub fn resolve(&self, key: TypeKey) -> Result<Instance, ContainerError> {
        let chain = ChainContext::current_or_root();
        let (constructor, mark) = match self.begin(key, &chain)? {
            Resolution::Ready(instance) => return Ok(instance),
            Resolution::Construct { constructor, mark } => (constructor, mark),
        };

        let (sender, receiver) = mpsc::sync_channel(1);
        self.spawn_worker(key, constructor, chain.child(key), move |outcome| {
            if sender.send(outcome).is_err() {
                tracing::warn!("Discarding late result of constructor for '{}'", key);
            }
        })?;

        let outcome = match receiver.recv_timeout(self.inner.config.resolve_timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out(key, &chain)),
            Err(RecvTimeoutError::Disconnected) => Err(self.worker_vanished(key, &chain)),
        };

        self.finish(key, outcome, mark)
    }

    /// Resolve a component by key without blocking the async executor.
    ///
    /// Same semantics as [`Container::resolve`]; the deadline is enforced with
    /// `tokio::time::timeout`.
    pub async fn resolve_async(&self, key: TypeKey) -> Result<Instance, ContainerError> {
        let chain = ChainContext::current_or_root();
        let (constructor, mark) = match self.begin(key, &chain)? {
            Resolution::Ready(instance) => return Ok(instance),
            Resolution::Construct { constructor, mark } => (constructor, mark),
        };

        let (sender, receiver) = tokio::sync::oneshot::channel();
        self.spawn_worker(key, constructor, chain.child(key), move |outcome| {
            if sender.send(outcome).is_err() {
                tracing::warn!("Discarding late result of constructor for '{}'", key);
            }
        })?;

        let outcome = match tokio::time::timeout(self.inner.config.resolve_timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(self.worker_vanished(key, &chain)),
            Err(_) => Err(self.timed_out(key, &chain)),
        };

        self.finish(key, outcome, mark)
    }

    /// Cache lookup, cycle check and in-flight marking
    fn begin(&self, key: TypeKey, chain: &ChainContext) -> Result<Resolution, ContainerError> {
        {
            let registry = self.read_registry()?;
            if let Some(instance) = registry.components.get(&key) {
                tracing::trace!("Resolved '{}' from cache", key);
                return Ok(Resolution::Ready(instance));
            }
            self.reject_cycle(&registry, key, chain)?;
            if !registry.constructors.contains(&key) {
                return Err(Self::not_registered(&registry, key, chain));
            }
        }

        // another resolution may have published while the read lock was released
        let mut registry = self.write_registry()?;
        if let Some(instance) = registry.components.get(&key) {
            return Ok(Resolution::Ready(instance));
        }
        self.reject_cycle(&registry, key, chain)?;
        let constructor = match registry.constructors.get(&key) {
            Some(constructor) => constructor,
            None => return Err(Self::not_registered(&registry, key, chain)),
        };
        registry.in_flight.mark(key, chain.id);

        Ok(Resolution::Construct {
            constructor,
            mark: InFlightMark {
                container: self.clone(),
                key,
                chain: chain.id,
                armed: true,
            },
        })
    }

    fn reject_cycle(
        &self,
        registry: &Registry,
        key: TypeKey,
        chain: &ChainContext,
    ) -> Result<(), ContainerError> {
        let cyclic = match self.inner.config.cycle_detection {
            CycleDetection::CallChain => registry.in_flight.is_in_flight_on(&key, chain.id),
            CycleDetection::Global => registry.in_flight.is_in_flight(&key),
        };
        if !cyclic {
            return Ok(());
        }

        let trace = ResolutionTrace::new(chain.path_with(key), registry.in_flight.keys());
        tracing::warn!("Circular dependency detected at '{}' ({})", key, trace);
        Err(ContainerError::CircularDependency { key, trace })
    }

    fn not_registered(registry: &Registry, key: TypeKey, chain: &ChainContext) -> ContainerError {
        ContainerError::NotRegistered {
            key,
            trace: ResolutionTrace::new(chain.path_with(key), registry.in_flight.keys()),
        }
    }

    fn spawn_worker<F>(
        &self,
        key: TypeKey,
        constructor: Constructor,
        chain: ChainContext,
        deliver: F,
    ) -> Result<(), ContainerError>
    where
        F: FnOnce(Result<Instance, ContainerError>) + Send + 'static,
    {
        let job = ConstructorJob {
            container: self.clone(),
            key,
            constructor,
            chain,
        };

        thread::Builder::new()
            .name(format!("mediahub-ctor-{}", key.short_name()))
            .spawn(move || deliver(job.run()))
            .map(|_| ())
            .map_err(|source| ContainerError::WorkerSpawn { key, source })
    }

    /// Publish a constructed instance; an instance published first by a concurrent resolution wins
    fn finish(
        &self,
        key: TypeKey,
        outcome: Result<Instance, ContainerError>,
        mark: InFlightMark,
    ) -> Result<Instance, ContainerError> {
        let instance = outcome?;

        let mut registry = self.write_registry()?;
        let (published, fresh) = registry.components.publish(key, instance);
        registry.in_flight.unmark(key, mark.chain);
        drop(registry);
        mark.disarm();

        if fresh {
            tracing::debug!("Published component '{}'", key);
        } else {
            tracing::debug!("Discarded duplicate '{}', another resolution published first", key);
        }
        Ok(published)
    }

    fn constructor_failed(&self, key: TypeKey, chain: &ChainContext, source: BoxError) -> ContainerError {
        let source = match source.downcast::<ContainerError>() {
            // the cycle is reported to the outermost caller as is
            Ok(inner) if inner.is_circular() => return *inner,
            Ok(inner) => inner as BoxError,
            Err(source) => source,
        };

        let trace = self.trace(chain.path.clone());
        tracing::warn!("Constructor for '{}' failed: {} ({})", key, source, trace);
        ContainerError::ConstructorFailed { key, source, trace }
    }

    fn timed_out(&self, key: TypeKey, chain: &ChainContext) -> ContainerError {
        let timeout = self.inner.config.resolve_timeout;
        let trace = self.trace(chain.path_with(key));
        tracing::warn!(
            "Constructor for '{}' did not complete within {:?}, possible deadlock ({})",
            key,
            timeout,
            trace
        );
        ContainerError::Timeout { key, timeout, trace }
    }

    fn worker_vanished(&self, key: TypeKey, chain: &ChainContext) -> ContainerError {
        ContainerError::ConstructorPanicked {
            key,
            message: "constructor worker exited without reporting a result".to_string(),
            trace: self.trace(chain.path_with(key)),
        }
    }

    fn trace(&self, chain: Vec<TypeKey>) -> ResolutionTrace {
        let in_flight = self
            .read_registry()
            .map(|registry| registry.in_flight.keys())
            .unwrap_or_default();
        ResolutionTrace::new(chain, in_flight)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (instances, constructors) = self
            .read_registry()
            .map(|registry| (registry.components.len(), registry.constructors.len()))
            .unwrap_or((0, 0));

        f.debug_struct("Container")
            .field("instances", &instances)
            .field("constructors", &constructors)
            .field("resolve_timeout", &self.inner.config.resolve_timeout)
            .field("cycle_detection", &self.inner.config.cycle_detection)
            .finish()
    }
}
