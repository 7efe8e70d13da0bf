use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::container::Container;
use crate::container::in_flight::InFlightTracker;
use crate::container::key::TypeKey;
use crate::errors::BoxError;

/// Type-erased component. For a typed component `T` the cell holds an `Arc<T>`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds a component, resolving its own dependencies from the container it is given
pub type Constructor = Arc<dyn Fn(&Container) -> Result<Instance, BoxError> + Send + Sync>;

/// Published components by key
#[derive(Default)]
pub struct ComponentStore {
    instances: HashMap<TypeKey, Instance>,
}

impl ComponentStore {
    pub fn get(&self, key: &TypeKey) -> Option<Instance> {
        self.instances.get(key).cloned()
    }

    /// Store unconditionally, replacing any previous entry
    pub fn insert(&mut self, key: TypeKey, instance: Instance) {
        self.instances.insert(key, instance);
    }

    /// Store `instance` unless the key is already published; returns the stored instance
    pub fn publish(&mut self, key: TypeKey, instance: Instance) -> (Instance, bool) {
        match self.instances.get(&key) {
            Some(existing) => (existing.clone(), false),
            None => {
                self.instances.insert(key, instance.clone());
                (instance, true)
            }
        }
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.instances.contains_key(key)
    }

    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.instances.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Registered constructors by key
#[derive(Default)]
pub struct ConstructorStore {
    constructors: HashMap<TypeKey, Constructor>,
}

impl ConstructorStore {
    pub fn get(&self, key: &TypeKey) -> Option<Constructor> {
        self.constructors.get(key).cloned()
    }

    pub fn insert(&mut self, key: TypeKey, constructor: Constructor) {
        self.constructors.insert(key, constructor);
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.constructors.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

/// All mutable state of a container, guarded as one unit
#[derive(Default)]
pub struct Registry {
    pub components: ComponentStore,
    pub constructors: ConstructorStore,
    pub in_flight: InFlightTracker,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered as an instance or a constructor
    pub fn is_registered(&self, key: &TypeKey) -> bool {
        self.components.contains(key) || self.constructors.contains(key)
    }

    /// Every key known to the registry, sorted and deduplicated
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        let mut keys = self.components.keys();
        keys.extend(self.constructors.keys());
        keys.sort();
        keys.dedup();
        keys
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.components.keys())
            .field("constructors", &self.constructors.keys())
            .field("in_flight", &self.in_flight.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Library;
    struct Catalog;

    fn instance(value: u32) -> Instance {
        Arc::new(Arc::new(value))
    }

    fn constructor(value: u32) -> Constructor {
        Arc::new(move |_: &Container| -> Result<Instance, BoxError> { Ok(instance(value)) })
    }

    #[test]
    fn test_publish_first_wins() {
        let mut store = ComponentStore::default();
        let key = TypeKey::of::<Library>();
        let first = instance(1);

        let (stored, fresh) = store.publish(key, first.clone());
        assert!(fresh);
        assert!(Arc::ptr_eq(&stored, &first));

        let (stored, fresh) = store.publish(key, instance(2));
        assert!(!fresh);
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut store = ComponentStore::default();
        let key = TypeKey::of::<Library>();
        let second = instance(2);

        store.insert(key, instance(1));
        store.insert(key, second.clone());

        let stored = store.get(&key).unwrap();
        assert!(Arc::ptr_eq(&stored, &second));
    }

    #[test]
    fn test_constructor_store_overwrites() {
        let mut store = ConstructorStore::default();
        let key = TypeKey::of::<Catalog>();
        let first = constructor(1);
        let second = constructor(2);

        store.insert(key, first);
        store.insert(key, second.clone());

        assert_eq!(store.len(), 1);
        assert!(Arc::ptr_eq(&store.get(&key).unwrap(), &second));
    }

    #[test]
    fn test_registered_keys_dedup() {
        let mut registry = Registry::new();
        registry.components.insert(TypeKey::of::<Library>(), instance(1));
        registry
            .constructors
            .insert(TypeKey::of::<Library>(), constructor(1));
        registry
            .constructors
            .insert(TypeKey::of::<Catalog>(), constructor(2));

        assert_eq!(registry.registered_keys().len(), 2);
        assert!(registry.is_registered(&TypeKey::of::<Catalog>()));
    }
}
