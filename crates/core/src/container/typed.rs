//! Typed access to the container.
//!
//! The registry stores type-erased cells; these helpers derive the key from a
//! static type and downcast on the way out. A component of type `T` is stored
//! as an `Arc<T>` inside the erased cell, so `T` may be a trait object:
//!
//! ```ignore
//! container.register_instance::<dyn LibraryRepository>(Arc::new(SqlLibraryRepository::new(pool)));
//! let repo: Arc<dyn LibraryRepository> = container.resolve_typed()?;
//! ```

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::container::container::Container;
use crate::container::key::TypeKey;
use crate::container::registry::{Constructor, Instance};
use crate::errors::{BoxError, ContainerError};

/// Checked downcast of an erased cell to the `Arc<T>` it should hold
pub fn downcast<T>(key: TypeKey, instance: &Instance) -> Result<Arc<T>, ContainerError>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(ContainerError::TypeMismatch {
            key,
            expected: std::any::type_name::<T>(),
        })
}

fn erase<T>(value: Arc<T>) -> Instance
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

impl Container {
    /// Resolve a component by its static type
    pub fn resolve_typed<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let instance = self.resolve(key)?;
        downcast::<T>(key, &instance)
    }

    /// Async counterpart of [`Container::resolve_typed`]
    pub async fn resolve_typed_async<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let instance = self.resolve_async(key).await?;
        downcast::<T>(key, &instance)
    }

    /// Resolve a component that must exist.
    ///
    /// # Panics
    ///
    /// Panics with the resolution error. Meant for bootstrap code where a
    /// missing dependency is a configuration defect.
    pub fn resolve_or_fail<T>(&self) -> Arc<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.resolve_typed::<T>() {
            Ok(component) => component,
            Err(err) => {
                tracing::error!("Required component '{}' unavailable: {}", std::any::type_name::<T>(), err);
                panic!("required component unavailable: {}", err)
            }
        }
    }

    /// Resolve a component, returning `None` on any failure
    pub fn try_resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_typed::<T>().ok()
    }

    /// Register a ready instance under the key of `T`
    pub fn register_instance<T>(&self, value: Arc<T>) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_instance_raw(TypeKey::of::<T>(), erase(value))
    }

    /// Register a lazily invoked constructor under the key of `T`
    pub fn register_constructor<T, F>(&self, constructor: F) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let erased: Constructor = Arc::new(move |container: &Container| -> Result<Instance, BoxError> {
            constructor(container).map(erase)
        });
        self.register_constructor_raw(TypeKey::of::<T>(), erased)
    }

    /// Register a constructor that runs successfully at most once.
    ///
    /// Concurrent first resolutions may each invoke the registered closure; the
    /// memo makes them all receive the value built by the first one.
    pub fn register_singleton_constructor<T, F>(&self, constructor: F) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let memo: OnceCell<Arc<T>> = OnceCell::new();
        let erased: Constructor = Arc::new(move |container: &Container| -> Result<Instance, BoxError> {
            let value = memo.get_or_try_init(|| constructor(container))?;
            Ok(erase(value.clone()))
        });
        self.register_constructor_raw(TypeKey::of::<T>(), erased)
    }
}
