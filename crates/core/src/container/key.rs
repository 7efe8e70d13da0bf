use std::any::TypeId;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Identity of a component's exposed type.
///
/// Two keys are equal exactly when they were derived from the same type,
/// so `TypeKey::of::<dyn LibraryRepository>()` and
/// `TypeKey::of::<SqlLibraryRepository>()` name different components.
/// The type name is carried only for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Derive the key for a type (concrete or trait object)
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path, e.g. `JellyfinClient` or `dyn LibraryRepository`
    pub fn short_name(&self) -> &'static str {
        // generics and trait objects keep their full path
        if self.type_name.starts_with("dyn ") || self.type_name.contains('<') {
            return self.type_name;
        }
        match self.type_name.rfind("::") {
            Some(idx) => &self.type_name[idx + 2..],
            None => self.type_name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name)
    }
}
