//! Request-scoped context.
//!
//! A [`Context`] is an immutable chain of key/value pairs. Deriving a new
//! context with [`Context::with_value`] never changes the one it was derived
//! from, so a context can be shared freely between the caller and the rules
//! it invokes.

use std::any::{self, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque token addressing a single slot in a [`Context`].
///
/// Keys compare by identity: two keys created with the same label are
/// different keys. The label is only used for debugging.
#[derive(Clone)]
pub struct ContextKey {
    id: u64,
    label: Arc<str>,
}

impl ContextKey {
    pub fn new(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            label: Arc::from(label),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ContextKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContextKey {}

impl Hash for ContextKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({}#{})", self.label, self.id)
    }
}

struct Entry {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Entry>>,
}

impl Context {
    /// An empty context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a new context carrying `value` under `key`.
    ///
    /// A value attached later shadows any earlier value under the same key.
    #[must_use]
    pub fn with_value<T>(&self, key: &ContextKey, value: T) -> Context
    where
        T: Any + Send + Sync,
    {
        Context {
            head: Some(Arc::new(Entry {
                key: key.clone(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Returns the value attached under `key` if it is of type `T`.
    pub fn value<T: Any>(&self, key: &ContextKey) -> Option<&T> {
        self.raw_value(key)?.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.raw_value(key).is_some()
    }

    /// Returns the principal attached under `key` if it is present, non-nil
    /// and of type `A`.
    pub fn principal<A: Any>(&self, key: &ContextKey) -> Option<&A> {
        self.value::<Principal>(key)?.downcast_ref::<A>()
    }

    pub(crate) fn raw_value(&self, key: &ContextKey) -> Option<&(dyn Any + Send + Sync)> {
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if entry.key == *key {
                return Some(entry.value.as_ref());
            }
            cursor = entry.parent.as_deref();
        }
        None
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            keys.push(&entry.key);
            cursor = entry.parent.as_deref();
        }
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}

/// Authentication context as stored in a request context.
///
/// A principal is either present or an explicit nil. Nil is distinct from
/// the key being absent altogether, although the dispatcher rejects both.
#[derive(Clone)]
pub struct Principal {
    value: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl Principal {
    pub fn new<A>(value: Option<A>) -> Self
    where
        A: Any + Send + Sync,
    {
        Self {
            value: value.map(|v| Arc::new(v) as Arc<dyn Any + Send + Sync>),
            type_name: any::type_name::<A>(),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.value.is_none()
    }

    pub fn downcast_ref<A: Any>(&self) -> Option<&A> {
        self.value.as_deref()?.downcast_ref::<A>()
    }

    /// Name of the type the principal was attached as.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn as_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.value.as_deref()
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("type", &self.type_name)
            .field("nil", &self.is_nil())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct User {
        role: &'static str,
    }

    #[test]
    fn with_value_does_not_mutate_parent() {
        let key = ContextKey::new("user");
        let parent = Context::background();
        let child = parent.with_value(&key, User { role: "Admin" });

        assert!(!parent.contains(&key));
        assert_eq!(Some(&User { role: "Admin" }), child.value::<User>(&key));
    }

    #[test]
    fn later_value_shadows_earlier() {
        let key = ContextKey::new("role");
        let ctx = Context::background()
            .with_value(&key, "Guest")
            .with_value(&key, "Admin");

        assert_eq!(Some(&"Admin"), ctx.value::<&'static str>(&key));
    }

    #[test]
    fn keys_with_same_label_do_not_collide() {
        let a = ContextKey::new("auth");
        let b = ContextKey::new("auth");
        let ctx = Context::background().with_value(&a, 1_u32);

        assert_ne!(a, b);
        assert_eq!(Some(&1), ctx.value::<u32>(&a));
        assert_eq!(None, ctx.value::<u32>(&b));
    }

    #[test]
    fn value_of_wrong_type_is_none() {
        let key = ContextKey::new("n");
        let ctx = Context::background().with_value(&key, 7_i64);

        assert!(ctx.contains(&key));
        assert_eq!(None, ctx.value::<i32>(&key));
    }

    #[test]
    fn principal_nil_and_present() {
        let key = ContextKey::new("auth");
        let nil = Context::background().with_value(&key, Principal::new::<User>(None));
        let present =
            Context::background().with_value(&key, Principal::new(Some(User { role: "Guest" })));

        let p = nil.value::<Principal>(&key).unwrap();
        assert!(p.is_nil());
        assert_eq!(None, nil.principal::<User>(&key));

        assert_eq!(
            Some(&User { role: "Guest" }),
            present.principal::<User>(&key)
        );
        assert!(present
            .value::<Principal>(&key)
            .unwrap()
            .type_name()
            .ends_with("User"));
    }
}
