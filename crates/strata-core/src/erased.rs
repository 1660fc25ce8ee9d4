//! Type-erased operation input and output.
//!
//! The middleware stack is shared by every operation, so typed inputs and
//! outputs travel through it erased. Serializer, validator and deserializer
//! steps recover the concrete type; a mismatch is a wiring error.

use std::any::{Any, TypeId};
use std::fmt;

/// A boxed value whose concrete type is recorded for later recovery.
pub struct TypeErasedBox {
    value: Box<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeErasedBox {
    /// Erases a value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the `TypeId` of the erased value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the erased value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the erased value is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrows the value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Recovers the value as a `T`, or returns the box unchanged.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        let Self {
            value,
            type_id,
            type_name,
        } = self;
        value.downcast::<T>().map(|b| *b).map_err(|value| Self {
            value,
            type_id,
            type_name,
        })
    }
}

impl fmt::Debug for TypeErasedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeErasedBox")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
