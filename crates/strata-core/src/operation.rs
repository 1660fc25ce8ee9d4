//! Operation descriptors.
//!
//! An [`Operation`] is the immutable description of one service operation:
//! its name, the service it belongs to, the name it signs under, and the
//! concrete input/output types its serializer and deserializer expect. It is
//! built once when a client is constructed and passed explicitly to the
//! stack builder.

use std::any::TypeId;

/// Immutable descriptor of a service operation.
///
/// # Example
///
/// ```
/// use strata_core::Operation;
///
/// struct Input;
/// struct Output;
///
/// let op = Operation::new::<Input, Output>("IAM", "DetachUserPolicy", "iam");
/// assert_eq!(op.name(), "DetachUserPolicy");
/// assert!(op.expects_input::<Input>());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    service_id: &'static str,
    name: &'static str,
    signing_name: &'static str,
    input: TypeTag,
    output: TypeTag,
}

/// Identity of a concrete Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Returns the tag for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the `TypeId`.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Operation {
    /// Creates a descriptor for an operation with input `I` and output `O`.
    #[must_use]
    pub fn new<I: 'static, O: 'static>(
        service_id: &'static str,
        name: &'static str,
        signing_name: &'static str,
    ) -> Self {
        Self {
            service_id,
            name,
            signing_name,
            input: TypeTag::of::<I>(),
            output: TypeTag::of::<O>(),
        }
    }

    /// Returns the service identifier.
    #[must_use]
    pub fn service_id(&self) -> &'static str {
        self.service_id
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the name used when signing requests.
    #[must_use]
    pub fn signing_name(&self) -> &'static str {
        self.signing_name
    }

    /// Returns the input type tag.
    #[must_use]
    pub fn input(&self) -> TypeTag {
        self.input
    }

    /// Returns the output type tag.
    #[must_use]
    pub fn output(&self) -> TypeTag {
        self.output
    }

    /// Returns `true` if `T` is this operation's input type.
    #[must_use]
    pub fn expects_input<T: 'static>(&self) -> bool {
        self.input.id == TypeId::of::<T>()
    }
}
