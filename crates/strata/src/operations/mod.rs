//! Operation bindings.

mod detach_user_policy;

pub use detach_user_policy::{DetachUserPolicy, DetachUserPolicyInput, DetachUserPolicyOutput};
