//! # Strata Core
//!
//! Core types shared by every Strata crate.
//!
//! This crate provides the foundational types used throughout the pipeline:
//!
//! - [`SdkError`] / [`ErrorKind`] - The classified error taxonomy
//! - [`Operation`] - Immutable operation descriptor
//! - [`InvocationId`] - UUID v7 identifier sent with every attempt of a call
//! - [`HttpRequest`] / [`HttpResponse`] / [`SdkBody`] - Protocol messages
//! - [`ResultMetadata`] - Side-channel data returned with every output
//! - [`TypeErasedBox`] - Operation input/output carried through the stack

#![doc(html_root_url = "https://docs.rs/strata-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod credentials;
mod erased;
mod error;
pub mod http;
mod metadata;
mod operation;

pub use context::InvocationId;
pub use credentials::Credentials;
pub use erased::TypeErasedBox;
pub use error::{
    BoxError, ErrorDetail, ErrorEnvelope, ErrorKind, FieldErrors, SdkError, SdkResult,
};
pub use http::{HttpRequest, HttpResponse, SdkBody};
pub use metadata::ResultMetadata;
pub use operation::{Operation, TypeTag};
