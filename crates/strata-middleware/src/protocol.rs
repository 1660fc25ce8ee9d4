//! Operation-specific steps: input validation, serialization and
//! deserialization.
//!
//! The pipeline is protocol-agnostic. Each operation supplies a
//! [`Validate`] impl on its input, a [`SerializeRequest`] that writes the
//! input into the request, and a [`DeserializeResponse`] that reads the
//! output (or a service error) back out. The steps here adapt those to the
//! [`Step`] trait and carry the concrete types so the stack builder can
//! reject mismatched wiring.
//!
//! Two stock codecs are provided: [`FormQuerySerializer`] for the
//! form-encoded `Action=...&Version=...` query protocol and
//! [`JsonDeserializer`] for JSON response bodies.

use crate::context::InvocationContext;
use crate::step::{BoxFuture, Next, Step};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use strata_core::{
    FieldErrors, HttpRequest, HttpResponse, SdkBody, SdkError, SdkResult, TypeErasedBox, TypeTag,
};

/// Content type of form-encoded query requests.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Input validation run before serialization.
///
/// # Example
///
/// ```
/// use strata_core::FieldErrors;
/// use strata_middleware::protocol::Validate;
///
/// struct Input {
///     user_name: Option<String>,
/// }
///
/// impl Validate for Input {
///     fn validate(&self, errors: &mut FieldErrors) {
///         if self.user_name.is_none() {
///             errors.missing("UserName");
///         }
///     }
/// }
/// ```
pub trait Validate {
    /// Records every problem with `self` in `errors`.
    fn validate(&self, errors: &mut FieldErrors);
}

/// Writes a typed input into the request.
pub trait SerializeRequest: Send + Sync + 'static {
    /// Operation input type.
    type Input: Send + Sync + 'static;

    /// Serializes `input` into `request`.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if the input cannot be encoded.
    fn serialize(&self, input: &Self::Input, request: &mut HttpRequest) -> SdkResult<()>;
}

/// Reads a typed output from a response.
pub trait DeserializeResponse: Send + Sync + 'static {
    /// Operation output type.
    type Output: Send + Sync + 'static;

    /// Deserializes `response` into an output, or the service error it
    /// carries.
    ///
    /// # Errors
    ///
    /// Returns a service error for a structured error payload and a protocol
    /// error for a body that cannot be decoded.
    fn deserialize(&self, response: &HttpResponse) -> SdkResult<Self::Output>;
}

/// Runs [`Validate`] on the operation input.
pub struct ValidateStep<I> {
    _input: PhantomData<fn() -> I>,
}

impl<I> ValidateStep<I> {
    /// Step id.
    pub const ID: &'static str = "operation_input_validation";

    /// Creates the step.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _input: PhantomData,
        }
    }
}

impl<I> Default for ValidateStep<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> fmt::Debug for ValidateStep<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidateStep")
            .field("input", &std::any::type_name::<I>())
            .finish()
    }
}

impl<I> Step for ValidateStep<I>
where
    I: Validate + 'static,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn input_type(&self) -> Option<TypeTag> {
        Some(TypeTag::of::<I>())
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let mut errors = FieldErrors::new();
            ctx.input::<I>()?.validate(&mut errors);
            errors.into_result(ctx.operation().name())?;
            next.run(ctx).await
        })
    }
}

/// Adapts a [`SerializeRequest`] to a step.
#[derive(Debug, Clone)]
pub struct SerializeStep<S> {
    serializer: S,
}

impl<S> SerializeStep<S> {
    /// Step id.
    pub const ID: &'static str = "operation_serializer";

    /// Wraps `serializer`.
    #[must_use]
    pub const fn new(serializer: S) -> Self {
        Self { serializer }
    }
}

impl<S: SerializeRequest> Step for SerializeStep<S> {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn input_type(&self) -> Option<TypeTag> {
        Some(TypeTag::of::<S::Input>())
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let (input, request) = ctx.input_and_request_mut::<S::Input>()?;
            self.serializer.serialize(input, request)?;
            next.run(ctx).await
        })
    }
}

/// Adapts a [`DeserializeResponse`] to a step.
#[derive(Debug, Clone)]
pub struct DeserializeStep<D> {
    deserializer: D,
}

impl<D> DeserializeStep<D> {
    /// Step id.
    pub const ID: &'static str = "operation_deserializer";

    /// Wraps `deserializer`.
    #[must_use]
    pub const fn new(deserializer: D) -> Self {
        Self { deserializer }
    }
}

impl<D: DeserializeResponse> Step for DeserializeStep<D> {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn output_type(&self) -> Option<TypeTag> {
        Some(TypeTag::of::<D::Output>())
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            next.run(ctx).await?;
            let response = ctx
                .response()
                .ok_or_else(|| SdkError::assembly("deserializer ran without a response"))?;
            let output = self.deserializer.deserialize(response)?;
            ctx.set_output(TypeErasedBox::new(output));
            Ok(())
        })
    }
}

/// Form-encoded query protocol serializer.
///
/// Produces `POST /` with a body of `Action=<action>&Version=<version>`
/// followed by every non-null top-level field of the input's serde
/// representation. Nested values are rejected.
pub struct FormQuerySerializer<I> {
    action: &'static str,
    version: &'static str,
    _input: PhantomData<fn(&I)>,
}

impl<I> FormQuerySerializer<I> {
    /// Creates a serializer for `action` at API `version`.
    #[must_use]
    pub const fn new(action: &'static str, version: &'static str) -> Self {
        Self {
            action,
            version,
            _input: PhantomData,
        }
    }

    /// Encodes `input` as a form body.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if `input` does not serialize to a flat
    /// object.
    pub fn encode(&self, input: &I) -> SdkResult<String>
    where
        I: Serialize,
    {
        let value = serde_json::to_value(input)
            .map_err(|e| SdkError::assembly(format!("{}: cannot encode input: {e}", self.action)))?;
        let Value::Object(fields) = value else {
            return Err(SdkError::assembly(format!(
                "{}: input must serialize to an object",
                self.action
            )));
        };

        let mut pairs = vec![
            ("Action".to_string(), self.action.to_string()),
            ("Version".to_string(), self.version.to_string()),
        ];
        for (name, value) in fields {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(SdkError::assembly(format!(
                        "{}: field {name} is not a scalar",
                        self.action
                    )))
                }
            };
            pairs.push((name, value));
        }

        Ok(pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&"))
    }
}

impl<I> fmt::Debug for FormQuerySerializer<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormQuerySerializer")
            .field("action", &self.action)
            .field("version", &self.version)
            .finish()
    }
}

impl<I> SerializeRequest for FormQuerySerializer<I>
where
    I: Serialize + Send + Sync + 'static,
{
    type Input = I;

    fn serialize(&self, input: &I, request: &mut HttpRequest) -> SdkResult<()> {
        let body = self.encode(input)?;
        request.set_method(Method::POST);
        request.set_uri(Uri::from_static("/"));
        request.set_header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        request.set_body(SdkBody::from_bytes(body));
        Ok(())
    }
}

/// JSON response deserializer.
///
/// A 2xx body is parsed as `O`; an empty body is read as `{}`. Any other
/// status is parsed as an error document carrying `__type` or `code` and
/// `message`; a `prefix#Code` type is reduced to `Code`.
pub struct JsonDeserializer<O> {
    _output: PhantomData<fn() -> O>,
}

impl<O> JsonDeserializer<O> {
    /// Creates the deserializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _output: PhantomData,
        }
    }
}

impl<O> Default for JsonDeserializer<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for JsonDeserializer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDeserializer")
            .field("output", &std::any::type_name::<O>())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(alias = "__type", alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl<O> DeserializeResponse for JsonDeserializer<O>
where
    O: DeserializeOwned + Send + Sync + 'static,
{
    type Output = O;

    fn deserialize(&self, response: &HttpResponse) -> SdkResult<O> {
        let status = response.status().as_u16();
        let body: &[u8] = match &response.body()[..] {
            b"" => b"{}",
            body => body,
        };

        if response.is_success() {
            return serde_json::from_slice(body).map_err(|e| {
                SdkError::protocol(format!("cannot decode response body: {e}")).with_status(status)
            });
        }

        match serde_json::from_slice::<ErrorDocument>(body) {
            Ok(ErrorDocument {
                code: Some(code), message,
            }) => {
                let code = code.rsplit('#').next().unwrap_or(&code).to_string();
                Err(SdkError::service(code, message.unwrap_or_default(), status))
            }
            _ => Err(SdkError::protocol(format!(
                "unrecognized error response with status {status}"
            ))
            .with_status(status)),
        }
    }
}
