//! The client.
//!
//! A [`Client`] owns everything calls share: the transport and its
//! connection pool, the signer and credentials, the retry token bucket and
//! the configuration. Stacks are assembled on first use of each operation
//! and reused by every later call.

use crate::operation::{CallOptions, OperationSpec};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use strata_config::StrataConfig;
use strata_core::{Credentials, SdkError, SdkResult};
use strata_middleware::{
    common_steps, HmacSha256Signer, HyperTransport, Invoker, Output, PipelineConfig, Signer,
    Stack, StackBuilder, TokenBucket, Transport,
};
use tracing::debug;

/// Invokes operations through the request pipeline.
///
/// Cheap to clone; clones share the transport, token bucket and stack cache.
///
/// # Example
///
/// ```ignore
/// use strata::{Client, Credentials, StrataConfig};
/// use strata::operations::DetachUserPolicyInput;
///
/// let client = Client::builder()
///     .config(config)
///     .credentials(Credentials::new("AKID", "secret"))
///     .build()?;
///
/// let output = client
///     .detach_user_policy(DetachUserPolicyInput::new("alice", "arn:aws:iam::aws:policy/ReadOnlyAccess"))
///     .await?;
/// println!("request id: {:?}", output.metadata.request_id());
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: StrataConfig,
    pipeline: PipelineConfig,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
    credentials: Credentials,
    bucket: Arc<TokenBucket>,
    stacks: RwLock<HashMap<TypeId, Arc<Stack>>>,
}

impl Client {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Returns the configuration the client was built from.
    #[must_use]
    pub fn config(&self) -> &StrataConfig {
        &self.inner.config
    }

    /// Returns the retry token bucket shared by every call.
    #[must_use]
    pub fn token_bucket(&self) -> &Arc<TokenBucket> {
        &self.inner.bucket
    }

    /// Invokes `Op` with default call options.
    ///
    /// # Errors
    ///
    /// Returns whatever the pipeline fails with.
    pub async fn invoke<Op: OperationSpec>(
        &self,
        op: Op,
        input: Op::Input,
    ) -> SdkResult<Output<Op::Output>> {
        self.invoke_with(op, input, |_| {}).await
    }

    /// Invokes `Op` after letting `configure` adjust this call's options.
    ///
    /// # Errors
    ///
    /// Returns whatever the pipeline fails with.
    pub async fn invoke_with<Op, F>(
        &self,
        _op: Op,
        input: Op::Input,
        configure: F,
    ) -> SdkResult<Output<Op::Output>>
    where
        Op: OperationSpec,
        F: FnOnce(&mut CallOptions),
    {
        let mut options = CallOptions::default();
        configure(&mut options);

        let stack = self.stack::<Op>()?;
        Invoker::new(stack, self.inner.transport.clone())
            .call::<Op::Input, Op::Output>(options.into_call_context(), input)
            .await
    }

    /// Returns the cached stack for `Op`, assembling it on first use.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if the operation's steps cannot be placed.
    pub fn stack<Op: OperationSpec>(&self) -> SdkResult<Arc<Stack>> {
        let key = TypeId::of::<Op>();
        if let Some(stack) = self.inner.stacks.read().get(&key) {
            return Ok(stack.clone());
        }

        let stack = Arc::new(self.assemble::<Op>()?);
        let mut stacks = self.inner.stacks.write();
        Ok(stacks.entry(key).or_insert(stack).clone())
    }

    fn assemble<Op: OperationSpec>(&self) -> SdkResult<Stack> {
        let inner = &self.inner;
        let common = common_steps(
            &inner.pipeline,
            inner.signer.clone(),
            inner.credentials.clone(),
            inner.bucket.clone(),
        )?;
        let stack = StackBuilder::assemble(Op::operation(), common, Op::steps())?;
        debug!(
            operation = stack.operation().name(),
            steps = stack.len(),
            "assembled stack"
        );
        Ok(stack)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("region", &self.inner.pipeline.region)
            .field("endpoint", &self.inner.pipeline.endpoint)
            .field("cached_stacks", &self.inner.stacks.read().len())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<StrataConfig>,
    credentials: Option<Credentials>,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
}

impl ClientBuilder {
    /// Sets the configuration. Defaults to [`StrataConfig::default`].
    #[must_use]
    pub fn config(mut self, config: StrataConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the signing credentials. Required.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replaces the transport. Defaults to a [`HyperTransport`] using the
    /// configured request timeout.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the signer. Defaults to [`HmacSha256Signer`].
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if credentials are missing, the
    /// configuration is invalid, or the endpoint cannot be parsed.
    pub fn build(self) -> SdkResult<Client> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| SdkError::assembly(format!("invalid client configuration: {e}")))?;

        let credentials = self
            .credentials
            .ok_or_else(|| SdkError::assembly("client credentials are required"))?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::with_timeout(config.request_timeout())));
        let signer = self
            .signer
            .unwrap_or_else(|| Arc::new(HmacSha256Signer::new()));
        let bucket = Arc::new(TokenBucket::new(config.retry.token_bucket_capacity));
        let pipeline = config.pipeline_config();

        // Surface endpoint problems now rather than on the first call.
        common_steps(&pipeline, signer.clone(), credentials.clone(), bucket.clone())?;

        debug!(
            region = pipeline.region.as_deref(),
            endpoint = pipeline.endpoint.as_deref(),
            max_attempts = pipeline.retry.max_attempts,
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                pipeline,
                transport,
                signer,
                credentials,
                bucket,
                stacks: RwLock::new(HashMap::new()),
            }),
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("has_credentials", &self.credentials.is_some())
            .field("has_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
