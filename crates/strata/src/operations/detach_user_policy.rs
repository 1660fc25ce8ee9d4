//! `DetachUserPolicy`: removes a managed policy from a user.

use crate::client::Client;
use crate::operation::OperationSpec;
use serde::{Deserialize, Serialize};
use strata_core::{FieldErrors, Operation, SdkResult};
use strata_middleware::protocol::{FormQuerySerializer, JsonDeserializer, Validate};
use strata_middleware::{operation_steps, Output, StepRegistration};

const ACTION: &str = "DetachUserPolicy";
const API_VERSION: &str = "2010-05-08";

/// Input for [`DetachUserPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetachUserPolicyInput {
    /// ARN of the managed policy to detach.
    pub policy_arn: Option<String>,
    /// Name of the user the policy is attached to.
    pub user_name: Option<String>,
}

impl DetachUserPolicyInput {
    /// Creates an input with both required fields set.
    pub fn new(user_name: impl Into<String>, policy_arn: impl Into<String>) -> Self {
        Self {
            policy_arn: Some(policy_arn.into()),
            user_name: Some(user_name.into()),
        }
    }
}

impl Validate for DetachUserPolicyInput {
    fn validate(&self, errors: &mut FieldErrors) {
        if self.policy_arn.is_none() {
            errors.missing("PolicyArn");
        }
        if self.user_name.is_none() {
            errors.missing("UserName");
        }
    }
}

/// Output of [`DetachUserPolicy`]. The service returns no fields; request
/// metadata travels alongside in [`Output::metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachUserPolicyOutput {}

/// Binding for the `DetachUserPolicy` operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachUserPolicy;

impl OperationSpec for DetachUserPolicy {
    type Input = DetachUserPolicyInput;
    type Output = DetachUserPolicyOutput;

    fn operation() -> Operation {
        Operation::new::<DetachUserPolicyInput, DetachUserPolicyOutput>("IAM", ACTION, "iam")
    }

    fn steps() -> Vec<StepRegistration> {
        operation_steps(
            FormQuerySerializer::<DetachUserPolicyInput>::new(ACTION, API_VERSION),
            JsonDeserializer::<DetachUserPolicyOutput>::new(),
        )
    }
}

impl Client {
    /// Detaches a managed policy from a user.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `PolicyArn` or `UserName` is missing,
    /// otherwise whatever the pipeline fails with.
    pub async fn detach_user_policy(
        &self,
        input: DetachUserPolicyInput,
    ) -> SdkResult<Output<DetachUserPolicyOutput>> {
        self.invoke(DetachUserPolicy, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ErrorKind;
    use strata_middleware::protocol::SerializeRequest;
    use strata_middleware::Phase;

    #[test]
    fn test_validation_lists_missing_fields() {
        let mut errors = FieldErrors::new();
        DetachUserPolicyInput::default().validate(&mut errors);
        let fields: Vec<_> = errors.field_names().collect();
        assert_eq!(fields, vec!["PolicyArn", "UserName"]);

        let err = errors.into_result(ACTION).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_complete_input_is_valid() {
        let mut errors = FieldErrors::new();
        DetachUserPolicyInput::new("alice", "arn:aws:iam::aws:policy/ReadOnlyAccess")
            .validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_form_encoding() {
        let serializer = FormQuerySerializer::<DetachUserPolicyInput>::new(ACTION, API_VERSION);
        let body = serializer
            .encode(&DetachUserPolicyInput::new(
                "alice",
                "arn:aws:iam::aws:policy/ReadOnlyAccess",
            ))
            .unwrap();
        assert_eq!(
            body,
            "Action=DetachUserPolicy&Version=2010-05-08\
             &PolicyArn=arn%3Aaws%3Aiam%3A%3Aaws%3Apolicy%2FReadOnlyAccess&UserName=alice"
        );
    }

    #[test]
    fn test_serializer_sets_form_request() {
        let serializer = FormQuerySerializer::<DetachUserPolicyInput>::new(ACTION, API_VERSION);
        let mut request = strata_core::HttpRequest::new();
        serializer
            .serialize(&DetachUserPolicyInput::new("bob", "arn:p"), &mut request)
            .unwrap();
        assert_eq!(request.method().as_str(), "POST");
        assert_eq!(request.uri().path(), "/");
        assert!(request
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded")));
    }

    #[test]
    fn test_output_from_empty_document() {
        let output: DetachUserPolicyOutput = serde_json::from_str("{}").unwrap();
        assert_eq!(output, DetachUserPolicyOutput::default());
    }

    #[test]
    fn test_operation_descriptor() {
        let operation = DetachUserPolicy::operation();
        assert_eq!(operation.service_id(), "IAM");
        assert_eq!(operation.name(), "DetachUserPolicy");
        assert_eq!(operation.signing_name(), "iam");
        assert!(operation.expects_input::<DetachUserPolicyInput>());
    }

    #[test]
    fn test_steps_cover_three_phases() {
        let phases: Vec<_> = DetachUserPolicy::steps()
            .iter()
            .map(StepRegistration::phase)
            .collect();
        assert_eq!(
            phases,
            vec![Phase::Initialize, Phase::Serialize, Phase::Deserialize]
        );
    }
}
