//! Applying accepted patches to a plan.

use plan_schema::{TestPlan, TestStep};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PatchRejected;
use crate::patch::{PatchField, RepairPatch, MAX_OPERATIONS};

/// Fields a patch may write on each step kind. Login credentials and
/// extraction keys are never patchable.
fn patchable_fields(step: &TestStep) -> &'static [PatchField] {
    match step {
        TestStep::Goto(_) => &[PatchField::Url],
        TestStep::Click(_) => &[PatchField::Target, PatchField::Selector],
        TestStep::Fill(_) => &[PatchField::Field, PatchField::Value, PatchField::Selector],
        TestStep::Expect(_) => &[
            PatchField::TextVisible,
            PatchField::UrlIncludes,
            PatchField::ElementVisible,
            PatchField::TimeoutMs,
        ],
        TestStep::Login(_) => &[],
        TestStep::WaitFor(_) => &[
            PatchField::TextVisible,
            PatchField::Selector,
            PatchField::TimeoutMs,
        ],
        TestStep::ExtractTextList(_) => &[PatchField::Selector],
    }
}

/// Check every operation against `plan` without applying anything.
pub fn check_patch(plan: &TestPlan, patch: &RepairPatch) -> Result<(), PatchRejected> {
    if patch.reason.trim().is_empty() {
        return Err(PatchRejected::EmptyReason);
    }
    if patch.operations.len() > MAX_OPERATIONS {
        return Err(PatchRejected::TooManyOperations {
            count: patch.operations.len(),
            max: MAX_OPERATIONS,
        });
    }
    for operation in &patch.operations {
        let index = operation.path.step_index;
        let step = plan.steps.get(index).ok_or(PatchRejected::StepOutOfRange {
            index,
            len: plan.steps.len(),
        })?;
        if !patchable_fields(step).contains(&operation.path.field) {
            return Err(PatchRejected::FieldNotOnStep {
                path: operation.path.to_string(),
                kind: step.type_name(),
            });
        }
    }
    Ok(())
}

/// Produce a repaired copy of `plan`. Either every operation lands and the
/// result validates, or the plan is left untouched and an error returned.
pub fn apply_patch(plan: &TestPlan, patch: &RepairPatch) -> Result<TestPlan, PatchRejected> {
    if let Err(rejection) = check_patch(plan, patch) {
        warn!(%rejection, "repair patch rejected");
        return Err(rejection);
    }

    let mut document = plan.to_value();
    for operation in &patch.operations {
        let step = document
            .get_mut("steps")
            .and_then(|steps| steps.get_mut(operation.path.step_index))
            .and_then(Value::as_object_mut)
            .ok_or(PatchRejected::StepOutOfRange {
                index: operation.path.step_index,
                len: plan.steps.len(),
            })?;
        step.insert(
            operation.path.field.as_str().to_string(),
            operation.value.to_json(),
        );
        debug!(path = %operation.path, op = ?operation.op, "patch operation applied");
    }

    let repaired = TestPlan::from_value(document).map_err(|err| {
        warn!(%err, "patched plan failed validation");
        PatchRejected::InvalidResult(err)
    })?;
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{PatchOperation, PatchPath};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan() -> TestPlan {
        TestPlan::from_value(json!({
            "version": "1",
            "steps": [
                { "type": "goto", "url": "https://example.com" },
                { "type": "click", "target": "Sign in" },
                { "type": "expect", "textVisible": "Welcome", "timeoutMs": 5000 },
                { "type": "login", "username": "${SECRET:U}", "password": "${SECRET:P}" }
            ]
        }))
        .unwrap()
    }

    fn kinds(plan: &TestPlan) -> Vec<&'static str> {
        plan.steps.iter().map(TestStep::type_name).collect()
    }

    #[test]
    fn only_addressed_fields_change() {
        let original = plan();
        let patch = RepairPatch::new(
            "selector drift",
            vec![
                PatchOperation::replace(PatchPath::new(1, PatchField::Target), "Log in"),
                PatchOperation::replace(PatchPath::new(2, PatchField::TimeoutMs), 9000),
            ],
        );

        let repaired = apply_patch(&original, &patch).unwrap();

        assert_eq!(kinds(&repaired), kinds(&original));
        assert_eq!(repaired.steps[0], original.steps[0]);
        assert_eq!(repaired.steps[3], original.steps[3]);
        let TestStep::Click(click) = &repaired.steps[1] else {
            panic!("click expected");
        };
        assert_eq!(click.target, "Log in");
        let TestStep::Expect(expect) = &repaired.steps[2] else {
            panic!("expect expected");
        };
        assert_eq!(expect.timeout_ms, Some(9000));
        assert_eq!(expect.text_visible.as_deref(), Some("Welcome"));
    }

    #[test]
    fn out_of_range_step_is_rejected() {
        let patch = RepairPatch::new(
            "beyond",
            vec![PatchOperation::replace(PatchPath::new(4, PatchField::Target), "x")],
        );
        assert_eq!(
            apply_patch(&plan(), &patch),
            Err(PatchRejected::StepOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn one_bad_operation_discards_the_whole_patch() {
        let patch = RepairPatch::new(
            "mixed",
            vec![
                PatchOperation::replace(PatchPath::new(1, PatchField::Target), "Log in"),
                PatchOperation::replace(PatchPath::new(3, PatchField::Target), "Submit"),
            ],
        );
        assert_eq!(
            apply_patch(&plan(), &patch),
            Err(PatchRejected::FieldNotOnStep {
                path: "/steps/3/target".into(),
                kind: "login"
            })
        );
    }

    #[test]
    fn invalid_result_is_rejected() {
        let second_condition = RepairPatch::new(
            "also check url",
            vec![PatchOperation {
                op: crate::patch::PatchOp::Add,
                path: PatchPath::new(2, PatchField::UrlIncludes),
                value: "welcome".into(),
            }],
        );
        assert!(matches!(
            apply_patch(&plan(), &second_condition),
            Err(PatchRejected::InvalidResult(_))
        ));

        let wrong_type = RepairPatch::new(
            "numeric target",
            vec![PatchOperation::replace(PatchPath::new(1, PatchField::Target), 7)],
        );
        assert!(matches!(
            apply_patch(&plan(), &wrong_type),
            Err(PatchRejected::InvalidResult(_))
        ));
    }

    #[test]
    fn empty_patch_returns_an_equal_plan() {
        let original = plan();
        let repaired = apply_patch(&original, &RepairPatch::new("nothing to do", vec![])).unwrap();
        assert_eq!(repaired, original);
    }
}
