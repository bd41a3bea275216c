use secret_resolver::redact_placeholders;

use crate::plan::{TestPlan, TestStep};

impl TestPlan {
    /// Copy of the plan safe to persist: secret placeholders in fill values and
    /// login credentials are masked.
    pub fn redacted(&self) -> TestPlan {
        let mut plan = self.clone();
        for step in &mut plan.steps {
            match step {
                TestStep::Fill(fill) => fill.value = redact_placeholders(&fill.value),
                TestStep::Login(login) => {
                    login.username = redact_placeholders(&login.username);
                    login.password = redact_placeholders(&login.password);
                }
                TestStep::Goto(_)
                | TestStep::Click(_)
                | TestStep::Expect(_)
                | TestStep::WaitFor(_)
                | TestStep::ExtractTextList(_) => {}
            }
        }
        plan
    }
}
