//! Credit accounting for completed runs.

use thiserror::Error;

use crate::transform::TransformOutput;

pub const DEFAULT_CREDIT_COST: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cost policy failed: {0}")]
pub struct CostError(pub String);

/// Decides how many credits a run costs.
pub trait CostPolicy: Send + Sync {
    fn credits_for(&self, artifact_type: &str, output: &TransformOutput) -> Result<u32, CostError>;
}

/// Charges the same amount for every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCost(pub u32);

impl Default for FixedCost {
    fn default() -> Self {
        Self(DEFAULT_CREDIT_COST)
    }
}

impl CostPolicy for FixedCost {
    fn credits_for(&self, _artifact_type: &str, _output: &TransformOutput) -> Result<u32, CostError> {
        Ok(self.0)
    }
}

impl<F> CostPolicy for F
where
    F: Fn(&str, &TransformOutput) -> Result<u32, CostError> + Send + Sync,
{
    fn credits_for(&self, artifact_type: &str, output: &TransformOutput) -> Result<u32, CostError> {
        self(artifact_type, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(tokens: u32) -> TransformOutput {
        TransformOutput {
            content: b"{}".to_vec(),
            changelog: "x".to_string(),
            tokens_used: tokens,
        }
    }

    #[test]
    fn test_fixed_cost_default() {
        assert_eq!(FixedCost::default().credits_for("minecraft", &output(10)), Ok(2));
        assert_eq!(FixedCost(7).credits_for("lua", &output(0)), Ok(7));
    }

    #[test]
    fn test_closure_policy() {
        let per_thousand =
            |_: &str, out: &TransformOutput| -> Result<u32, CostError> { Ok(out.tokens_used.div_ceil(1000)) };
        assert_eq!(per_thousand.credits_for("minecraft", &output(2500)), Ok(3));

        let broken = |_: &str, _: &TransformOutput| -> Result<u32, CostError> {
            Err(CostError("pricing table unavailable".to_string()))
        };
        assert!(broken.credits_for("minecraft", &output(1)).is_err());
    }
}
