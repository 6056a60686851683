use crate::errors::ServiceError;
use serde::Serialize;
use std::fmt;

/// Tolerance for caller-supplied part line totals against
/// `quantity_used * unit_cost`.
pub const LINE_TOTAL_TOLERANCE: f64 = 0.01;

/// Floating-point slack when classifying a cost variance as on budget.
const VARIANCE_EPSILON: f64 = 1e-9;

/// Budget classification of a completed or in-flight work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OverBudget,
    UnderBudget,
    OnBudget,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetStatus::OverBudget => write!(f, "over_budget"),
            BudgetStatus::UnderBudget => write!(f, "under_budget"),
            BudgetStatus::OnBudget => write!(f, "on_budget"),
        }
    }
}

/// Authoritative cost aggregate for a work order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    pub labor_cost: f64,
    pub parts_cost: f64,
    pub external_cost: f64,
    pub total_cost: f64,
}

/// Read-only variance report: never persisted, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarianceReport {
    pub estimated_total_cost: f64,
    pub actual_total_cost: f64,
    pub cost_variance: f64,
    pub budget_status: BudgetStatus,
}

/// Recomputes the aggregate cost fields from the current part line totals
/// plus labor and external costs. Unset components count as zero.
pub fn reconcile(labor_cost: f64, external_cost: f64, part_totals: &[f64]) -> CostSummary {
    let parts_cost: f64 = part_totals.iter().sum();
    CostSummary {
        labor_cost,
        parts_cost,
        external_cost,
        total_cost: labor_cost + parts_cost + external_cost,
    }
}

/// Validates a caller-supplied part line total against the quantity and unit
/// cost. A deviation beyond tolerance is a data-entry error and is rejected,
/// not corrected.
pub fn validate_part_line(
    part_number: &str,
    quantity_used: f64,
    unit_cost: f64,
    total_cost: f64,
) -> Result<(), ServiceError> {
    if quantity_used < 0.0 || unit_cost < 0.0 {
        return Err(ServiceError::ValidationFailed(format!(
            "part '{}': quantity and unit cost must be non-negative",
            part_number
        )));
    }
    let expected = quantity_used * unit_cost;
    if (total_cost - expected).abs() > LINE_TOTAL_TOLERANCE {
        return Err(ServiceError::ValidationFailed(format!(
            "part '{}': total cost {:.2} does not match quantity {} x unit cost {:.2} (expected {:.2})",
            part_number, total_cost, quantity_used, unit_cost, expected
        )));
    }
    Ok(())
}

/// Builds the variance report for a work order's estimated vs actual totals.
pub fn variance_report(estimated_total_cost: f64, actual_total_cost: f64) -> VarianceReport {
    let cost_variance = actual_total_cost - estimated_total_cost;
    let budget_status = if cost_variance.abs() <= VARIANCE_EPSILON {
        BudgetStatus::OnBudget
    } else if cost_variance > 0.0 {
        BudgetStatus::OverBudget
    } else {
        BudgetStatus::UnderBudget
    };
    VarianceReport {
        estimated_total_cost,
        actual_total_cost,
        cost_variance,
        budget_status,
    }
}
