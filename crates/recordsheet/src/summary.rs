//! Per-sheet summary totals for summable columns.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::warn;

use crate::coerce::round_decimal;
use crate::spec::{EnumCellValue, EnumNumericRule, SpecColumnPlan};

/// One summary cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSummaryCell {
    pub col_idx: usize,
    /// Total rounded half-to-even to two fractional digits.
    pub amount: Decimal,
    /// `"<label>: <amount>"`.
    pub text: String,
}

/// Amount a content cell contributes to its column total, if any.
///
/// Numeric cells always count. Numeric-looking text counts only under
/// [`EnumNumericRule::TextOnly`], where no cell is ever written as numeric.
pub fn derive_summable_amount(value: &EnumCellValue, rule_numeric: EnumNumericRule) -> Option<Decimal> {
    match value {
        EnumCellValue::Numeric(n) => derive_decimal_from_f64(*n),
        EnumCellValue::Text(s) => match rule_numeric {
            EnumNumericRule::Pattern => None,
            EnumNumericRule::TextOnly => parse_numeric_text(s),
        },
    }
}

fn derive_decimal_from_f64(n: f64) -> Option<Decimal> {
    if !n.is_finite() {
        return None;
    }
    Decimal::from_str(&n.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(n))
}

fn parse_numeric_text(s: &str) -> Option<Decimal> {
    let c_txt = s.trim();
    if c_txt.is_empty() {
        return None;
    }
    Decimal::from_str(c_txt)
        .or_else(|_| Decimal::from_scientific(c_txt))
        .ok()
}

/// Streaming column totals of one sheet (or one stacked group).
#[derive(Debug, Clone)]
pub struct SummaryAccumulator {
    l_sums: Vec<Option<Decimal>>,
    rule_numeric: EnumNumericRule,
    n_skipped: usize,
}

impl SummaryAccumulator {
    pub fn new(plan: &SpecColumnPlan, rule_numeric: EnumNumericRule) -> Self {
        let l_sums = plan
            .columns
            .iter()
            .map(|c| c.field.if_sum.then_some(Decimal::ZERO))
            .collect();
        Self {
            l_sums,
            rule_numeric,
            n_skipped: 0,
        }
    }

    /// Whether any column is summable.
    pub fn is_active(&self) -> bool {
        self.l_sums.iter().any(Option::is_some)
    }

    /// Add one content cell.
    pub fn observe(&mut self, col_idx: usize, value: &EnumCellValue) {
        let Some(Some(d_sum)) = self.l_sums.get_mut(col_idx) else {
            return;
        };
        let Some(d_amount) = derive_summable_amount(value, self.rule_numeric) else {
            if let EnumCellValue::Numeric(n) = value
                && n.is_finite()
            {
                warn!("Summary overflow in column {col_idx}; value {n} out of decimal range, skipped.");
                self.n_skipped += 1;
            }
            return;
        };
        match d_sum.checked_add(d_amount) {
            Some(val) => *d_sum = val,
            None => {
                warn!("Summary overflow in column {col_idx}; value {d_amount} skipped.");
                self.n_skipped += 1;
            }
        }
    }

    /// Numeric cells left out of a total because they exceed the decimal range.
    pub fn n_skipped(&self) -> usize {
        self.n_skipped
    }

    /// Summary cells of all summable columns, in column order.
    pub fn finish(&self, label: &str) -> Vec<SpecSummaryCell> {
        self.l_sums
            .iter()
            .enumerate()
            .filter_map(|(col_idx, d_sum)| {
                d_sum.map(|d_sum| {
                    let amount = round_decimal(d_sum);
                    SpecSummaryCell {
                        col_idx,
                        amount,
                        text: format!("{label}: {amount}"),
                    }
                })
            })
            .collect()
    }
}

/// Summary row of a finished sheet; `rows[i][col_idx]` is a content cell.
pub fn aggregate_summary(
    plan: &SpecColumnPlan,
    rows: &[Vec<EnumCellValue>],
    rule_numeric: EnumNumericRule,
    label: &str,
) -> Vec<SpecSummaryCell> {
    let mut accumulator = SummaryAccumulator::new(plan, rule_numeric);
    for row in rows {
        for (col_idx, value) in row.iter().enumerate() {
            accumulator.observe(col_idx, value);
        }
    }
    accumulator.finish(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{SpecFieldDescriptor, SpecPlannedColumn};

    fn derive_plan(l_sum: &[bool]) -> SpecColumnPlan {
        SpecColumnPlan {
            columns: l_sum
                .iter()
                .enumerate()
                .map(|(col_idx, if_sum)| SpecPlannedColumn {
                    col_idx,
                    field: SpecFieldDescriptor::new(format!("f{col_idx}"), format!("F{col_idx}"))
                        .with_sum(*if_sum),
                })
                .collect(),
        }
    }

    #[test]
    fn test_summary_sums_numeric_cells_only() {
        let plan = derive_plan(&[true]);
        let rows = vec![
            vec![EnumCellValue::Numeric(10.0)],
            vec![EnumCellValue::Numeric(20.5)],
            vec![EnumCellValue::Text("n/a".to_string())],
        ];

        let l_cells = aggregate_summary(&plan, &rows, EnumNumericRule::Pattern, "合计");
        assert_eq!(l_cells.len(), 1);
        assert_eq!(l_cells[0].amount.to_string(), "30.50");
        assert_eq!(l_cells[0].text, "合计: 30.50");
    }

    #[test]
    fn test_summary_skips_non_summable_columns() {
        let plan = derive_plan(&[false, true, false]);
        let rows = vec![
            vec![
                EnumCellValue::Numeric(1.0),
                EnumCellValue::Numeric(2.0),
                EnumCellValue::Numeric(3.0),
            ],
            vec![
                EnumCellValue::Numeric(1.0),
                EnumCellValue::Numeric(0.125),
                EnumCellValue::Numeric(3.0),
            ],
        ];

        let l_cells = aggregate_summary(&plan, &rows, EnumNumericRule::Pattern, "Total");
        assert_eq!(l_cells.len(), 1);
        assert_eq!(l_cells[0].col_idx, 1);
        // 2.125 rounds half-to-even.
        assert_eq!(l_cells[0].text, "Total: 2.12");
    }

    #[test]
    fn test_summary_text_only_rule_parses_numeric_text() {
        let plan = derive_plan(&[true]);
        let rows = vec![
            vec![EnumCellValue::Text("10".to_string())],
            vec![EnumCellValue::Text("-2.5".to_string())],
            vec![EnumCellValue::Text("1e1".to_string())],
            vec![EnumCellValue::Text("abc".to_string())],
            vec![EnumCellValue::Text(String::new())],
        ];

        let l_cells = aggregate_summary(&plan, &rows, EnumNumericRule::TextOnly, "合计");
        assert_eq!(l_cells[0].text, "合计: 17.50");

        let l_cells = aggregate_summary(&plan, &rows, EnumNumericRule::Pattern, "合计");
        assert_eq!(l_cells[0].text, "合计: 0.00");
    }

    #[test]
    fn test_accumulator_inactive_without_summable_columns() {
        let plan = derive_plan(&[false, false]);
        let mut accumulator = SummaryAccumulator::new(&plan, EnumNumericRule::Pattern);
        accumulator.observe(0, &EnumCellValue::Numeric(1.0));
        accumulator.observe(9, &EnumCellValue::Numeric(1.0));

        assert!(!accumulator.is_active());
        assert!(accumulator.finish("合计").is_empty());
    }

    #[test]
    fn test_accumulator_counts_values_beyond_decimal_range() {
        let plan = derive_plan(&[true]);
        let mut accumulator = SummaryAccumulator::new(&plan, EnumNumericRule::Pattern);
        accumulator.observe(0, &EnumCellValue::Numeric(1e30));
        accumulator.observe(0, &EnumCellValue::Numeric(7e28));
        accumulator.observe(0, &EnumCellValue::Numeric(7e28));
        accumulator.observe(0, &EnumCellValue::Numeric(f64::NAN));

        assert_eq!(accumulator.n_skipped(), 2);
        assert_eq!(
            accumulator.finish("合计")[0].amount,
            Decimal::from_str("70000000000000000000000000000").expect("decimal")
        );
    }
}
