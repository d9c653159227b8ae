//! Column assignment: reconcile explicit column requests with unpositioned fields.

use tracing::warn;

use crate::error::ExportError;
use crate::spec::{SpecColumnPlan, SpecExportReport, SpecFieldDescriptor, SpecPlannedColumn};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnLetters

/// Decode spreadsheet column letters (`A` = 0, `Z` = 25, `AA` = 26) case-insensitively.
///
/// Returns `Ok(None)` when the index does not fit in `usize`; such a request can
/// never be honored and is handled as a collision by [`plan_columns`].
pub fn decode_column_letters(letters: &str) -> Result<Option<usize>, String> {
    if letters.is_empty() {
        return Err("column letters must not be empty".to_string());
    }
    if let Some(chr) = letters.chars().find(|chr| !chr.is_ascii_alphabetic()) {
        return Err(format!("column letters contain non-letter character {chr:?}"));
    }

    let mut n_idx_1based: usize = 0;
    for chr in letters.bytes() {
        let n_digit = usize::from(chr.to_ascii_uppercase() - b'A') + 1;
        let Some(n_next) = n_idx_1based
            .checked_mul(26)
            .and_then(|val| val.checked_add(n_digit))
        else {
            return Ok(None);
        };
        n_idx_1based = n_next;
    }

    Ok(Some(n_idx_1based - 1))
}

/// Encode a zero-based column index as spreadsheet column letters.
pub fn encode_column_letters(col_idx: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_digit = (n_rest - 1) % 26;
        l_chars.push(char::from(b'A' + n_digit as u8));
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnAssignment

/// Resolve the final column order of the exported fields.
///
/// 1. Split fields into unpositioned and requested (declaration order kept).
/// 2. Sort requested fields by their letter string, case-insensitively and stably.
/// 3. Place each requested field at its decoded index when in range and free.
/// 4. Fill the remaining slots left to right with unpositioned fields.
/// 5. Fill what is still empty with the collided requests, in sorted order.
///
/// Fields with `if_export == false` consume no column. Collisions are recorded
/// as report warnings, never as errors.
pub fn plan_columns(
    fields: &[SpecFieldDescriptor],
    report: &mut SpecExportReport,
) -> Result<SpecColumnPlan, ExportError> {
    let mut l_fields: Vec<&SpecFieldDescriptor> = fields.iter().filter(|f| f.if_export).collect();
    if l_fields.is_empty() {
        return Err(ExportError::EmptyFieldSet);
    }
    l_fields.sort_by_key(|f| f.declaration_order);
    let n_cols = l_fields.len();

    let mut l_unpositioned = Vec::with_capacity(n_cols);
    let mut l_requested = Vec::new();
    for field in l_fields {
        match &field.column {
            None => l_unpositioned.push(field),
            Some(letters) => {
                let n_idx = decode_column_letters(letters).map_err(|_| {
                    ExportError::InvalidColumnLetters {
                        field: field.name.clone(),
                        letters: letters.clone(),
                    }
                })?;
                l_requested.push((field, letters.to_ascii_uppercase(), n_idx));
            }
        }
    }
    l_requested.sort_by(|a, b| a.1.cmp(&b.1));

    let mut l_slots: Vec<Option<&SpecFieldDescriptor>> = vec![None; n_cols];
    let mut l_collided = Vec::new();
    for (field, letters, n_idx) in l_requested {
        match n_idx {
            Some(n_idx) if n_idx < n_cols && l_slots[n_idx].is_none() => {
                l_slots[n_idx] = Some(field);
            }
            Some(n_idx) if n_idx < n_cols => {
                let c_owner = l_slots[n_idx].map_or("", |f| f.name.as_str());
                let c_msg = format!(
                    "Column collision: field {:?} requested column {letters}, already taken by field {c_owner:?}.",
                    field.name
                );
                warn!("{c_msg}");
                report.warn(c_msg);
                l_collided.push(field);
            }
            _ => {
                let c_msg = format!(
                    "Column overflow: field {:?} requested column {letters}, beyond the {n_cols} exported columns.",
                    field.name
                );
                warn!("{c_msg}");
                report.warn(c_msg);
                l_collided.push(field);
            }
        }
    }

    fill_empty_slots(&mut l_slots, l_unpositioned);
    fill_empty_slots(&mut l_slots, l_collided);
    debug_assert!(l_slots.iter().all(Option::is_some));

    let columns = l_slots
        .into_iter()
        .enumerate()
        .filter_map(|(col_idx, slot)| {
            slot.map(|field| SpecPlannedColumn {
                col_idx,
                field: field.clone(),
            })
        })
        .collect();

    Ok(SpecColumnPlan { columns })
}

fn fill_empty_slots<'a>(
    slots: &mut [Option<&'a SpecFieldDescriptor>],
    fields: Vec<&'a SpecFieldDescriptor>,
) {
    let mut it_fields = fields.into_iter();
    for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
        let Some(field) = it_fields.next() else {
            return;
        };
        *slot = Some(field);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_fields(spec: &[(&str, Option<&str>)]) -> Vec<SpecFieldDescriptor> {
        spec.iter()
            .enumerate()
            .map(|(n_idx, (title, column))| {
                let field = SpecFieldDescriptor::new(title.to_lowercase(), *title)
                    .with_declaration_order(n_idx);
                match column {
                    Some(letters) => field.with_column(*letters),
                    None => field,
                }
            })
            .collect()
    }

    fn plan_titles(fields: &[SpecFieldDescriptor]) -> Vec<String> {
        let mut report = SpecExportReport::default();
        plan_columns(fields, &mut report)
            .expect("plan")
            .titles()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_decode_column_letters_known_values() {
        for (letters, n_idx) in [
            ("A", 0),
            ("Z", 25),
            ("AA", 26),
            ("AB", 27),
            ("AZ", 51),
            ("BA", 52),
            ("ZZ", 701),
            ("AAA", 702),
            ("xfd", 16_383),
        ] {
            assert_eq!(decode_column_letters(letters), Ok(Some(n_idx)), "{letters}");
            assert_eq!(encode_column_letters(n_idx), letters.to_ascii_uppercase());
        }
    }

    #[test]
    fn test_decode_column_letters_rejects_non_letters() {
        assert!(decode_column_letters("").is_err());
        assert!(decode_column_letters("A1").is_err());
        assert!(decode_column_letters("-").is_err());
        assert!(decode_column_letters(" A").is_err());
    }

    #[test]
    fn test_decode_column_letters_overflow_is_out_of_range() {
        assert_eq!(decode_column_letters(&"Z".repeat(40)), Ok(None));
    }

    #[test]
    fn test_plan_columns_without_requests_keeps_declaration_order() {
        for n_len in 1..12 {
            let l_titles: Vec<String> = (0..n_len).map(|n| format!("F{n}")).collect();
            let l_spec: Vec<(&str, Option<&str>)> =
                l_titles.iter().map(|t| (t.as_str(), None)).collect();
            assert_eq!(plan_titles(&derive_fields(&l_spec)), l_titles);
        }
    }

    #[test]
    fn test_plan_columns_collision_fixture() {
        let fields = derive_fields(&[("ID", None), ("Name", Some("A")), ("Age", Some("A"))]);
        let mut report = SpecExportReport::default();
        let plan = plan_columns(&fields, &mut report).expect("plan");

        assert_eq!(plan.titles(), vec!["Name", "ID", "Age"]);
        assert_eq!(
            plan.columns.iter().map(|c| c.col_idx).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("\"age\""));
    }

    #[test]
    fn test_plan_columns_out_of_range_request_is_collision() {
        let fields = derive_fields(&[("A", None), ("B", Some("Z")), ("C", None)]);
        let mut report = SpecExportReport::default();
        let plan = plan_columns(&fields, &mut report).expect("plan");

        assert_eq!(plan.titles(), vec!["A", "C", "B"]);
        assert!(report.warnings[0].starts_with("Column overflow"));
    }

    #[test]
    fn test_plan_columns_requests_sorted_by_letter_string() {
        let fields = derive_fields(&[
            ("P", None),
            ("Q", Some("b")),
            ("R", Some("AB")),
            ("S", Some("C")),
        ]);
        assert_eq!(plan_titles(&fields), vec!["P", "Q", "S", "R"]);

        // "AA" sorts before "Z" as text although it decodes to a larger index.
        let fields = derive_fields(&[("P", None), ("X", Some("Z")), ("Y", Some("AA"))]);
        assert_eq!(plan_titles(&fields), vec!["P", "Y", "X"]);
    }

    #[test]
    fn test_plan_columns_case_insensitive_tie_keeps_declaration_order() {
        let fields = derive_fields(&[("X", Some("b")), ("Y", Some("B")), ("Z", None)]);
        assert_eq!(plan_titles(&fields), vec!["Z", "X", "Y"]);
    }

    #[test]
    fn test_plan_columns_indices_dense_and_deterministic() {
        let l_letters = [None, Some("C"), Some("a"), None, Some("C"), Some("Q"), None, Some("b")];
        for n_len in 1..=l_letters.len() {
            let l_titles: Vec<String> = (0..n_len).map(|n| format!("F{n}")).collect();
            let l_spec: Vec<(&str, Option<&str>)> = l_titles
                .iter()
                .zip(l_letters.iter())
                .map(|(t, c)| (t.as_str(), *c))
                .collect();
            let fields = derive_fields(&l_spec);

            let mut report = SpecExportReport::default();
            let plan = plan_columns(&fields, &mut report).expect("plan");
            assert_eq!(
                plan.columns.iter().map(|c| c.col_idx).collect::<Vec<_>>(),
                (0..n_len).collect::<Vec<_>>()
            );

            let mut l_names: Vec<&str> = plan.columns.iter().map(|c| c.field.title.as_str()).collect();
            l_names.sort_unstable();
            let mut l_expected: Vec<&str> = l_titles.iter().map(String::as_str).collect();
            l_expected.sort_unstable();
            assert_eq!(l_names, l_expected);

            let mut report_again = SpecExportReport::default();
            assert_eq!(plan, plan_columns(&fields, &mut report_again).expect("plan"));
        }
    }

    #[test]
    fn test_plan_columns_skips_non_exported_fields() {
        let mut fields = derive_fields(&[("A", None), ("B", None), ("C", Some("B"))]);
        fields[1].if_export = false;
        assert_eq!(plan_titles(&fields), vec!["A", "C"]);
    }

    #[test]
    fn test_plan_columns_errors() {
        let mut report = SpecExportReport::default();
        assert!(matches!(
            plan_columns(&[], &mut report),
            Err(ExportError::EmptyFieldSet)
        ));

        let fields = vec![SpecFieldDescriptor::new("a", "A").with_export(false)];
        assert!(matches!(
            plan_columns(&fields, &mut report),
            Err(ExportError::EmptyFieldSet)
        ));

        let fields = vec![SpecFieldDescriptor::new("a", "A").with_column("")];
        assert!(matches!(
            plan_columns(&fields, &mut report),
            Err(ExportError::InvalidColumnLetters { .. })
        ));
    }
}
