//! Stateless helper utilities shared by the export pipeline and sinks.

use std::collections::BTreeSet;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL};

////////////////////////////////////////////////////////////////////////////////
// #region RowChunking

/// Generate `(row_start, row_len)` chunks for `n_rows_total`.
pub fn generate_row_chunks(n_rows_total: usize, size_rows_chunk: usize) -> Vec<(usize, usize)> {
    let mut l_chunks = Vec::new();
    let mut n_row_cursor = 0;
    while n_row_cursor < n_rows_total {
        let n_rows_per_chunk = usize::min(size_rows_chunk.max(1), n_rows_total - n_row_cursor);
        l_chunks.push((n_row_cursor, n_rows_per_chunk));
        n_row_cursor += n_rows_per_chunk;
    }
    l_chunks
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Return `name` if unused, else the first free `name__2`, `name__3`, ...
///
/// The returned name is registered in `existing`.
pub fn derive_unique_sheet_name(existing: &mut BTreeSet<String>, name: &str) -> String {
    if !existing.contains(name) {
        existing.insert(name.to_string());
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !existing.contains(&candidate) {
            existing.insert(candidate.clone());
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthAndBounds

/// Displayed width units of a text; non-ASCII characters count 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Convert a sheet row index, enforcing the worksheet row limit.
pub fn cast_row_num(value: usize) -> Result<u32, String> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(format!("row index overflow: {value}"));
    }
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

/// Convert a sheet column index, enforcing the worksheet column limit.
pub fn cast_col_num(value: usize) -> Result<u16, String> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(format!("column index overflow: {value}"));
    }
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_row_chunks() {
        assert_eq!(generate_row_chunks(0, 3), vec![]);
        assert_eq!(generate_row_chunks(7, 3), vec![(0, 3), (3, 3), (6, 1)]);
        assert_eq!(generate_row_chunks(2, 0), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_derive_unique_sheet_name_respects_length_cap() {
        let mut existing = BTreeSet::new();
        let c_long = "y".repeat(31);
        assert_eq!(derive_unique_sheet_name(&mut existing, &c_long), c_long);

        let c_second = derive_unique_sheet_name(&mut existing, &c_long);
        assert_eq!(c_second.chars().count(), 31);
        assert!(c_second.ends_with("__2"));
        assert_ne!(derive_unique_sheet_name(&mut existing, &c_long), c_second);
    }

    #[test]
    fn test_estimate_width_and_casts() {
        assert_eq!(estimate_unicode_string_width("abc"), 3);
        assert_eq!(estimate_unicode_string_width("合计"), 3);
        assert_eq!(cast_row_num(5), Ok(5));
        assert!(cast_row_num(N_NROWS_EXCEL_MAX).is_err());
        assert!(cast_col_num(N_NCOLS_EXCEL_MAX).is_err());
    }
}
