//! Export constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{EnumStyleHint, SpecCellFormat};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Default content rows per sheet: worksheet limit minus header and summary rows.
pub const N_ROWS_PER_SHEET_DEFAULT: usize = N_NROWS_EXCEL_MAX - 2;
/// Blank rows between two groups in stacked mode.
pub const N_ROWS_DELIMITER_DEFAULT: usize = 5;
/// Number of rows below the header covered by prompt/choice widgets.
pub const N_ROWS_VALIDATION_SPAN: usize = 100;
/// Sheet height from which content rows are coerced on the rayon pool.
pub const N_ROWS_PARALLEL_MIN_DEFAULT: usize = 10_000;
/// Rows coerced per batch before being handed to the sink.
pub const N_ROWS_COERCE_CHUNK: usize = 8_192;
/// Fractional digits kept for decimal values and summary totals.
pub const N_DECIMAL_SCALE: u32 = 2;

/// Per-field date pattern used when metadata leaves it unset.
pub const C_DATE_FORMAT_DEFAULT: &str = "yyyy-MM-dd HH:mm:ss";
/// Label prefixed to every summary cell.
pub const C_SUMMARY_LABEL_DEFAULT: &str = "合计";
/// Title shown on prompt widgets.
pub const C_PROMPT_TITLE: &str = "提示";
/// Font family of all exported cells.
pub const C_FONT_NAME: &str = "Arial Narrow";
/// Header font size in points.
pub const N_FONT_SIZE_HEADER: i64 = 14;
/// Content font size in points.
pub const N_FONT_SIZE_CONTENT: i64 = 12;
/// Font color of marked fields.
pub const C_FONT_COLOR_MARK: &str = "#FF0000";

/// Build default cell formats per style hint used by [`crate::writer::XlsxSink`].
pub fn derive_default_export_formats() -> BTreeMap<EnumStyleHint, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(C_FONT_NAME.to_string()),
        font_size: Some(N_FONT_SIZE_CONTENT),
        bold: Some(true),
        ..Default::default()
    };
    let cfg_header_fmt_spec = cfg_base_fmt_spec.with_(SpecCellFormat {
        font_size: Some(N_FONT_SIZE_HEADER),
        align: Some("center".to_string()),
        ..Default::default()
    });
    let cfg_mark_patch = SpecCellFormat {
        font_color: Some(C_FONT_COLOR_MARK.to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(
        EnumStyleHint::HeaderMarked,
        cfg_header_fmt_spec.with_(cfg_mark_patch.clone()),
    );
    dict_fmt.insert(EnumStyleHint::Header, cfg_header_fmt_spec);
    dict_fmt.insert(
        EnumStyleHint::ContentMarked,
        cfg_base_fmt_spec.with_(cfg_mark_patch),
    );
    dict_fmt.insert(EnumStyleHint::Content, cfg_base_fmt_spec);
    dict_fmt.insert(EnumStyleHint::Summary, SpecCellFormat::default());

    dict_fmt
}
