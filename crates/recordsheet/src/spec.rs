//! Shared export specification models.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::conf::{
    C_DATE_FORMAT_DEFAULT, C_SUMMARY_LABEL_DEFAULT, N_ROWS_DELIMITER_DEFAULT,
    N_ROWS_PARALLEL_MIN_DEFAULT, N_ROWS_PER_SHEET_DEFAULT, derive_default_export_formats,
};

////////////////////////////////////////////////////////////////////////////////
// #region FieldDescriptor

/// Per-field export metadata.
///
/// Built once per record type (see [`crate::record::FieldSource`]) and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldDescriptor {
    /// Record field key used to fetch the value.
    pub name: String,
    /// Header text.
    pub title: String,
    /// Requested column letters (`"A"`, `"AB"`); `None` means no preference.
    pub column: Option<String>,
    /// Skip the field entirely when false.
    pub if_export: bool,
    /// Styling hint only.
    pub if_mark: bool,
    /// Include the column in the per-sheet summary row.
    pub if_sum: bool,
    /// Rendered-text substitution table. Later entries win on duplicate keys.
    pub translate: Vec<(String, String)>,
    /// Date/time pattern (`yyyy-MM-dd HH:mm:ss` style).
    pub format: String,
    /// Choice list for a validation widget.
    pub combo: Vec<String>,
    /// Prompt text for a validation widget.
    pub prompt: Option<String>,
    /// View tags selecting this field.
    pub groups: BTreeSet<String>,
    /// Position in the unsorted field list.
    pub declaration_order: usize,
}

impl SpecFieldDescriptor {
    /// Create an exported, unpositioned field with default metadata.
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            column: None,
            if_export: true,
            if_mark: false,
            if_sum: false,
            translate: Vec::new(),
            format: C_DATE_FORMAT_DEFAULT.to_string(),
            combo: Vec::new(),
            prompt: None,
            groups: BTreeSet::new(),
            declaration_order: 0,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_export(mut self, if_export: bool) -> Self {
        self.if_export = if_export;
        self
    }

    pub fn with_mark(mut self, if_mark: bool) -> Self {
        self.if_mark = if_mark;
        self
    }

    pub fn with_sum(mut self, if_sum: bool) -> Self {
        self.if_sum = if_sum;
        self
    }

    pub fn with_translate<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.translate
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_combo<S: Into<String>>(mut self, combo: impl IntoIterator<Item = S>) -> Self {
        self.combo = combo.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_declaration_order(mut self, declaration_order: usize) -> Self {
        self.declaration_order = declaration_order;
        self
    }

    /// Look up the display text substituted for `text`, if any.
    pub fn translate_text(&self, text: &str) -> Option<&str> {
        self.translate
            .iter()
            .rev()
            .find(|(key, _)| key == text)
            .map(|(_, value)| value.as_str())
    }

    /// Prompt text, ignoring blank prompts.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|txt| !txt.trim().is_empty())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Plans

/// One placed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecPlannedColumn {
    /// Zero-based column index.
    pub col_idx: usize,
    /// Field rendered in this column.
    pub field: SpecFieldDescriptor,
}

/// Final left-to-right column order of one export call.
///
/// Indices are exactly `0..len()` and sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnPlan {
    pub columns: Vec<SpecPlannedColumn>,
}

impl SpecColumnPlan {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Field titles in column order.
    pub fn titles(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.field.title.as_str()).collect()
    }
}

/// Record range rendered into one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecSheetPlan {
    /// Dense sheet index within one export call.
    pub sheet_idx: usize,
    /// Inclusive record start.
    pub row_start: usize,
    /// Exclusive record end.
    pub row_end: usize,
}

impl SpecSheetPlan {
    pub fn len(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn is_empty(&self) -> bool {
        self.row_end == self.row_start
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Values

/// Raw field value as fetched from a record.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRawValue {
    /// Absent value.
    Null,
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time of day.
    DateTime(NaiveDateTime),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Text.
    Text(String),
    /// Opaque bytes; no coercion rule exists.
    Binary(Vec<u8>),
}

impl EnumRawValue {
    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Decimal(_) => "decimal",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

impl From<&str> for EnumRawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnumRawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for EnumRawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for EnumRawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EnumRawValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Decimal> for EnumRawValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<NaiveDate> for EnumRawValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumRawValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<EnumRawValue>> From<Option<T>> for EnumRawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Classified cell value handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Numeric cell.
    Numeric(f64),
    /// Text cell.
    Text(String),
}

impl EnumCellValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Display text of the cell.
    pub fn to_text(&self) -> String {
        match self {
            Self::Numeric(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Style tag attached to each sink write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumStyleHint {
    Header,
    HeaderMarked,
    Content,
    ContentMarked,
    Summary,
}

impl EnumStyleHint {
    pub fn header(if_mark: bool) -> Self {
        if if_mark {
            Self::HeaderMarked
        } else {
            Self::Header
        }
    }

    pub fn content(if_mark: bool) -> Self {
        if if_mark {
            Self::ContentMarked
        } else {
            Self::Content
        }
    }
}

/// Input prompt shown on cell focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecInputPrompt {
    pub title: String,
    pub message: String,
}

/// Validation widget content.
///
/// Sinks key widgets by cell range, so a column with both a prompt and a
/// choice list is requested once as `Choices` carrying the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumValidationKind {
    /// Prompt only.
    Prompt(SpecInputPrompt),
    /// Explicit choice list, with an optional prompt on the same range.
    Choices {
        choices: Vec<String>,
        prompt: Option<SpecInputPrompt>,
    },
}

/// Validation widget request for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecValidationRequest {
    /// First covered sheet row (inclusive).
    pub row_start: usize,
    /// Last covered sheet row (inclusive).
    pub row_end: usize,
    /// Target column.
    pub col_idx: usize,
    pub kind: EnumValidationKind,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Numeric classification rule for rendered cell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumNumericRule {
    /// Digits with an optional fractional part become numeric cells.
    #[default]
    Pattern,
    /// Every cell is written as text; summaries parse numeric-looking text.
    TextOnly,
}

/// Export-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportOptions {
    /// Maximum content rows per sheet in paged mode.
    pub max_rows_per_sheet: usize,
    /// Blank rows after each group in stacked mode.
    pub n_rows_delimiter: usize,
    /// Date pattern taking precedence over every field's own pattern.
    pub date_format_override: Option<String>,
    /// View tag selecting fields; `None` exports all fields.
    pub view: Option<String>,
    /// Prepend parent-shape fields.
    pub if_with_parent_fields: bool,
    /// Numeric classification rule.
    pub rule_numeric: EnumNumericRule,
    /// Summary cell label.
    pub summary_label: String,
    /// Abort on the first per-cell failure instead of leaving the cell empty.
    pub if_fail_on_cell_error: bool,
    /// Sheet height from which rows are coerced in parallel.
    pub n_rows_parallel_min: usize,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            max_rows_per_sheet: N_ROWS_PER_SHEET_DEFAULT,
            n_rows_delimiter: N_ROWS_DELIMITER_DEFAULT,
            date_format_override: None,
            view: None,
            if_with_parent_fields: true,
            rule_numeric: EnumNumericRule::Pattern,
            summary_label: C_SUMMARY_LABEL_DEFAULT.to_string(),
            if_fail_on_cell_error: false,
            n_rows_parallel_min: N_ROWS_PARALLEL_MIN_DEFAULT,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SinkOptions

/// Cell format specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from content and summary cells only.
    Body,
    /// Infer width from every written cell (default).
    #[default]
    All,
}

/// Autofit policy of the XLSX sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected per sheet when body-based inference is active.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Options of [`crate::writer::XlsxSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxSinkOptions {
    /// Cell format per style hint; missing hints fall back to the default format.
    pub formats: BTreeMap<EnumStyleHint, SpecCellFormat>,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Freeze the first row of every sheet.
    pub if_freeze_header: bool,
}

impl Default for SpecXlsxSinkOptions {
    fn default() -> Self {
        Self {
            formats: derive_default_export_formats(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
            if_freeze_header: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One sheet written by an export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Sheet name as accepted by the sink.
    pub sheet_name: String,
    /// Record group rendered (always 0 in paged mode).
    pub group_idx: usize,
    /// Inclusive record start within the group.
    pub row_start_inclusive: usize,
    /// Exclusive record end within the group.
    pub row_end_exclusive: usize,
    /// Sheet row of the header.
    pub row_header: usize,
    /// Sheet row of the summary, when any column is summable.
    pub row_summary: Option<usize>,
}

/// One per-cell failure left as an empty cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCellError {
    pub sheet_name: String,
    /// Sheet row.
    pub row_idx: usize,
    /// Sheet column.
    pub col_idx: usize,
    /// Field key.
    pub field: String,
    /// User-facing error text.
    pub message: String,
}

/// Per-export call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Sheets produced by the call.
    pub sheets: Vec<SpecSheetReport>,
    /// Cells left empty because their value could not be coerced.
    pub cell_errors: Vec<SpecCellError>,
    /// Non-fatal warnings (column collisions, skipped groups).
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_text_prefers_last_duplicate_key() {
        let field = SpecFieldDescriptor::new("sex", "Sex")
            .with_translate([("1", "男"), ("0", "女"), ("1", "M")]);

        assert_eq!(field.translate_text("1"), Some("M"));
        assert_eq!(field.translate_text("0"), Some("女"));
        assert_eq!(field.translate_text("2"), None);
    }

    #[test]
    fn test_prompt_text_ignores_blank() {
        assert_eq!(
            SpecFieldDescriptor::new("a", "A")
                .with_prompt("  ")
                .prompt_text(),
            None
        );
        assert_eq!(
            SpecFieldDescriptor::new("a", "A")
                .with_prompt("pick one")
                .prompt_text(),
            Some("pick one")
        );
    }

    #[test]
    fn test_raw_value_from_option() {
        assert_eq!(EnumRawValue::from(None::<i64>), EnumRawValue::Null);
        assert_eq!(EnumRawValue::from(Some(3_i64)), EnumRawValue::Integer(3));
    }

    #[test]
    fn test_cell_format_merge_right_side_wins() {
        let base = SpecCellFormat {
            font_name: Some("Arial".to_string()),
            bold: Some(true),
            ..Default::default()
        };
        let merged = base.with_(SpecCellFormat {
            bold: Some(false),
            font_color: Some("#FF0000".to_string()),
            ..Default::default()
        });

        assert_eq!(merged.font_name.as_deref(), Some("Arial"));
        assert_eq!(merged.bold, Some(false));
        assert_eq!(merged.font_color.as_deref(), Some("#FF0000"));
    }
}
