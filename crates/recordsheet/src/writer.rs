//! XLSX cell sink backed by `rust_xlsxwriter`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use rust_xlsxwriter::{
    DataValidation, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError,
};
use tracing::debug;

use crate::error::SinkError;
use crate::sink::{CellSink, SpecSinkSheet};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumStyleHint, EnumValidationKind,
    SpecAutofitCellsPolicy, SpecCellFormat, SpecValidationRequest, SpecXlsxSinkOptions,
};
use crate::util::{
    cast_col_num, cast_row_num, derive_unique_sheet_name, estimate_unicode_string_width,
    sanitize_sheet_name,
};

/// Width bookkeeping of one open sheet.
#[derive(Debug, Default)]
struct SpecSheetWidths {
    l_width_by_col_header: Vec<usize>,
    l_width_by_col_body: Vec<usize>,
    set_rows_body_seen: BTreeSet<usize>,
    row_header_first: Option<usize>,
    if_finished: bool,
}

impl SpecSheetWidths {
    fn record(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        n_width: usize,
        hint: EnumStyleHint,
        policy: &SpecAutofitCellsPolicy,
    ) {
        let l_widths = match hint {
            EnumStyleHint::Header | EnumStyleHint::HeaderMarked => {
                if self.row_header_first.is_none() {
                    self.row_header_first = Some(row_idx);
                }
                &mut self.l_width_by_col_header
            }
            _ => {
                if !self.set_rows_body_seen.contains(&row_idx) {
                    if policy
                        .height_body_inferred_max
                        .is_some_and(|n_max| self.set_rows_body_seen.len() >= n_max)
                    {
                        return;
                    }
                    self.set_rows_body_seen.insert(row_idx);
                }
                &mut self.l_width_by_col_body
            }
        };
        if l_widths.len() <= col_idx {
            l_widths.resize(col_idx + 1, 0);
        }
        l_widths[col_idx] = usize::max(l_widths[col_idx], n_width);
    }
}

/// Workbook sink.
///
/// The workbook is buffered in memory until [`Self::close`] or
/// [`Self::save_to_buffer`] is called.
pub struct XlsxSink {
    path_file_out: Option<PathBuf>,
    workbook: Workbook,
    dict_fmt: BTreeMap<EnumStyleHint, Format>,
    options: SpecXlsxSinkOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_sheet_widths: Vec<SpecSheetWidths>,
    if_closed: bool,
}

impl XlsxSink {
    /// Create a sink flushed to `path_file_out` on [`Self::close`].
    pub fn new(path_file_out: PathBuf, options: SpecXlsxSinkOptions) -> Result<Self, SinkError> {
        let mut sink = Self::in_memory(options)?;
        sink.path_file_out = Some(path_file_out);
        Ok(sink)
    }

    /// Create a sink only readable through [`Self::save_to_buffer`].
    pub fn in_memory(options: SpecXlsxSinkOptions) -> Result<Self, SinkError> {
        validate_policy_autofit(&options.policy_autofit)?;
        let dict_fmt = options
            .formats
            .iter()
            .map(|(hint, spec)| (*hint, derive_rust_xlsx_format(spec)))
            .collect();
        Ok(Self {
            path_file_out: None,
            workbook: Workbook::new(),
            dict_fmt,
            options,
            set_sheet_names_existing: BTreeSet::new(),
            l_sheet_widths: Vec::new(),
            if_closed: false,
        })
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), SinkError> {
        if self.if_closed {
            return Ok(());
        }
        let Some(path_file_out) = self.path_file_out.clone() else {
            return Err(SinkError::new("Sink has no output path; use save_to_buffer()."));
        };
        self.finish_open_sheets()?;
        self.workbook
            .save(&path_file_out)
            .map_err(derive_xlsx_error_text)?;
        debug!("Workbook saved to {}.", path_file_out.display());
        self.if_closed = true;
        Ok(())
    }

    /// Serialize the workbook into XLSX bytes.
    pub fn save_to_buffer(&mut self) -> Result<Vec<u8>, SinkError> {
        self.finish_open_sheets()?;
        self.workbook
            .save_to_buffer()
            .map_err(derive_xlsx_error_text)
    }

    fn finish_open_sheets(&mut self) -> Result<(), SinkError> {
        for sheet_id in 0..self.l_sheet_widths.len() {
            if !self.l_sheet_widths[sheet_id].if_finished {
                self.finish_sheet(sheet_id)?;
            }
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.if_closed {
            return Err(SinkError::new("Cannot write after close()."));
        }
        Ok(())
    }

    fn worksheet(&mut self, sheet_id: usize) -> Result<&mut Worksheet, SinkError> {
        self.workbook
            .worksheet_from_index(sheet_id)
            .map_err(derive_xlsx_error_text)
    }

    fn format(&self, hint: EnumStyleHint) -> Format {
        self.dict_fmt.get(&hint).cloned().unwrap_or_else(Format::new)
    }
}

impl CellSink for XlsxSink {
    fn add_sheet(&mut self, name: &str) -> Result<SpecSinkSheet, SinkError> {
        self.ensure_open()?;
        let sheet_name = derive_unique_sheet_name(
            &mut self.set_sheet_names_existing,
            &sanitize_sheet_name(name, "_"),
        );
        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name)
            .map_err(derive_xlsx_error_text)?;
        self.l_sheet_widths.push(SpecSheetWidths::default());
        Ok(SpecSinkSheet {
            sheet_id: self.l_sheet_widths.len() - 1,
            sheet_name,
        })
    }

    fn write_cell(
        &mut self,
        sheet_id: usize,
        row_idx: usize,
        col_idx: usize,
        value: &EnumCellValue,
        hint: EnumStyleHint,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;
        let format = self.format(hint);
        write_cell_with_format(self.worksheet(sheet_id)?, row_idx, col_idx, value, &format)?;

        if self.options.policy_autofit.rule_columns != EnumAutofitColumnsRule::None
            && let Some(widths) = self.l_sheet_widths.get_mut(sheet_id)
        {
            let n_width = estimate_unicode_string_width(&value.to_text());
            widths.record(row_idx, col_idx, n_width, hint, &self.options.policy_autofit);
        }
        Ok(())
    }

    fn add_validation(
        &mut self,
        sheet_id: usize,
        request: &SpecValidationRequest,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;
        let validation = derive_data_validation(&request.kind)?;
        let n_col = cast_col_num(request.col_idx).map_err(SinkError::new)?;
        let n_row_start = cast_row_num(request.row_start).map_err(SinkError::new)?;
        let n_row_end = cast_row_num(request.row_end).map_err(SinkError::new)?;
        self.worksheet(sheet_id)?
            .add_data_validation(n_row_start, n_col, n_row_end, n_col, &validation)
            .map_err(derive_xlsx_error_text)?;
        Ok(())
    }

    fn finish_sheet(&mut self, sheet_id: usize) -> Result<(), SinkError> {
        let Some(widths) = self.l_sheet_widths.get_mut(sheet_id) else {
            return Err(SinkError::new(format!("unknown sheet id: {sheet_id}")));
        };
        if widths.if_finished {
            return Ok(());
        }
        let widths = std::mem::take(widths);
        self.l_sheet_widths[sheet_id].if_finished = true;

        let policy = self.options.policy_autofit.clone();
        let if_freeze_header = self.options.if_freeze_header;
        let worksheet = self.worksheet(sheet_id)?;

        if if_freeze_header && let Some(row_header) = widths.row_header_first {
            worksheet
                .set_freeze_panes(cast_row_num(row_header + 1).map_err(SinkError::new)?, 0)
                .map_err(derive_xlsx_error_text)?;
        }

        if policy.rule_columns == EnumAutofitColumnsRule::None {
            return Ok(());
        }
        let n_min = usize::max(1, policy.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));
        let n_cols = usize::max(
            widths.l_width_by_col_header.len(),
            widths.l_width_by_col_body.len(),
        );
        for n_idx_col in 0..n_cols {
            let n_width_header = widths.l_width_by_col_header.get(n_idx_col).copied().unwrap_or(0);
            let n_width_body = widths.l_width_by_col_body.get(n_idx_col).copied().unwrap_or(0);
            let n_width_recorded = match policy.rule_columns {
                EnumAutofitColumnsRule::Header => n_width_header,
                EnumAutofitColumnsRule::Body => n_width_body,
                EnumAutofitColumnsRule::All | EnumAutofitColumnsRule::None => {
                    usize::max(n_width_header, n_width_body)
                }
            };
            let n_width_final = usize::min(
                n_max,
                usize::max(n_min, n_width_recorded + policy.width_cell_padding),
            );
            worksheet
                .set_column_width(
                    cast_col_num(n_idx_col).map_err(SinkError::new)?,
                    n_width_final as f64,
                )
                .map_err(derive_xlsx_error_text)?;
        }
        Ok(())
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), SinkError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(SinkError::new("policy_autofit.width_cell_min must be >= 1."));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(SinkError::new(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.",
        ));
    }
    Ok(())
}

fn derive_data_validation(kind: &EnumValidationKind) -> Result<DataValidation, SinkError> {
    let (validation, prompt) = match kind {
        EnumValidationKind::Prompt(prompt) => (DataValidation::new(), Some(prompt)),
        EnumValidationKind::Choices { choices, prompt } => (
            DataValidation::new()
                .allow_list_strings(choices.as_slice())
                .map_err(derive_xlsx_error_text)?,
            prompt.as_ref(),
        ),
    };
    let Some(prompt) = prompt else {
        return Ok(validation);
    };
    validation
        .set_input_title(&prompt.title)
        .and_then(|validation| validation.set_input_message(&prompt.message))
        .map_err(derive_xlsx_error_text)
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), SinkError> {
    let n_row = cast_row_num(row_idx).map_err(SinkError::new)?;
    let n_col = cast_col_num(col_idx).map_err(SinkError::new)?;
    match value {
        EnumCellValue::Text(val) if val.is_empty() => {
            worksheet
                .write_blank(n_row, n_col, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Text(val) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Numeric(val) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn derive_xlsx_error_text(err: XlsxError) -> SinkError {
    SinkError::new(format!("xlsx write error: {err}"))
}
