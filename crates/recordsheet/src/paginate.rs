//! Sheet planning and per-sheet row emission.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::coerce::ValueCoercer;
use crate::conf::{C_PROMPT_TITLE, N_ROWS_COERCE_CHUNK, N_ROWS_VALIDATION_SPAN};
use crate::error::ExportError;
use crate::record::ExportRecord;
use crate::sink::{CellSink, SpecSinkSheet};
use crate::spec::{
    EnumCellValue, EnumStyleHint, EnumValidationKind, SpecCellError, SpecColumnPlan,
    SpecExportOptions, SpecExportReport, SpecInputPrompt, SpecSheetPlan, SpecValidationRequest,
};
use crate::summary::SummaryAccumulator;
use crate::util::generate_row_chunks;

////////////////////////////////////////////////////////////////////////////////
// #region SheetPlanning

/// Split `n_records` into consecutive sheets of at most `max_rows_per_sheet`.
///
/// Always yields at least one sheet, so an empty record list still gets a
/// header-only sheet.
pub fn plan_sheets(
    n_records: usize,
    max_rows_per_sheet: usize,
) -> Result<Vec<SpecSheetPlan>, ExportError> {
    if max_rows_per_sheet == 0 {
        return Err(ExportError::InvalidOptions(
            "max_rows_per_sheet must be >= 1".to_string(),
        ));
    }
    if n_records == 0 {
        return Ok(vec![SpecSheetPlan {
            sheet_idx: 0,
            row_start: 0,
            row_end: 0,
        }]);
    }

    Ok(generate_row_chunks(n_records, max_rows_per_sheet)
        .into_iter()
        .enumerate()
        .map(|(sheet_idx, (row_start, row_len))| SpecSheetPlan {
            sheet_idx,
            row_start,
            row_end: row_start + row_len,
        })
        .collect())
}

/// One sheet per non-empty group, as `(group_idx, plan)`.
///
/// Empty groups are skipped and consume no sheet index.
pub fn plan_group_sheets(group_lens: &[usize]) -> Vec<(usize, SpecSheetPlan)> {
    group_lens
        .iter()
        .enumerate()
        .filter(|(_, n_len)| **n_len > 0)
        .enumerate()
        .map(|(sheet_idx, (group_idx, n_len))| {
            (
                group_idx,
                SpecSheetPlan {
                    sheet_idx,
                    row_start: 0,
                    row_end: *n_len,
                },
            )
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BlockEmission

/// Where one header/content/summary block landed on its sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecBlockLayout {
    pub row_header: usize,
    /// Summary row, when any column is summable.
    pub row_summary: Option<usize>,
    /// First row after the block (summary row included).
    pub row_next: usize,
}

/// Row span covered by validation widgets below a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumValidationSpan {
    /// The fixed span of rows under the header.
    #[default]
    Fixed,
    /// Only the rows holding the block's content.
    Content,
}

/// Emits header, content and summary rows of one column plan.
pub struct SheetEmitter<'a> {
    plan: &'a SpecColumnPlan,
    coercer: ValueCoercer,
    options: &'a SpecExportOptions,
    span_validation: EnumValidationSpan,
}

impl<'a> SheetEmitter<'a> {
    pub fn new(plan: &'a SpecColumnPlan, options: &'a SpecExportOptions) -> Self {
        Self {
            plan,
            coercer: ValueCoercer::new(
                plan,
                options.date_format_override.as_deref(),
                options.rule_numeric,
            ),
            options,
            span_validation: EnumValidationSpan::Fixed,
        }
    }

    pub fn with_validation_span(mut self, span_validation: EnumValidationSpan) -> Self {
        self.span_validation = span_validation;
        self
    }

    /// Write the header row and its validation widgets.
    pub fn emit_header<S: CellSink + ?Sized>(
        &self,
        sink: &mut S,
        sheet_id: usize,
        row_header: usize,
        n_rows_content: usize,
    ) -> Result<(), ExportError> {
        let row_validation_end = match self.span_validation {
            EnumValidationSpan::Fixed => row_header + N_ROWS_VALIDATION_SPAN,
            EnumValidationSpan::Content => row_header + n_rows_content,
        };

        for column in &self.plan.columns {
            let field = &column.field;
            sink.write_cell(
                sheet_id,
                row_header,
                column.col_idx,
                &EnumCellValue::Text(field.title.clone()),
                EnumStyleHint::header(field.if_mark),
            )?;

            if row_validation_end <= row_header {
                continue;
            }
            let prompt = field.prompt_text().map(|message| SpecInputPrompt {
                title: C_PROMPT_TITLE.to_string(),
                message: message.to_string(),
            });
            let kind = match (prompt, field.combo.is_empty()) {
                (prompt, false) => EnumValidationKind::Choices {
                    choices: field.combo.clone(),
                    prompt,
                },
                (Some(prompt), true) => EnumValidationKind::Prompt(prompt),
                (None, true) => continue,
            };
            sink.add_validation(
                sheet_id,
                &SpecValidationRequest {
                    row_start: row_header + 1,
                    row_end: row_validation_end,
                    col_idx: column.col_idx,
                    kind,
                },
            )?;
        }
        Ok(())
    }

    /// Write one block: header at `row_header`, one content row per record,
    /// then the summary row.
    pub fn emit_block<S: CellSink + ?Sized>(
        &self,
        sink: &mut S,
        sheet: &SpecSinkSheet,
        row_header: usize,
        records: &[&dyn ExportRecord],
        report: &mut SpecExportReport,
    ) -> Result<SpecBlockLayout, ExportError> {
        debug!(
            "Emitting {} records on sheet {:?} from row {}.",
            records.len(),
            sheet.sheet_name,
            row_header
        );
        self.emit_header(sink, sheet.sheet_id, row_header, records.len())?;

        let mut accumulator = SummaryAccumulator::new(self.plan, self.coercer.rule_numeric());
        let if_parallel = records.len() >= self.options.n_rows_parallel_min.max(1);

        for (n_chunk_start, n_chunk_len) in generate_row_chunks(records.len(), N_ROWS_COERCE_CHUNK) {
            let chunk = &records[n_chunk_start..n_chunk_start + n_chunk_len];
            let l_rows: Vec<Vec<Result<EnumCellValue, ExportError>>> = if if_parallel {
                chunk
                    .par_iter()
                    .map(|record| self.coerce_record(*record))
                    .collect()
            } else {
                chunk
                    .iter()
                    .map(|record| self.coerce_record(*record))
                    .collect()
            };

            for (n_offset, l_cells) in l_rows.into_iter().enumerate() {
                let row_idx = row_header + 1 + n_chunk_start + n_offset;
                for (column, cell) in self.plan.columns.iter().zip(l_cells) {
                    let value = match cell {
                        Ok(val) => val,
                        Err(err) if self.options.if_fail_on_cell_error => return Err(err),
                        Err(err) => {
                            warn!(
                                "Cell {}:{} ({}) left empty: {err}",
                                sheet.sheet_name, row_idx, column.field.name
                            );
                            report.cell_errors.push(SpecCellError {
                                sheet_name: sheet.sheet_name.clone(),
                                row_idx,
                                col_idx: column.col_idx,
                                field: column.field.name.clone(),
                                message: err.to_string(),
                            });
                            EnumCellValue::empty()
                        }
                    };
                    accumulator.observe(column.col_idx, &value);
                    sink.write_cell(
                        sheet.sheet_id,
                        row_idx,
                        column.col_idx,
                        &value,
                        EnumStyleHint::content(column.field.if_mark),
                    )?;
                }
            }
        }

        let row_summary_slot = row_header + 1 + records.len();
        if accumulator.n_skipped() > 0 {
            report.warn(format!(
                "Summary on sheet {:?}: {} values beyond decimal range left out of the totals.",
                sheet.sheet_name,
                accumulator.n_skipped()
            ));
        }
        let row_summary = if accumulator.is_active() {
            for cell in accumulator.finish(&self.options.summary_label) {
                sink.write_cell(
                    sheet.sheet_id,
                    row_summary_slot,
                    cell.col_idx,
                    &EnumCellValue::Text(cell.text),
                    EnumStyleHint::Summary,
                )?;
            }
            Some(row_summary_slot)
        } else {
            None
        };

        Ok(SpecBlockLayout {
            row_header,
            row_summary,
            row_next: row_summary_slot + 1,
        })
    }

    fn coerce_record(&self, record: &dyn ExportRecord) -> Vec<Result<EnumCellValue, ExportError>> {
        self.plan
            .columns
            .iter()
            .map(|column| {
                let value = record.field_value(&column.field.name)?;
                self.coercer.coerce(column.col_idx, &column.field, &value)
            })
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
