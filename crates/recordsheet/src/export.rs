//! Export facade: paged, per-group and stacked layouts.

use tracing::debug;

use crate::coerce::convert_date_pattern;
use crate::column::plan_columns;
use crate::conf::N_NROWS_EXCEL_MAX;
use crate::error::ExportError;
use crate::paginate::{EnumValidationSpan, SheetEmitter, plan_group_sheets, plan_sheets};
use crate::record::{ExportRecord, FieldSource, SpecRecordGroup};
use crate::sink::CellSink;
use crate::spec::{SpecColumnPlan, SpecExportOptions, SpecExportReport, SpecSheetReport};

/// Exports record groups into a [`CellSink`].
///
/// Holds only configuration, so one exporter can serve any number of calls.
#[derive(Debug, Clone, Default)]
pub struct RecordExporter {
    options: SpecExportOptions,
}

impl RecordExporter {
    pub fn new(options: SpecExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpecExportOptions {
        &self.options
    }

    /// Restrict exported fields to those tagged `view`; `None` exports all.
    pub fn set_view(&mut self, view: Option<&str>) {
        self.options.view = view.map(str::to_string);
    }

    /// Blank rows written after each group in stacked mode.
    pub fn set_delimiter(&mut self, n_rows_delimiter: usize) {
        self.options.n_rows_delimiter = n_rows_delimiter;
    }

    /// Date pattern used for every date field instead of the field's own.
    pub fn set_date_format(&mut self, date_format: Option<&str>) {
        self.options.date_format_override = date_format.map(str::to_string);
    }

    /// Paged export of typed records; sheets are named `<sheet_name><idx>`.
    pub fn export_records<T, S>(
        &self,
        sink: &mut S,
        sheet_name: &str,
        records: &[T],
    ) -> Result<SpecExportReport, ExportError>
    where
        T: ExportRecord + FieldSource,
        S: CellSink + ?Sized,
    {
        self.export_group(sink, sheet_name, &SpecRecordGroup::from_records(records))
    }

    /// Paged export of one group: as many sheets as `max_rows_per_sheet`
    /// requires, at least one.
    pub fn export_group<S: CellSink + ?Sized>(
        &self,
        sink: &mut S,
        sheet_name: &str,
        group: &SpecRecordGroup<'_>,
    ) -> Result<SpecExportReport, ExportError> {
        self.validate_options()?;
        let mut report = SpecExportReport::default();
        let plan = self.derive_column_plan(group, &mut report)?;
        let l_sheet_plans = plan_sheets(group.len(), self.options.max_rows_per_sheet)?;
        debug!(
            "Paged export of {} records over {} sheet(s), {} column(s).",
            group.len(),
            l_sheet_plans.len(),
            plan.len()
        );

        let emitter = SheetEmitter::new(&plan, &self.options);
        for sheet_plan in l_sheet_plans {
            let sheet = sink.add_sheet(&format!("{sheet_name}{}", sheet_plan.sheet_idx))?;
            let layout = emitter.emit_block(
                sink,
                &sheet,
                0,
                &group.records[sheet_plan.row_start..sheet_plan.row_end],
                &mut report,
            )?;
            sink.finish_sheet(sheet.sheet_id)?;
            report.sheets.push(SpecSheetReport {
                sheet_name: sheet.sheet_name,
                group_idx: 0,
                row_start_inclusive: sheet_plan.row_start,
                row_end_exclusive: sheet_plan.row_end,
                row_header: layout.row_header,
                row_summary: layout.row_summary,
            });
        }
        Ok(report)
    }

    /// One sheet per non-empty group, each with its own column plan.
    ///
    /// Sheets are named `<sheet_name><idx>` with dense indices.
    pub fn export_groups<S: CellSink + ?Sized>(
        &self,
        sink: &mut S,
        sheet_name: &str,
        groups: &[SpecRecordGroup<'_>],
    ) -> Result<SpecExportReport, ExportError> {
        self.validate_options()?;
        let mut report = SpecExportReport::default();
        let l_lens: Vec<usize> = groups.iter().map(SpecRecordGroup::len).collect();

        for (group_idx, sheet_plan) in plan_group_sheets(&l_lens) {
            let group = &groups[group_idx];
            if group.len() > self.options.max_rows_per_sheet {
                return Err(ExportError::InvalidOptions(format!(
                    "group {group_idx} holds {} records, above max_rows_per_sheet {}",
                    group.len(),
                    self.options.max_rows_per_sheet
                )));
            }
            let plan = self.derive_column_plan(group, &mut report)?;
            debug!(
                "Group {group_idx}: {} records, {} column(s).",
                group.len(),
                plan.len()
            );

            let sheet = sink.add_sheet(&format!("{sheet_name}{}", sheet_plan.sheet_idx))?;
            let layout = SheetEmitter::new(&plan, &self.options).emit_block(
                sink,
                &sheet,
                0,
                &group.records,
                &mut report,
            )?;
            sink.finish_sheet(sheet.sheet_id)?;
            report.sheets.push(SpecSheetReport {
                sheet_name: sheet.sheet_name,
                group_idx,
                row_start_inclusive: sheet_plan.row_start,
                row_end_exclusive: sheet_plan.row_end,
                row_header: layout.row_header,
                row_summary: layout.row_summary,
            });
        }
        Ok(report)
    }

    /// All non-empty groups on one sheet: header, content and summary per
    /// group, then `n_rows_delimiter` blank rows.
    pub fn export_stacked<S: CellSink + ?Sized>(
        &self,
        sink: &mut S,
        sheet_name: &str,
        groups: &[SpecRecordGroup<'_>],
    ) -> Result<SpecExportReport, ExportError> {
        self.validate_options()?;
        let mut report = SpecExportReport::default();
        let sheet = sink.add_sheet(sheet_name)?;
        let mut row_cursor = 0usize;

        for (group_idx, group) in groups.iter().enumerate() {
            if group.is_empty() {
                debug!("Group {group_idx} is empty; skipped.");
                continue;
            }
            let plan = self.derive_column_plan(group, &mut report)?;
            let n_rows_block = group.len() + 2;
            if row_cursor + n_rows_block > N_NROWS_EXCEL_MAX {
                return Err(ExportError::InvalidOptions(format!(
                    "group {group_idx} does not fit on sheet {:?} starting at row {row_cursor}",
                    sheet.sheet_name
                )));
            }

            let layout = SheetEmitter::new(&plan, &self.options)
                .with_validation_span(EnumValidationSpan::Content)
                .emit_block(sink, &sheet, row_cursor, &group.records, &mut report)?;
            report.sheets.push(SpecSheetReport {
                sheet_name: sheet.sheet_name.clone(),
                group_idx,
                row_start_inclusive: 0,
                row_end_exclusive: group.len(),
                row_header: layout.row_header,
                row_summary: layout.row_summary,
            });
            row_cursor = layout.row_next + self.options.n_rows_delimiter;
        }

        sink.finish_sheet(sheet.sheet_id)?;
        debug!(
            "Stacked export wrote {} group(s) on sheet {:?}.",
            report.sheets.len(),
            sheet.sheet_name
        );
        Ok(report)
    }

    fn derive_column_plan(
        &self,
        group: &SpecRecordGroup<'_>,
        report: &mut SpecExportReport,
    ) -> Result<SpecColumnPlan, ExportError> {
        let fields = group.select_fields(
            self.options.view.as_deref(),
            self.options.if_with_parent_fields,
        );
        plan_columns(&fields, report)
    }

    fn validate_options(&self) -> Result<(), ExportError> {
        let n_rows_max = self.options.max_rows_per_sheet;
        if n_rows_max == 0 || n_rows_max > N_NROWS_EXCEL_MAX - 2 {
            return Err(ExportError::InvalidOptions(format!(
                "max_rows_per_sheet must be within 1..={}, got {n_rows_max}",
                N_NROWS_EXCEL_MAX - 2
            )));
        }
        if let Some(pattern) = &self.options.date_format_override {
            convert_date_pattern(pattern).map_err(|message| ExportError::InvalidDateFormat {
                pattern: pattern.clone(),
                message,
            })?;
        }
        Ok(())
    }
}
