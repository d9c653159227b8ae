//! Cell sink contract and an in-memory sink.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SinkError;
use crate::spec::{EnumCellValue, EnumStyleHint, SpecValidationRequest};
use crate::util::{derive_unique_sheet_name, sanitize_sheet_name};

/// Sheet accepted by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSinkSheet {
    /// Handle passed back on every write.
    pub sheet_id: usize,
    /// Final (sanitized, unique) sheet name.
    pub sheet_name: String,
}

/// Destination of every cell decided by an export call.
///
/// Implementations own sheets, styles and validation widgets. Errors are
/// propagated to the caller unchanged.
pub trait CellSink {
    /// Create a sheet named after `name`.
    fn add_sheet(&mut self, name: &str) -> Result<SpecSinkSheet, SinkError>;

    /// Write one cell.
    fn write_cell(
        &mut self,
        sheet_id: usize,
        row_idx: usize,
        col_idx: usize,
        value: &EnumCellValue,
        hint: EnumStyleHint,
    ) -> Result<(), SinkError>;

    /// Attach a prompt or choice-list widget to a column range.
    fn add_validation(
        &mut self,
        sheet_id: usize,
        request: &SpecValidationRequest,
    ) -> Result<(), SinkError>;

    /// Called once after the last write into a sheet.
    fn finish_sheet(&mut self, _sheet_id: usize) -> Result<(), SinkError> {
        Ok(())
    }
}

/// One sheet held by [`MemorySink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecMemorySheet {
    pub name: String,
    /// Cells keyed by `(row, col)`.
    pub cells: BTreeMap<(usize, usize), (EnumCellValue, EnumStyleHint)>,
    pub validations: Vec<SpecValidationRequest>,
    pub if_finished: bool,
}

impl SpecMemorySheet {
    /// Value at `(row, col)`.
    pub fn value(&self, row_idx: usize, col_idx: usize) -> Option<&EnumCellValue> {
        self.cells.get(&(row_idx, col_idx)).map(|(value, _)| value)
    }

    /// Style hint at `(row, col)`.
    pub fn hint(&self, row_idx: usize, col_idx: usize) -> Option<EnumStyleHint> {
        self.cells.get(&(row_idx, col_idx)).map(|(_, hint)| *hint)
    }

    /// Display text at `(row, col)`; empty when the cell was never written.
    pub fn text(&self, row_idx: usize, col_idx: usize) -> String {
        self.value(row_idx, col_idx)
            .map(EnumCellValue::to_text)
            .unwrap_or_default()
    }

    /// One past the last written row.
    pub fn height(&self) -> usize {
        self.cells
            .keys()
            .map(|(row_idx, _)| row_idx + 1)
            .max()
            .unwrap_or(0)
    }

    /// Texts of one row, from column 0 to the last written column.
    pub fn row_texts(&self, row_idx: usize) -> Vec<String> {
        let n_width = self
            .cells
            .range((row_idx, 0)..=(row_idx, usize::MAX))
            .map(|((_, col_idx), _)| col_idx + 1)
            .max()
            .unwrap_or(0);
        (0..n_width).map(|col_idx| self.text(row_idx, col_idx)).collect()
    }
}

/// Sink keeping every sheet in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sheets: Vec<SpecMemorySheet>,
    set_sheet_names_existing: BTreeSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[SpecMemorySheet] {
        &self.sheets
    }

    pub fn sheet(&self, sheet_id: usize) -> Option<&SpecMemorySheet> {
        self.sheets.get(sheet_id)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&SpecMemorySheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    fn sheet_mut(&mut self, sheet_id: usize) -> Result<&mut SpecMemorySheet, SinkError> {
        self.sheets
            .get_mut(sheet_id)
            .ok_or_else(|| SinkError::new(format!("unknown sheet id: {sheet_id}")))
    }
}

impl CellSink for MemorySink {
    fn add_sheet(&mut self, name: &str) -> Result<SpecSinkSheet, SinkError> {
        let sheet_name =
            derive_unique_sheet_name(&mut self.set_sheet_names_existing, &sanitize_sheet_name(name, "_"));
        self.sheets.push(SpecMemorySheet {
            name: sheet_name.clone(),
            ..Default::default()
        });
        Ok(SpecSinkSheet {
            sheet_id: self.sheets.len() - 1,
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
        let sheet = self.sheet_mut(sheet_id)?;
        if sheet.if_finished {
            return Err(SinkError::new(format!(
                "sheet {:?} is already finished",
                sheet.name
            )));
        }
        sheet.cells.insert((row_idx, col_idx), (value.clone(), hint));
        Ok(())
    }

    fn add_validation(
        &mut self,
        sheet_id: usize,
        request: &SpecValidationRequest,
    ) -> Result<(), SinkError> {
        self.sheet_mut(sheet_id)?.validations.push(request.clone());
        Ok(())
    }

    fn finish_sheet(&mut self, sheet_id: usize) -> Result<(), SinkError> {
        self.sheet_mut(sheet_id)?.if_finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_unique_names_and_rows() {
        let mut sink = MemorySink::new();
        let first = sink.add_sheet("Data").expect("sheet");
        let second = sink.add_sheet("Data").expect("sheet");
        assert_eq!(first.sheet_name, "Data");
        assert_eq!(second.sheet_name, "Data__2");

        sink.write_cell(
            first.sheet_id,
            1,
            2,
            &EnumCellValue::Numeric(1.5),
            EnumStyleHint::Content,
        )
        .expect("write");

        let sheet = sink.sheet(first.sheet_id).expect("sheet");
        assert_eq!(sheet.height(), 2);
        assert_eq!(sheet.row_texts(1), vec!["", "", "1.5"]);
        assert_eq!(sheet.hint(1, 2), Some(EnumStyleHint::Content));
    }

    #[test]
    fn test_memory_sink_rejects_unknown_and_finished_sheets() {
        let mut sink = MemorySink::new();
        assert!(
            sink.write_cell(3, 0, 0, &EnumCellValue::empty(), EnumStyleHint::Content)
                .is_err()
        );

        let sheet = sink.add_sheet("S").expect("sheet");
        sink.finish_sheet(sheet.sheet_id).expect("finish");
        assert!(
            sink.write_cell(
                sheet.sheet_id,
                0,
                0,
                &EnumCellValue::empty(),
                EnumStyleHint::Content
            )
            .is_err()
        );
    }
}
