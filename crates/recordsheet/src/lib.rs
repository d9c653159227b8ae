//! `recordsheet` v1:
//! Record-to-spreadsheet export kernel.
//!
//! Module map:
//! - `conf`     : constants and default presets
//! - `spec`     : field descriptors, plans, values, options, reports
//! - `error`    : typed export/sink/field-access errors
//! - `column`   : column placement and column-letter codec
//! - `coerce`   : raw value -> cell value pipeline
//! - `summary`  : per-sheet summary totals
//! - `paginate` : sheet planning and row emission
//! - `record`   : record and field-metadata contracts
//! - `sink`     : cell sink contract and in-memory sink
//! - `writer`   : XLSX sink
//! - `frame`    : polars DataFrame record source
//! - `export`   : paged / per-group / stacked export facade
//! - `util`     : pure helper functions
pub mod coerce;
pub mod column;
pub mod conf;
pub mod error;
pub mod export;
pub mod frame;
pub mod paginate;
pub mod record;
pub mod sink;
pub mod spec;
pub mod summary;
pub mod util;
pub mod writer;

pub use coerce::{ValueCoercer, coerce_value, convert_date_pattern, round_decimal};
pub use column::{decode_column_letters, encode_column_letters, plan_columns};
pub use conf::{
    C_DATE_FORMAT_DEFAULT, C_SUMMARY_LABEL_DEFAULT, N_NROWS_EXCEL_MAX, N_ROWS_DELIMITER_DEFAULT,
    N_ROWS_PER_SHEET_DEFAULT,
};
pub use error::{ExportError, FieldAccessError, SinkError};
pub use export::RecordExporter;
pub use frame::{DataFrameRecords, DataFrameRow};
pub use paginate::{SheetEmitter, SpecBlockLayout, plan_group_sheets, plan_sheets};
pub use record::{ExportRecord, FieldSource, SpecRecordGroup, select_fields};
pub use sink::{CellSink, MemorySink, SpecMemorySheet, SpecSinkSheet};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumNumericRule, EnumRawValue, EnumStyleHint,
    EnumValidationKind, SpecAutofitCellsPolicy, SpecCellError, SpecCellFormat, SpecColumnPlan,
    SpecExportOptions, SpecExportReport, SpecFieldDescriptor, SpecInputPrompt, SpecPlannedColumn,
    SpecSheetPlan, SpecSheetReport, SpecValidationRequest, SpecXlsxSinkOptions,
};
pub use summary::{SpecSummaryCell, SummaryAccumulator, aggregate_summary};
pub use writer::XlsxSink;
