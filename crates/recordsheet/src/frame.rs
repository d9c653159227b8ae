//! Polars DataFrame record source.

use std::io::Cursor;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader, TimeUnit};

use crate::error::{ExportError, FieldAccessError};
use crate::record::{ExportRecord, SpecRecordGroup};
use crate::spec::{EnumRawValue, SpecFieldDescriptor};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const N_DAYS_CE_TO_UNIX_EPOCH: i32 = 719_163;

/// DataFrame whose rows are exported as records; column names are field keys.
pub struct DataFrameRecords {
    df: DataFrame,
    fields: Vec<SpecFieldDescriptor>,
}

impl DataFrameRecords {
    /// Wrap a DataFrame; every column becomes a field titled by its name.
    pub fn new(df: DataFrame) -> Self {
        let fields = df
            .get_column_names_str()
            .into_iter()
            .map(|name| SpecFieldDescriptor::new(name, name))
            .collect();
        Self { df, fields }
    }

    /// Read a Polars IPC payload.
    pub fn from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Self, ExportError> {
        let df = IpcReader::new(Cursor::new(v_ipc_df))
            .finish()
            .map_err(|err| ExportError::Frame(format!("Failed to read IPC DataFrame bytes: {err}")))?;
        Ok(Self::new(df))
    }

    /// Replace the derived field metadata (titles, formats, columns, ...).
    ///
    /// Field keys must name frame columns; unmatched keys surface as
    /// per-cell `MissingField` errors at export time.
    pub fn with_fields(mut self, fields: Vec<SpecFieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    pub fn fields(&self) -> &[SpecFieldDescriptor] {
        &self.fields
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Row views in frame order.
    pub fn rows(&self) -> Vec<DataFrameRow<'_>> {
        (0..self.df.height())
            .map(|row_idx| DataFrameRow {
                df: &self.df,
                row_idx,
            })
            .collect()
    }

    /// Record group over `rows` (from [`Self::rows`]) with this frame's fields.
    pub fn group<'a>(&self, rows: &'a [DataFrameRow<'_>]) -> SpecRecordGroup<'a> {
        SpecRecordGroup::new(
            self.fields.clone(),
            rows.iter().map(|row| row as &dyn ExportRecord).collect(),
        )
    }
}

/// One DataFrame row.
#[derive(Clone, Copy)]
pub struct DataFrameRow<'a> {
    df: &'a DataFrame,
    row_idx: usize,
}

impl ExportRecord for DataFrameRow<'_> {
    fn field_value(&self, name: &str) -> Result<EnumRawValue, FieldAccessError> {
        let column = self
            .df
            .column(name)
            .map_err(|_| FieldAccessError::MissingField(name.to_string()))?;
        let value = column
            .get(self.row_idx)
            .map_err(|err| FieldAccessError::Unreadable {
                field: name.to_string(),
                message: err.to_string(),
            })?;
        derive_raw_value_from_any_value(value).map_err(|message| FieldAccessError::Unreadable {
            field: name.to_string(),
            message,
        })
    }
}

fn derive_date_from_days(n_days: i32) -> Option<NaiveDate> {
    n_days
        .checked_add(N_DAYS_CE_TO_UNIX_EPOCH)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

fn derive_datetime_from_timestamp(n_ts: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(n_ts)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(n_ts),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(n_ts),
    };
    dt.map(|val| val.naive_utc())
}

/// Wall-clock time of a UTC instant in the named IANA zone.
fn derive_local_datetime(dt_utc: NaiveDateTime, tz_name: &str) -> Result<NaiveDateTime, String> {
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| format!("unknown time zone: {tz_name}"))?;
    Ok(tz.from_utc_datetime(&dt_utc).naive_local())
}

/// Timestamp of a datetime column; zone-aware columns render in their own zone.
fn derive_zoned_datetime(
    n_ts: i64,
    unit: TimeUnit,
    tz_name: Option<&str>,
) -> Result<NaiveDateTime, String> {
    let dt_utc = derive_datetime_from_timestamp(n_ts, unit)
        .ok_or_else(|| format!("datetime out of range: {n_ts}"))?;
    match tz_name {
        Some(tz_name) => derive_local_datetime(dt_utc, tz_name),
        None => Ok(dt_utc),
    }
}

fn derive_raw_value_from_any_value(value: AnyValue<'_>) -> Result<EnumRawValue, String> {
    let raw = match value {
        AnyValue::Null => EnumRawValue::Null,
        AnyValue::Boolean(val) => EnumRawValue::Boolean(val),
        AnyValue::String(val) => EnumRawValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumRawValue::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumRawValue::Integer(val.into()),
        AnyValue::UInt16(val) => EnumRawValue::Integer(val.into()),
        AnyValue::UInt32(val) => EnumRawValue::Integer(val.into()),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(val) => EnumRawValue::Integer(val),
            Err(_) => EnumRawValue::Text(val.to_string()),
        },
        AnyValue::Int8(val) => EnumRawValue::Integer(val.into()),
        AnyValue::Int16(val) => EnumRawValue::Integer(val.into()),
        AnyValue::Int32(val) => EnumRawValue::Integer(val.into()),
        AnyValue::Int64(val) => EnumRawValue::Integer(val),
        // Widening f32 exposes binary noise (0.1 -> 0.10000000149011612).
        AnyValue::Float32(val) => EnumRawValue::Float(
            val.to_string()
                .parse::<f64>()
                .unwrap_or_else(|_| f64::from(val)),
        ),
        AnyValue::Float64(val) => EnumRawValue::Float(val),
        AnyValue::Date(val) => EnumRawValue::Date(
            derive_date_from_days(val).ok_or_else(|| format!("date out of range: {val}"))?,
        ),
        AnyValue::Datetime(val, unit, tz) => {
            EnumRawValue::DateTime(derive_zoned_datetime(val, unit, tz.map(|tz| tz.as_str()))?)
        }
        AnyValue::DatetimeOwned(val, unit, ref tz) => EnumRawValue::DateTime(
            derive_zoned_datetime(val, unit, tz.as_deref().map(|tz| tz.as_str()))?,
        ),
        AnyValue::Binary(val) => EnumRawValue::Binary(val.to_vec()),
        AnyValue::BinaryOwned(val) => EnumRawValue::Binary(val),
        _ => EnumRawValue::Text(value.to_string()),
    };
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use polars::prelude::{DataType, IntoColumn, IpcWriter, NamedFrom, SerWriter, Series};

    use super::*;

    fn derive_frame() -> DataFrame {
        let s_name = Series::new("name".into(), &["Ann", "Bob"]);
        let s_age = Series::new("age".into(), &[Some(30_i64), None]);
        let s_day = Series::new("day".into(), &[0_i32, 19_797])
            .cast(&DataType::Date)
            .expect("date cast");
        DataFrame::new(vec![
            s_name.into_column(),
            s_age.into_column(),
            s_day.into_column(),
        ])
        .expect("frame")
    }

    #[test]
    fn test_rows_expose_values_by_column_name() {
        let records = DataFrameRecords::new(derive_frame());
        let rows = records.rows();

        assert_eq!(records.height(), 2);
        assert_eq!(rows[0].field_value("name"), Ok(EnumRawValue::Text("Ann".to_string())));
        assert_eq!(rows[0].field_value("age"), Ok(EnumRawValue::Integer(30)));
        assert_eq!(rows[1].field_value("age"), Ok(EnumRawValue::Null));
        assert_eq!(
            rows[0].field_value("day"),
            Ok(EnumRawValue::Date(
                NaiveDate::from_ymd_opt(1970, 1, 1).expect("date")
            ))
        );
        assert_eq!(
            rows[1].field_value("day"),
            Ok(EnumRawValue::Date(
                NaiveDate::from_ymd_opt(2024, 3, 15).expect("date")
            ))
        );
        assert_eq!(
            rows[0].field_value("nope"),
            Err(FieldAccessError::MissingField("nope".to_string()))
        );
    }

    #[test]
    fn test_default_fields_follow_column_order() {
        let records = DataFrameRecords::new(derive_frame());
        let l_titles: Vec<&str> = records.fields().iter().map(|f| f.title.as_str()).collect();
        assert_eq!(l_titles, vec!["name", "age", "day"]);

        let rows = records.rows();
        let group = records.group(&rows);
        assert_eq!(group.len(), 2);
        assert_eq!(group.fields.len(), 3);
    }

    #[test]
    fn test_from_ipc_bytes_round_trips_frame() {
        let mut df = derive_frame();
        let mut buf: Vec<u8> = Vec::new();
        IpcWriter::new(&mut buf).finish(&mut df).expect("ipc write");

        let records = DataFrameRecords::from_ipc_bytes(&buf).expect("ipc read");
        assert_eq!(records.height(), 2);
        assert!(matches!(
            DataFrameRecords::from_ipc_bytes(b"not ipc"),
            Err(ExportError::Frame(_))
        ));
    }

    #[test]
    fn test_datetime_units_convert_to_naive_datetime() {
        let dt_expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("datetime");
        let n_ms = dt_expected.and_utc().timestamp_millis();

        assert_eq!(
            derive_datetime_from_timestamp(n_ms, TimeUnit::Milliseconds),
            Some(dt_expected)
        );
        assert_eq!(
            derive_datetime_from_timestamp(n_ms * 1_000, TimeUnit::Microseconds),
            Some(dt_expected)
        );
        assert_eq!(
            derive_datetime_from_timestamp(n_ms * 1_000_000, TimeUnit::Nanoseconds),
            Some(dt_expected)
        );
    }

    #[test]
    fn test_float32_renders_without_widening_noise() {
        assert_eq!(
            derive_raw_value_from_any_value(AnyValue::Float32(0.1)),
            Ok(EnumRawValue::Float(0.1))
        );
        assert_eq!(
            derive_raw_value_from_any_value(AnyValue::Float32(12.25)),
            Ok(EnumRawValue::Float(12.25))
        );
    }

    #[test]
    fn test_zoned_datetime_renders_local_wall_time() {
        let dt_utc = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("datetime");
        let n_ms = dt_utc.and_utc().timestamp_millis();

        assert_eq!(
            derive_zoned_datetime(n_ms, TimeUnit::Milliseconds, Some("Asia/Shanghai")),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(11, 4, 5))
                .expect("datetime"))
        );
        assert_eq!(
            derive_zoned_datetime(n_ms, TimeUnit::Milliseconds, Some("UTC")),
            Ok(dt_utc)
        );
        assert_eq!(derive_zoned_datetime(n_ms, TimeUnit::Milliseconds, None), Ok(dt_utc));
        assert!(
            derive_zoned_datetime(n_ms, TimeUnit::Milliseconds, Some("Mars/Olympus"))
                .is_err_and(|message| message.contains("Mars/Olympus"))
        );
    }

    #[test]
    fn test_with_fields_replaces_titles_and_columns() {
        let records = DataFrameRecords::new(derive_frame()).with_fields(vec![
            SpecFieldDescriptor::new("age", "Age"),
            SpecFieldDescriptor::new("name", "Name"),
        ]);
        let l_titles: Vec<&str> = records.fields().iter().map(|f| f.title.as_str()).collect();
        assert_eq!(l_titles, vec!["Age", "Name"]);

        let rows = records.rows();
        let group = records.group(&rows);
        assert_eq!(group.fields.len(), 2);
        assert_eq!(group.fields[0].name, "age");
    }
}
