//! Columnar snapshot of a dataset as Parquet

use crate::columns::DATE_FIELD_CANDIDATES;
use crate::dates;
use crate::error::Result;
use crate::models::{Dataset, value_text};
use arrow_array::builder::{StringBuilder, TimestampSecondBuilder};
use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use diagnostics::*;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const UTC_OFFSET: &str = "+00:00";

fn is_date_column(name: &str) -> bool {
    DATE_FIELD_CANDIDATES.contains(&name)
}

/// Date candidates become UTC second timestamps, everything else text
pub fn snapshot_schema(dataset: &Dataset) -> Schema {
    let fields: Vec<Field> = dataset
        .columns
        .iter()
        .map(|name| {
            let data_type = if is_date_column(name) {
                DataType::Timestamp(TimeUnit::Second, Some(UTC_OFFSET.into()))
            } else {
                DataType::Utf8
            };
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

/// Unparseable dates become null
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let schema = Arc::new(snapshot_schema(dataset));

    let columns: Vec<ArrayRef> = dataset
        .columns
        .iter()
        .map(|name| -> ArrayRef {
            if is_date_column(name) {
                let mut builder = TimestampSecondBuilder::with_capacity(dataset.len())
                    .with_timezone(UTC_OFFSET);
                for value in dataset.column_values(name) {
                    builder.append_option(dates::parse_value(value).map(|d| d.timestamp()));
                }
                Arc::new(builder.finish())
            } else {
                let mut builder = StringBuilder::new();
                for value in dataset.column_values(name) {
                    builder.append_option(value_text(value));
                }
                Arc::new(builder.finish())
            }
        })
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(dataset.len()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Write `dataset` to `path`, replacing any existing file
pub fn write_parquet(dataset: &Dataset, path: &Path) -> Result<()> {
    let batch = to_record_batch(dataset)?;
    crate::report::ensure_parent(path)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    let rows = batch.num_rows();
    let display = path.display().to_string();
    debug!("Wrote {rows} rows to {display}");
    Ok(())
}
