//! Loading a whole dataset for inspection: an API sample or a CSV export

use crate::client::{PageQuery, SourceClient};
use crate::error::{Error, Result};
use crate::models::{Dataset, Record};
use arrow_array::Array;
use arrow_array::cast::AsArray;
use arrow_csv::{ReaderBuilder, reader::Format};
use arrow_schema::{DataType, Field, Schema};
use diagnostics::*;
use serde_json::Value;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Rows inspected when inferring CSV headers
const CSV_INFER_RECORDS: usize = 100;

/// One `$limit=N` request, no filter and no order
pub fn load_api_sample(client: &dyn SourceClient, limit: usize) -> Result<Dataset> {
    let records = client.fetch_page(&PageQuery::new(limit))?;
    let count = records.len();
    info!("Loaded {count} rows from API");
    Ok(Dataset::from_records(format!("API (limit={limit})"), records))
}

/// Read a CSV export with every column as nullable text.
///
/// `None` means the caller was given no path at all.
pub fn load_csv(path: Option<&Path>) -> Result<Dataset> {
    let path = path.ok_or(Error::MissingCsvPath)?;
    if !path.exists() {
        return Err(Error::CsvNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, Some(CSV_INFER_RECORDS))?;
    file.seek(SeekFrom::Start(0))?;

    // Keep header names, read every value as text
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let reader = ReaderBuilder::new(schema)
        .with_format(format)
        .build(file)?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let arrays: Vec<_> = batch.columns().iter().map(|a| a.as_string::<i32>()).collect();
        for row in 0..batch.num_rows() {
            let mut record = Record::new();
            for (name, array) in columns.iter().zip(&arrays) {
                let value = if array.is_null(row) || array.value(row).is_empty() {
                    Value::Null
                } else {
                    Value::String(array.value(row).to_string())
                };
                record.insert(name.clone(), value);
            }
            records.push(record);
        }
    }

    let count = records.len();
    let display = path.display().to_string();
    info!("Loaded {count} rows from CSV {display}");

    Ok(Dataset {
        source_label: format!("CSV ({display})"),
        columns,
        records,
    })
}
