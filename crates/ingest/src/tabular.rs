//! Convert staged CSV files to Apache Parquet.
//!
//! Column types are inferred from the cell text, so downstream readers get
//! typed columns instead of strings everywhere. Output is Zstd-compressed and
//! carries the source filename in the footer metadata.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

/// Extension given to converted artifacts.
pub const COLUMNAR_EXTENSION: &str = "parquet";

/// Extension of staged tabular files.
pub const TABULAR_EXTENSION: &str = "csv";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Ragged rows, invalid UTF-8 or unreadable input.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("input has no header row")]
    MissingHeader,

    #[error("Arrow conversion error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet write error: {0}")]
    Write(#[from] parquet::errors::ParquetError),
}

/// Encoded Parquet file plus its shape.
#[derive(Debug)]
pub struct ColumnarTable {
    pub bytes: Vec<u8>,
    pub rows: usize,
    pub columns: usize,
}

/// `income_2017.csv` → `income_2017.parquet`. Names without an extension get one appended.
pub fn replace_extension(name: &str, extension: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}.{}", &name[..idx], extension),
        _ => format!("{}.{}", name, extension),
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

type Rows = Vec<Vec<Option<String>>>;

/// Repeated header names get `.1`, `.2`, ... suffixes in order of appearance.
fn dedupe_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    headers
        .iter()
        .map(|name| {
            let count = seen.entry(name).or_insert(0);
            let unique = if *count == 0 {
                name.to_string()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

fn read_csv(data: &[u8]) -> Result<(Vec<String>, Rows), ConvertError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ConvertError::MissingHeader);
    }
    let names = dedupe_headers(&headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok((names, rows))
}

// ---------------------------------------------------------------------------
// Type inference
// ---------------------------------------------------------------------------

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Narrowest type every non-empty cell of the column parses as.
/// Columns with no values at all are Utf8.
fn infer_column_type(rows: &Rows, col_idx: usize) -> DataType {
    let values: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get(col_idx).and_then(|v| v.as_deref()))
        .collect();

    if values.is_empty() {
        DataType::Utf8
    } else if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if values.iter().all(|v| parse_bool(v).is_some()) {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

fn build_schema(names: &[String], rows: &Rows) -> Schema {
    let fields: Vec<Field> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| Field::new(name, infer_column_type(rows, idx), true))
        .collect();
    Schema::new(fields)
}

// ---------------------------------------------------------------------------
// Column builders
// ---------------------------------------------------------------------------

fn cell(row: &[Option<String>], idx: usize) -> Option<&str> {
    row.get(idx).and_then(|v| v.as_deref())
}

fn build_arrays(rows: &Rows, schema: &Schema) -> Vec<ArrayRef> {
    let num_rows = rows.len();

    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(col_idx, field)| -> ArrayRef {
            match field.data_type() {
                DataType::Int64 => {
                    let mut builder = Int64Builder::with_capacity(num_rows);
                    for row in rows {
                        builder.append_option(cell(row, col_idx).and_then(|s| s.parse().ok()));
                    }
                    Arc::new(builder.finish())
                }
                DataType::Float64 => {
                    let mut builder = Float64Builder::with_capacity(num_rows);
                    for row in rows {
                        builder.append_option(cell(row, col_idx).and_then(|s| s.parse().ok()));
                    }
                    Arc::new(builder.finish())
                }
                DataType::Boolean => {
                    let mut builder = BooleanBuilder::with_capacity(num_rows);
                    for row in rows {
                        builder.append_option(cell(row, col_idx).and_then(parse_bool));
                    }
                    Arc::new(builder.finish())
                }
                _ => {
                    let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 16);
                    for row in rows {
                        builder.append_option(cell(row, col_idx));
                    }
                    Arc::new(builder.finish())
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse CSV bytes into an Arrow [`RecordBatch`].
pub fn csv_to_record_batch(data: &[u8]) -> Result<RecordBatch, ConvertError> {
    let (names, rows) = read_csv(data)?;
    let schema = Arc::new(build_schema(&names, &rows));
    let arrays = build_arrays(&rows, &schema);
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Parse CSV bytes and encode them as an in-memory Parquet file.
///
/// `source_name` is stored as `landing.source` in the footer metadata.
pub fn csv_to_parquet(data: &[u8], source_name: &str) -> Result<ColumnarTable, ConvertError> {
    let batch = csv_to_record_batch(data)?;
    let rows = batch.num_rows();
    let columns = batch.num_columns();

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata(Some(vec![parquet::format::KeyValue::new(
            "landing.source".to_string(),
            Some(source_name.to_string()),
        )]))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(source = source_name, rows, columns, bytes = buf.len(), "Encoded Parquet table");

    Ok(ColumnarTable {
        bytes: buf,
        rows,
        columns,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use bytes::Bytes;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    const INCOME: &str = "district,year,income,above_avg\n\
                          Ciutat Vella,2017,12.5,false\n\
                          Eixample,2017,20,true\n\
                          Gracia,,18.25,TRUE\n";

    #[test]
    fn test_replace_extension() {
        assert_eq!(replace_extension("a.csv", "parquet"), "a.parquet");
        assert_eq!(replace_extension("a.b.csv", "parquet"), "a.b.parquet");
        assert_eq!(replace_extension("noext", "parquet"), "noext.parquet");
        assert_eq!(replace_extension(".hidden", "parquet"), ".hidden.parquet");
    }

    #[test]
    fn test_type_inference() {
        let batch = csv_to_record_batch(INCOME.as_bytes()).unwrap();
        let schema = batch.schema();
        assert_eq!(*schema.field(0).data_type(), DataType::Utf8);
        assert_eq!(*schema.field(1).data_type(), DataType::Int64);
        assert_eq!(*schema.field(2).data_type(), DataType::Float64);
        assert_eq!(*schema.field(3).data_type(), DataType::Boolean);
    }

    #[test]
    fn test_empty_cells_are_null() {
        let batch = csv_to_record_batch(INCOME.as_bytes()).unwrap();
        let year = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(year.value(0), 2017);
        assert!(year.is_null(2));
    }

    #[test]
    fn test_all_empty_column_is_utf8() {
        let batch = csv_to_record_batch(b"a,b\n1,\n2,\n").unwrap();
        assert_eq!(*batch.schema().field(1).data_type(), DataType::Utf8);
        assert_eq!(batch.column(1).null_count(), 2);
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let batch = csv_to_record_batch(b"id,id,name,id\n1,2,x,3\n").unwrap();
        let names: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["id", "id.1", "name", "id.2"]);
    }

    #[test]
    fn test_header_only_gives_empty_table() {
        let table = csv_to_parquet(b"a,b\n", "empty.csv").unwrap();
        assert_eq!(table.rows, 0);
        assert_eq!(table.columns, 2);
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            csv_to_parquet(b"", "x.csv"),
            Err(ConvertError::MissingHeader)
        ));
        assert!(matches!(
            csv_to_parquet(b"a,b\n1,2\n3\n", "x.csv"),
            Err(ConvertError::Csv(_))
        ));
        assert!(matches!(
            csv_to_parquet(b"a,b\n\xff\xfe,2\n", "x.csv"),
            Err(ConvertError::Csv(_))
        ));
    }

    #[test]
    fn test_parquet_round_trip() {
        let table = csv_to_parquet(INCOME.as_bytes(), "income.csv").unwrap();
        assert_eq!(table.rows, 3);
        assert_eq!(table.columns, 4);

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(table.bytes)).unwrap();
        let footer = builder.metadata().file_metadata().key_value_metadata().cloned();
        let reader = builder.build().unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);

        let districts = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(districts.value(1), "Eixample");
        let income = batches[0]
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!((income.value(2) - 18.25).abs() < f64::EPSILON);

        let footer = footer.unwrap();
        assert!(footer
            .iter()
            .any(|kv| kv.key == "landing.source" && kv.value.as_deref() == Some("income.csv")));
    }
}
