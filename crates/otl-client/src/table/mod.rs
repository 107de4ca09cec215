//! Typed columnar result of a job.

pub mod assemble;
pub mod schema;

use serde_json::{Map, Value};

use crate::error::{OtlError, OtlResult};
use schema::{ColumnType, Schema};

/// Name of the implicit row index.
pub const INDEX_NAME: &str = "Index";

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    Json(Vec<Option<Value>>),
}

impl ColumnData {
    fn for_type(dtype: ColumnType) -> Self {
        match dtype {
            ColumnType::Integer => Self::Integer(Vec::new()),
            ColumnType::Float => Self::Float(Vec::new()),
            ColumnType::Boolean => Self::Boolean(Vec::new()),
            ColumnType::Utf8 | ColumnType::Timestamp => Self::Text(Vec::new()),
            ColumnType::Nested => Self::Json(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Integer(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Boolean(values) => values.len(),
            Self::Text(values) => values.len(),
            Self::Json(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` as JSON; `Null` for missing cells.
    pub fn value(&self, row: usize) -> Value {
        match self {
            Self::Integer(values) => values
                .get(row)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::from),
            Self::Float(values) => values
                .get(row)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::from),
            Self::Boolean(values) => values
                .get(row)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Bool),
            Self::Text(values) => values
                .get(row)
                .cloned()
                .flatten()
                .map_or(Value::Null, Value::String),
            Self::Json(values) => values.get(row).cloned().flatten().unwrap_or(Value::Null),
        }
    }

    fn push(&mut self, raw: Option<&Value>) -> Result<(), String> {
        let raw = raw.filter(|value| !value.is_null());
        match self {
            Self::Integer(values) => values.push(raw.map(coerce_integer).transpose()?),
            Self::Float(values) => values.push(raw.map(coerce_float).transpose()?),
            Self::Boolean(values) => values.push(raw.map(coerce_boolean).transpose()?),
            Self::Text(values) => values.push(raw.map(coerce_text)),
            Self::Json(values) => values.push(raw.cloned()),
        }
        Ok(())
    }
}

fn coerce_integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                    .map(|float| float as i64)
            })
            .ok_or_else(|| format!("{number} is not an integer")),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("`{text}` is not an integer")),
        other => Err(format!("{other} is not an integer")),
    }
}

fn coerce_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| format!("{number} is not a float")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("`{text}` is not a float")),
        other => Err(format!("{other} is not a float")),
    }
}

fn coerce_boolean(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) if number.as_i64() == Some(0) => Ok(false),
        Value::Number(number) if number.as_i64() == Some(1) => Ok(true),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(text) if text.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(format!("{other} is not a boolean")),
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub data: ColumnData,
}

/// Rows decoded from the data shards, typed by the schema shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<Column>,
    rows: usize,
    index_name: String,
    schema_descriptor: String,
}

impl ResultTable {
    /// Zero rows with the declared columns.
    pub fn empty(schema: &Schema, schema_descriptor: impl Into<String>) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|declared| Column {
                name: declared.name.clone(),
                dtype: declared.dtype,
                data: ColumnData::for_type(declared.dtype),
            })
            .collect();
        Self {
            columns,
            rows: 0,
            index_name: INDEX_NAME.to_string(),
            schema_descriptor: schema_descriptor.into(),
        }
    }

    /// Parses newline-delimited JSON objects, one row per non-blank line.
    ///
    /// Keys the schema does not declare are ignored; declared keys missing
    /// from a record become empty cells.
    pub fn from_json_lines(
        schema: &Schema,
        schema_descriptor: impl Into<String>,
        text: &str,
    ) -> OtlResult<Self> {
        let mut table = Self::empty(schema, schema_descriptor);
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let record: Map<String, Value> = serde_json::from_str(line)
                .map_err(|err| OtlError::record(line_no, err.to_string()))?;
            table.push_record(line_no, &record)?;
        }
        Ok(table)
    }

    fn push_record(&mut self, line: usize, record: &Map<String, Value>) -> OtlResult<()> {
        for column in &mut self.columns {
            column.data.push(record.get(&column.name)).map_err(|message| {
                OtlError::record(line, format!("column `{}`: {message}", column.name))
            })?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Schema descriptor the table was built from.
    pub fn schema_descriptor(&self) -> &str {
        &self.schema_descriptor
    }

    pub fn row(&self, row: usize) -> Option<Map<String, Value>> {
        (row < self.rows).then(|| {
            self.columns
                .iter()
                .map(|column| (column.name.clone(), column.data.value(row)))
                .collect()
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.rows).filter_map(|row| self.row(row))
    }

    /// Tab-separated rendering with a header line; the index comes first.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.index_name);
        for column in &self.columns {
            out.push('\t');
            out.push_str(&column.name);
        }
        out.push('\n');

        for row in 0..self.rows {
            out.push_str(&row.to_string());
            for column in &self.columns {
                out.push('\t');
                match column.data.value(row) {
                    Value::Null => {}
                    Value::String(text) => out.push_str(&text),
                    other => out.push_str(&other.to_string()),
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::schema::{DdlSchemaParser, SchemaParser};
    use super::*;

    fn schema(ddl: &str) -> Schema {
        DdlSchemaParser.parse(ddl).unwrap()
    }

    #[test]
    fn coerces_cells_into_declared_types() {
        let ddl = "n BIGINT, x DOUBLE, ok BOOLEAN, s STRING, tags ARRAY<STRING>";
        let text = concat!(
            r#"{"n": "12", "x": 3, "ok": "true", "s": 5, "tags": ["a"]}"#,
            "\n",
            r#"{"n": 4.0, "ok": 0, "s": "y", "extra": 1}"#,
            "\n\n"
        );
        let table = ResultTable::from_json_lines(&schema(ddl), ddl, text).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column("n").unwrap().data,
            ColumnData::Integer(vec![Some(12), Some(4)])
        );
        assert_eq!(
            table.column("x").unwrap().data,
            ColumnData::Float(vec![Some(3.0), None])
        );
        assert_eq!(
            table.column("ok").unwrap().data,
            ColumnData::Boolean(vec![Some(true), Some(false)])
        );
        assert_eq!(table.row(0).unwrap().get("s"), Some(&json!("5")));
        assert_eq!(table.row(1).unwrap().get("tags"), Some(&Value::Null));
        assert!(table.column("extra").is_none());
    }

    #[test]
    fn bad_cells_report_line_and_column() {
        let ddl = "n INT";
        let err = ResultTable::from_json_lines(&schema(ddl), ddl, "{\"n\": 1}\n{\"n\": \"x\"}\n")
            .unwrap_err();
        match err {
            OtlError::Record { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("`n`"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tsv_puts_index_first() {
        let ddl = "a INT, b STRING";
        let table =
            ResultTable::from_json_lines(&schema(ddl), ddl, "{\"a\":1,\"b\":\"x\"}\n{\"a\":2}\n")
                .unwrap();
        assert_eq!(table.to_tsv(), "Index\ta\tb\n0\t1\tx\n1\t2\t\n");
    }
}
