//! Schema descriptors: Spark-style DDL such as ``"`ts` TIMESTAMP, `count` BIGINT"``.

use thiserror::Error;

/// Storage class a declared column is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Utf8,
    Timestamp,
    Nested,
}

impl ColumnType {
    fn from_ddl(keyword: &str) -> Option<Self> {
        let ty = match keyword.to_ascii_uppercase().as_str() {
            "TINYINT" | "BYTE" | "SMALLINT" | "SHORT" | "INT" | "INTEGER" | "BIGINT" | "LONG" => {
                Self::Integer
            }
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC" => Self::Float,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "STRING" | "VARCHAR" | "CHAR" | "TEXT" | "BINARY" => Self::Utf8,
            "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "DATE" => Self::Timestamp,
            "ARRAY" | "MAP" | "STRUCT" => Self::Nested,
            _ => return None,
        };
        Some(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ColumnType,
    /// Type exactly as written in the descriptor.
    pub ddl_type: String,
}

/// Ordered column declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema descriptor declares no columns")]
    Empty,
    #[error("column `{column}` has no type")]
    MissingType { column: String },
    #[error("column `{column}` has unsupported type `{ddl_type}`")]
    UnknownType { column: String, ddl_type: String },
    #[error("column `{0}` declared twice")]
    DuplicateColumn(String),
    #[error("unbalanced brackets or quotes in `{0}`")]
    Unbalanced(String),
}

/// Turns a schema descriptor into column types.
pub trait SchemaParser: Send + Sync {
    fn parse(&self, descriptor: &str) -> Result<Schema, SchemaError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DdlSchemaParser;

impl SchemaParser for DdlSchemaParser {
    fn parse(&self, descriptor: &str) -> Result<Schema, SchemaError> {
        let mut columns: Vec<ColumnSpec> = Vec::new();
        for field in split_top_level(descriptor)? {
            let column = parse_field(field)?;
            if columns.iter().any(|existing| existing.name == column.name) {
                return Err(SchemaError::DuplicateColumn(column.name));
            }
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(Schema::new(columns))
    }
}

fn split_top_level(descriptor: &str) -> Result<Vec<&str>, SchemaError> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0usize;

    for (idx, ch) in descriptor.char_indices() {
        match ch {
            '`' => quoted = !quoted,
            '<' | '(' if !quoted => depth += 1,
            '>' | ')' if !quoted => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SchemaError::Unbalanced(descriptor.to_string()))?;
            }
            ',' if !quoted && depth == 0 => {
                fields.push(&descriptor[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quoted || depth != 0 {
        return Err(SchemaError::Unbalanced(descriptor.to_string()));
    }
    fields.push(&descriptor[start..]);

    Ok(fields
        .into_iter()
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect())
}

fn parse_field(field: &str) -> Result<ColumnSpec, SchemaError> {
    let (name, rest) = match field.strip_prefix('`') {
        Some(quoted) => {
            let end = quoted
                .find('`')
                .ok_or_else(|| SchemaError::Unbalanced(field.to_string()))?;
            (&quoted[..end], &quoted[end + 1..])
        }
        None => {
            let end = field
                .find(|ch: char| ch.is_whitespace() || ch == ':')
                .unwrap_or(field.len());
            (&field[..end], &field[end..])
        }
    };

    let ddl_type = rest.trim_start().trim_start_matches(':').trim();
    if ddl_type.is_empty() {
        return Err(SchemaError::MissingType {
            column: name.to_string(),
        });
    }

    let keyword_len = ddl_type
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(ddl_type.len());
    let dtype =
        ColumnType::from_ddl(&ddl_type[..keyword_len]).ok_or_else(|| SchemaError::UnknownType {
            column: name.to_string(),
            ddl_type: ddl_type.to_string(),
        })?;

    Ok(ColumnSpec {
        name: name.to_string(),
        dtype,
        ddl_type: ddl_type.to_string(),
    })
}
