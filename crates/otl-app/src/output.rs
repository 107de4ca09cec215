//! Rendering of result tables on stdout.

use std::io::Write;

use otl_client::ResultTable;

use crate::{cli::OutputFormat, error::AppError};

pub fn write_table<W: Write>(
    out: &mut W,
    table: &ResultTable,
    format: OutputFormat,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => out.write_all(table.to_tsv().as_bytes())?,
        OutputFormat::Json => {
            for row in table.rows() {
                serde_json::to_writer(&mut *out, &row)?;
                out.write_all(b"\n")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
