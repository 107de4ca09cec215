//! Turns downloaded shards into a [`ResultTable`].

use tracing::debug;

use crate::{
    api::shards::ShardPayload,
    error::{OtlError, OtlResult},
    table::{ResultTable, schema::SchemaParser},
};

/// Substring that marks the schema shard among the result locations.
pub const SCHEMA_MARKER: &str = "_SCHEMA";

/// Index of the single location carrying the schema.
pub fn schema_position(locations: &[String]) -> OtlResult<usize> {
    let mut matches = locations
        .iter()
        .enumerate()
        .filter(|(_, location)| location.contains(SCHEMA_MARKER))
        .map(|(idx, _)| idx);

    match (matches.next(), matches.count()) {
        (Some(idx), 0) => Ok(idx),
        (None, _) => Err(OtlError::SchemaMissing { matches: 0 }),
        (Some(_), rest) => Err(OtlError::SchemaMissing { matches: rest + 1 }),
    }
}

/// Builds the table from payloads aligned with `locations`.
///
/// Data shards are concatenated in location order before parsing.
pub fn assemble(
    locations: &[String],
    payloads: &[ShardPayload],
    parser: &dyn SchemaParser,
) -> OtlResult<ResultTable> {
    let schema_idx = schema_position(locations)?;
    let descriptor = payloads
        .get(schema_idx)
        .ok_or_else(|| OtlError::WorkerJoin(format!("missing payload for `{}`", locations[schema_idx])))?
        .text()?;
    let schema = parser.parse(descriptor.trim())?;

    let mut data = String::new();
    for (idx, payload) in payloads.iter().enumerate() {
        if idx == schema_idx {
            continue;
        }
        let text = payload.text()?;
        if !data.is_empty() && !data.ends_with('\n') {
            data.push('\n');
        }
        data.push_str(&text);
    }

    let table = if data.trim().is_empty() {
        ResultTable::empty(&schema, &descriptor)
    } else {
        ResultTable::from_json_lines(&schema, &descriptor, &data)?
    };
    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        shards = payloads.len(),
        "result assembled"
    );
    Ok(table)
}
