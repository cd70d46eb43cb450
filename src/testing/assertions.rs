//! Shape checks for operation results

use crate::connector::{ReadResult, WriteResult};
use crate::types::scalar_to_string;
use anyhow::{bail, ensure, Result};

/// A page is well formed: `rows` counts `data`, and `done` agrees with an
/// empty `next_page`
pub fn assert_read_result(result: &ReadResult) -> Result<()> {
    ensure!(
        result.rows == result.data.len(),
        "rows is {} but the page holds {} records",
        result.rows,
        result.data.len()
    );
    ensure!(
        result.done == result.next_page.is_empty(),
        "done is {} but next_page is {:?}",
        result.done,
        result.next_page
    );
    Ok(())
}

/// A write succeeded and reported a record id
pub fn assert_write_ok(result: &WriteResult) -> Result<()> {
    if !result.success {
        bail!("write failed: {}", result.errors.join("; "));
    }
    ensure!(!result.record_id.is_empty(), "write succeeded without a record id");
    Ok(())
}

/// Whether a page holds the record whose `id_field` equals `record_id`
pub fn contains_record(result: &ReadResult, id_field: &str, record_id: &str) -> bool {
    result.data.iter().any(|record| {
        record
            .raw
            .get(id_field)
            .and_then(scalar_to_string)
            .is_some_and(|id| id == record_id)
    })
}
