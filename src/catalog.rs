//! The dataset's table catalog.

use crate::error::{QuarryError, Result};

/// Known tables and their backing parquet files.
pub const TABLE_FILES: &[(&str, &str)] = &[
    ("households", "households.parquet"),
    ("products", "products.parquet"),
    ("transactions", "transactions.parquet"),
    ("coupons", "coupons.parquet"),
    ("coupon_redemptions", "coupon_redemptions.parquet"),
    ("campaigns", "campaigns.parquet"),
    ("campaign_descriptions", "campaign_descriptions.parquet"),
];

/// Magic bytes at both ends of a parquet file.
pub const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Names of all known tables, in catalog order.
pub fn known_tables() -> Vec<String> {
    TABLE_FILES.iter().map(|(t, _)| t.to_string()).collect()
}

/// `true` if `table` is in the catalog.
pub fn is_known(table: &str) -> bool {
    TABLE_FILES.iter().any(|(t, _)| *t == table)
}

/// Backing file for `table`.
pub fn file_for(table: &str) -> Result<&'static str> {
    TABLE_FILES
        .iter()
        .find(|(t, _)| *t == table)
        .map(|(_, file)| *file)
        .ok_or_else(|| QuarryError::UnknownTable(table.to_string()))
}

/// Structural check: the buffer starts and ends with the parquet magic.
pub fn is_parquet_buffer(buffer: &[u8]) -> bool {
    buffer.len() >= 2 * PARQUET_MAGIC.len()
        && buffer.starts_with(PARQUET_MAGIC)
        && buffer.ends_with(PARQUET_MAGIC)
}
