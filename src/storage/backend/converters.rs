use std::collections::BTreeSet;

use crate::errors::{LinkvaultError, Result};
use crate::storage::LinkRecord;
use migration::entities::link;

/// Owner hashes are stored as a JSON array in a text column.
pub fn encode_owners(owners: &BTreeSet<String>) -> Result<String> {
    serde_json::to_string(owners).map_err(|e| LinkvaultError::backend("encode owners", e))
}

pub fn decode_owners(raw: &str) -> Result<BTreeSet<String>> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    serde_json::from_str(raw).map_err(|e| LinkvaultError::backend("decode owners", e))
}

/// 将 Sea-ORM Model 转换为 LinkRecord
pub fn model_to_record(model: link::Model) -> Result<LinkRecord> {
    Ok(LinkRecord {
        owners: decode_owners(&model.owners)?,
        id: model.id,
        base_url: model.base_url,
        deleted: model.is_deleted,
    })
}

pub fn record_to_active_model(record: &LinkRecord) -> Result<link::ActiveModel> {
    use sea_orm::ActiveValue::Set;

    Ok(link::ActiveModel {
        id: Set(record.id.clone()),
        base_url: Set(record.base_url.clone()),
        owners: Set(encode_owners(&record.owners)?),
        is_deleted: Set(record.deleted),
    })
}
