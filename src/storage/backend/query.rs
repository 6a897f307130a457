//! Read-only queries for SeaOrmStorage

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use super::converters::model_to_record;
use super::{SeaOrmStorage, retry};
use crate::errors::{LinkvaultError, Result};
use crate::storage::LinkRecord;

use migration::entities::link;

impl SeaOrmStorage {
    pub(super) async fn load_live(&self, id: &str) -> Result<Option<LinkRecord>> {
        let db = &self.db;
        let id_owned = id.to_string();

        let model = retry::with_retry(&format!("get({})", id), self.retry_config, || async {
            link::Entity::find_by_id(&id_owned)
                .filter(link::Column::IsDeleted.eq(false))
                .one(db)
                .await
        })
        .await
        .map_err(|e| LinkvaultError::backend("get", e))?;

        model.map(model_to_record).transpose()
    }

    pub(super) async fn load_live_by_base_url(&self, base_url: &str) -> Result<Option<LinkRecord>> {
        let db = &self.db;
        let url_owned = base_url.to_string();

        let model = retry::with_retry("find_by_base_url", self.retry_config, || async {
            link::Entity::find()
                .filter(link::Column::BaseUrl.eq(url_owned.as_str()))
                .filter(link::Column::IsDeleted.eq(false))
                .one(db)
                .await
        })
        .await
        .map_err(|e| LinkvaultError::backend("find_by_base_url", e))?;

        model.map(model_to_record).transpose()
    }

    /// Live links owned by `owner_hash`, ordered by id.
    ///
    /// The text match on the JSON column only narrows the scan; membership
    /// is checked again after decoding.
    pub(super) async fn load_owned(&self, owner_hash: &str) -> Result<Vec<LinkRecord>> {
        let db = &self.db;
        let needle = serde_json::to_string(owner_hash)
            .map_err(|e| LinkvaultError::backend("list_by_owner", e))?;

        let models = retry::with_retry("list_by_owner", self.retry_config, || async {
            link::Entity::find()
                .filter(link::Column::IsDeleted.eq(false))
                .filter(link::Column::Owners.contains(needle.as_str()))
                .order_by_asc(link::Column::Id)
                .all(db)
                .await
        })
        .await
        .map_err(|e| LinkvaultError::backend("list_by_owner", e))?;

        let mut owned = Vec::with_capacity(models.len());
        for model in models {
            let record = model_to_record(model)?;
            if record.is_owned_by(owner_hash) {
                owned.push(record);
            }
        }
        Ok(owned)
    }
}
