//! Write operations for SeaOrmStorage
//!
//! Multi-statement writes run inside a transaction. On MySQL and PostgreSQL
//! the row read before a merge is locked with `SELECT ... FOR UPDATE`. On
//! SQLite the transaction takes the database write lock before its first
//! read, the same effect as `BEGIN IMMEDIATE`.

use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, SqlErr, TransactionTrait, sea_query::Expr,
};
use tracing::debug;

use super::converters::{decode_owners, encode_owners, record_to_active_model};
use super::{SeaOrmStorage, retry};
use crate::errors::{LinkvaultError, Result};
use crate::storage::{InsertOutcome, LinkRecord};

use migration::entities::link;

fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("unique constraint") || message.contains("duplicate")
}

/// Map a write failure onto the error taxonomy.
fn write_error(operation: &str, detail: &str, err: DbErr) -> LinkvaultError {
    match err {
        DbErr::RecordNotFound(_) => LinkvaultError::not_found(format!("link '{}' not found", detail)),
        e if is_unique_violation(&e) => LinkvaultError::conflict(format!(
            "{} conflicts with an existing link: {}",
            detail, e
        )),
        e => LinkvaultError::backend(operation, e),
    }
}

fn to_db_err(err: LinkvaultError) -> DbErr {
    DbErr::Custom(err.to_string())
}

/// A write as the first statement makes SQLite acquire the writer lock
/// (waiting on `busy_timeout`) before any snapshot is taken, so a concurrent
/// commit cannot invalidate the read that follows.
async fn reserve_sqlite_writer<C>(txn: &C) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    txn.execute_unprepared("UPDATE links SET is_deleted = is_deleted WHERE 0")
        .await
        .map(|_| ())
}

/// Live row matching `condition`, locked when `lock` is set.
async fn find_live_for_update<C>(
    txn: &C,
    condition: Condition,
    lock: bool,
) -> std::result::Result<Option<link::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = link::Entity::find()
        .filter(condition)
        .filter(link::Column::IsDeleted.eq(false));
    if lock {
        query = query.lock_exclusive();
    }
    query.one(txn).await
}

/// Fold `owners` into `model`; writes only when something was added.
async fn merge_owners<C>(
    txn: &C,
    model: &link::Model,
    owners: impl IntoIterator<Item = String>,
) -> std::result::Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let mut merged = decode_owners(&model.owners).map_err(to_db_err)?;
    let before = merged.len();
    merged.extend(owners);
    if merged.len() == before {
        return Ok(());
    }

    let encoded = encode_owners(&merged).map_err(to_db_err)?;
    link::Entity::update_many()
        .col_expr(link::Column::Owners, Expr::value(encoded))
        .filter(link::Column::Id.eq(model.id.as_str()))
        .exec(txn)
        .await?;
    Ok(())
}

async fn merge_or_insert_once(
    db: &DatabaseConnection,
    record: &LinkRecord,
    am: link::ActiveModel,
    lock: bool,
) -> std::result::Result<InsertOutcome, DbErr> {
    let txn = db.begin().await?;
    if !lock {
        reserve_sqlite_writer(&txn).await?;
    }

    let existing = find_live_for_update(
        &txn,
        Condition::all().add(link::Column::BaseUrl.eq(record.base_url.as_str())),
        lock,
    )
    .await?;

    let outcome = match existing {
        Some(model) => {
            merge_owners(&txn, &model, record.owners.iter().cloned()).await?;
            InsertOutcome {
                id: model.id,
                existed: true,
            }
        }
        None => {
            link::Entity::insert(am).exec(&txn).await?;
            InsertOutcome {
                id: record.id.clone(),
                existed: false,
            }
        }
    };

    txn.commit().await?;
    Ok(outcome)
}

async fn append_owner_once(
    db: &DatabaseConnection,
    id: &str,
    owner_hash: &str,
    lock: bool,
) -> std::result::Result<(), DbErr> {
    let txn = db.begin().await?;
    if !lock {
        reserve_sqlite_writer(&txn).await?;
    }

    let model = find_live_for_update(
        &txn,
        Condition::all().add(link::Column::Id.eq(id)),
        lock,
    )
    .await?
    .ok_or_else(|| DbErr::RecordNotFound(id.to_string()))?;

    merge_owners(&txn, &model, [owner_hash.to_string()]).await?;
    txn.commit().await
}

impl SeaOrmStorage {
    fn supports_row_lock(&self) -> bool {
        self.backend_name != "sqlite"
    }

    pub(super) async fn insert_record(&self, record: &LinkRecord) -> Result<()> {
        let db = &self.db;
        let am = record_to_active_model(record)?;

        retry::with_retry(&format!("put({})", record.id), self.retry_config, || async {
            link::Entity::insert(am.clone()).exec(db).await.map(|_| ())
        })
        .await
        .map_err(|e| write_error("put", &record.id, e))
    }

    /// 批量插入（使用事务，整批成功或整批回滚）
    pub(super) async fn insert_records(&self, records: &[LinkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let active_models = records
            .iter()
            .map(record_to_active_model)
            .collect::<Result<Vec<_>>>()?;

        let db = &self.db;
        retry::with_retry("put_batch", self.retry_config, || async {
            let txn = db.begin().await?;
            link::Entity::insert_many(active_models.clone())
                .exec(&txn)
                .await?;
            txn.commit().await
        })
        .await
        .map_err(|e| write_error("put_batch", "batch", e))?;

        debug!("Inserted batch of {} links", records.len());
        Ok(())
    }

    pub(super) async fn append_owner(&self, id: &str, owner_hash: &str) -> Result<()> {
        let db = &self.db;
        let lock = self.supports_row_lock();

        retry::with_retry(&format!("add_owner({})", id), self.retry_config, || {
            append_owner_once(db, id, owner_hash, lock)
        })
        .await
        .map_err(|e| write_error("add_owner", id, e))
    }

    pub(super) async fn merge_or_insert(&self, record: &LinkRecord) -> Result<InsertOutcome> {
        let db = &self.db;
        let lock = self.supports_row_lock();
        let am = record_to_active_model(record)?;

        retry::with_retry("insert_or_add_owner", self.retry_config, || {
            merge_or_insert_once(db, record, am.clone(), lock)
        })
        .await
        .map_err(|e| write_error("insert_or_add_owner", &record.base_url, e))
    }

    /// Tombstone all live ids in one transaction.
    pub(super) async fn tombstone(&self, ids: &HashSet<String>) -> Result<()> {
        let db = &self.db;

        let rows = retry::with_retry("delete_batch", self.retry_config, || async {
            let txn = db.begin().await?;
            let result = link::Entity::update_many()
                .col_expr(link::Column::IsDeleted, Expr::value(true))
                .filter(link::Column::Id.is_in(ids.iter().cloned()))
                .filter(link::Column::IsDeleted.eq(false))
                .exec(&txn)
                .await?;
            txn.commit().await?;
            Ok::<_, DbErr>(result.rows_affected)
        })
        .await
        .map_err(|e| LinkvaultError::backend("delete_batch", e))?;

        debug!("Tombstoned {} of {} requested links", rows, ids.len());
        Ok(())
    }
}
