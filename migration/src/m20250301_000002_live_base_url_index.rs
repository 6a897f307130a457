use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

const TABLE: &str = "links";
const INDEX: &str = "idx_links_live_base_url";
const MYSQL_LIVE_COLUMN: &str = "live_base_url_hash";

/// MySQL has no partial indexes. A generated column that is NULL for
/// tombstones carries the uniqueness instead; NULLs never collide.
const MYSQL_ADD_LIVE_COLUMN: &str = "ALTER TABLE links ADD COLUMN live_base_url_hash CHAR(64) \
     GENERATED ALWAYS AS (IF(is_deleted, NULL, SHA2(base_url, 256))) STORED";
const MYSQL_ADD_LIVE_INDEX: &str =
    "CREATE UNIQUE INDEX idx_links_live_base_url ON links (live_base_url_hash)";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        match manager.get_database_backend() {
            // Tombstoned rows keep their base_url, so uniqueness only covers live rows.
            DatabaseBackend::Postgres => {
                conn.execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_live_base_url ON links (base_url) WHERE is_deleted = false",
                )
                .await?;
            }
            DatabaseBackend::Sqlite => {
                conn.execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_live_base_url ON links (base_url) WHERE is_deleted = 0",
                )
                .await?;
            }
            DatabaseBackend::MySql => {
                // MySQL 不支持 IF NOT EXISTS，先查询再创建
                if !manager.has_column(TABLE, MYSQL_LIVE_COLUMN).await? {
                    conn.execute_unprepared(MYSQL_ADD_LIVE_COLUMN).await?;
                }
                if !manager.has_index(TABLE, INDEX).await? {
                    conn.execute_unprepared(MYSQL_ADD_LIVE_INDEX).await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        match manager.get_database_backend() {
            DatabaseBackend::MySql => {
                if manager.has_index(TABLE, INDEX).await? {
                    conn.execute_unprepared("DROP INDEX idx_links_live_base_url ON links")
                        .await?;
                }
                if manager.has_column(TABLE, MYSQL_LIVE_COLUMN).await? {
                    conn.execute_unprepared("ALTER TABLE links DROP COLUMN live_base_url_hash")
                        .await?;
                }
            }
            _ => {
                conn.execute_unprepared("DROP INDEX IF EXISTS idx_links_live_base_url")
                    .await?;
            }
        }
        Ok(())
    }
}
