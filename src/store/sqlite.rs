//! SQLite-backed rule store using sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::bridge::mentions::MentionPolicy;
use crate::common::error::{StoreError, StoreResult};
use crate::common::{Endpoint, Snowflake};
use crate::store::migrations::run_migrations;
use crate::store::{BridgeRule, NewBridge, RuleStore};

const SELECT_RULES: &str = r#"
    SELECT
        b.bridge_id,
        b.source_guild,
        b.source_channel,
        b.destination_guild,
        b.destination_channel,
        c.condition_id,
        c.attribute,
        c.regex,
        (SELECT group_concat(m.mention)
           FROM bridge_mentions AS m
          WHERE m.bridge_id = b.bridge_id) AS mentions
    FROM bridges AS b
    JOIN bridge_conditions AS c ON b.bridge_id = c.bridge_id
"#;

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct RuleRow {
    bridge_id: i64,
    source_guild: String,
    source_channel: String,
    destination_guild: String,
    destination_channel: String,
    condition_id: i64,
    attribute: String,
    regex: String,
    mentions: Option<String>,
}

impl TryFrom<RuleRow> for BridgeRule {
    type Error = StoreError;

    fn try_from(r: RuleRow) -> StoreResult<Self> {
        Ok(Self {
            bridge_id: r.bridge_id,
            source: Endpoint::new(
                parse_snowflake("source_guild", &r.source_guild)?,
                parse_snowflake("source_channel", &r.source_channel)?,
            ),
            destination: Endpoint::new(
                parse_snowflake("destination_guild", &r.destination_guild)?,
                parse_snowflake("destination_channel", &r.destination_channel)?,
            ),
            condition_id: r.condition_id,
            attribute: r.attribute,
            regex: r.regex,
            mentions: MentionPolicy::from_names(
                r.mentions.as_deref().unwrap_or_default().split(','),
            ),
        })
    }
}

// Snowflakes are stored as TEXT.
fn parse_snowflake(column: &'static str, value: &str) -> StoreResult<Snowflake> {
    value.parse().map_err(|_| StoreError::InvalidSnowflake {
        column,
        value: value.to_string(),
    })
}

/// Decode rows one by one. A corrupt row is logged and skipped so it only
/// disables itself, never its siblings.
fn decode_rows(rows: Vec<RuleRow>) -> Vec<BridgeRule> {
    rows.into_iter()
        .filter_map(|row| {
            let (bridge_id, condition_id) = (row.bridge_id, row.condition_id);
            BridgeRule::try_from(row)
                .map_err(|e| error!(bridge_id, condition_id, "Skipping corrupt bridge row: {}", e))
                .ok()
        })
        .collect()
}

/// SQLite-backed persistence for bridges, conditions and mentions.
pub struct SqliteRuleStore {
    pool: SqlitePool,
}

impl SqliteRuleStore {
    /// Open (or create) the database file at `path` and run migrations.
    pub async fn open(path: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        info!(path, "Opened rule store");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations must already have run.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Single-connection in-memory store (for testing).
    #[cfg(test)]
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn bridges_for_source(&self, channel_id: Snowflake) -> StoreResult<Vec<BridgeRule>> {
        let sql = format!(
            "{SELECT_RULES} WHERE b.source_channel = ? ORDER BY b.bridge_id, c.condition_id"
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(channel_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(rows))
    }

    async fn all_bridges(&self) -> StoreResult<Vec<BridgeRule>> {
        let sql = format!("{SELECT_RULES} ORDER BY b.bridge_id, c.condition_id");
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(rows))
    }

    async fn source_channels(&self) -> StoreResult<Vec<Snowflake>> {
        let channels: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT source_channel FROM bridges")
                .fetch_all(&self.pool)
                .await?;
        channels
            .iter()
            .map(|c| parse_snowflake("source_channel", c))
            .collect()
    }

    async fn create_bridge(&self, bridge: NewBridge) -> StoreResult<i64> {
        if bridge.conditions.is_empty() {
            return Err(StoreError::NoConditions);
        }

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let bridge_id = sqlx::query(
            "INSERT INTO bridges (source_guild, source_channel, destination_guild, destination_channel)
             VALUES (?, ?, ?, ?)",
        )
        .bind(bridge.source.guild_id.to_string())
        .bind(bridge.source.channel_id.to_string())
        .bind(bridge.destination.guild_id.to_string())
        .bind(bridge.destination.channel_id.to_string())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for condition in &bridge.conditions {
            sqlx::query("INSERT INTO bridge_conditions (bridge_id, attribute, regex) VALUES (?, ?, ?)")
                .bind(bridge_id)
                .bind(condition.attribute.code())
                .bind(&condition.regex)
                .execute(&mut *tx)
                .await?;
        }

        for kind in bridge.mentions.kinds() {
            sqlx::query("INSERT INTO bridge_mentions (bridge_id, mention) VALUES (?, ?)")
                .bind(bridge_id)
                .bind(kind.name())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            bridge_id,
            conditions = bridge.conditions.len(),
            "Persisted bridge"
        );
        Ok(bridge_id)
    }

    async fn remove_bridge(&self, bridge_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM bridges WHERE bridge_id = ?")
            .bind(bridge_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
