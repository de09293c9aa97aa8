//! SQLite-backed snapshot store
//!
//! One `coins` row per id, one `price_history` row per observation.
//! WAL mode so reads stay cheap while the poll loop writes. The connection
//! sits behind a mutex; statements are short and the lock is never held
//! across an await point.

use super::PriceStore;
use crate::market::{self, Coin, PricePoint};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS coins (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    image TEXT NOT NULL,
    current_price REAL NOT NULL,
    price_change_24h REAL,
    last_updated INTEGER NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    coin_id TEXT NOT NULL REFERENCES coins(id),
    price REAL NOT NULL,
    change_24h REAL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_history_coin_ts
    ON price_history(coin_id, timestamp);
"#;

/// SQLite implementation of [`PriceStore`]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    tolerance: f64,
}

impl SqliteStore {
    /// Open (or create) the store at the given path
    pub fn open(path: impl AsRef<Path>, tolerance: f64) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::with_connection(conn, tolerance)
    }

    /// Open an in-memory store, used by tests
    pub fn open_in_memory(tolerance: f64) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, tolerance)
    }

    fn with_connection(conn: Connection, tolerance: f64) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tolerance,
        })
    }

    /// Upsert a single coin. Returns true when a row was written.
    fn upsert_one(&self, conn: &Connection, coin: &Coin) -> anyhow::Result<bool> {
        let existing: Option<(f64, Option<f64>)> = conn
            .query_row(
                "SELECT current_price, price_change_24h FROM coins WHERE id = ?1",
                params![coin.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to read existing coin")?;

        match existing {
            Some((old_price, old_change)) => {
                if !market::coin_changed(
                    old_price,
                    old_change,
                    coin.current_price,
                    coin.price_change_24h,
                    self.tolerance,
                ) {
                    return Ok(false);
                }

                conn.execute(
                    "UPDATE coins SET current_price = ?2, price_change_24h = ?3, \
                     last_updated = ?4 WHERE id = ?1",
                    params![
                        coin.id,
                        coin.current_price,
                        coin.price_change_24h,
                        Utc::now().timestamp_millis()
                    ],
                )
                .context("Failed to update coin")?;
                Ok(true)
            }
            None => {
                conn.execute(
                    "INSERT INTO coins (id, symbol, name, image, current_price, \
                     price_change_24h, last_updated) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        coin.id,
                        coin.symbol,
                        coin.name,
                        coin.image,
                        coin.current_price,
                        coin.price_change_24h,
                        Utc::now().timestamp_millis()
                    ],
                )
                .context("Failed to insert coin")?;
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn upsert_coins(&self, coins: &[Coin]) -> anyhow::Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut changed = Vec::new();

        for coin in coins {
            // One coin failing must not sink the rest of the batch
            match self.upsert_one(&conn, coin) {
                Ok(true) => changed.push(coin.id.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(coin_id = %coin.id, error = %e, "Skipping coin upsert");
                }
            }
        }

        Ok(changed)
    }

    async fn append_history(&self, point: &PricePoint) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO price_history (coin_id, price, change_24h, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                point.coin_id,
                point.price,
                point.change_24h,
                point.timestamp.timestamp_millis()
            ],
        )
        .context("Failed to append history point")?;
        Ok(())
    }

    async fn prune_history(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM price_history WHERE timestamp < ?1",
                params![cutoff.timestamp_millis()],
            )
            .context("Failed to prune history")?;

        if removed > 0 {
            tracing::debug!(removed, "Pruned old history points");
        }
        Ok(removed)
    }

    async fn history(&self, coin_id: &str, window: Duration) -> anyhow::Result<Vec<PricePoint>> {
        let since = (Utc::now() - window).timestamp_millis();
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                "SELECT coin_id, price, change_24h, timestamp FROM price_history \
                 WHERE coin_id = ?1 AND timestamp >= ?2 ORDER BY timestamp ASC",
            )
            .context("Failed to prepare history query")?;

        let points = stmt
            .query_map(params![coin_id, since], |row| {
                Ok(PricePoint {
                    coin_id: row.get(0)?,
                    price: row.get(1)?,
                    change_24h: row.get(2)?,
                    timestamp: millis_to_datetime(row.get(3)?),
                })
            })
            .context("Failed to query history")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read history rows")?;

        Ok(points)
    }

    async fn get_coin(&self, coin_id: &str) -> anyhow::Result<Option<Coin>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, symbol, name, image, current_price, price_change_24h, last_updated \
             FROM coins WHERE id = ?1",
            params![coin_id],
            row_to_coin,
        )
        .optional()
        .context("Failed to read coin")
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Coin>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, name, image, current_price, price_change_24h, last_updated \
                 FROM coins ORDER BY current_price DESC, id ASC",
            )
            .context("Failed to prepare list query")?;

        let coins = stmt
            .query_map([], row_to_coin)
            .context("Failed to query coins")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read coin rows")?;

        Ok(coins)
    }
}

fn row_to_coin(row: &rusqlite::Row<'_>) -> rusqlite::Result<Coin> {
    Ok(Coin {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        current_price: row.get(4)?,
        price_change_24h: row.get(5)?,
        last_updated: millis_to_datetime(row.get(6)?),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
