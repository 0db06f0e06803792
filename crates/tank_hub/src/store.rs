//! Log de temperaturas em SQLite (somente inserção).
//!
//! ```sql
//! CREATE TABLE temperature_log (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     timestamp TEXT NOT NULL,        -- "YYYY-MM-DD HH:MM:SS"
//!     basking_temp REAL NOT NULL,
//!     water_temp REAL NOT NULL
//! );
//! ```

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Formato do timestamp gravado.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Erros do armazenamento.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Falha ao abrir banco {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Erro SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Registro a ser gravado.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureRecord {
    pub timestamp: String,
    pub basking_temp: f64,
    pub water_temp: f64,
}

/// Registro lido do banco.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    pub id: i64,
    pub timestamp: String,
    pub basking_temp: f64,
    pub water_temp: f64,
}

/// Conexão SQLite protegida por `Mutex` (Connection não é Sync).
/// Inserções concorrentes são serializadas aqui.
pub struct TemperatureStore {
    conn: Mutex<Connection>,
}

impl TemperatureStore {
    /// Abre (ou cria) o banco e a tabela.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::with_connection(conn)?;
        info!("Banco de temperaturas pronto em {}", path.display());
        Ok(store)
    }

    /// Banco em memória (testes).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS temperature_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                basking_temp REAL NOT NULL,
                water_temp REAL NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insere um registro e retorna o id gerado.
    pub fn append(&self, record: &TemperatureRecord) -> Result<i64, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO temperature_log (timestamp, basking_temp, water_temp)
             VALUES (?1, ?2, ?3)",
            params![record.timestamp, record.basking_temp, record.water_temp],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM temperature_log", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Últimos `limit` registros, do mais novo para o mais velho.
    pub fn latest(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, basking_temp, water_temp
             FROM temperature_log ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], row_to_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Registros de um dia (o que a página de tendências consulta).
    pub fn readings_for_day(&self, day: NaiveDate) -> Result<Vec<StoredReading>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, basking_temp, water_temp
             FROM temperature_log WHERE DATE(timestamp) = ?1 ORDER BY id",
        )?;
        let day = day.format("%Y-%m-%d").to_string();
        let rows = stmt
            .query_map(params![day], row_to_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<StoredReading> {
    Ok(StoredReading {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        basking_temp: row.get(2)?,
        water_temp: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str, b: f64, w: f64) -> TemperatureRecord {
        TemperatureRecord {
            timestamp: ts.into(),
            basking_temp: b,
            water_temp: w,
        }
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let store = TemperatureStore::open_in_memory().unwrap();
        let a = store.append(&record("2026-10-16 08:00:00", 88.0, 76.0)).unwrap();
        let b = store.append(&record("2026-10-16 08:30:00", 89.5, 76.2)).unwrap();
        assert!(b > a);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn latest_is_newest_first() {
        let store = TemperatureStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .append(&record(&format!("2026-10-16 0{i}:00:00"), 80.0 + i as f64, 75.0))
                .unwrap();
        }
        let latest = store.latest(2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].basking_temp, 84.0);
        assert_eq!(latest[1].basking_temp, 83.0);
    }

    #[test]
    fn readings_for_day_filters_by_date() {
        let store = TemperatureStore::open_in_memory().unwrap();
        store.append(&record("2026-10-15 23:59:59", 85.0, 74.0)).unwrap();
        store.append(&record("2026-10-16 00:00:00", 86.0, 75.0)).unwrap();
        store.append(&record("2026-10-16 12:00:00", 90.0, 77.0)).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let rows = store.readings_for_day(day).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, "2026-10-16 00:00:00");
        assert_eq!(rows[1].water_temp, 77.0);
    }

    #[test]
    fn open_creates_file_and_reopens() {
        let path = std::env::temp_dir().join(format!("tank_hub_store_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let store = TemperatureStore::open(&path).unwrap();
            store.append(&record("2026-10-16 10:00:00", 88.0, 76.0)).unwrap();
        }
        let store = TemperatureStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_fails_on_missing_directory() {
        let path = Path::new("/nao/existe/dir/turtle.db");
        assert!(matches!(TemperatureStore::open(path), Err(StoreError::Open { .. })));
    }
}
