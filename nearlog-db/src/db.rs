use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::models::{build_history, HistoricalRecord, RejectedRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS log_results (
    game_code  TEXT NOT NULL,
    period     INTEGER NOT NULL,
    code       TEXT NOT NULL,
    PRIMARY KEY (game_code, period)
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("nearlog.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn insert_record(conn: &Connection, game_code: &str, record: &HistoricalRecord) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO log_results (game_code, period, code) VALUES (?1, ?2, ?3)",
        rusqlite::params![game_code, record.period, record.code.to_string()],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

/// Historique complet d'un jeu, trié par période croissante.
pub struct LoadedHistory {
    pub records: Vec<HistoricalRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Charge tout l'historique d'un jeu. Les lignes dont le code est invalide sont écartées
/// individuellement (voir `build_history`).
pub fn fetch_history(conn: &Connection, game_code: &str) -> Result<LoadedHistory> {
    let mut stmt = conn.prepare(
        "SELECT period, code FROM log_results WHERE game_code = ?1 ORDER BY period ASC"
    )?;
    let rows = stmt.query_map([game_code], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?.collect::<Result<Vec<_>, _>>()?;

    let (records, rejected) = build_history(rows);
    Ok(LoadedHistory { records, rejected })
}

/// Les `limit` dernières entrées, la plus récente en premier.
pub fn fetch_last_records(conn: &Connection, game_code: &str, limit: u32) -> Result<Vec<HistoricalRecord>> {
    let mut stmt = conn.prepare(
        "SELECT period, code FROM log_results WHERE game_code = ?1 ORDER BY period DESC LIMIT ?2"
    )?;
    let rows = stmt.query_map(rusqlite::params![game_code, limit], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?.collect::<Result<Vec<_>, _>>()?;

    let (mut records, _) = build_history(rows);
    records.reverse();
    Ok(records)
}

pub fn count_records(conn: &Connection, game_code: &str) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM log_results WHERE game_code = ?1",
        [game_code],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_games(conn: &Connection) -> Result<Vec<(String, u32)>> {
    let mut stmt = conn.prepare(
        "SELECT game_code, COUNT(*) FROM log_results GROUP BY game_code ORDER BY game_code ASC"
    )?;
    let games = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(games)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Code;

    fn record(period: i64, code: &str) -> HistoricalRecord {
        HistoricalRecord::new(period, Code::normalize(code).unwrap())
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = setup();
        assert_eq!(count_records(&conn, "NCD").unwrap(), 0);

        insert_record(&conn, "NCD", &record(1, "1234")).unwrap();
        assert_eq!(count_records(&conn, "NCD").unwrap(), 1);
        assert_eq!(count_records(&conn, "MQ22").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = setup();

        assert!(insert_record(&conn, "NCD", &record(1, "1234")).unwrap());
        assert!(!insert_record(&conn, "NCD", &record(1, "9999")).unwrap());
        assert_eq!(count_records(&conn, "NCD").unwrap(), 1);
    }

    #[test]
    fn test_fetch_history_order_and_padding() {
        let conn = setup();
        insert_record(&conn, "NCD", &record(3, "1235")).unwrap();
        insert_record(&conn, "NCD", &record(1, "0042")).unwrap();
        insert_record(&conn, "NCD", &record(2, "2345")).unwrap();

        let history = fetch_history(&conn, "NCD").unwrap();
        let codes: Vec<String> = history.records.iter().map(|r| r.code.to_string()).collect();
        assert_eq!(codes, vec!["0042", "2345", "1235"]);
        assert!(history.rejected.is_empty());
    }

    #[test]
    fn test_fetch_history_rejects_corrupt_rows() {
        let conn = setup();
        insert_record(&conn, "NCD", &record(1, "1234")).unwrap();
        conn.execute(
            "INSERT INTO log_results (game_code, period, code) VALUES ('NCD', 2, 'ab12')",
            [],
        ).unwrap();
        insert_record(&conn, "NCD", &record(3, "5678")).unwrap();

        let history = fetch_history(&conn, "NCD").unwrap();
        assert_eq!(history.records.len(), 2);
        assert_eq!(history.rejected.len(), 1);
        assert_eq!(history.rejected[0].period, 2);
    }

    #[test]
    fn test_fetch_last_records() {
        let conn = setup();
        for (p, c) in [(1, "1111"), (2, "2222"), (3, "3333")] {
            insert_record(&conn, "NCD", &record(p, c)).unwrap();
        }
        let last = fetch_last_records(&conn, "NCD", 2).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].period, 3);
        assert_eq!(last[1].period, 2);
    }

    #[test]
    fn test_list_games() {
        let conn = setup();
        insert_record(&conn, "NCD", &record(1, "1111")).unwrap();
        insert_record(&conn, "NCD", &record(2, "2222")).unwrap();
        insert_record(&conn, "AB4", &record(1, "3333")).unwrap();

        let games = list_games(&conn).unwrap();
        assert_eq!(games, vec![("AB4".to_string(), 1), ("NCD".to_string(), 2)]);
    }

    #[test]
    fn test_open_db_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nearlog.db");
        let conn = open_db(&path).unwrap();
        migrate(&conn).unwrap();
        assert!(path.exists());
    }
}
