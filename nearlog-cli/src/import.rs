use anyhow::{Context, Result};
use nearlog_db::rusqlite::Connection;
use std::path::Path;

use nearlog_db::db::insert_record;
use nearlog_db::models::HistoricalRecord;

/// Ligne CSV `game_code;period;code`.
fn parse_record(record: &csv::StringRecord) -> Result<(String, HistoricalRecord)> {
    let get = |idx: usize| -> Result<&str> {
        record
            .get(idx)
            .map(|s| s.trim())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let game_code = get(0)?;
    anyhow::ensure!(!game_code.is_empty(), "Code de jeu vide");

    let raw_period = get(1)?;
    let period: i64 = raw_period
        .parse()
        .with_context(|| format!("Période invalide : '{}'", raw_period))?;

    let record = HistoricalRecord::parse(period, get(2)?)?;
    Ok((game_code.to_string(), record))
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub fn import_csv(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    import_reader(conn, reader)
}

fn import_reader<R: std::io::Read>(conn: &Connection, mut reader: csv::Reader<R>) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        let parsed = record_result
            .context("Erreur de lecture")
            .and_then(|record| parse_record(&record));
        match parsed {
            Ok((game_code, record)) => match insert_record(&tx, &game_code, &record) {
                Ok(true) => result.inserted += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    log::warn!("Ligne {} : insertion impossible : {}", line, e);
                    result.errors += 1;
                }
            },
            Err(e) => {
                log::warn!("Ligne {} écartée : {:#}", line, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearlog_db::db::{count_records, fetch_history, migrate};

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_parse_record() {
        let record = csv::StringRecord::from(vec![" NCD ", "12", "42"]);
        let (game, parsed) = parse_record(&record).unwrap();
        assert_eq!(game, "NCD");
        assert_eq!(parsed.period, 12);
        assert_eq!(parsed.code.to_string(), "0042");
    }

    #[test]
    fn test_parse_record_rejects_bad_rows() {
        assert!(parse_record(&csv::StringRecord::from(vec!["NCD", "x", "1234"])).is_err());
        assert!(parse_record(&csv::StringRecord::from(vec!["NCD", "1", "12345"])).is_err());
        assert!(parse_record(&csv::StringRecord::from(vec!["NCD", "1"])).is_err());
        assert!(parse_record(&csv::StringRecord::from(vec!["", "1", "1234"])).is_err());
    }

    #[test]
    fn test_import_counts_and_skips_bad_rows() {
        let conn = setup();
        let data = "game_code;period;code\nNCD;1;1234\nNCD;2;12a4\nNCD;3;0007\nNCD;1;9999\nXYZ;1;5555\n";
        let result = import_reader(&conn, reader(data)).unwrap();
        assert_eq!(result.total_records, 5);
        assert_eq!(result.inserted, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 1);

        assert_eq!(count_records(&conn, "NCD").unwrap(), 2);
        let history = fetch_history(&conn, "NCD").unwrap();
        let codes: Vec<String> = history.records.iter().map(|r| r.code.to_string()).collect();
        assert_eq!(codes, vec!["1234", "0007"]);
    }

    #[test]
    fn test_import_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "game_code;period;code\nNCD;1;1234\nNCD;2;2345\n").unwrap();
        let conn = setup();
        let result = import_csv(&conn, &path).unwrap();
        assert_eq!(result.inserted, 2);
        assert!(import_csv(&conn, &dir.path().join("absent.csv")).is_err());
    }
}
