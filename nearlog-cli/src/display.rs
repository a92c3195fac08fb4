use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use nearlog_db::models::HistoricalRecord;
use nearlog_engine::backtest::BacktestSummary;
use nearlog_engine::benchmark::Benchmark;
use nearlog_engine::output::{FinalCandidates, RankedCandidate};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn display_records(records: &[HistoricalRecord]) {
    if records.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Période", "Code"]);
    for record in records {
        table.add_row(vec![record.period.to_string(), record.code.to_string()]);
    }
    println!("{table}");
}

pub fn display_games(games: &[(String, u32)]) {
    if games.is_empty() {
        println!("Aucun jeu en base.");
        return;
    }

    let mut table = new_table(vec!["Jeu", "Tirages"]);
    for (game, count) in games {
        table.add_row(vec![game.clone(), count.to_string()]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

pub fn display_benchmark(benchmark: &Benchmark) {
    if benchmark.is_empty() {
        println!("Benchmark vide.");
        return;
    }

    let total: u64 = benchmark.entries().iter().map(|e| e.score).sum();
    let mut table = new_table(vec!["#", "Type de motif", "Score", "Part"]);
    for (i, entry) in benchmark.entries().iter().enumerate() {
        let share = if total > 0 { entry.score as f64 / total as f64 * 100.0 } else { 0.0 };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(entry.pattern_type.as_str()),
            Cell::new(entry.score),
            Cell::new(format!("{:.1} %", share)),
        ]);
    }
    println!("{table}");
}

pub fn display_backtest_summary(summary: &BacktestSummary, incremental: bool) {
    let mode = if incremental { "incrémental" } else { "complet" };
    println!("\nBacktest {} depuis l'index {} :", mode, summary.start_index);
    println!("  Prédictions évaluées : {}", summary.evaluated);
    let rate = if summary.evaluated > 0 {
        summary.hits as f64 / summary.evaluated as f64 * 100.0
    } else {
        0.0
    };
    println!("  Réussites            : {} ({:.1} %)", summary.hits, rate);
}

pub fn display_candidates(output: &FinalCandidates, show: usize, raw: bool) {
    if let Some(reference) = output.reference {
        println!("\nRéférence : période {} -> {}", reference.period, reference.code);
    }
    println!(
        "Graine : {} candidats, {} niveau(x) d'expansion, {} candidats au total",
        output.seed_size,
        output.report.levels_run,
        output.len()
    );
    if !output.report.reached() {
        println!("Attention : {}", output.report);
    }
    println!("Candidats benchmark : {}\n", output.benchmark_count());

    let rows: Vec<&RankedCandidate> = if raw {
        output.raw_sorted()
    } else {
        output.entries().iter().collect()
    };

    let mut table = new_table(vec!["#", "Code", "Provenance", ""]);
    for (i, ranked) in rows.iter().take(show).enumerate() {
        let tag = if ranked.benchmark {
            Cell::new("BENCHMARK").fg(Color::Green)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(ranked.candidate.code),
            Cell::new(ranked.candidate.provenance.to_string()),
            tag,
        ]);
    }
    println!("{table}");

    if rows.len() > show {
        println!("... {} candidats supplémentaires (--show pour en afficher plus)", rows.len() - show);
    }
}

/// Sortie brute, une ligne par candidat.
pub fn print_candidate_lines(output: &FinalCandidates, raw: bool) {
    if raw {
        for ranked in output.raw_sorted() {
            println!("{}", ranked.render_line());
        }
    } else {
        for line in output.render_lines() {
            println!("{}", line);
        }
    }
}
