mod display;
mod import;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nearlog_db::db::{count_records, db_path, fetch_history, fetch_last_records, insert_record, list_games, migrate, open_db};
use nearlog_db::models::{HistoricalRecord, Code};
use nearlog_db::rusqlite::Connection;
use nearlog_engine::backtest::{self, BacktestRunner};
use nearlog_engine::benchmark::{Benchmark, BenchmarkStore};
use nearlog_engine::config::{load_config, save_config, EngineConfig};
use nearlog_engine::error::require_history;
use nearlog_engine::expansion::ExpansionMode;
use nearlog_engine::pipeline::generate_next;
use crate::display::{
    display_backtest_summary, display_benchmark, display_candidates, display_games,
    display_import_summary, display_records, print_candidate_lines,
};

#[derive(Parser)]
#[command(name = "nearlog", about = "Génération de candidats et benchmark des motifs pour codes à 4 chiffres")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer l'historique depuis un fichier CSV (game_code;period;code)
    Import {
        /// Chemin vers le fichier CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les jeux présents en base
    Games,

    /// Lister les derniers tirages d'un jeu
    List {
        #[arg(short, long)]
        game: String,

        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Ajouter un tirage manuellement
    Add {
        #[arg(short, long)]
        game: String,
    },

    /// Rejouer l'historique et mettre à jour le benchmark des motifs
    Backtest {
        #[arg(short, long)]
        game: String,

        /// Backtest complet, sans reprendre le benchmark existant
        #[arg(long)]
        full: bool,

        /// Fichier benchmark (défaut : data/<jeu>_benchmark_patterns.json)
        #[arg(short, long)]
        benchmark: Option<PathBuf>,

        /// Fichier de configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Générer la liste de candidats pour la prochaine période
    Generate {
        #[arg(short, long)]
        game: String,

        #[arg(short, long)]
        benchmark: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stratégie d'expansion
        #[arg(short, long)]
        mode: Option<ExpansionMode>,

        /// Nombre de candidats à produire
        #[arg(long)]
        count: Option<usize>,

        /// Nombre de candidats affichés dans le tableau
        #[arg(short, long, default_value = "50")]
        show: usize,

        /// Vue triée par code au lieu de la vue priorisée
        #[arg(long)]
        raw: bool,

        /// Une ligne « code --> provenance » par candidat, sans tableau
        #[arg(long)]
        lines: bool,
    },

    /// Backtest incrémental puis génération
    Run {
        #[arg(short, long)]
        game: String,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "50")]
        show: usize,
    },

    /// Afficher le benchmark enregistré
    Benchmark {
        #[arg(short, long)]
        game: String,

        #[arg(short, long)]
        benchmark: Option<PathBuf>,
    },

    /// Écrire la configuration par défaut
    Config {
        #[arg(short, long, default_value = "nearlog.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Games => cmd_games(&conn),
        Command::List { game, last } => cmd_list(&conn, &game, last),
        Command::Add { game } => cmd_add(&conn, &game),
        Command::Backtest {
            game,
            full,
            benchmark,
            config,
        } => cmd_backtest(&conn, &game, full, benchmark.as_deref(), config.as_deref()),
        Command::Generate {
            game,
            benchmark,
            config,
            mode,
            count,
            show,
            raw,
            lines,
        } => {
            let mut config = engine_config(config.as_deref())?;
            if let Some(mode) = mode {
                config.expansion_mode = mode;
            }
            if let Some(count) = count {
                config.output_count = count;
            }
            cmd_generate(&conn, &game, &config, benchmark.as_deref(), show, raw, lines)
        }
        Command::Run { game, config, show } => cmd_run(&conn, &game, config.as_deref(), show),
        Command::Benchmark { game, benchmark } => cmd_benchmark(&game, benchmark.as_deref()),
        Command::Config { output } => {
            save_config(&EngineConfig::default(), &output)?;
            println!("Configuration par défaut écrite dans {}", output.display());
            Ok(())
        }
    }
}

fn engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(EngineConfig::default()),
    }
}

fn benchmark_store(game: &str, path: Option<&Path>) -> BenchmarkStore {
    match path {
        Some(path) => BenchmarkStore::new(path),
        None => {
            let db = db_path();
            let dir = db.parent().unwrap_or_else(|| Path::new("."));
            BenchmarkStore::for_game(dir, game)
        }
    }
}

fn load_history(conn: &Connection, game: &str) -> Result<Vec<HistoricalRecord>> {
    let loaded = fetch_history(conn, game)?;
    if !loaded.rejected.is_empty() {
        println!("{} ligne(s) invalide(s) ignorée(s) pour {}", loaded.rejected.len(), game);
    }
    if loaded.records.is_empty() {
        bail!("Aucun tirage pour le jeu {}. Lancez d'abord : nearlog import", game);
    }
    require_history(loaded.records.len())?;
    Ok(loaded.records)
}

fn cmd_import(conn: &Connection, file: &Path) -> Result<()> {
    let result = import::import_csv(conn, file)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_games(conn: &Connection) -> Result<()> {
    let games = list_games(conn)?;
    display_games(&games);
    Ok(())
}

fn cmd_list(conn: &Connection, game: &str, last: u32) -> Result<()> {
    let n = count_records(conn, game)?;
    if n == 0 {
        println!("Aucun tirage pour {}. Lancez d'abord : nearlog import", game);
        return Ok(());
    }
    let records = fetch_last_records(conn, game, last)?;
    display_records(&records);
    Ok(())
}

fn cmd_backtest(
    conn: &Connection,
    game: &str,
    full: bool,
    benchmark: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config = engine_config(config)?;
    config.validate()?;
    let history = load_history(conn, game)?;
    let store = benchmark_store(game, benchmark);

    let ranking = run_backtest(&history, &config, &store, full)?;
    println!();
    display_benchmark(&ranking);
    Ok(())
}

fn run_backtest(
    history: &[HistoricalRecord],
    config: &EngineConfig,
    store: &BenchmarkStore,
    full: bool,
) -> Result<Benchmark> {
    let prior = if full { None } else { store.load() };
    let plan = backtest::plan(history.len(), config, prior.as_ref());
    let runner = BacktestRunner::from_config(config);
    let steps = BacktestRunner::steps(history.len(), plan.start_index);

    println!(
        "Backtest sur {} tirages ({} prédictions, cible {} candidats, mode {})...",
        history.len(),
        steps,
        config.backtest_target_count,
        config.expansion_mode
    );

    let pb = ProgressBar::new(steps as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .context("Modèle de barre de progression invalide")?
        .progress_chars("=> "));

    let summary = runner.run_seeded(
        history,
        plan.start_index,
        config.backtest_target_count,
        plan.seed,
        || pb.inc(1),
    );
    pb.finish_and_clear();

    display_backtest_summary(&summary, plan.incremental);

    let ranking = summary.benchmark(config.benchmark_top_k);
    store.persist(&ranking)?;
    println!("Benchmark enregistré dans {}", store.path().display());
    Ok(ranking)
}

fn cmd_generate(
    conn: &Connection,
    game: &str,
    config: &EngineConfig,
    benchmark: Option<&Path>,
    show: usize,
    raw: bool,
    lines: bool,
) -> Result<()> {
    let history = load_history(conn, game)?;
    let store = benchmark_store(game, benchmark);
    let ranking = match store.load() {
        Some(ranking) => ranking,
        None => {
            println!("Aucun benchmark pour {} : candidats non priorisés. Lancez : nearlog backtest", game);
            Benchmark::default()
        }
    };

    let output = generate_next(&history, config, &ranking, None)?;
    if lines {
        print_candidate_lines(&output, raw);
    } else {
        display_candidates(&output, show, raw);
    }
    Ok(())
}

fn cmd_run(conn: &Connection, game: &str, config: Option<&Path>, show: usize) -> Result<()> {
    let config = engine_config(config)?;
    config.validate()?;
    let history = load_history(conn, game)?;
    let store = benchmark_store(game, None);

    println!("Exécution du {} pour {}", chrono::Local::now().format("%d/%m/%Y %H:%M"), game);

    let ranking = run_backtest(&history, &config, &store, false)?;
    println!();
    display_benchmark(&ranking);

    let output = generate_next(&history, &config, &ranking, None)?;
    display_candidates(&output, show, false);
    Ok(())
}

fn cmd_benchmark(game: &str, benchmark: Option<&Path>) -> Result<()> {
    let store = benchmark_store(game, benchmark);
    match store.load() {
        Some(ranking) => {
            println!("Benchmark {} ({})\n", game, store.path().display());
            display_benchmark(&ranking);
        }
        None => println!("Aucun benchmark lisible dans {}", store.path().display()),
    }
    Ok(())
}

fn cmd_add(conn: &Connection, game: &str) -> Result<()> {
    println!("Ajout d'un tirage pour {}\n", game);

    let period = prompt_period()?;
    let code = prompt_code()?;
    let record = HistoricalRecord::new(period, code);

    println!("\nTirage à insérer :");
    display_records(&[record]);

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() == "o" {
        let inserted = insert_record(conn, game, &record)?;
        if inserted {
            println!("Tirage inséré avec succès.");
        } else {
            println!("Cette période existe déjà (doublon ignoré).");
        }
    } else {
        println!("Insertion annulée.");
    }

    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn prompt_period() -> Result<i64> {
    loop {
        let input = prompt("Période (entier, ex: 20240115) : ")?;
        match input.parse::<i64>() {
            Ok(period) => return Ok(period),
            Err(_) => println!("Période invalide. Réessayez."),
        }
    }
}

fn prompt_code() -> Result<Code> {
    loop {
        let input = prompt("Code (1 à 4 chiffres) : ")?;
        match Code::normalize(&input) {
            Ok(code) => return Ok(code),
            Err(e) => println!("{}. Réessayez.", e),
        }
    }
}
