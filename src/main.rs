use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use image::ImageReader;
use image_hasher::{HashAlg, HasherConfig};
use indicatif::{ProgressBar, ProgressStyle};
use lostfound_match::history::{SearchHistory, SearchRecord};
use lostfound_match::{
    CatalogItem, CatalogSource, EngineConfig, ImageSource, JsonCatalog, MatchEngine, ScoredItem,
    SqliteCatalog,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "lfmatch", version, about = "Match photos against a lost-and-found catalog")]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine config file (default: <config_dir>/lostfound/config.json)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// History file (default: <data_dir>/lostfound/history.jsonl)
    #[arg(long, value_name = "FILE", global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the features extracted from an image
    Features {
        /// Image path or URL
        image: String,
    },

    /// Find the catalog items most similar to an image
    Match {
        /// Image path or URL
        image: String,
        /// Catalog file (.json, or .db/.sqlite for SQLite)
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        /// Number of matches to show
        #[arg(long)]
        top: Option<usize>,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
        /// Do not record this search in history
        #[arg(long)]
        no_history: bool,
    },

    /// Match every image in a directory
    Batch {
        /// Directory to scan
        #[arg(value_name = "DIR")]
        path: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        #[arg(long)]
        top: Option<usize>,
    },

    /// Precompute visual features for catalog items from their photos
    Index {
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        /// Write the indexed catalog here instead of updating in place
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Copy a JSON catalog into a SQLite database
    Import {
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
    },

    /// Work with search history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List recorded searches
    List,

    /// Delete all recorded searches
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = EngineConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load engine config")?;

    match cli.command {
        Commands::Features { image } => {
            let engine = MatchEngine::new(config).context("Invalid engine config")?;
            let features = engine
                .extract_features(&ImageSource::parse(&image))
                .with_context(|| format!("Failed to analyze {}", image))?;
            println!("{}", serde_json::to_string_pretty(&features)?);
        }

        Commands::Match {
            image,
            catalog,
            top,
            json,
            no_history,
        } => {
            if let Some(top) = top {
                config.top_k = top.max(1);
            }
            let engine = MatchEngine::new(config).context("Invalid engine config")?;
            let source = open_catalog(&catalog);

            println!("▶ Matching {} against {}", image, source.describe());
            let outcome = timed("search", || {
                engine.search(&ImageSource::parse(&image), source.as_ref())
            })
            .with_context(|| format!("Search for {} failed", image))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("   🎨 Labels: {}", outcome.features.labels.join(", "));
                print_matches(&outcome.matches);
            }

            if !no_history {
                let history = open_history(cli.history)?;
                history.append(&SearchRecord::from_outcome(&image, &outcome))?;
            }
        }

        Commands::Batch { path, catalog, top } => {
            if let Some(top) = top {
                config.top_k = top.max(1);
            }
            let engine = MatchEngine::new(config).context("Invalid engine config")?;
            let source = open_catalog(&catalog);
            let items = source
                .fetch_all_items()
                .with_context(|| format!("Failed to read catalog {}", source.describe()))?;

            println!("▶ Scanning for images in: {}", path.display());
            let images = unique_images(&path)?;
            if images.is_empty() {
                println!("No images found.");
                return Ok(());
            }

            let bar = progress_bar(images.len() as u64)?;
            let results: Vec<(PathBuf, Result<Vec<ScoredItem>>)> =
                timed("matching all images", || {
                    images
                        .par_iter()
                        .map(|image| {
                            let result = engine
                                .extract_features(&ImageSource::Path(image.clone()))
                                .map(|features| engine.rank_similar_items(&features, &items))
                                .map_err(anyhow::Error::from);
                            bar.inc(1);
                            (image.clone(), result)
                        })
                        .collect()
                });
            bar.finish_and_clear();

            for (image, result) in results {
                println!("\n✨ {}", image.display());
                match result {
                    Ok(matches) => print_matches(&matches),
                    Err(err) => eprintln!("   ⚠️  {}", err),
                }
            }
        }

        Commands::Index { catalog, output } => {
            let engine = MatchEngine::new(config).context("Invalid engine config")?;
            let source = open_catalog(&catalog);
            let items = source
                .fetch_all_items()
                .with_context(|| format!("Failed to read catalog {}", source.describe()))?;
            let base_dir = catalog
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            println!("▶ Indexing {} items from {}", items.len(), source.describe());
            let bar = progress_bar(items.len() as u64)?;
            let indexed: Vec<(CatalogItem, bool)> = timed("indexing item photos", || {
                items
                    .into_par_iter()
                    .map(|mut item| {
                        let updated = index_item(&engine, &mut item, &base_dir);
                        bar.inc(1);
                        (item, updated)
                    })
                    .collect()
            });
            bar.finish_and_clear();

            let updated = indexed.iter().filter(|(_, ok)| *ok).count();
            let items: Vec<CatalogItem> = indexed.into_iter().map(|(item, _)| item).collect();
            let target = output.unwrap_or(catalog);
            save_catalog(&target, &items)?;

            println!(
                "✅ Indexed {} of {} items into {}",
                updated,
                items.len(),
                target.display()
            );
        }

        Commands::Import { catalog, db } => {
            let items = JsonCatalog::new(&catalog)
                .fetch_all_items()
                .with_context(|| format!("Failed to read catalog {:?}", catalog))?;
            let stored = SqliteCatalog::create(&db)?.upsert_items(&items)?;
            println!("✅ Imported {} items into {}", stored, db.display());
        }

        Commands::History { command } => {
            let history = open_history(cli.history)?;
            match command {
                HistoryCmd::List => {
                    let records = history.records()?;
                    if records.is_empty() {
                        println!("No searches recorded.");
                        return Ok(());
                    }
                    println!("🗂️  Search History:");
                    for (i, rec) in records.iter().enumerate() {
                        println!("[{}] {}\n     source: {}", i, rec.timestamp, rec.source);
                        for m in &rec.matches {
                            println!("     {:.2}  {} ({})", m.score, m.title, m.id);
                        }
                    }
                }

                HistoryCmd::Clear { yes } => {
                    let confirmed = yes
                        || Confirm::new()
                            .with_prompt(format!(
                                "Delete all records in {}?",
                                history.path().display()
                            ))
                            .default(false)
                            .interact()?;
                    if !confirmed {
                        println!("Nothing deleted.");
                        return Ok(());
                    }
                    let removed = history.clear()?;
                    println!("🧹 Removed {} record(s)", removed);
                }
            }
        }
    }

    Ok(())
}

fn open_catalog(path: &Path) -> Box<dyn CatalogSource> {
    if is_sqlite(path) {
        Box::new(SqliteCatalog::open(path))
    } else {
        Box::new(JsonCatalog::new(path))
    }
}

fn save_catalog(path: &Path, items: &[CatalogItem]) -> Result<()> {
    if is_sqlite(path) {
        SqliteCatalog::create(path)?.upsert_items(items)?;
    } else {
        JsonCatalog::new(path).save(items)?;
    }
    Ok(())
}

fn is_sqlite(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .as_deref(),
        Some("db" | "sqlite" | "sqlite3")
    )
}

fn open_history(explicit: Option<PathBuf>) -> Result<SearchHistory> {
    let path = explicit
        .or_else(SearchHistory::default_path)
        .context("Could not determine a history location; pass --history")?;
    Ok(SearchHistory::new(path))
}

/// Fill in `item.visual` from the item's photo. Items without a usable
/// photo are left as they are.
fn index_item(engine: &MatchEngine, item: &mut CatalogItem, base_dir: &Path) -> bool {
    if item.image.is_empty() {
        log::info!("Item {} has no photo, skipping", item.id);
        return false;
    }
    let source = ImageSource::parse_relative(&item.image, base_dir);
    match engine.extract_features(&source) {
        Ok(features) => {
            item.visual = Some(features);
            true
        }
        Err(err) => {
            log::warn!("Could not index item {} ({}): {}", item.id, source, err);
            false
        }
    }
}

fn print_matches(matches: &[ScoredItem]) {
    if matches.is_empty() {
        println!("   No matching items.");
        return;
    }
    for (rank, m) in matches.iter().enumerate() {
        println!(
            "   {}. {:.2}  {} [{}] ({})",
            rank + 1,
            m.score,
            m.item.title,
            m.item.category,
            m.item.id
        );
    }
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{bar:30}] {pos}/{len} {msg}",
    )?);
    Ok(bar)
}

const PHOTO_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Photo files below `dir`, sorted by path. Unreadable entries are skipped.
fn collect_photos(dir: &Path) -> Result<Vec<PathBuf>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut photos = Vec::new();
    for entry in WalkDir::new(dir).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_photo(entry.path()) {
            photos.push(entry.into_path());
            spinner.set_message(format!("Found {} photos", photos.len()));
        }
    }
    spinner.finish_and_clear();
    println!("   📷 {} photos under {}", photos.len(), dir.display());

    photos.sort();
    Ok(photos)
}

/// Images under `dir` with visual duplicates (same mean hash) collapsed to
/// their first path. Undecodable files are kept so the search reports them.
fn unique_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let images = collect_photos(dir)?;
    let hasher = HasherConfig::new().hash_alg(HashAlg::Mean).to_hasher();

    let keyed: Vec<(Option<String>, PathBuf)> = timed("hashing all images", || {
        images
            .par_iter()
            .map(|path| {
                let key = ImageReader::open(path)
                    .ok()
                    .and_then(|reader| reader.with_guessed_format().ok())
                    .and_then(|reader| reader.decode().ok())
                    .map(|img| hasher.hash_image(&img).to_base64());
                (key, path.clone())
            })
            .collect()
    });

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::new();
    for (key, path) in keyed {
        match key {
            Some(key) => {
                if let Some(first) = seen.get(&key) {
                    println!("   ⏭  {} duplicates {}", path.display(), first.display());
                    continue;
                }
                seen.insert(key, path.clone());
                unique.push(path);
            }
            None => unique.push(path),
        }
    }
    Ok(unique)
}

/// Time one stage of a command. The duration is printed and logged.
fn timed<T>(stage: &str, work: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let output = work();
    let elapsed = started.elapsed();
    log::info!("{} finished in {:?}", stage, elapsed);
    println!("⏱ {}: {:.2?}", stage, elapsed);
    output
}
