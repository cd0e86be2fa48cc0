mod aligner;
mod config;
mod deck;
mod document;
mod gate;
mod models;
mod pool;
mod recalc;
mod review;
mod scheduler;
mod tui;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use deck::{DeckError, DeckStore, Stats};
use models::{Card, CardStatus, JsonOutput, Paragraph, Rating};
use pool::Scope;

#[derive(Parser)]
#[command(name = "paragate")]
#[command(about = "Progressively unlock document paragraphs as you retain their flashcards")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Manage cards
    #[command(subcommand)]
    Card(CardCommands),

    /// Rate a card: again, hard, good or easy
    Rate {
        /// Card ID
        id: String,

        /// Rating: again/hard/good/easy (or 1-4)
        rating: String,
    },

    /// Show the review queue
    Pool {
        /// Scope: chapter, subject or review
        #[arg(long, short, default_value = "review")]
        scope: String,

        /// Active chapter (required for chapter and subject scopes)
        #[arg(long, short)]
        chapter: Option<String>,
    },

    /// Show which paragraphs of a chapter are unlocked
    Gate {
        /// Chapter path relative to the vault
        chapter: String,
    },

    /// Find the paragraph a quoted tag came from
    Align {
        /// Chapter path relative to the vault
        chapter: String,

        /// Quoted text or image tag
        tag: String,
    },

    /// Wrap a chapter's paragraphs in numbered spans
    Finalize {
        /// Chapter path relative to the vault
        chapter: String,
    },

    /// Re-align card paragraphs after documents change
    Recalc {
        /// Only this chapter (default: every chapter in the vault)
        #[arg(long, short)]
        chapter: Option<String>,
    },

    /// Show card statistics
    Stats {
        /// Only this chapter
        #[arg(long, short)]
        chapter: Option<String>,
    },

    /// Launch interactive terminal UI
    Tui {
        /// Scope: chapter, subject or review
        #[arg(long, short, default_value = "chapter")]
        scope: String,

        /// Active chapter
        #[arg(long, short)]
        chapter: Option<String>,
    },
}

#[derive(Subcommand)]
enum CardCommands {
    /// List the cards of a chapter
    List {
        /// Chapter path relative to the vault
        chapter: String,

        /// Only cards in this state: new, learning, review or relearn
        #[arg(long)]
        status: Option<String>,
    },

    /// Add a card anchored to the paragraph its tag quotes
    Add {
        /// Chapter path relative to the vault
        chapter: String,

        /// Question side
        #[arg(long, short)]
        front: String,

        /// Answer side
        #[arg(long, short)]
        back: String,

        /// Verbatim quote from the chapter
        #[arg(long, short, required_unless_present = "image", conflicts_with = "image")]
        tag: Option<String>,

        /// Hash of an image in the chapter, instead of a quote
        #[arg(long)]
        image: Option<String>,
    },

    /// Show card details
    Show {
        /// Card ID
        id: String,
    },

    /// Delete a card
    Delete {
        /// Card ID
        id: String,
    },

    /// Replace a card's tag and re-align it
    Tag {
        /// Card ID
        id: String,

        /// New quoted text
        tag: String,
    },

    /// Anchor a card to a paragraph by hand (0 clears it)
    Para {
        /// Card ID
        id: String,

        /// Paragraph number
        para: u32,
    },

    /// Suspend or unsuspend a card
    Suspend {
        /// Card ID
        id: String,
    },

    /// Flag or unflag a card
    Flag {
        /// Card ID
        id: String,
    },

    /// Push a card back without rating it
    Bury {
        /// Card ID
        id: String,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paragate=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Init = cli.command {
        let path = config::config_path();
        if !path.exists() {
            Config::default().save_to(&path)?;
        }
        if cli.json {
            println!(
                "{}",
                serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                    "config": path.display().to_string()
                })))?
            );
        } else {
            println!("Config at: {}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let store = DeckStore::new(config.vault_root());
    let now = Utc::now();

    match cli.command {
        Commands::Init => {}

        Commands::Card(card_cmd) => match card_cmd {
            CardCommands::List { chapter, status } => {
                let status = match status {
                    Some(s) => Some(CardStatus::from_str(&s).ok_or_else(|| {
                        format!("Invalid status '{}'. Use: new, learning, review, or relearn", s)
                    })?),
                    None => None,
                };
                let deck = store.load_or_empty(&store.deck_path(&chapter));
                let mut cards: Vec<&Card> = deck
                    .in_chapter(&chapter)
                    .filter(|c| status.map_or(true, |s| c.status == s))
                    .collect();
                cards.sort_by_key(|c| (c.para_idx.is_none(), c.para_idx, c.created_at));

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&cards))?);
                } else if cards.is_empty() {
                    println!("No cards in {}.", chapter);
                } else {
                    println!("{:<38} {:<5} {:<9} {:<7} FRONT", "ID", "PARA", "STATUS", "GATE");
                    println!("{}", "-".repeat(90));
                    for card in cards {
                        println!(
                            "{:<38} {:<5} {:<9} {:<7} {}",
                            card.id,
                            card.para_idx.map_or("-".to_string(), |p| p.to_string()),
                            card.status.as_str(),
                            card_marker(card),
                            truncate(&card.front, 30)
                        );
                    }
                }
            }

            CardCommands::Add {
                chapter,
                front,
                back,
                tag,
                image,
            } => {
                let tag = tag
                    .or_else(|| image.map(|hash| aligner::image_tag(&hash)))
                    .ok_or("Provide --tag or --image")?;
                let paragraphs = chapter_paragraphs(&store, &chapter)?;
                let images = aligner::load_image_index(&store.image_index_path(&chapter));
                let card = review::create_card(
                    &store,
                    &chapter,
                    &front,
                    &back,
                    &tag,
                    &paragraphs,
                    &images,
                    now,
                )?;

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                } else {
                    println!("Added card {}", card.id);
                    match card.para_idx {
                        Some(p) => println!("Anchored to paragraph {}.", p),
                        None => println!(
                            "Tag matched no paragraph. Assign one with:\n  paragate card para {} <n>",
                            card.id
                        ),
                    }
                }
            }

            CardCommands::Show { id } => {
                let (_, card) = locate(&store, &id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                } else {
                    print_card(&card, now);
                }
            }

            CardCommands::Delete { id } => {
                let (path, _) = locate(&store, &id)?;
                review::delete_card(&store, &path, &id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("Card {} deleted.", id);
                }
            }

            CardCommands::Tag { id, tag } => {
                let (path, card) = locate(&store, &id)?;
                let paragraphs = chapter_paragraphs(&store, &card.chapter)?;
                let images = aligner::load_image_index(&store.image_index_path(&card.chapter));
                let card = review::retag_card(&store, &path, &id, &tag, &paragraphs, &images)?;
                print_anchor(cli.json, &card)?;
            }

            CardCommands::Para { id, para } => {
                let (path, _) = locate(&store, &id)?;
                let para_idx = if para == 0 { None } else { Some(para) };
                let card = review::assign_paragraph(&store, &path, &id, para_idx)?;
                print_anchor(cli.json, &card)?;
            }

            CardCommands::Suspend { id } => {
                let (path, _) = locate(&store, &id)?;
                let card = review::toggle_suspended(&store, &path, &id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                } else if card.suspended {
                    println!("Card {} suspended.", id);
                } else {
                    println!("Card {} unsuspended.", id);
                }
            }

            CardCommands::Flag { id } => {
                let (path, _) = locate(&store, &id)?;
                let card = review::toggle_flagged(&store, &path, &id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                } else if card.flagged {
                    println!("Card {} flagged.", id);
                } else {
                    println!("Card {} unflagged.", id);
                }
            }

            CardCommands::Bury { id } => {
                let (path, _) = locate(&store, &id)?;
                let card = review::bury_card(&store, &path, &id, &config.scheduler, now)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                } else {
                    println!("Card {} buried until {}.", id, format_time(&card.due));
                }
            }
        },

        Commands::Rate { id, rating } => {
            let rating = Rating::from_str(&rating).ok_or_else(|| {
                format!(
                    "Invalid rating '{}'. Use: again, hard, good, or easy",
                    rating
                )
            })?;
            let (path, _) = locate(&store, &id)?;
            let outcome = review::rate_card(&store, &path, &id, rating, &config.scheduler, now)?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "card": outcome.card,
                        "boundary_before": outcome.before,
                        "boundary_after": outcome.after,
                        "rerender": outcome.needs_rerender()
                    })))?
                );
            } else {
                println!("Rated {} as {}.", id, rating.label());
                println!(
                    "Status: {}  Next due: {}",
                    outcome.card.status.label(),
                    format_time(&outcome.card.due)
                );
                if outcome.needs_rerender() {
                    println!(
                        "Unlock boundary moved: {} -> {}",
                        outcome.before, outcome.after
                    );
                }
            }
        }

        Commands::Pool { scope, chapter } => {
            let scope = Scope::from_parts(&scope, chapter.as_deref())?;
            let decks = store.load_all();
            let entries = pool::build_pool(&scope, &decks, now, config.review.new_card_order);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&entries))?);
            } else if entries.is_empty() {
                println!("Nothing due in {}.", scope.label());
            } else {
                println!("=== Review queue: {} ===", scope.label());
                println!("{:<38} {:<24} {:<5} {:<9} FRONT", "ID", "CHAPTER", "PARA", "STATUS");
                println!("{}", "-".repeat(100));
                for entry in entries {
                    let card = &entry.card;
                    println!(
                        "{:<38} {:<24} {:<5} {:<9} {}",
                        card.id,
                        truncate(&card.chapter, 22),
                        card.para_idx.map_or("-".to_string(), |p| p.to_string()),
                        card.status.as_str(),
                        truncate(&card.front, 30)
                    );
                }
            }
        }

        Commands::Gate { chapter } => {
            let deck = store.load_or_empty(&store.deck_path(&chapter));
            let boundary = gate::chapter_boundary(&deck, &chapter);
            let paragraphs = chapter_paragraphs(&store, &chapter).unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Vec::new()
            });
            let obscured: Vec<u32> = paragraphs
                .iter()
                .map(|p| p.id)
                .filter(|id| boundary.obscures(*id))
                .collect();

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "chapter": chapter,
                        "boundary": boundary,
                        "paragraphs": paragraphs.len(),
                        "obscured": obscured
                    })))?
                );
            } else {
                println!("Chapter: {}", chapter);
                println!("Unlock boundary: {}", boundary);
                println!(
                    "Visible paragraphs: {}/{}",
                    paragraphs.len() - obscured.len(),
                    paragraphs.len()
                );
                for p in &paragraphs {
                    let marker = if boundary.obscures(p.id) { "░" } else { " " };
                    println!("{} {:>4}  {}", marker, p.id, truncate(&first_line(&p.markdown), 70));
                }
            }
        }

        Commands::Align { chapter, tag } => {
            let paragraphs = chapter_paragraphs(&store, &chapter)?;
            let images = aligner::load_image_index(&store.image_index_path(&chapter));
            let para_id = aligner::align(&tag, &paragraphs, &images);
            let best = aligner::best_match(&tag, &paragraphs);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "para_id": para_id,
                        "best": best
                    })))?
                );
            } else {
                match para_id {
                    Some(id) => println!("Matched paragraph {}.", id),
                    None => println!("No paragraph matched."),
                }
                if let Some(m) = best {
                    println!("Best score: {:.2} (paragraph {})", m.score, m.para_id);
                }
            }
        }

        Commands::Finalize { chapter } => {
            let path = document::document_path(store.root(), &chapter);
            if !path.exists() {
                return Err(DeckError::DocumentNotFound(chapter).into());
            }
            let content = std::fs::read_to_string(&path)?;
            let paragraphs = if document::is_finalized(&content) {
                document::extract_paragraphs(&content).len()
            } else {
                let finalized = document::finalize(&content);
                std::fs::write(&path, &finalized)?;
                document::extract_paragraphs(&finalized).len()
            };

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "chapter": chapter,
                        "paragraphs": paragraphs
                    })))?
                );
            } else {
                println!("{} has {} paragraphs.", chapter, paragraphs);
            }
        }

        Commands::Recalc { chapter } => {
            let chapters = match chapter {
                Some(ch) => vec![ch],
                None => store.chapters(),
            };
            let report = recalc::recalculate(&store, &chapters)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&report))?);
            } else {
                println!("=== Paragraph recalculation ===");
                println!("Chapters: {}", report.chapters);
                println!("Cards checked: {}", report.cards);
                println!("Cards moved: {}", report.updated);
                println!("Unmatched: {}", report.unmatched.len());
                for id in &report.unmatched {
                    println!("  {}", id);
                }
                if !report.failed.is_empty() {
                    println!("Failed chapters: {}", report.failed.join(", "));
                }
            }
        }

        Commands::Stats { chapter } => {
            let decks = store.load_all();
            let cards = decks
                .iter()
                .flat_map(|(_, deck)| deck.iter())
                .filter(|c| chapter.as_deref().map_or(true, |ch| c.chapter == ch));
            let stats = Stats::collect(cards, now);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Card Statistics ===");
                println!("Total cards: {}", stats.total_cards);
                println!(
                    "New: {}  Learning: {}  Review: {}  Relearn: {}",
                    stats.new, stats.learning, stats.review, stats.relearn
                );
                println!("Due now: {}", stats.due_now);
                println!("Blocking: {}", stats.blocked);
                println!("Suspended: {}", stats.suspended);
                println!("Flagged: {}", stats.flagged);
                println!("Unaligned: {}", stats.unaligned);
            }
        }

        Commands::Tui { scope, chapter } => {
            let scope = Scope::from_parts(&scope, chapter.as_deref())?;
            tui::run(store, config, scope, chapter)?;
        }
    }

    Ok(())
}

fn locate(store: &DeckStore, id: &str) -> Result<(PathBuf, Card), DeckError> {
    store
        .find_card(id)
        .ok_or_else(|| DeckError::CardNotFound(id.to_string()))
}

fn chapter_paragraphs(store: &DeckStore, chapter: &str) -> Result<Vec<Paragraph>, DeckError> {
    let path = document::document_path(store.root(), chapter);
    if !path.exists() {
        return Err(DeckError::DocumentNotFound(chapter.to_string()));
    }
    Ok(document::load_paragraphs(&path)?)
}

fn print_anchor(json: bool, card: &Card) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(&JsonOutput::ok(card))?);
    } else {
        match card.para_idx {
            Some(p) => println!("Card {} anchored to paragraph {}.", card.id, p),
            None => println!("Card {} is unaligned.", card.id),
        }
    }
    Ok(())
}

fn print_card(card: &Card, now: DateTime<Utc>) {
    println!("Card: {}", card.id);
    println!("Chapter: {}", card.chapter);
    println!(
        "Paragraph: {}",
        card.para_idx.map_or("unaligned".to_string(), |p| p.to_string())
    );
    println!("Front: {}", card.front);
    println!("Back: {}", card.back);
    println!("Tag: {}", card.tag);
    println!();
    println!("--- Schedule ---");
    println!("Status: {}", card.status.label());
    println!("Interval: {:.1} days", card.interval);
    println!("Ease: {:.2}", card.ease_factor);
    println!(
        "Due: {}{}",
        format_time(&card.due),
        if card.is_due(now) { " (due now)" } else { "" }
    );
    if let Some(last) = &card.last_reviewed {
        println!("Last reviewed: {}", format_time(last));
    }
    println!("Flags: {}", card_marker(card));
    if !card.review_history.is_empty() {
        println!();
        println!("--- History ---");
        for entry in &card.review_history {
            println!(
                "{}  {:<6} from {:<9} ivl {:.1}  ease {:.2}",
                format_time(&entry.timestamp),
                entry.rating.as_str(),
                entry.state.as_str(),
                entry.interval,
                entry.ease_factor
            );
        }
    }
}

fn card_marker(card: &Card) -> String {
    let mut marks = Vec::new();
    if card.blocked && !card.suspended {
        marks.push("gate");
    }
    if card.suspended {
        marks.push("susp");
    }
    if card.flagged {
        marks.push("flag");
    }
    if marks.is_empty() {
        "-".to_string()
    } else {
        marks.join(",")
    }
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
