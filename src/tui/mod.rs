mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::Config;
use crate::deck::{self, DeckStore};
use crate::document;
use crate::gate::{self, Boundary};
use crate::models::{Card, Paragraph, Rating};
use crate::pool::{self, PoolEntry, Scope};
use crate::review;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Review,
    Reader,
    Cards,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Review => View::Reader,
            View::Reader => View::Cards,
            View::Cards => View::Review,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Review => View::Cards,
            View::Reader => View::Review,
            View::Cards => View::Reader,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    /// Swap in fresh items, keeping the cursor position where possible.
    fn replace(&mut self, items: Vec<T>) {
        self.selected = match (self.selected, items.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.items = items;
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    store: DeckStore,
    config: Config,
    pub scope: Scope,
    pub chapter: Option<String>,
    pub view: View,
    pub pool: StatefulList<PoolEntry>,
    pub revealed: bool,
    pub loaded_chapter: Option<String>,
    pub paragraphs: Vec<Paragraph>,
    pub boundary: Boundary,
    pub reader_scroll: u16,
    pub cards: StatefulList<Card>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(store: DeckStore, config: Config, scope: Scope, chapter: Option<String>) -> Self {
        let mut app = Self {
            store,
            config,
            scope,
            chapter,
            view: View::Review,
            pool: StatefulList::with_items(Vec::new()),
            revealed: false,
            loaded_chapter: None,
            paragraphs: Vec::new(),
            boundary: Boundary::Unbounded,
            reader_scroll: 0,
            cards: StatefulList::with_items(Vec::new()),
            status: None,
            should_quit: false,
        };
        app.refresh_data();
        app
    }

    pub fn scheduler_config(&self) -> &crate::config::SchedulerConfig {
        &self.config.scheduler
    }

    /// Chapter shown by the reader: the active chapter, or the chapter of the
    /// card under the cursor when reviewing across chapters.
    fn reader_chapter(&self) -> Option<String> {
        self.chapter
            .clone()
            .or_else(|| self.pool.selected_item().map(|e| e.card.chapter.clone()))
    }

    pub fn refresh_data(&mut self) {
        self.reload_pool();
        self.reload_reader();
        self.reload_cards();
    }

    fn reload_pool(&mut self) {
        let decks = self.store.load_all();
        let entries =
            pool::build_pool(&self.scope, &decks, Utc::now(), self.config.review.new_card_order);
        self.pool.replace(entries);
    }

    fn reload_reader(&mut self) {
        let chapter = self.reader_chapter();
        match &chapter {
            Some(ch) => {
                let path = document::document_path(self.store.root(), ch);
                self.paragraphs = document::load_paragraphs(&path).unwrap_or_else(|e| {
                    tracing::warn!("Could not read {}: {}", path.display(), e);
                    Vec::new()
                });
                let deck = self.store.load_or_empty(&self.store.deck_path(ch));
                self.boundary = gate::chapter_boundary(&deck, ch);
            }
            None => {
                self.paragraphs.clear();
                self.boundary = Boundary::Unbounded;
            }
        }
        if chapter != self.loaded_chapter {
            self.reader_scroll = 0;
        }
        self.loaded_chapter = chapter;
    }

    fn reload_cards(&mut self) {
        let cards = match &self.loaded_chapter {
            Some(ch) => {
                let deck = self.store.load_or_empty(&self.store.deck_path(ch));
                let mut cards: Vec<Card> = deck.in_chapter(ch).cloned().collect();
                cards.sort_by_key(|c| (c.para_idx.is_none(), c.para_idx, c.created_at));
                cards
            }
            None => Vec::new(),
        };
        self.cards.replace(cards);
    }

    fn switch_view(&mut self, view: View) {
        if view != View::Review && self.reader_chapter() != self.loaded_chapter {
            self.reload_reader();
            self.reload_cards();
        }
        self.view = view;
    }

    fn rate_selected(&mut self, rating: Rating) -> deck::Result<()> {
        let Some(entry) = self.pool.selected_item() else {
            return Ok(());
        };
        if !self.revealed {
            self.status = Some("Press space to show the answer first".to_string());
            return Ok(());
        }
        let (deck_path, id) = (entry.deck.clone(), entry.card.id.clone());

        let outcome = review::rate_card(
            &self.store,
            &deck_path,
            &id,
            rating,
            &self.config.scheduler,
            Utc::now(),
        )?;

        self.status = Some(format!(
            "{} -> {}, due {}",
            rating.label(),
            outcome.card.status.label(),
            outcome.card.due.format("%b %d %H:%M")
        ));
        if outcome.needs_rerender()
            && self.loaded_chapter.as_deref() == Some(outcome.card.chapter.as_str())
        {
            self.reload_reader();
        }
        self.revealed = false;
        self.reload_pool();
        self.reload_cards();
        Ok(())
    }

    /// Card under the cursor in the current view, with its deck file.
    fn selected_card(&self) -> Option<(std::path::PathBuf, String)> {
        match self.view {
            View::Review => self
                .pool
                .selected_item()
                .map(|e| (e.deck.clone(), e.card.id.clone())),
            View::Cards => self
                .cards
                .selected_item()
                .map(|c| (self.store.deck_path(&c.chapter), c.id.clone())),
            View::Reader => None,
        }
    }

    fn bury_selected(&mut self) -> deck::Result<()> {
        if let Some((path, id)) = self.selected_card() {
            let card = review::bury_card(&self.store, &path, &id, &self.config.scheduler, Utc::now())?;
            self.status = Some(format!("Buried until {}", card.due.format("%b %d %H:%M")));
            self.revealed = false;
            self.reload_pool();
        }
        Ok(())
    }

    fn suspend_selected(&mut self) -> deck::Result<()> {
        if let Some((path, id)) = self.selected_card() {
            let card = review::toggle_suspended(&self.store, &path, &id)?;
            self.status = Some(if card.suspended { "Suspended" } else { "Unsuspended" }.to_string());
            self.revealed = false;
            // Suspension changes the boundary too.
            self.refresh_data();
        }
        Ok(())
    }

    fn flag_selected(&mut self) -> deck::Result<()> {
        if let Some((path, id)) = self.selected_card() {
            let card = review::toggle_flagged(&self.store, &path, &id)?;
            self.status = Some(if card.flagged { "Flagged" } else { "Unflagged" }.to_string());
            self.reload_pool();
            self.reload_cards();
        }
        Ok(())
    }

    fn report(&mut self, result: deck::Result<()>) {
        if let Err(e) = result {
            tracing::warn!("{}", e);
            self.status = Some(format!("Error: {}", e));
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data();
                self.status = Some("Refreshed".to_string());
            }

            KeyCode::Char('h') | KeyCode::Left => self.switch_view(self.view.prev()),
            KeyCode::Char('l') | KeyCode::Right => self.switch_view(self.view.next()),
            KeyCode::Tab => self.switch_view(self.view.next()),
            KeyCode::BackTab => self.switch_view(self.view.prev()),

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Review => {
                    self.pool.next();
                    self.revealed = false;
                }
                View::Reader => self.reader_scroll = self.reader_scroll.saturating_add(1),
                View::Cards => self.cards.next(),
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Review => {
                    self.pool.previous();
                    self.revealed = false;
                }
                View::Reader => self.reader_scroll = self.reader_scroll.saturating_sub(1),
                View::Cards => self.cards.previous(),
            },
            KeyCode::Char('g') => match self.view {
                View::Review => self.pool.first(),
                View::Reader => self.reader_scroll = 0,
                View::Cards => self.cards.first(),
            },
            KeyCode::Char('G') => match self.view {
                View::Review => self.pool.last(),
                View::Reader => {}
                View::Cards => self.cards.last(),
            },

            KeyCode::Char(' ') | KeyCode::Enter if self.view == View::Review => {
                if self.pool.selected_item().is_some() {
                    self.revealed = true;
                }
            }
            KeyCode::Char(c @ '1'..='4') if self.view == View::Review => {
                if let Some(rating) = Rating::from_str(&c.to_string()) {
                    let result = self.rate_selected(rating);
                    self.report(result);
                }
            }
            KeyCode::Char('b') if self.view == View::Review => {
                let result = self.bury_selected();
                self.report(result);
            }
            KeyCode::Char('s') => {
                let result = self.suspend_selected();
                self.report(result);
            }
            KeyCode::Char('f') => {
                let result = self.flag_selected();
                self.report(result);
            }

            _ => {}
        }
    }
}

pub fn run(
    store: DeckStore,
    config: Config,
    scope: Scope,
    chapter: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(store, config, scope, chapter);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
