//! Board registry and scraper factory.

use crate::boards::builtin_boards;
use crate::contract::JobBoard;
use crate::definition::{ConfigOverrides, Priority, ScrapeConfiguration};
use crate::error::{Result, ScrapeError};
use crate::scraper::{BoardScraper, SessionSlot};
use jobscout_browser::{BrowserDriver, SessionIdentity, SessionOptions};
use jobscout_core::{AppConfig, BoardId, BrowserConfig};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, info, warn};

struct BoardEntry {
    board: Arc<dyn JobBoard>,
    defaults: ScrapeConfiguration,
    issued: u64,
    slots: Vec<Weak<SessionSlot>>,
}

impl BoardEntry {
    fn live_slots(&self) -> impl Iterator<Item = Arc<SessionSlot>> + '_ {
        self.slots
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| slot.is_live())
    }
}

/// Per-board counters reported by [`ScraperFactory::get_scraper_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    /// Display name
    pub name: String,
    /// Whether the default policy enables the board
    pub enabled: bool,
    /// Default scheduling priority
    pub priority: Priority,
    /// Scrapers issued since construction
    pub issued: u64,
    /// Browser sessions currently open
    pub live_sessions: usize,
}

/// Maps board ids to boards and their default policy, and builds
/// [`BoardScraper`]s bound to a shared browser driver.
///
/// Every scraper it issues is tracked so [`Self::cleanup_all`] can close
/// sessions left open.
pub struct ScraperFactory {
    boards: RwLock<HashMap<BoardId, BoardEntry>>,
    driver: Arc<dyn BrowserDriver>,
    browser: BrowserConfig,
    default_session: SessionIdentity,
    scraper_version: String,
    /// Layer applied under `[boards.<id>]`: app-wide browser timeouts
    base_overrides: ConfigOverrides,
    board_overrides: BTreeMap<String, ConfigOverrides>,
}

impl ScraperFactory {
    /// Build a factory with the built-in boards and the `[boards.<id>]`
    /// overrides from `config`.
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &AppConfig) -> Result<Self> {
        let board_overrides = config
            .boards
            .iter()
            .map(|(id, table)| {
                ConfigOverrides::from_table(table)
                    .map(|overrides| (id.clone(), overrides))
                    .map_err(|e| ScrapeError::Configuration(format!("[boards.{id}]: {e}")))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let base_overrides = ConfigOverrides {
            navigation_timeout_ms: Some(config.browser.navigation_timeout_secs * 1000),
            element_timeout_ms: Some(config.browser.element_timeout_secs * 1000),
            ..ConfigOverrides::default()
        };

        let factory = Self {
            boards: RwLock::new(HashMap::new()),
            driver,
            browser: config.browser.clone(),
            default_session: SessionIdentity::default(),
            scraper_version: config.scraping.scraper_version.clone(),
            base_overrides,
            board_overrides,
        };

        for board in builtin_boards()? {
            factory.register(board)?;
        }

        {
            let boards = factory.boards.read().expect("acquire read lock on boards");
            for id in factory.board_overrides.keys() {
                if !boards.keys().any(|known| known.as_str() == id) {
                    warn!(board_id = %id, "overrides configured for a board that is not registered");
                }
            }
        }

        info!(
            boards = factory.board_count(),
            driver = factory.driver.name(),
            "scraper factory ready"
        );
        Ok(factory)
    }

    /// Register `board`, replacing any board with the same id.
    ///
    /// Its default policy is the board's own defaults with the app-wide
    /// timeouts and any `[boards.<id>]` table applied on top.
    pub fn register(&self, board: Arc<dyn JobBoard>) -> Result<()> {
        let id = board.board_id().clone();
        let overrides = match self.board_overrides.get(id.as_str()) {
            Some(table) => self.base_overrides.layered_under(table),
            None => self.base_overrides.clone(),
        };
        let defaults = board.default_config().with_overrides(&overrides)?;

        let mut boards = self.boards.write().expect("acquire write lock on boards");
        if boards.contains_key(&id) {
            info!(board_id = %id, "replacing registered board");
        }
        debug!(board_id = %id, enabled = defaults.enabled, "registered board");
        boards.insert(
            id,
            BoardEntry {
                board,
                defaults,
                issued: 0,
                slots: Vec::new(),
            },
        );
        Ok(())
    }

    /// Board registered under `board_id`.
    pub fn board(&self, board_id: &BoardId) -> Result<Arc<dyn JobBoard>> {
        let boards = self.boards.read().expect("acquire read lock on boards");
        boards
            .get(board_id)
            .map(|entry| Arc::clone(&entry.board))
            .ok_or_else(|| ScrapeError::UnknownBoard(board_id.to_string()))
    }

    /// Defaults for `board_id` with `overrides` applied and validated.
    pub fn resolve_config(
        &self,
        board_id: &BoardId,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ScrapeConfiguration> {
        let defaults = self.get_default_config(board_id)?;
        match overrides {
            Some(overrides) => defaults.with_overrides(overrides),
            None => Ok(defaults),
        }
    }

    /// Build a scraper for `board_id`, merging `overrides` onto the
    /// registered defaults. Without `session`, the identity is randomised
    /// when `rotate_user_agent` is set and the default session otherwise.
    pub fn create_scraper(
        &self,
        board_id: &BoardId,
        overrides: Option<&ConfigOverrides>,
        session: Option<SessionIdentity>,
    ) -> Result<BoardScraper> {
        let config = self.resolve_config(board_id, overrides)?;
        self.build_scraper(board_id, config, session)
    }

    /// Build a scraper with an already resolved policy.
    pub fn build_scraper(
        &self,
        board_id: &BoardId,
        config: ScrapeConfiguration,
        session: Option<SessionIdentity>,
    ) -> Result<BoardScraper> {
        if !config.enabled {
            return Err(ScrapeError::Configuration(format!(
                "board {board_id} is disabled"
            )));
        }

        let identity = session.unwrap_or_else(|| {
            if config.rotate_user_agent {
                SessionIdentity::randomized()
            } else {
                self.default_session.clone()
            }
        });

        let mut options = SessionOptions::from_config(&self.browser);
        if config.use_proxy {
            options.proxy = self.browser.proxies.choose(&mut rand::thread_rng()).cloned();
            if options.proxy.is_none() {
                warn!(board_id = %board_id, "use_proxy is set but no proxies are configured");
            }
        }

        let mut boards = self.boards.write().expect("acquire write lock on boards");
        let entry = boards
            .get_mut(board_id)
            .ok_or_else(|| ScrapeError::UnknownBoard(board_id.to_string()))?;

        let scraper = BoardScraper::new(
            Arc::clone(&entry.board),
            config,
            identity,
            options,
            Arc::clone(&self.driver),
            self.scraper_version.clone(),
        );
        entry.issued += 1;
        entry.slots.retain(|slot| slot.strong_count() > 0);
        entry.slots.push(Arc::downgrade(scraper.slot()));

        debug!(board_id = %board_id, issued = entry.issued, "issued scraper");
        Ok(scraper)
    }

    /// Whether `board_id` is registered and enabled.
    #[must_use]
    pub fn is_scraper_available(&self, board_id: &BoardId) -> bool {
        let boards = self.boards.read().expect("acquire read lock on boards");
        boards
            .get(board_id)
            .is_some_and(|entry| entry.defaults.enabled)
    }

    /// Registered default policy for `board_id`.
    pub fn get_default_config(&self, board_id: &BoardId) -> Result<ScrapeConfiguration> {
        let boards = self.boards.read().expect("acquire read lock on boards");
        boards
            .get(board_id)
            .map(|entry| entry.defaults.clone())
            .ok_or_else(|| ScrapeError::UnknownBoard(board_id.to_string()))
    }

    /// Identity used when identities are not rotated.
    #[must_use]
    pub fn get_default_session(&self) -> SessionIdentity {
        self.default_session.clone()
    }

    /// Replace the identity used when identities are not rotated.
    pub fn set_default_session(&mut self, session: SessionIdentity) {
        self.default_session = session;
    }

    /// Per-board counters, keyed by board id.
    #[must_use]
    pub fn get_scraper_stats(&self) -> BTreeMap<String, BoardStats> {
        let boards = self.boards.read().expect("acquire read lock on boards");
        boards
            .iter()
            .map(|(id, entry)| {
                (
                    id.to_string(),
                    BoardStats {
                        name: entry.board.display_name().to_string(),
                        enabled: entry.defaults.enabled,
                        priority: entry.defaults.priority,
                        issued: entry.issued,
                        live_sessions: entry.live_slots().count(),
                    },
                )
            })
            .collect()
    }

    /// Enabled boards, sorted by id.
    #[must_use]
    pub fn get_available_scrapers(&self) -> Vec<BoardId> {
        let boards = self.boards.read().expect("acquire read lock on boards");
        let mut available: Vec<BoardId> = boards
            .iter()
            .filter(|(_, entry)| entry.defaults.enabled)
            .map(|(id, _)| id.clone())
            .collect();
        available.sort();
        available
    }

    /// Number of registered boards.
    #[must_use]
    pub fn board_count(&self) -> usize {
        self.boards
            .read()
            .expect("acquire read lock on boards")
            .len()
    }

    /// Close every browser session still open on a scraper this factory
    /// issued. Returns how many sessions were closed.
    pub async fn cleanup_all(&self) -> usize {
        let slots: Vec<(BoardId, Arc<SessionSlot>)> = {
            let mut boards = self.boards.write().expect("acquire write lock on boards");
            boards
                .iter_mut()
                .flat_map(|(id, entry)| {
                    entry.slots.retain(|slot| slot.strong_count() > 0);
                    entry
                        .live_slots()
                        .map(|slot| (id.clone(), slot))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        let mut closed = 0;
        for (board_id, slot) in slots {
            if let Some(report) = slot.release().await {
                closed += 1;
                for step in &report.failed_steps {
                    warn!(board_id = %board_id, step = %step, "teardown step failed during cleanup");
                }
            }
        }
        info!(closed, "closed live browser sessions");
        closed
    }
}

impl std::fmt::Debug for ScraperFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperFactory")
            .field("boards", &self.board_count())
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}
