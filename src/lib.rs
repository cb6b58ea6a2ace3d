pub mod addressing;
pub mod db;
pub mod engine;
pub mod mode_switch;
pub mod persistence;
pub mod position;
pub mod renderer;
pub mod restoration;
pub mod settings;
mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};

pub use db::{Database, MemoryStore, PersistedPosition, PositionStore};
pub use engine::{EngineConfig, MountParams, ReaderEngine};
pub use mode_switch::{BookContext, HandOff, ModeSwitchCoordinator, RendererHost, SwitchPhase};
pub use persistence::{FlushOutcome, PersistenceScheduler};
pub use position::{BookStats, ReadingPosition};
pub use renderer::{Layout, ReadingMode, Renderer, SharedRenderer, WritingDirection};
pub use restoration::RestoreState;
pub use settings::SettingsStore;

/// Installs the `env_logger` backend. Honours `RUST_LOG`, defaults to info.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Process-wide handles: the position database and reader settings.
pub struct Library {
    data_dir: PathBuf,
    db: Database,
    settings: Arc<SettingsStore>,
}

impl Library {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("shiori.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        log::info!("library opened at {}", data_dir.display());

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            db,
            settings: Arc::new(settings),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    /// Opens `book_id` in the layout stored in settings.
    pub async fn open_book(
        &self,
        book_id: &str,
        stats: Option<BookStats>,
        chapters_loaded: usize,
        host: Arc<dyn RendererHost>,
    ) -> ModeSwitchCoordinator {
        let context = BookContext {
            book_id: book_id.to_string(),
            stats,
            chapters_loaded,
            store: Arc::new(self.db.clone()),
            config: self.settings.engine_config(),
        };
        ModeSwitchCoordinator::open(context, host, self.settings.layout()).await
    }

    /// Drops the saved position when a book leaves the library.
    pub async fn forget_book(&self, book_id: &str) -> Result<()> {
        self.db.delete_position(book_id).await
    }
}
