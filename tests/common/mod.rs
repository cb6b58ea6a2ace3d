#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use shiori::{
    addressing::{point_at_offset, ChapterDocument, TextPoint},
    db::{MemoryStore, PersistedPosition, PositionStore},
    renderer::{Anchor, Layout, PageMetrics, ProbePoint, Renderer, SharedRenderer, Viewport},
    BookStats, ReadingPosition, RendererHost,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Anchor(usize, TextPoint),
    Boundary(usize),
}

/// Scriptable renderer. Tests move the "viewport" by setting the anchor and
/// progress directly.
pub struct FakeRenderer {
    pub layout: Layout,
    pub chapters: HashMap<usize, Arc<ChapterDocument>>,
    pub anchor: Option<Anchor>,
    pub progress: f64,
    pub pages: Option<PageMetrics>,
    pub accept_scrolls: bool,
    pub scrolls: Vec<Scroll>,
}

impl FakeRenderer {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            chapters: HashMap::new(),
            anchor: None,
            progress: 0.0,
            pages: None,
            accept_scrolls: true,
            scrolls: Vec::new(),
        }
    }

    pub fn with_chapter(mut self, index: usize, doc: ChapterDocument) -> Self {
        self.chapters.insert(index, Arc::new(doc));
        self
    }

    /// Puts the focal point at stream offset `offset` of `chapter`.
    pub fn look_at(&mut self, chapter: usize, offset: usize) {
        let doc = self.chapters.get(&chapter).expect("chapter not loaded");
        let point = point_at_offset(doc, offset).expect("offset out of range");
        self.anchor = Some(Anchor {
            chapter_index: chapter,
            point,
        });
    }
}

impl Renderer for FakeRenderer {
    fn layout(&self) -> Layout {
        self.layout
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: 600.0,
            height: 800.0,
        }
    }

    fn focal_anchor(&self, _probe: ProbePoint) -> Option<Anchor> {
        self.anchor
    }

    fn chapter_root(&self, chapter_index: usize) -> Option<Arc<ChapterDocument>> {
        self.chapters.get(&chapter_index).cloned()
    }

    fn chapter_progress_percent(&self) -> f64 {
        self.progress
    }

    fn page_metrics(&self) -> Option<PageMetrics> {
        self.pages
    }

    fn scroll_to_anchor(&mut self, chapter_index: usize, point: TextPoint) -> bool {
        if !self.accept_scrolls {
            return false;
        }
        self.scrolls.push(Scroll::Anchor(chapter_index, point));
        self.anchor = Some(Anchor {
            chapter_index,
            point,
        });
        true
    }

    fn scroll_to_chapter_boundary(&mut self, chapter_index: usize) {
        self.scrolls.push(Scroll::Boundary(chapter_index));
    }
}

/// Returns the concrete handle for test scripting and the trait-object handle
/// the engine takes.
pub fn share(renderer: FakeRenderer) -> (Arc<Mutex<FakeRenderer>>, SharedRenderer) {
    let concrete = Arc::new(Mutex::new(renderer));
    let shared: SharedRenderer = concrete.clone();
    (concrete, shared)
}

/// Memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    saves: StdMutex<Vec<PersistedPosition>>,
    failing: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> Vec<PersistedPosition> {
        self.saves.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub async fn seed(&self, book_id: &str, value: Value) {
        self.inner.insert_raw(book_id, value).await;
    }
}

#[async_trait]
impl PositionStore for RecordingStore {
    async fn load(&self, book_id: &str) -> Result<Option<Value>> {
        self.inner.load(book_id).await
    }

    async fn save(&self, book_id: &str, record: &PersistedPosition) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        self.inner.save(book_id, record).await?;
        self.saves.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn delete(&self, book_id: &str) -> Result<()> {
        self.inner.delete(book_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Placeholder,
    Unmount(u64),
    /// Remount key and the number of store writes seen at mount time.
    Mount(u64, usize),
}

/// Renderer host that builds a fresh [`FakeRenderer`] for every mount.
pub struct FakeHost {
    chapters: Vec<ChapterDocument>,
    store: Option<Arc<RecordingStore>>,
    pub events: StdMutex<Vec<HostEvent>>,
    pub mounted: StdMutex<Vec<Arc<Mutex<FakeRenderer>>>>,
}

impl FakeHost {
    pub fn new(chapters: Vec<ChapterDocument>, store: Option<Arc<RecordingStore>>) -> Arc<Self> {
        Arc::new(Self {
            chapters,
            store,
            events: StdMutex::new(Vec::new()),
            mounted: StdMutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn renderer(&self, nth: usize) -> Arc<Mutex<FakeRenderer>> {
        self.mounted.lock().unwrap()[nth].clone()
    }

    pub fn mount_count(&self) -> usize {
        self.mounted.lock().unwrap().len()
    }
}

impl RendererHost for FakeHost {
    fn show_placeholder(&self) {
        self.events.lock().unwrap().push(HostEvent::Placeholder);
    }

    fn unmount(&self, remount_key: u64) {
        self.events.lock().unwrap().push(HostEvent::Unmount(remount_key));
    }

    fn mount(
        &self,
        layout: Layout,
        remount_key: u64,
        _seed: Option<&ReadingPosition>,
    ) -> SharedRenderer {
        let writes = self.store.as_ref().map(|s| s.save_count()).unwrap_or(0);
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Mount(remount_key, writes));

        let mut renderer = FakeRenderer::new(layout);
        for (index, doc) in self.chapters.iter().enumerate() {
            renderer.chapters.insert(index, Arc::new(doc.clone()));
        }
        let (concrete, shared) = share(renderer);
        self.mounted.lock().unwrap().push(concrete);
        shared
    }
}

pub fn doc(xhtml: &str) -> ChapterDocument {
    ChapterDocument::from_xhtml(xhtml.as_bytes()).expect("test chapter parses")
}

/// A chapter of `sentences` numbered English sentences.
pub fn prose_chapter(chapter: usize, sentences: usize) -> ChapterDocument {
    let body: String = (0..sentences)
        .map(|i| format!("<p>Chapter {chapter} sentence {i} goes here.</p>"))
        .collect();
    doc(&body)
}

pub fn stats_for(chapters: &[ChapterDocument]) -> BookStats {
    BookStats::new(chapters.iter().map(shiori::addressing::chapter_len).collect())
}

pub fn position(chapter: usize, offset: usize, sentence: &str) -> ReadingPosition {
    ReadingPosition {
        chapter_index: chapter,
        page_index: None,
        chapter_char_offset: offset,
        total_chars_read: 0,
        sentence_text: sentence.to_string(),
        chapter_progress: 0.0,
        total_progress: 0.0,
        timestamp: 1_700_000_000_000,
    }
}
