//! Shared engine fixture: in-memory store, scripted renderer and manual clock.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use scribe_render::{RenderMessage, RenderOutput, RenderRequest, Renderer, RendererError};
use scribe_store::{Document, DocumentId, DocumentStore, MemoryStore};
use scribe_wiki::{ChannelQueue, Clock, ManualClock, NewDocument, TaskQueue, Wiki, WikiBuilder, Worker};

pub const EDITOR: &str = "editor";

pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Renderer returning its input, with knobs for latency, failures and messages.
pub struct ScriptedRenderer {
    clock: Arc<ManualClock>,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<TimeDelta>,
    messages: Mutex<Vec<RenderMessage>>,
    last_cache_control: Mutex<Option<String>>,
    during: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl ScriptedRenderer {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Mutex::new(TimeDelta::zero()),
            messages: Mutex::new(Vec::new()),
            last_cache_control: Mutex::new(None),
            during: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Advance the clock by `delay` on every call.
    pub fn take(&self, delay: TimeDelta) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn report(&self, messages: Vec<RenderMessage>) {
        *self.messages.lock().unwrap() = messages;
    }

    /// Run `action` while a render is in flight.
    pub fn during(&self, action: impl Fn() + Send + Sync + 'static) {
        *self.during.lock().unwrap() = Some(Box::new(action));
    }

    pub fn last_cache_control(&self) -> Option<String> {
        self.last_cache_control.lock().unwrap().clone()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, RendererError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cache_control.lock().unwrap() = request.cache_control.map(str::to_owned);
        self.clock.advance(*self.delay.lock().unwrap());
        if let Some(action) = self.during.lock().unwrap().as_ref() {
            action();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RendererError::HttpResponse {
                status: 500,
                body: "macro service down".to_owned(),
            });
        }
        Ok(RenderOutput {
            html: request.html.to_owned(),
            errors: self.messages.lock().unwrap().clone(),
        })
    }
}

pub struct Fixture {
    pub wiki: Arc<Wiki>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub renderer: Arc<ScriptedRenderer>,
    pub queue: Arc<ChannelQueue>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    /// Fixture with extra builder configuration.
    pub fn with(configure: impl FnOnce(WikiBuilder) -> WikiBuilder) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let renderer = Arc::new(ScriptedRenderer::new(Arc::clone(&clock)));
        let queue = Arc::new(ChannelQueue::new());

        let builder = Wiki::builder(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::clone(&renderer) as Arc<dyn Renderer>,
        )
        .queue(Arc::clone(&queue) as Arc<dyn TaskQueue>)
        .clock(Arc::clone(&clock) as Arc<dyn Clock>);
        let wiki = Arc::new(configure(builder).build());

        Self {
            wiki,
            store,
            clock,
            renderer,
            queue,
        }
    }

    pub fn create(&self, locale: &str, slug: &str, content: &str) -> Document {
        let title = slug.rsplit('/').next().unwrap_or(slug);
        self.wiki
            .create_document(NewDocument::new(locale, slug, title, content), EDITOR)
            .unwrap()
    }

    /// Create a document under a breadcrumb parent.
    pub fn create_child(&self, parent: &Document, slug: &str, content: &str) -> Document {
        let title = slug.rsplit('/').next().unwrap_or(slug);
        let new = NewDocument {
            parent_topic: Some(parent.id),
            ..NewDocument::new(&parent.locale, slug, title, content)
        };
        self.wiki.create_document(new, EDITOR).unwrap()
    }

    /// Create a translation of `source`.
    pub fn translate(&self, source: &Document, locale: &str, slug: &str, content: &str) -> Document {
        let new = NewDocument {
            parent: Some(source.id),
            ..NewDocument::new(locale, slug, &source.title, content)
        };
        self.wiki.create_document(new, EDITOR).unwrap()
    }

    pub fn get(&self, id: DocumentId) -> Document {
        self.store.get(id).unwrap()
    }

    pub fn find(&self, locale: &str, slug: &str) -> Option<Document> {
        self.store.find(locale, slug).unwrap()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn worker(&self) -> Worker {
        Worker::new(Arc::clone(&self.wiki), Arc::clone(&self.queue))
    }

    /// Number of jobs currently queued; drains the queue.
    pub fn drain_jobs(&self) -> usize {
        std::iter::from_fn(|| self.queue.try_next()).count()
    }
}
