//! Engine wiring shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use scribe_cache::FileCache;
use scribe_config::{CliSettings, Config};
use scribe_render::{KumascriptClient, PassthroughRenderer, Renderer};
use scribe_store::{Document, DocumentStore, MemoryStore};
use scribe_wiki::{ChannelQueue, JsonProjection, TaskQueue, Wiki, WikiSettings, Worker};

use crate::error::CliError;

/// Options accepted by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover scribe.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot file (overrides config).
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Kumascript service URL (overrides config).
    #[arg(long, global = true)]
    kumascript_url: Option<String>,

    /// Render synchronously even for deferred documents.
    #[arg(long, global = true)]
    force_immediate: bool,

    /// Acting user recorded on revisions and deletion logs.
    #[arg(short, long, global = true, env = "SCRIBE_USER", default_value = "scribe")]
    pub user: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Natural key of a document on the command line.
#[derive(Args, Clone, Debug)]
pub(crate) struct Target {
    /// Document locale (e.g., en-US).
    pub locale: String,
    /// Document slug (e.g., Web/HTML).
    pub slug: String,
}

/// An open engine over the snapshot store.
pub(crate) struct Session {
    pub wiki: Arc<Wiki>,
    config: Config,
    store: Arc<MemoryStore>,
    queue: Arc<ChannelQueue>,
}

/// Map loaded configuration onto engine settings.
pub(crate) fn wiki_settings(config: &Config) -> WikiSettings {
    WikiSettings {
        canonical_locale: config.wiki.canonical_locale.clone(),
        locales: config.wiki.locales.clone(),
        max_breadcrumb_depth: config.wiki.max_breadcrumb_depth,
        render_timeout: config.rendering.render_timeout(),
        force_defer: config.rendering.force_defer(),
        force_immediate: config.rendering.force_immediate,
        renderer_timeout: config.kumascript_resolved.timeout(),
        base_url: Some(config.kumascript_resolved.base_url.clone()),
    }
}

fn renderer(config: &Config) -> Arc<dyn Renderer> {
    match &config.kumascript_resolved.url {
        Some(url) => Arc::new(KumascriptClient::new(
            url.clone(),
            config.kumascript_resolved.timeout(),
        )),
        None => Arc::new(PassthroughRenderer),
    }
}

impl Session {
    /// Load configuration and the snapshot store.
    pub(crate) fn open(args: &GlobalArgs) -> Result<Self, CliError> {
        let cli_settings = CliSettings {
            snapshot: args.snapshot.clone(),
            kumascript_url: args.kumascript_url.clone(),
            force_immediate: args.force_immediate.then_some(true),
        };
        let config = Config::load(args.config.as_deref(), Some(&cli_settings))?;
        Self::from_config(config)
    }

    /// Build a session from resolved configuration.
    pub(crate) fn from_config(config: Config) -> Result<Self, CliError> {
        if let Some(dir) = config.store_resolved.snapshot.parent() {
            ensure_project_dir(dir)?;
        }
        let store = Arc::new(MemoryStore::open(&config.store_resolved.snapshot)?);
        let queue = Arc::new(ChannelQueue::new());
        let cache = FileCache::new(
            config.store_resolved.cache_dir.clone(),
            env!("CARGO_PKG_VERSION"),
        );

        let wiki = Wiki::builder(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            renderer(&config),
        )
        .queue(Arc::clone(&queue) as Arc<dyn TaskQueue>)
        .listener(Box::new(JsonProjection::new(&cache)))
        .settings(wiki_settings(&config))
        .build();

        Ok(Self {
            wiki: Arc::new(wiki),
            config,
            store,
            queue,
        })
    }

    /// Look up a live document.
    pub(crate) fn find(&self, target: &Target) -> Result<Document, CliError> {
        Ok(self.wiki.find(&target.locale, &target.slug)?)
    }

    /// Worker over this session's job queue.
    pub(crate) fn worker(&self) -> Worker {
        Worker::new(Arc::clone(&self.wiki), Arc::clone(&self.queue))
    }

    /// Projection cache the session publishes rendered documents into.
    pub(crate) fn projection(&self) -> JsonProjection {
        JsonProjection::new(&FileCache::new(
            self.config.store_resolved.cache_dir.clone(),
            env!("CARGO_PKG_VERSION"),
        ))
    }

    /// Write the store snapshot back.
    pub(crate) fn save(&self) -> Result<(), CliError> {
        self.store.persist(&self.config.store_resolved.snapshot)?;
        tracing::debug!(path = %self.config.store_resolved.snapshot.display(), "Saved snapshot");
        Ok(())
    }
}

/// Ensure the snapshot directory exists; the `.scribe/` directory also gets a `.gitignore`.
fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if project_dir.file_name().is_some_and(|name| name == ".scribe") && !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by scribe\n*\n");
    }

    Ok(())
}
