//! Snapshot formatters
//!
//! A [`Formatter`] is either a single render function or an ordered pipeline
//! of them. Every render function receives the destination buffer, the
//! snapshot and the formatter's [`SecondCache`].
//!
//! The default layout is:
//!
//! ```text
//! YYYY-MM-DD HH:MM:SS.ssssss[Z] [SEV] <name> <file>:<line> <message>\n
//! ```
//!
//! # Example
//!
//! ```
//! use ldgr::core::formatter::{self, Formatter};
//!
//! // Same output as the default, assembled from stages.
//! let formatter = Formatter::pipeline()
//!     .then(formatter::render_timestamp)
//!     .then(formatter::render_severity)
//!     .then(formatter::render_name)
//!     .then(formatter::render_location)
//!     .then(formatter::render_message);
//! assert_eq!(formatter.stage_count(), 5);
//! ```

use super::entry::{DecomposedTime, Snapshot};
use super::fmtutil;
use super::pool::LogBuffer;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;

/// Path segments of the source file kept by the default layout.
pub const DEFAULT_FILE_SEGMENTS: usize = 3;

/// A render step. Appends to the buffer; never clears it.
pub type RenderFn = Box<dyn Fn(&mut LogBuffer, &Snapshot, &mut SecondCache) + Send + Sync>;

/// Cache of the last rendered `YYYY-MM-DD HH:MM:SS` prefix.
///
/// Consecutive entries in the same second reuse the stored bytes instead of
/// re-rendering the calendar fields.
#[derive(Debug, Default)]
pub struct SecondCache {
    key: Option<(i64, bool)>,
    rendered: SmallVec<[u8; 24]>,
    hits: u64,
    misses: u64,
}

impl SecondCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the calendar prefix for `time`, refreshing the cache on a new second.
    pub fn append_calendar(&mut self, dest: &mut LogBuffer, time: &DecomposedTime) {
        let key = (time.epoch_second, time.is_local);
        if self.key == Some(key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let start = dest.len();
            fmtutil::append_calendar(dest, time);
            self.rendered.clear();
            self.rendered.extend_from_slice(&dest[start..]);
            self.key = Some(key);
            return;
        }
        dest.extend_from_slice(&self.rendered);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

pub enum FormatterKind {
    Single(RenderFn),
    Pipeline(Vec<RenderFn>),
}

/// Renders snapshots into bytes.
pub struct Formatter {
    kind: FormatterKind,
    cache: Mutex<SecondCache>,
}

impl Formatter {
    /// Formatter backed by a single render function.
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&mut LogBuffer, &Snapshot, &mut SecondCache) + Send + Sync + 'static,
    {
        Self::from_kind(FormatterKind::Single(Box::new(render)))
    }

    /// Empty pipeline; add stages with [`then`](Self::then) or [`push`](Self::push).
    pub fn pipeline() -> Self {
        Self::from_kind(FormatterKind::Pipeline(Vec::new()))
    }

    pub fn from_kind(kind: FormatterKind) -> Self {
        Self {
            kind,
            cache: Mutex::new(SecondCache::new()),
        }
    }

    #[must_use]
    pub fn then<F>(mut self, stage: F) -> Self
    where
        F: Fn(&mut LogBuffer, &Snapshot, &mut SecondCache) + Send + Sync + 'static,
    {
        self.push(stage);
        self
    }

    /// Append a stage, turning a single-function formatter into a pipeline.
    pub fn push<F>(&mut self, stage: F)
    where
        F: Fn(&mut LogBuffer, &Snapshot, &mut SecondCache) + Send + Sync + 'static,
    {
        let stage: RenderFn = Box::new(stage);
        match &mut self.kind {
            FormatterKind::Pipeline(stages) => stages.push(stage),
            FormatterKind::Single(_) => {
                let previous = std::mem::replace(&mut self.kind, FormatterKind::Pipeline(Vec::new()));
                if let (FormatterKind::Single(first), FormatterKind::Pipeline(stages)) =
                    (previous, &mut self.kind)
                {
                    stages.push(first);
                    stages.push(stage);
                }
            }
        }
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self.kind, FormatterKind::Pipeline(_))
    }

    pub fn stage_count(&self) -> usize {
        match &self.kind {
            FormatterKind::Single(_) => 1,
            FormatterKind::Pipeline(stages) => stages.len(),
        }
    }

    /// `(hits, misses)` of the calendar-second cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        let cache = self.cache.lock();
        (cache.hits(), cache.misses())
    }

    /// Append the rendering of `snapshot` to `dest`.
    ///
    /// The cache is taken with `try_lock`; a render racing another one on the
    /// same formatter uses a throwaway cache rather than waiting.
    pub fn format(&self, dest: &mut LogBuffer, snapshot: &Snapshot) {
        let mut guard = self.cache.try_lock();
        let mut scratch;
        let cache = match guard.as_deref_mut() {
            Some(cache) => cache,
            None => {
                scratch = SecondCache::new();
                &mut scratch
            }
        };

        match &self.kind {
            FormatterKind::Single(render) => render(dest, snapshot, cache),
            FormatterKind::Pipeline(stages) => {
                for stage in stages {
                    stage(dest, snapshot, cache);
                }
            }
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::new(default_render)
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("pipeline", &self.is_pipeline())
            .field("stages", &self.stage_count())
            .finish()
    }
}

/// The full default layout in one pass.
pub fn default_render(dest: &mut LogBuffer, snapshot: &Snapshot, cache: &mut SecondCache) {
    render_timestamp(dest, snapshot, cache);
    render_severity(dest, snapshot, cache);
    render_name(dest, snapshot, cache);
    render_location(dest, snapshot, cache);
    render_message(dest, snapshot, cache);
}

/// `YYYY-MM-DD HH:MM:SS.ssssss[Z]`
pub fn render_timestamp(dest: &mut LogBuffer, snapshot: &Snapshot, cache: &mut SecondCache) {
    cache.append_calendar(dest, snapshot.time());
    fmtutil::append_subsecond(dest, snapshot.time());
}

/// ` [SEV] `
pub fn render_severity(dest: &mut LogBuffer, snapshot: &Snapshot, _cache: &mut SecondCache) {
    dest.extend_from_slice(b" [");
    fmtutil::append_severity(dest, snapshot.severity());
    dest.extend_from_slice(b"] ");
}

/// `<name> `
pub fn render_name(dest: &mut LogBuffer, snapshot: &Snapshot, _cache: &mut SecondCache) {
    dest.extend_from_slice(snapshot.name());
    dest.push(b' ');
}

/// `<file>:<line> `
pub fn render_location(dest: &mut LogBuffer, snapshot: &Snapshot, _cache: &mut SecondCache) {
    dest.extend_from_slice(fmtutil::trunc_segments(snapshot.file(), DEFAULT_FILE_SEGMENTS));
    dest.push(b':');
    dest.extend_from_slice(snapshot.line());
    dest.push(b' ');
}

/// `<message>\n`
pub fn render_message(dest: &mut LogBuffer, snapshot: &Snapshot, _cache: &mut SecondCache) {
    dest.extend_from_slice(snapshot.message());
    dest.push(b'\n');
}
