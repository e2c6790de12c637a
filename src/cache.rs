//! Compilation cache for compiled predicates.
//!
//! Predicates are keyed by model identity, expression text and case
//! sensitivity. Entries live until the host evicts them: expressions and
//! model shapes are static for the lifetime of a process.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{
    error::Result,
    evaluator::{CompileOptions, CompiledPredicate, compile},
    model::{Model, ModelType},
    toolchain::Toolchain,
    value::Record,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    model: u64,
    expression: String,
    case_sensitive: bool,
}

/// Statistics for the compilation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
}

/// Thread-safe, unbounded cache of compiled predicates.
///
/// A cache assumes a single toolchain: the toolchain is not part of the key.
#[derive(Debug, Default)]
pub struct CompilationCache {
    entries: DashMap<CacheKey, Arc<CompiledPredicate>>,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached predicate, compiling and publishing it on first use.
    ///
    /// Compilation runs outside any lock. Racing first callers may each
    /// compile; the first insertion wins and every caller gets that predicate.
    pub fn get_or_compile(
        &self,
        model: &Arc<ModelType>,
        expression: &str,
        toolchain: &Toolchain,
        options: CompileOptions,
    ) -> Result<Arc<CompiledPredicate>> {
        let key = CacheKey {
            model: model.id(),
            expression: expression.to_string(),
            case_sensitive: options.case_sensitive,
        };

        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(model = model.name(), expression, "compilation cache hit");
            return Ok(entry.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compile(expression, model, toolchain, options)?);
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let published = self.entries.entry(key).or_insert(compiled);
        Ok(published.value().clone())
    }

    /// Drops the entries for this model and expression, under either case
    /// sensitivity. Returns whether anything was cached.
    pub fn evict(&self, model: &ModelType, expression: &str) -> bool {
        let mut removed = false;
        for case_sensitive in [true, false] {
            let key = CacheKey {
                model: model.id(),
                expression: expression.to_string(),
                case_sensitive,
            };
            removed |= self.entries.remove(&key).is_some();
        }
        if removed {
            debug!(model = model.name(), expression, "evicted compiled expression");
        }
        removed
    }

    pub fn clear(&self) {
        let entries = self.entries.len();
        self.entries.clear();
        debug!(entries, "cleared compilation cache");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
        }
    }
}

/// A toolchain, a compilation cache and compile options behind one handle.
///
/// # Examples
///
/// ```
/// use expressive::{Engine, ModelType, Record, ValueType};
///
/// let model = ModelType::builder("Trip")
///     .field("GoAbroad", ValueType::Bool)
///     .field("Country", ValueType::String)
///     .build();
/// let record = Record::builder(&model)
///     .set("GoAbroad", true)
///     .set("Country", "Germany")
///     .build()
///     .unwrap();
///
/// let engine = Engine::new();
/// let fires = engine
///     .evaluate(&model, "GoAbroad == true && Country != 'Poland'", &record)
///     .unwrap();
/// assert!(fires);
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    toolchain: Arc<Toolchain>,
    cache: CompilationCache,
    options: CompileOptions,
}

impl Engine {
    /// Engine over the standard library toolchain.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toolchain(toolchain: impl Into<Arc<Toolchain>>) -> Self {
        Engine {
            toolchain: toolchain.into(),
            cache: CompilationCache::new(),
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn toolchain(&self) -> &Arc<Toolchain> {
        &self.toolchain
    }

    pub fn cache(&self) -> &CompilationCache {
        &self.cache
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    pub fn compile(&self, model: &Arc<ModelType>, expression: &str) -> Result<Arc<CompiledPredicate>> {
        self.cache
            .get_or_compile(model, expression, &self.toolchain, self.options)
    }

    pub fn evaluate(&self, model: &Arc<ModelType>, expression: &str, record: &Record) -> Result<bool> {
        Ok(self.compile(model, expression)?.evaluate(record))
    }

    pub fn evaluate_model<M: Model>(&self, expression: &str, instance: &M) -> Result<bool> {
        let model = M::model_type();
        Ok(self.compile(&model, expression)?.evaluate(&instance.to_record()))
    }
}
