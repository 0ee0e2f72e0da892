//! Module loading pipeline
//!
//! `load` is the single entry point: it discovers headers when none are
//! given, serves the alias from the binding cache when the key matches, and
//! otherwise runs every header through the preprocessor and extractors before
//! saving a fresh snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use autobind_cache::{include_order, CacheKey, CacheStore, CacheTarget, CachedSnapshot, LoadOutcome};
use autobind_core::{Config, DeclarationParser, ExpressionEvaluator, Registry, Result};

use crate::decl::CDeclParser;
use crate::diag::Diagnostics;
use crate::eval::CExprEvaluator;
use crate::headers::HeaderDiscovery;
use crate::preprocessor::{Platform, PreprocessorState};
use crate::{defines, enums, functions, normalize, structs, typedefs};

/// Where the alias's tables came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Cache,
    Parsed,
}

/// Summary of one `load` call
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub alias: String,
    pub source: LoadSource,
    pub headers: Vec<PathBuf>,
    pub constants: usize,
    pub enums: usize,
    pub functions: usize,
    pub typedefs: usize,
    pub structs: usize,
    /// Declarations that could not be understood
    pub skipped: usize,
    pub import_errors: Vec<String>,
    /// Snapshot written by this load, if any
    pub cache_file: Option<PathBuf>,
}

/// Loads a native library's declarations into a [`Registry`]
pub struct ModuleLoader {
    evaluator: Arc<dyn ExpressionEvaluator>,
    declarations: Arc<dyn DeclarationParser>,
    store: CacheStore,
    config: Config,
    discovery: HeaderDiscovery,
    platform: Platform,
}

impl ModuleLoader {
    pub fn new(
        evaluator: Arc<dyn ExpressionEvaluator>,
        declarations: Arc<dyn DeclarationParser>,
        config: Config,
    ) -> Result<Self> {
        let store = CacheStore::from_config(&config.cache)?;
        let platform = Platform::host();
        Ok(Self {
            evaluator,
            declarations,
            store,
            config,
            discovery: HeaderDiscovery::system(platform.arch),
            platform,
        })
    }

    /// Loader using the built-in C evaluator and declaration parser
    pub fn with_defaults(config: Config) -> Result<Self> {
        let declarations = CDeclParser::with_max_typedef_depth(config.parse.max_typedef_depth);
        Self::new(Arc::new(CExprEvaluator), Arc::new(declarations), config)
    }

    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_discovery(mut self, discovery: HeaderDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Populate `registry` with everything `library`'s headers declare
    ///
    /// With no `headers`, the library's main header is discovered from its
    /// file name. Cache failures never fail the load; header read errors do.
    pub fn load(
        &self,
        registry: &Registry,
        alias: &str,
        library: &Path,
        headers: &[PathBuf],
    ) -> Result<LoadReport> {
        let headers = if headers.is_empty() {
            self.discovery.discover(alias, library)?
        } else {
            headers.to_vec()
        };

        let key = self.store.is_enabled().then(|| {
            let target = self.cache_target();
            CacheKey::compute(&target, alias, library, &headers, self.config.cache.fingerprint)
        });

        if let Some(key) = &key {
            if let LoadOutcome::Hit(snapshot) = self.store.load(key) {
                info!("Loaded {} from binding cache", alias);
                registry.clear_alias(alias);
                snapshot.restore_into(registry);
                return Ok(self.report(registry, alias, LoadSource::Cache, headers, 0, None));
            }
        }

        let start = Instant::now();
        let skipped = self.parse_headers(registry, alias, &headers)?;
        info!(
            "Parsed {} header(s) for {} in {:?} ({} skipped)",
            headers.len(),
            alias,
            start.elapsed(),
            skipped
        );

        let cache_file = match key {
            Some(key) => {
                let snapshot = CachedSnapshot::capture(registry, key);
                match self.store.save(&snapshot) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Failed to save binding cache for {}: {}", alias, e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(self.report(registry, alias, LoadSource::Parsed, headers, skipped, cache_file))
    }

    /// Key fields describing the platform this loader parses for
    fn cache_target(&self) -> CacheTarget {
        CacheTarget::new(
            self.platform.os.name(),
            self.platform.arch.name(),
            self.platform.arch.pointer_width(),
        )
    }

    /// Run `headers` through the full pipeline without touching the cache
    ///
    /// Whatever `alias` held before is discarded first, apart from manual
    /// signatures. Headers reached through local `#include "..."` lines are
    /// parsed too, each before the header including it. Returns the number
    /// of skipped declarations.
    pub fn parse_headers(&self, registry: &Registry, alias: &str, headers: &[PathBuf]) -> Result<usize> {
        registry.clear_alias(alias);
        let diag = Diagnostics::new(&self.config.parse);
        let mut state = PreprocessorState::for_platform(&self.platform);
        let ordered = include_order(headers);
        let mut combined = Vec::with_capacity(ordered.len());

        for path in &ordered {
            debug!("Preprocessing {}", path.display());
            let raw = fs::read_to_string(path)?;
            combined.push(self.preprocess(&raw, alias, registry, &mut state, &diag));
        }
        let combined = combined.join("\n");

        let evaluator = self.evaluator.as_ref();
        let constants = defines::evaluate_defines(alias, registry, evaluator, &self.config.parse, &diag);
        let enums = enums::parse_enums(&combined, alias, registry, evaluator, &diag);
        let structs = structs::parse_structs(
            &combined,
            alias,
            registry,
            self.config.parse.max_typedef_depth,
            &diag,
        );
        let functions =
            functions::parse_functions(&combined, alias, registry, self.declarations.as_ref(), &diag);
        debug!(
            "{}: {} constants, {} enums, {} structs, {} functions",
            alias, constants, enums, structs, functions
        );

        Ok(diag.skipped())
    }

    /// One header's text, ready for extraction
    fn preprocess(
        &self,
        raw: &str,
        alias: &str,
        registry: &Registry,
        state: &mut PreprocessorState,
        diag: &Diagnostics,
    ) -> String {
        let text = normalize::strip_comments(raw);
        let text = normalize::join_continuations(&text);
        let text = state.filter(&text, self.evaluator.as_ref());

        for (name, definition) in normalize::extract_original_macros(&text) {
            registry.record_original_macro(alias, name, definition);
        }

        let text = normalize::remove_marker_macros(&text);
        defines::collect_defines(&text, alias, registry);
        typedefs::parse_typedefs(&text, alias, registry, self.declarations.as_ref(), diag);
        let text = defines::drop_define_lines(&text);
        normalize::normalize_function_declarations(&text)
    }

    fn report(
        &self,
        registry: &Registry,
        alias: &str,
        source: LoadSource,
        headers: Vec<PathBuf>,
        skipped: usize,
        cache_file: Option<PathBuf>,
    ) -> LoadReport {
        let tables = registry.snapshot_alias(alias);
        LoadReport {
            alias: alias.to_string(),
            source,
            headers,
            constants: tables.constants.len(),
            enums: tables.enums.len(),
            functions: tables.signatures.len(),
            typedefs: tables.typedefs.len() + tables.func_ptr_sigs.len(),
            structs: tables.structs.len(),
            skipped,
            import_errors: tables.import_errors,
            cache_file,
        }
    }
}
