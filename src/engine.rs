//! The engine: one build instance.
//!
//! An [`Engine`] owns its [`FileStore`], its name-to-path mapping, the slice
//! requests handed over by the directive parser, and the sprite tables of the
//! current pass. Nothing is shared between instances, so independent builds
//! can run side by side. A single engine assumes one writer at a time.
//!
//! Work is lazy and cached: slices are resolved, sprites planned and rendered
//! only when an output asks for them. Store and mapping mutations drop exactly
//! the cached resolutions that looked at the affected names; the sprite plan
//! and rendered sprites are dropped on any mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::{ConfigError, SlicepackConfig};
use crate::encode::{data_url, mhtml, preload, sprited, OutputMode, OutputNames, PrefixUrls, UrlResolver};
use crate::error::{EngineError, SliceError, SpriteError};
use crate::files::{is_stylesheet, FileError, FileStore};
use crate::models::SliceRequest;
use crate::report::{Advisory, Diagnostics};
use crate::slicing::{ResolvedSlice, SliceResolver};
use crate::sprite::{plan_sprites, render_sprite, LayoutOptions, RenderedSprite, SpritePlan};

/// Validated build-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Empty, or starting with `.`
    pub theme: String,
    pub minify: bool,
    pub retina: bool,
    pub mode: OutputMode,
    /// Drop rendered sprite pixels once delivered
    pub release_memory: bool,
    pub waste_threshold: u32,
    pub debug_padding: bool,
    pub raster_formats: bool,
    pub url_prefix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            theme: String::new(),
            minify: false,
            retina: false,
            mode: OutputMode::Sprited,
            release_memory: false,
            waste_threshold: 10,
            debug_padding: false,
            raster_formats: true,
            url_prefix: String::new(),
        }
    }
}

impl EngineOptions {
    /// Build options from a loaded configuration, rejecting unknown modes and
    /// inconsistent combinations.
    pub fn from_config(config: &SlicepackConfig) -> Result<Self, ConfigError> {
        let engine = &config.engine;
        let options = Self {
            theme: normalize_theme(&engine.theme),
            minify: engine.minify,
            retina: engine.retina,
            mode: engine.mode.trim().parse()?,
            release_memory: engine.release_memory,
            waste_threshold: engine.waste_threshold,
            debug_padding: engine.debug_padding,
            raster_formats: engine.raster_formats,
            url_prefix: config.output.url_prefix.clone(),
        };
        options.validate()?;
        Ok(options)
    }

    /// Check option combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == OutputMode::Mhtml && self.retina {
            return Err(ConfigError::Inconsistent(
                "mhtml output cannot be combined with retina mode".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retina(mut self, retina: bool) -> Self {
        self.retina = retina;
        self
    }

    pub fn with_theme(mut self, theme: &str) -> Self {
        self.theme = normalize_theme(theme);
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_release_memory(mut self, release: bool) -> Self {
        self.release_memory = release;
        self
    }

    pub fn with_debug_padding(mut self, enabled: bool) -> Self {
        self.debug_padding = enabled;
        self
    }

    pub fn with_raster_formats(mut self, enabled: bool) -> Self {
        self.raster_formats = enabled;
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// File names for this theme.
    pub fn names(&self) -> OutputNames {
        OutputNames::new(self.theme.clone())
    }

    pub fn layout(&self) -> LayoutOptions {
        LayoutOptions { retina: self.retina, padding: 0, waste_threshold: self.waste_threshold }
            .with_debug_padding(self.debug_padding)
    }
}

/// Prefix a non-empty theme with `.` so it reads well inside file names.
pub fn normalize_theme(theme: &str) -> String {
    let theme = theme.trim();
    if theme.is_empty() || theme.starts_with('.') {
        theme.to_string()
    } else {
        format!(".{}", theme)
    }
}

struct CachedResolution {
    request: SliceRequest,
    result: Result<Arc<ResolvedSlice>, SliceError>,
    /// Names looked up while resolving
    depends_on: Vec<String>,
}

struct PlanState {
    plan: SpritePlan,
    errors: Vec<SpriteError>,
    advisories: Vec<Advisory>,
}

/// Everything one pass produces.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Rewritten stylesheet
    pub css: String,
    /// Sprite files (sprited mode only)
    pub sprites: Vec<RenderedSprite>,
    pub preload: String,
    /// MHTML document (MHTML mode only)
    pub mhtml: Option<String>,
    pub names: OutputNames,
    pub diagnostics: Diagnostics,
}

/// A single build instance.
pub struct Engine {
    options: EngineOptions,
    store: FileStore,
    mapped: BTreeMap<String, PathBuf>,
    requests: Vec<SliceRequest>,
    resolved: HashMap<String, CachedResolution>,
    plan: Option<Arc<PlanState>>,
    rendered: HashMap<String, RenderedSprite>,
    /// Failures found while producing output for the current plan
    output_errors: Diagnostics,
    urls: Box<dyn UrlResolver>,
}

impl Engine {
    /// Create an engine; configuration errors surface here, before any work.
    pub fn new(options: EngineOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let store = FileStore::new(CodecRegistry::from_flags(options.raster_formats));
        let urls = Box::new(PrefixUrls::new(options.url_prefix.clone()));
        Ok(Self {
            options,
            store,
            mapped: BTreeMap::new(),
            requests: Vec::new(),
            resolved: HashMap::new(),
            plan: None,
            rendered: HashMap::new(),
            output_errors: Diagnostics::default(),
            urls,
        })
    }

    /// Replace the codec registry, starting over with an empty store.
    ///
    /// Meant for construction time: registered files, mappings and cached
    /// work are dropped.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.store = FileStore::new(codecs);
        self.mapped.clear();
        self.resolved.clear();
        self.forget_sprites();
        self
    }

    /// Replace how sprite names become URLs in sprited CSS.
    pub fn with_url_resolver(mut self, urls: impl UrlResolver + 'static) -> Self {
        self.urls = Box::new(urls);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn names(&self) -> OutputNames {
        self.options.names()
    }

    // ---- file store ----

    /// Register an on-disk file.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        self.store.add(path)?;
        self.after_add(path);
        Ok(())
    }

    /// Register in-memory content.
    pub fn add_file_bytes(&mut self, path: impl AsRef<Path>, bytes: Vec<u8>) {
        let path = path.as_ref();
        self.store.add_bytes(path, bytes);
        self.after_add(path);
    }

    /// Pick up a changed file.
    pub fn update_file(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        self.store.update(path)?;
        self.forget_path(path);
        Ok(())
    }

    /// Drop decoded content for a path.
    pub fn invalidate(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        self.store.invalidate(path)?;
        self.forget_path(path);
        Ok(())
    }

    /// Unregister a file. Names mapped to it stay mapped and fail to resolve.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        self.store.remove(path)?;
        self.forget_path(path);
        Ok(())
    }

    /// Whether a registered file changed on disk since it was recorded.
    pub fn is_stale(&self, path: impl AsRef<Path>) -> Result<bool, FileError> {
        self.store.is_stale(path)
    }

    /// Expose a registered file to slice requests under an instance-relative name.
    pub fn map_file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Result<(), EngineError> {
        let (name, path) = (name.into(), path.into());
        if !self.store.contains(&path) {
            return Err(EngineError::NotInStore { name, path });
        }
        self.mapped.insert(name.clone(), path);
        self.forget_names(&HashSet::from([name]));
        Ok(())
    }

    /// Remove a name mapping, returning the path it pointed at.
    pub fn unmap_file(&mut self, name: &str) -> Option<PathBuf> {
        let removed = self.mapped.remove(name);
        if removed.is_some() {
            self.forget_names(&HashSet::from([name.to_string()]));
        }
        removed
    }

    /// Mapped names and their store paths, in name order.
    pub fn mapped_files(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.mapped.iter().map(|(name, path)| (name.as_str(), path.as_path()))
    }

    fn after_add(&mut self, path: &Path) {
        self.resolved.retain(|_, cached| cached.result.is_ok());
        self.forget_path(path);
    }

    fn forget_path(&mut self, path: &Path) {
        let names: HashSet<String> =
            self.mapped.iter().filter(|(_, p)| p.as_path() == path).map(|(n, _)| n.clone()).collect();
        self.forget_names(&names);
    }

    fn forget_names(&mut self, names: &HashSet<String>) {
        self.resolved.retain(|_, cached| !cached.depends_on.iter().any(|n| names.contains(n)));
        self.forget_sprites();
    }

    fn forget_sprites(&mut self) {
        self.plan = None;
        self.rendered.clear();
        self.output_errors = Diagnostics::default();
    }

    // ---- slice requests ----

    /// Replace the slice requests. Resolutions of unchanged requests are kept.
    ///
    /// Names must be unique; later duplicates are ignored.
    pub fn set_slices(&mut self, requests: Vec<SliceRequest>) {
        let mut seen = HashSet::new();
        let requests: Vec<SliceRequest> = requests
            .into_iter()
            .filter(|r| {
                let first = seen.insert(r.name.clone());
                if !first {
                    log::warn!("Ignoring duplicate slice '{}'", r.name);
                }
                first
            })
            .collect();

        let current: HashMap<&str, &SliceRequest> = requests.iter().map(|r| (r.name.as_str(), r)).collect();
        self.resolved.retain(|name, cached| current.get(name.as_str()).is_some_and(|r| **r == cached.request));
        self.requests = requests;
        self.forget_sprites();
    }

    pub fn slices(&self) -> &[SliceRequest] {
        &self.requests
    }

    fn ensure_resolved(&mut self) {
        let Self { store, mapped, requests, resolved, options, .. } = self;
        let mut resolver = SliceResolver::new(store, mapped, options.retina);
        let mut fresh = 0;

        for request in requests.iter() {
            if resolved.contains_key(&request.name) {
                continue;
            }
            let result = resolver.resolve(request).map(Arc::new);
            if let Err(e) = &result {
                log::warn!("{}", e);
            }
            resolved.insert(
                request.name.clone(),
                CachedResolution { request: request.clone(), result, depends_on: resolver.take_touched() },
            );
            fresh += 1;
        }

        if fresh > 0 {
            log::debug!("Resolved {} slices ({} cached)", fresh, requests.len() - fresh);
        }
    }

    /// Successful resolutions and failures, both in request order.
    fn resolved_in_order(&self) -> (Vec<Arc<ResolvedSlice>>, Vec<SliceError>) {
        let mut slices = Vec::new();
        let mut errors = Vec::new();
        for request in &self.requests {
            match self.resolved.get(&request.name).map(|c| &c.result) {
                Some(Ok(slice)) => slices.push(Arc::clone(slice)),
                Some(Err(e)) => errors.push(e.clone()),
                None => {}
            }
        }
        (slices, errors)
    }

    /// Resolution result for one requested slice.
    pub fn resolved_slice(&mut self, name: &str) -> Option<Result<Arc<ResolvedSlice>, SliceError>> {
        self.ensure_resolved();
        self.resolved.get(name).map(|c| c.result.clone())
    }

    // ---- sprites ----

    fn plan_state(&mut self) -> Arc<PlanState> {
        if let Some(state) = &self.plan {
            return Arc::clone(state);
        }
        self.ensure_resolved();
        let (slices, _) = self.resolved_in_order();
        let outcome = plan_sprites(&slices, &self.options.layout());
        let state =
            Arc::new(PlanState { plan: outcome.plan, errors: outcome.errors, advisories: outcome.advisories });
        self.plan = Some(Arc::clone(&state));
        state
    }

    /// The sprite plan for the current requests.
    pub fn plan(&mut self) -> SpritePlan {
        self.plan_state().plan.clone()
    }

    /// Names of the sprites this pass delivers; empty in data-URL mode.
    pub fn sprite_names(&mut self) -> Vec<String> {
        if self.options.mode.uses_sprites() {
            self.plan_state().plan.names()
        } else {
            Vec::new()
        }
    }

    /// Encoded bytes of one sprite, rendering it if needed.
    ///
    /// Unless memory release is enabled, the result is kept until the next
    /// mutation, so repeated calls return identical bytes without re-rendering.
    pub fn sprite_data(&mut self, name: &str) -> Result<Vec<u8>, SpriteError> {
        if let Some(rendered) = self.rendered.get(name) {
            return Ok(rendered.bytes.clone());
        }

        let state = self.plan_state();
        let sprite = state.plan.sprite(name).ok_or_else(|| SpriteError::Unknown(name.to_string()))?;
        match render_sprite(sprite, self.store.codecs(), self.options.debug_padding) {
            Ok(rendered) => {
                let bytes = rendered.bytes.clone();
                if !self.options.release_memory {
                    self.rendered.insert(name.to_string(), rendered);
                }
                Ok(bytes)
            }
            Err(e) => {
                log::warn!("{}", e);
                self.output_errors.push_sprite_error(e.clone());
                Err(e)
            }
        }
    }

    /// Number of sprites currently held in rendered form.
    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    // ---- outputs ----

    /// Rewrite placeholder tokens in `stylesheet` for the configured mode.
    ///
    /// In the sprite modes every sprite is rendered first; slices of a sprite
    /// that fails to render are written as unavailable.
    pub fn css(&mut self, stylesheet: &str) -> String {
        let rendered = self.render_all();
        let plan = self.delivered_plan(&rendered);
        self.rewrite(stylesheet, &plan)
    }

    /// Render every sprite of the pass, skipping (and recording) failures.
    fn render_all(&mut self) -> Vec<RenderedSprite> {
        let mut rendered = Vec::new();
        for name in self.sprite_names() {
            if let Ok(bytes) = self.sprite_data(&name) {
                rendered.push(RenderedSprite { name, bytes });
            }
        }
        rendered
    }

    /// The plan restricted to sprites that rendered.
    fn delivered_plan(&mut self, rendered: &[RenderedSprite]) -> SpritePlan {
        if !self.options.mode.uses_sprites() {
            return SpritePlan::default();
        }
        let names: HashSet<&str> = rendered.iter().map(|r| r.name.as_str()).collect();
        self.plan_state().plan.filtered(|sprite| names.contains(sprite.name.as_str()))
    }

    fn rewrite(&mut self, stylesheet: &str, plan: &SpritePlan) -> String {
        let names = self.names();
        let minify = self.options.minify;

        match self.options.mode {
            OutputMode::Sprited => {
                let urls = &self.urls;
                sprited::rewrite(stylesheet, plan, |sprite| urls.sprite_url(sprite), minify)
            }
            OutputMode::Mhtml => mhtml::rewrite(stylesheet, plan, &names.mhtml(), minify),
            OutputMode::DataUrl => {
                self.ensure_resolved();
                let (slices, _) = self.resolved_in_order();
                let table = slices.into_iter().map(|s| (s.name().to_string(), s)).collect();
                let (css, errors) =
                    data_url::rewrite(stylesheet, &table, self.store.codecs(), &names.mhtml(), minify);
                for error in errors {
                    if !self.output_errors.slice_errors.contains(&error) {
                        self.output_errors.slice_errors.push(error);
                    }
                }
                css
            }
        }
    }

    /// Mapped stylesheets concatenated depth-first by their requires.
    ///
    /// Roots are visited in name order. A required name is looked up as
    /// given, then with `.css` appended; each stylesheet appears once.
    pub fn combined_stylesheet(&mut self) -> Result<String, EngineError> {
        let roots: Vec<String> = self.mapped.keys().filter(|n| is_stylesheet(n)).cloned().collect();
        let mut visited = HashSet::new();
        let mut output = String::new();
        for name in roots {
            self.include_stylesheet(&name, &mut visited, &mut output)?;
        }
        Ok(output)
    }

    fn include_stylesheet(
        &mut self,
        name: &str,
        visited: &mut HashSet<String>,
        output: &mut String,
    ) -> Result<(), EngineError> {
        if !visited.insert(name.to_string()) {
            return Ok(());
        }
        let Some(path) = self.mapped.get(name).cloned() else {
            return Ok(());
        };

        let file = self.store.get(&path)?;
        for required in file.requires() {
            match self.require_target(required) {
                Some(target) => self.include_stylesheet(&target, visited, output)?,
                None => log::warn!("{}: required file '{}' is not mapped", name, required),
            }
        }

        if let Some(text) = file.stylesheet() {
            output.push_str(text);
            if !text.ends_with('\n') {
                output.push('\n');
            }
        }
        Ok(())
    }

    fn require_target(&self, required: &str) -> Option<String> {
        if self.mapped.contains_key(required) {
            return Some(required.to_string());
        }
        let with_ext = format!("{}.css", required);
        self.mapped.contains_key(&with_ext).then_some(with_ext)
    }

    /// Preload script: sprite names, or slice class names in data-URL mode.
    pub fn preload_script(&mut self) -> String {
        let names = match self.options.mode {
            OutputMode::DataUrl => {
                self.ensure_resolved();
                let (slices, _) = self.resolved_in_order();
                slices.iter().map(|s| s.request.css_name().to_string()).collect()
            }
            _ => self.sprite_names(),
        };
        preload::script(&names)
    }

    /// MHTML document holding every sprite that renders.
    pub fn mhtml(&mut self) -> String {
        let rendered = self.render_all();
        mhtml::document(&rendered)
    }

    /// Everything recorded for the current pass.
    pub fn diagnostics(&mut self) -> Diagnostics {
        self.ensure_resolved();
        let (slices, slice_errors) = self.resolved_in_order();
        let mut diagnostics = Diagnostics { slices: slices.len(), slice_errors, ..Diagnostics::default() };

        if self.options.mode.uses_sprites() {
            let state = self.plan_state();
            diagnostics.sprites = state.plan.len();
            diagnostics.sprite_errors = state.errors.clone();
            diagnostics.advisories = state.advisories.clone();
        }

        diagnostics.merge(self.output_errors.clone());
        diagnostics
    }

    /// Run a full pass over `stylesheet` and collect every output.
    pub fn build(&mut self, stylesheet: &str) -> BuildOutput {
        // Render once, so the CSS only points at sprites that are delivered
        let rendered = self.render_all();
        let plan = self.delivered_plan(&rendered);
        let css = self.rewrite(stylesheet, &plan);

        let mhtml = (self.options.mode == OutputMode::Mhtml).then(|| mhtml::document(&rendered));
        let sprites = if self.options.mode == OutputMode::Sprited { rendered } else { Vec::new() };
        let preload = self.preload_script();
        let diagnostics = self.diagnostics();
        log::debug!("{}", diagnostics.summary());

        BuildOutput { css, sprites, preload, mhtml, names: self.names(), diagnostics }
    }
}
