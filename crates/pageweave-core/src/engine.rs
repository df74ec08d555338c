//! View engine: resolution, caching, includes and live reload in one place

use crate::cache::TemplateCache;
use crate::config::Config;
use crate::config::consts::{DEFAULT_MAX_INCLUDE_DEPTH, live_reload};
use crate::context::Context;
use crate::error::Result;
use crate::reload::{BroadcastReport, ReloadNotifier, script};
use crate::resolve::{IdentifierResolver, SourceLocation};
use crate::template::{IncludeStack, Includer, ParseOptions, Template, TemplateError, render_with};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Deepest allowed include nesting below the page
    pub max_include_depth: usize,
    /// Register with the reload notifier and inject the client script
    pub live_reload: bool,
    pub inject_script: bool,
    /// Event stream URL written into the client script
    pub reload_url: String,
    /// Queue capacity used if this engine creates the global notifier
    pub channel_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            live_reload: false,
            inject_script: true,
            reload_url: format!("http://{}{}", live_reload::ADDRESS, live_reload::PATH),
            channel_capacity: live_reload::CHANNEL_CAPACITY,
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_include_depth: config.render.max_include_depth,
            live_reload: config.live_reload.enabled,
            inject_script: config.live_reload.inject_script,
            reload_url: config.live_reload.url(),
            channel_capacity: config.live_reload.channel_capacity,
        }
    }
}

/// Renders pages by identifier
///
/// Safe to share between threads; each render call keeps its own include
/// stack and only the parse cache is shared.
#[derive(Debug)]
pub struct ViewEngine {
    resolver: IdentifierResolver,
    cache: Arc<TemplateCache>,
    options: EngineOptions,
    notifier: OnceLock<Arc<ReloadNotifier>>,
}

impl ViewEngine {
    /// Engine over `root` with default extensions, caching and options
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_parts(
            IdentifierResolver::with_defaults(root)?,
            Arc::new(TemplateCache::new()),
            EngineOptions::default(),
        ))
    }

    pub fn with_parts(resolver: IdentifierResolver, cache: Arc<TemplateCache>, options: EngineOptions) -> Self {
        Self {
            resolver,
            cache,
            options,
            notifier: OnceLock::new(),
        }
    }

    /// Engine configured by pageweave.toml found at `project_root`
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self> {
        let resolver = IdentifierResolver::new(
            config.template_root(project_root),
            config.templates.extensions.clone(),
            config.templates.index_names.clone(),
        )?;
        let cache = TemplateCache::with_options(config.cache.enabled, config.cache.revalidate)
            .with_parse_options(ParseOptions {
                max_block_depth: config.render.max_block_depth,
            });
        Ok(Self::with_parts(
            resolver,
            Arc::new(cache),
            EngineOptions::from_config(config),
        ))
    }

    /// Use `notifier` instead of the process-wide one
    pub fn with_notifier(self, notifier: Arc<ReloadNotifier>) -> Self {
        notifier.attach_cache(&self.cache);
        Self {
            notifier: OnceLock::from(notifier),
            ..self
        }
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Resolve `identifier`
    pub fn locate(&self, identifier: &str) -> std::result::Result<SourceLocation, TemplateError> {
        self.resolver.resolve(identifier)
    }

    /// Resolve and parse `identifier`, through the cache
    pub fn load(&self, identifier: &str) -> std::result::Result<Arc<Template>, TemplateError> {
        let location = self.resolver.resolve(identifier)?;
        self.cache
            .get_or_load(&location.path)
            .map_err(|e| e.in_template(identifier))
    }

    /// Render `identifier` against `context`
    ///
    /// Errors raised inside a template are wrapped in
    /// [`TemplateError::InTemplate`] for every template on the include chain.
    pub fn render(&self, identifier: &str, context: &Context) -> std::result::Result<String, TemplateError> {
        let mut stack = IncludeStack::new();
        self.render_frame(identifier, context, &mut stack)
    }

    /// Render a page for the browser
    ///
    /// With live reload enabled this registers the engine's cache with the
    /// notifier and, unless disabled, injects the client script.
    pub fn render_page(&self, page: &str, context: &Context) -> std::result::Result<String, TemplateError> {
        let html = self.render(page, context)?;
        if !self.options.live_reload {
            return Ok(html);
        }
        self.notifier();
        if !self.options.inject_script {
            return Ok(html);
        }
        Ok(script::inject(&html, &script::client_script(&self.options.reload_url)))
    }

    /// The notifier this engine reports to, creating the global one if needed
    pub fn notifier(&self) -> &Arc<ReloadNotifier> {
        self.notifier.get_or_init(|| {
            let notifier = ReloadNotifier::init_global(self.options.channel_capacity);
            notifier.attach_cache(&self.cache);
            notifier
        })
    }

    /// A template file changed: drop it from the cache and tell subscribers
    ///
    /// Without a notifier only the cache is invalidated.
    pub fn notify_changed(&self, path: &Path) -> BroadcastReport {
        match self.notifier.get() {
            Some(notifier) => notifier.notify_changed(path),
            None => {
                self.cache.invalidate(path);
                BroadcastReport::default()
            }
        }
    }

    fn render_frame(
        &self,
        identifier: &str,
        context: &Context,
        stack: &mut IncludeStack,
    ) -> std::result::Result<String, TemplateError> {
        let location = self.resolver.resolve(identifier)?;
        stack.push(identifier, &location.path)?;
        debug!(identifier, depth = stack.depth(), "rendering template");
        let result = self
            .cache
            .get_or_load(&location.path)
            .and_then(|template| render_with(&template, context, self, stack));
        stack.pop();
        result.map_err(|e| e.in_template(identifier))
    }
}

impl Includer for ViewEngine {
    fn include(
        &self,
        identifier: &str,
        context: &Context,
        stack: &mut IncludeStack,
    ) -> std::result::Result<String, TemplateError> {
        if stack.depth() > self.options.max_include_depth {
            return Err(TemplateError::IncludeDepthExceeded {
                identifier: identifier.to_string(),
                max: self.options.max_include_depth,
            });
        }
        self.render_frame(identifier, context, stack)
    }
}
