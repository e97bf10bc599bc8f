use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core module order. Stopping walks this list backwards, so the cache pool
/// closes before the database pool.
const CORE_MODULE_ORDER: &[&str] = &["database", "cache"];

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register an infrastructure module (database, cache). Modules outside
    /// the known core order run after the known ones, in registration order.
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        if !CORE_MODULE_ORDER.contains(&module.name()) {
            tracing::warn!(
                module = module.name(),
                order = ?CORE_MODULE_ORDER,
                "core module has no fixed position; it starts after the known core modules"
            );
        }
        self.core_modules.push(module);
    }

    /// Register a domain module (books, auth, ...)
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// All registered modules, core first
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules().into_iter().find(|module| module.name() == name)
    }

    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    fn ordered_core(&self) -> impl Iterator<Item = &Arc<dyn Module>> + '_ {
        let known = CORE_MODULE_ORDER.iter().filter_map(|name| {
            self.core_modules
                .iter()
                .find(|module| module.name() == *name)
        });
        let unlisted = self
            .core_modules
            .iter()
            .filter(|module| !CORE_MODULE_ORDER.contains(&module.name()));
        known.chain(unlisted)
    }

    /// Initialize core modules in order, then custom modules in registration order
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(order = ?CORE_MODULE_ORDER, "initializing core modules");
        for module in self.ordered_core() {
            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize core module '{}'", module.name()))?;
        }

        tracing::info!(count = self.custom_modules.len(), "initializing custom modules");
        for module in &self.custom_modules {
            tracing::debug!(module = module.name(), "initializing custom module");
            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Start core modules in order, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.ordered_core().chain(self.custom_modules.iter()) {
            tracing::debug!(module = module.name(), "starting module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop custom modules in reverse registration order, then core modules in
    /// reverse core order. Every module gets a stop call even if an earlier one
    /// fails; the first failure is returned.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        let core: Vec<_> = self.ordered_core().collect();
        let mut first_error = None;

        for module in self
            .custom_modules
            .iter()
            .rev()
            .chain(core.into_iter().rev())
        {
            tracing::info!(module = module.name(), "stopping module");
            if let Err(err) = module.stop().await {
                tracing::error!(module = module.name(), error = %err, "module failed to stop");
                if first_error.is_none() {
                    first_error =
                        Some(err.context(format!("failed to stop module '{}'", module.name())));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect all migrations from all modules (core + custom), ordered by
    /// module name and migration id
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));
        migrations
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
