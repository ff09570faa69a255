// src/instrument_factory.rs

use std::collections::HashMap;

use crate::config::InstrumentConfig;
use crate::visual::{CloneVisual, HandedClone, KeyedClone, PlainClone};

/// Standard kind tags.
pub mod kinds {
    pub const PLAIN: &str = "plain";
    pub const KEYED: &str = "keyed";
    pub const HANDED: &str = "handed";
}

/// A factory capable of creating clone visuals for one instrument kind.
///
/// This is only used while loading a performance.
pub trait CloneFactory: Send + Sync {
    /// Create the visual for clone `clone_id` of an instrument part
    fn create(&self, clone_id: usize, config: &InstrumentConfig) -> Box<dyn CloneVisual>;
}

/// Convenience factory for closures
pub struct SimpleCloneFactory<F>
where
    F: Fn(usize, &InstrumentConfig) -> Box<dyn CloneVisual> + Send + Sync,
{
    create_fn: F,
}

impl<F> SimpleCloneFactory<F>
where
    F: Fn(usize, &InstrumentConfig) -> Box<dyn CloneVisual> + Send + Sync,
{
    pub fn new(create_fn: F) -> Self {
        Self { create_fn }
    }
}

impl<F> CloneFactory for SimpleCloneFactory<F>
where
    F: Fn(usize, &InstrumentConfig) -> Box<dyn CloneVisual> + Send + Sync,
{
    fn create(&self, clone_id: usize, config: &InstrumentConfig) -> Box<dyn CloneVisual> {
        (self.create_fn)(clone_id, config)
    }
}

/// Clone factories keyed by kind tag.
#[derive(Default)]
pub struct InstrumentRegistry {
    factories: HashMap<String, Box<dyn CloneFactory>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the plain, keyed and handed kinds.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        register_standard_kinds(&mut registry);
        registry
    }

    /// Register (or replace) the factory for a kind.
    pub fn register(&mut self, kind: impl Into<String>, factory: impl CloneFactory + 'static) {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Create one visual per clone of the part's pool.
    ///
    /// Returns `None` if the part's kind is not registered.
    pub fn create_pool(&self, config: &InstrumentConfig) -> Option<Vec<Box<dyn CloneVisual>>> {
        let factory = self.factories.get(&config.kind)?;
        Some(
            (0..config.pool_size)
                .map(|id| factory.create(id, config))
                .collect(),
        )
    }

    /// Registered kind tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Register the built-in clone kinds.
pub fn register_standard_kinds(registry: &mut InstrumentRegistry) {
    registry.register(
        kinds::PLAIN,
        SimpleCloneFactory::new(|id, config: &InstrumentConfig| {
            Box::new(PlainClone::new(id, config.model_name(), config.offset)) as Box<dyn CloneVisual>
        }),
    );

    registry.register(
        kinds::KEYED,
        SimpleCloneFactory::new(|id, config: &InstrumentConfig| {
            Box::new(KeyedClone::new(
                id,
                config.model_name(),
                config.key_count,
                config.offset,
            )) as Box<dyn CloneVisual>
        }),
    );

    registry.register(
        kinds::HANDED,
        SimpleCloneFactory::new(|id, config: &InstrumentConfig| {
            Box::new(HandedClone::new(
                id,
                config.model_name(),
                config.left_hands,
                config.right_hands,
                config.offset,
            )) as Box<dyn CloneVisual>
        }),
    );
}
