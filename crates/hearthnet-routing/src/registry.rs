//! Named strategy lookup and active-strategy selection

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use hearthnet_core::SimError;

use crate::broadcast::BroadcastStrategy;
use crate::connection::ConnectionBasedStrategy;
use crate::direct::DirectStrategy;
use crate::greedy::GreedyStrategy;
use crate::random::RandomStrategy;
use crate::strategy::RoutingStrategy;

/// Holds every registered strategy behind its name and tracks which one is
/// active. Strategies are shared `Arc`s so the engine can keep a handle
/// across registry mutations.
pub struct StrategyRegistry {
    strategies: BTreeMap<&'static str, Arc<dyn RoutingStrategy>>,
    active: &'static str,
}

impl StrategyRegistry {
    /// Registry with the five built-in strategies, `greedy` active
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
            active: "greedy",
        };
        registry.register(Arc::new(BroadcastStrategy::new()));
        registry.register(Arc::new(ConnectionBasedStrategy::new()));
        registry.register(Arc::new(DirectStrategy::new()));
        registry.register(Arc::new(GreedyStrategy::new()));
        registry.register(Arc::new(RandomStrategy::new()));
        registry
    }

    /// Empty registry for hosts that bring their own strategies
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
            active: "",
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn RoutingStrategy>) {
        if self.strategies.is_empty() {
            self.active = strategy.name();
        }
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RoutingStrategy>, SimError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::UnknownStrategy(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }

    pub fn active_name(&self) -> &'static str {
        self.active
    }

    pub fn active(&self) -> Option<Arc<dyn RoutingStrategy>> {
        self.strategies.get(self.active).cloned()
    }

    pub fn set_active(&mut self, name: &str) -> Result<(), SimError> {
        let (&key, _) = self
            .strategies
            .get_key_value(name)
            .ok_or_else(|| SimError::UnknownStrategy(name.to_string()))?;
        info!(strategy = key, "active routing strategy changed");
        self.active = key;
        Ok(())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}
