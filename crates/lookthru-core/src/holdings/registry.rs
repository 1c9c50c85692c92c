//! Scraper adapter registry.
//!
//! Adapters register under a stable provider key; funds are assigned
//! to a provider explicitly (from configuration or prior runs). A fund
//! without an assignment has no scraper tier.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::Identifier;
use crate::external::ScraperAdapter;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn ScraperAdapter>>,
    assignments: BTreeMap<Identifier, &'static str>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its provider key, replacing any
    /// previous adapter for the same provider.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ScraperAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Assign a fund to a provider. The provider does not need to be
    /// registered yet; the hint survives for error messages either way.
    pub fn assign(&mut self, fund: Identifier, provider: &'static str) {
        self.assignments.insert(fund, provider);
    }

    /// Provider key assigned to a fund, registered or not.
    #[must_use]
    pub fn provider_hint(&self, fund: &Identifier) -> Option<&'static str> {
        self.assignments.get(fund).copied()
    }

    /// Adapter for a fund, if one is assigned and registered.
    #[must_use]
    pub fn adapter_for(&self, fund: &Identifier) -> Option<&Arc<dyn ScraperAdapter>> {
        let provider = self.assignments.get(fund)?;
        self.adapters.get(provider)
    }

    #[must_use]
    pub fn registered_providers(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{BoxFuture, ExternalError};
    use crate::schema::RawHolding;

    struct FakeAdapter(&'static str);

    impl ScraperAdapter for FakeAdapter {
        fn provider(&self) -> &'static str {
            self.0
        }

        fn fetch_holdings<'a>(
            &'a self,
            _identifier: &'a Identifier,
        ) -> BoxFuture<'a, Result<Vec<RawHolding>, ExternalError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn fund() -> Identifier {
        Identifier::parse("IE00B4L5Y983").expect("valid identifier")
    }

    #[test]
    fn resolves_adapter_through_assignment() {
        let mut registry = AdapterRegistry::new();
        registry.register_adapter(Arc::new(FakeAdapter("ishares")));

        assert!(registry.adapter_for(&fund()).is_none());

        registry.assign(fund(), "ishares");
        let adapter = registry.adapter_for(&fund()).expect("assigned");
        assert_eq!(adapter.provider(), "ishares");
        assert_eq!(registry.provider_hint(&fund()), Some("ishares"));
    }

    #[test]
    fn assignment_without_registration_keeps_the_hint() {
        let mut registry = AdapterRegistry::new();
        registry.assign(fund(), "vanguard");

        assert!(registry.adapter_for(&fund()).is_none());
        assert_eq!(registry.provider_hint(&fund()), Some("vanguard"));
    }
}
