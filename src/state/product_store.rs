use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;

use crate::state::catalog;
use crate::state::history::RollingWindow;
use crate::types::{AbTest, AnalyticsSnapshot, HistoryPoint, Product, View};

// ---------------------------------------------------------------------------
// ProductStore
// ---------------------------------------------------------------------------

/// Owned state container for one session: the product catalog plus the
/// analytics shadow, the chart history and the active view.
///
/// Each mutator runs its closure while holding the relevant entry or lock,
/// so a read-modify-write never interleaves with another writer.
pub struct ProductStore {
    /// sku → Product
    products: DashMap<String, Product>,
    /// SKUs in catalog order; DashMap iteration order is arbitrary.
    order: Mutex<Vec<String>>,
    analytics: Mutex<AnalyticsSnapshot>,
    history: Mutex<RollingWindow<HistoryPoint>>,
    ab_tests: Mutex<Vec<AbTest>>,
    active_view: Mutex<View>,
}

impl ProductStore {
    pub fn new(analytics: AnalyticsSnapshot, history_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            products: DashMap::new(),
            order: Mutex::new(Vec::new()),
            analytics: Mutex::new(analytics),
            history: Mutex::new(RollingWindow::new(history_capacity)),
            ab_tests: Mutex::new(Vec::new()),
            active_view: Mutex::new(View::default()),
        })
    }

    /// Store populated from the built-in seed catalog.
    pub fn seeded(history_capacity: usize, now_ms: u64) -> Arc<Self> {
        let store = Self::new(catalog::seed_analytics(), history_capacity);
        store.add_products(catalog::seed_products());
        for point in catalog::seed_history(now_ms) {
            store.push_history(point);
        }
        for test in catalog::seed_ab_tests() {
            store.add_ab_test(test);
        }
        store
    }

    pub fn add_product(&self, product: Product) {
        let sku = product.sku.clone();
        if self.products.insert(sku.clone(), product).is_none() {
            lock(&self.order).push(sku);
        }
    }

    pub fn add_products(&self, products: Vec<Product>) {
        for product in products {
            self.add_product(product);
        }
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.products.contains_key(sku)
    }

    pub fn get_product(&self, sku: &str) -> Option<Product> {
        self.products.get(sku).map(|p| p.clone())
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// SKUs in catalog order.
    pub fn skus(&self) -> Vec<String> {
        lock(&self.order).clone()
    }

    /// Snapshot of every product, in catalog order.
    pub fn products(&self) -> Vec<Product> {
        self.skus()
            .iter()
            .filter_map(|sku| self.get_product(sku))
            .collect()
    }

    /// Mutate one product in place. Returns None if the SKU is unknown.
    pub fn update_product<T>(&self, sku: &str, f: impl FnOnce(&mut Product) -> T) -> Option<T> {
        let mut entry = self.products.get_mut(sku)?;
        Some(f(entry.value_mut()))
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        lock(&self.analytics).clone()
    }

    pub fn update_analytics<T>(&self, f: impl FnOnce(&mut AnalyticsSnapshot) -> T) -> T {
        let mut analytics = lock(&self.analytics);
        f(&mut *analytics)
    }

    /// Chart points, oldest first.
    pub fn history(&self) -> Vec<HistoryPoint> {
        lock(&self.history).to_vec()
    }

    pub fn push_history(&self, point: HistoryPoint) {
        lock(&self.history).push(point);
    }

    /// Build the next point from the newest one and append it under a single lock.
    pub fn extend_history(&self, f: impl FnOnce(Option<&HistoryPoint>) -> HistoryPoint) -> HistoryPoint {
        let mut history = lock(&self.history);
        let point = f(history.last());
        history.push(point);
        point
    }

    pub fn ab_tests(&self) -> Vec<AbTest> {
        lock(&self.ab_tests).clone()
    }

    pub fn add_ab_test(&self, test: AbTest) {
        lock(&self.ab_tests).push(test);
    }

    pub fn has_ab_test(&self, name: &str) -> bool {
        lock(&self.ab_tests).iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn active_view(&self) -> View {
        *lock(&self.active_view)
    }

    pub fn set_active_view(&self, view: View) {
        *lock(&self.active_view) = view;
    }
}

/// Every critical section here is a plain field update, so a poisoned lock
/// still holds consistent data.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_store_preserves_catalog_order() {
        let store = ProductStore::seeded(10, 0);
        assert_eq!(store.skus(), vec!["SKU001", "SKU002", "SKU003"]);
        assert_eq!(store.product_count(), 3);
        assert_eq!(store.history().len(), 7);
        assert_eq!(store.active_view(), View::Dashboard);
    }

    #[test]
    fn re_adding_a_sku_replaces_without_duplicating_order() {
        let store = ProductStore::seeded(10, 0);
        let mut p = store.get_product("SKU002").unwrap();
        p.current_price = 10.0;
        store.add_product(p);
        assert_eq!(store.skus().len(), 3);
        assert_eq!(store.get_product("SKU002").unwrap().current_price, 10.0);
    }

    #[test]
    fn update_unknown_sku_returns_none() {
        let store = ProductStore::seeded(10, 0);
        assert!(store.update_product("NOPE", |p| p.current_price = 1.0).is_none());
    }

    #[test]
    fn extend_history_sees_previous_point() {
        let store = ProductStore::seeded(3, 0);
        let last_revenue = store.history().last().unwrap().revenue;
        let added = store.extend_history(|prev| HistoryPoint {
            revenue: prev.map(|p| p.revenue).unwrap_or(0.0) + 1.0,
            ml_boost: 0.0,
            recorded_at_ms: 1,
        });
        assert_eq!(added.revenue, last_revenue + 1.0);
        assert_eq!(store.history().len(), 3);
    }
}
