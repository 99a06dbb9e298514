use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use concierge_core::collaborators::{AnalyticsSink, Catalog, OrderDirectory, SessionCache};
use concierge_core::domain::analytics::AnalyticsRecord;
use concierge_core::domain::intent::{BrowseTrigger, OrderId};
use concierge_core::domain::order::Order;
use concierge_core::domain::product::{Product, ProductId};
use concierge_core::domain::vision::ClothingAttributes;
use concierge_core::errors::CollaboratorError;

#[derive(Debug, Default)]
struct CachedList {
    values: VecDeque<String>,
    expires_at: Option<Instant>,
}

impl CachedList {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|deadline| deadline <= now).unwrap_or(false)
    }
}

#[derive(Default)]
pub struct InMemorySessionCache {
    lists: RwLock<HashMap<String, CachedList>>,
}

impl InMemorySessionCache {
    pub async fn len(&self, key: &str) -> usize {
        let lists = self.lists.read().await;
        lists
            .get(key)
            .filter(|list| !list.is_expired(Instant::now()))
            .map(|list| list.values.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn push(&self, key: &str, value: String) -> Result<(), CollaboratorError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_owned()).or_default();
        if list.is_expired(Instant::now()) {
            *list = CachedList::default();
        }
        list.values.push_back(value);
        Ok(())
    }

    async fn range_last(&self, key: &str, count: usize) -> Result<Vec<String>, CollaboratorError> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        if list.is_expired(Instant::now()) {
            lists.remove(key);
            return Ok(Vec::new());
        }

        let skip = list.values.len().saturating_sub(count);
        Ok(list.values.iter().skip(skip).cloned().collect())
    }

    async fn trim_to_last(&self, key: &str, count: usize) -> Result<(), CollaboratorError> {
        let mut lists = self.lists.write().await;
        if let Some(list) = lists.get_mut(key) {
            while list.values.len() > count {
                list.values.pop_front();
            }
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CollaboratorError> {
        let mut lists = self.lists.write().await;
        if let Some(list) = lists.get_mut(key) {
            list.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError> {
        let mut lists = self.lists.write().await;
        lists.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderDirectory {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderDirectory {
    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.to_ascii_uppercase(), order);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderDirectory {
    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>, CollaboratorError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id.0.to_ascii_uppercase()).cloned())
    }
}

#[derive(Clone, Debug)]
struct CatalogEntry {
    product: Product,
    view_count: u32,
}

/// Catalog held in insertion order; later insertions count as newer arrivals.
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub async fn insert(&self, product: Product, view_count: u32) {
        let mut entries = self.entries.write().await;
        entries.retain(|entry| entry.product.id != product.id);
        entries.push(CatalogEntry { product, view_count });
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn browse(
        &self,
        trigger: BrowseTrigger,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError> {
        let entries = self.entries.read().await;
        let mut newest_first = entries.iter().rev().cloned().collect::<Vec<_>>();

        match trigger {
            BrowseTrigger::NewArrivals => {}
            BrowseTrigger::Trending => {
                newest_first.sort_by(|left, right| right.view_count.cmp(&left.view_count));
            }
            BrowseTrigger::Sale => newest_first.retain(|entry| entry.product.on_sale),
        }

        Ok(newest_first.into_iter().take(limit).map(|entry| entry.product).collect())
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, CollaboratorError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|entry| &entry.product.id == id).map(|entry| entry.product.clone()))
    }

    async fn search_by_attributes(
        &self,
        attributes: &ClothingAttributes,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError> {
        let entries = self.entries.read().await;
        let newest_first = entries.iter().rev().map(|entry| entry.product.clone()).collect();
        Ok(attributes.rank(newest_first, limit))
    }
}

#[derive(Default)]
pub struct InMemoryAnalyticsSink {
    records: RwLock<Vec<AnalyticsRecord>>,
}

impl InMemoryAnalyticsSink {
    pub async fn records(&self) -> Vec<AnalyticsRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryAnalyticsSink {
    async fn record(&self, record: &AnalyticsRecord) -> Result<(), CollaboratorError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;

    use concierge_core::collaborators::{Catalog, OrderDirectory, SessionCache};
    use concierge_core::domain::intent::{BrowseTrigger, OrderId};
    use concierge_core::domain::order::{Order, OrderStatus};
    use concierge_core::domain::product::{Product, ProductId};
    use concierge_core::domain::vision::ClothingAttributes;

    use crate::repositories::{InMemoryCatalog, InMemoryOrderDirectory, InMemorySessionCache};

    #[tokio::test]
    async fn session_cache_trims_and_expires() {
        let cache = InMemorySessionCache::default();
        for index in 0..15 {
            cache.push("session:a", format!("v{index}")).await.expect("push");
        }
        cache.trim_to_last("session:a", 10).await.expect("trim");
        assert_eq!(cache.len("session:a").await, 10);
        assert_eq!(
            cache.range_last("session:a", 2).await.expect("range"),
            vec!["v13".to_owned(), "v14".to_owned()]
        );

        cache.expire("session:a", Duration::from_millis(1)).await.expect("expire");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.range_last("session:a", 10).await.expect("range").is_empty());

        cache.push("session:a", "fresh".to_owned()).await.expect("push after expiry");
        assert_eq!(cache.range_last("session:a", 10).await.expect("range"), vec!["fresh"]);
    }

    #[tokio::test]
    async fn order_directory_matches_case_insensitively() {
        let directory = InMemoryOrderDirectory::default();
        directory
            .insert(Order {
                id: OrderId("ORD-2024-001234".to_owned()),
                status: OrderStatus::Processing,
                items: Vec::new(),
                total_amount: None,
                currency: "USD".to_owned(),
                tracking_number: None,
                carrier: None,
                estimated_delivery: None,
                delivered_at: None,
            })
            .await;

        let found = directory
            .find_order(&OrderId("ord-2024-001234".to_owned()))
            .await
            .expect("lookup");
        assert_eq!(found.map(|order| order.status), Some(OrderStatus::Processing));
    }

    #[tokio::test]
    async fn catalog_browse_follows_trigger_rules() {
        let catalog = InMemoryCatalog::default();
        for (id, on_sale, views) in [("a", false, 3), ("b", true, 9), ("c", true, 1)] {
            catalog
                .insert(
                    Product {
                        id: ProductId(id.to_owned()),
                        name: id.to_uppercase(),
                        description: None,
                        price: Decimal::new(1_000, 2),
                        currency: "USD".to_owned(),
                        sizes: Vec::new(),
                        colors: Vec::new(),
                        on_sale,
                    },
                    views,
                )
                .await;
        }

        let ids = |products: Vec<Product>| {
            products.into_iter().map(|product| product.id.0).collect::<Vec<_>>()
        };

        assert_eq!(
            ids(catalog.browse(BrowseTrigger::NewArrivals, 2).await.expect("browse")),
            vec!["c", "b"]
        );
        assert_eq!(
            ids(catalog.browse(BrowseTrigger::Trending, 10).await.expect("browse")),
            vec!["b", "a", "c"]
        );
        assert_eq!(
            ids(catalog.browse(BrowseTrigger::Sale, 10).await.expect("browse")),
            vec!["c", "b"]
        );
    }

    #[tokio::test]
    async fn attribute_search_prefers_the_garment_type() {
        let catalog = InMemoryCatalog::default();
        for (id, name, colors) in [
            ("scarf", "Silk Scarf", vec!["Black".to_owned()]),
            ("dress", "Slip Dress", vec!["Black".to_owned()]),
            ("hat", "Straw Hat", vec!["Natural".to_owned()]),
        ] {
            catalog
                .insert(
                    Product {
                        id: ProductId(id.to_owned()),
                        name: name.to_owned(),
                        description: None,
                        price: Decimal::new(5_000, 2),
                        currency: "USD".to_owned(),
                        sizes: Vec::new(),
                        colors,
                        on_sale: false,
                    },
                    0,
                )
                .await;
        }

        let attributes = ClothingAttributes {
            garment_type: "dress".to_owned(),
            colors: vec!["black".to_owned()],
            ..ClothingAttributes::default()
        };
        let found = catalog.search_by_attributes(&attributes, 5).await.expect("search");
        let ids = found.into_iter().map(|product| product.id.0).collect::<Vec<_>>();
        assert_eq!(ids, vec!["dress", "scarf"]);
    }
}
