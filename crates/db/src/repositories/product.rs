use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::collaborators::Catalog;
use concierge_core::domain::intent::BrowseTrigger;
use concierge_core::domain::product::{Product, ProductId};
use concierge_core::domain::vision::ClothingAttributes;
use concierge_core::errors::CollaboratorError;

use super::{parse_json_list, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, currency, sizes_json, colors_json, on_sale";

pub struct SqlCatalog {
    pool: DbPool,
}

impl SqlCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(product_from_row).transpose()
    }

    pub async fn list_for_trigger(
        &self,
        trigger: BrowseTrigger,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let filter_and_order = match trigger {
            BrowseTrigger::NewArrivals => "WHERE is_active = 1 ORDER BY created_at DESC, id ASC",
            BrowseTrigger::Trending => {
                "WHERE is_active = 1 ORDER BY view_count DESC, created_at DESC, id ASC"
            }
            BrowseTrigger::Sale => {
                "WHERE is_active = 1 AND on_sale = 1 ORDER BY created_at DESC, id ASC"
            }
        };

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product {filter_and_order} LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    /// Active products ranked by how many photo attributes they mention.
    pub async fn search_by_attributes(
        &self,
        attributes: &ClothingAttributes,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE is_active = 1 ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let products = rows.into_iter().map(product_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(attributes.rank(products, limit))
    }

    pub async fn save(&self, product: &Product, view_count: u32) -> Result<(), RepositoryError> {
        let sizes = serde_json::to_string(&product.sizes)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let colors = serde_json::to_string(&product.colors)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO product (
                id,
                name,
                description,
                price,
                currency,
                sizes_json,
                colors_json,
                on_sale,
                is_active,
                view_count,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                currency = excluded.currency,
                sizes_json = excluded.sizes_json,
                colors_json = excluded.colors_json,
                on_sale = excluded.on_sale,
                view_count = excluded.view_count",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price.to_string())
        .bind(&product.currency)
        .bind(sizes)
        .bind(colors)
        .bind(product.on_sale)
        .bind(i64::from(view_count))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn browse(
        &self,
        trigger: BrowseTrigger,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError> {
        Ok(self.list_for_trigger(trigger, limit).await?)
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, CollaboratorError> {
        Ok(self.find_by_id(id).await?)
    }

    async fn search_by_attributes(
        &self,
        attributes: &ClothingAttributes,
        limit: usize,
    ) -> Result<Vec<Product>, CollaboratorError> {
        Ok(SqlCatalog::search_by_attributes(self, attributes, limit).await?)
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let price_raw = row.try_get::<String, _>("price")?;
    let price = Decimal::from_str(&price_raw)
        .map_err(|_| RepositoryError::Decode(format!("invalid product price `{price_raw}`")))?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price,
        currency: row.try_get("currency")?,
        sizes: parse_json_list("sizes_json", &row.try_get::<String, _>("sizes_json")?)?,
        colors: parse_json_list("colors_json", &row.try_get::<String, _>("colors_json")?)?,
        on_sale: row.try_get("on_sale")?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use concierge_core::collaborators::Catalog;
    use concierge_core::domain::intent::BrowseTrigger;
    use concierge_core::domain::product::{Product, ProductId};
    use concierge_core::domain::vision::ClothingAttributes;

    use super::SqlCatalog;
    use crate::{connect_with_settings, migrations};

    async fn catalog() -> SqlCatalog {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlCatalog::new(pool)
    }

    fn product(id: &str, on_sale: bool) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            name: format!("Product {id}"),
            description: Some("Soft cotton".to_owned()),
            price: Decimal::new(2_999, 2),
            currency: "USD".to_owned(),
            sizes: vec!["S".to_owned(), "M".to_owned()],
            colors: vec!["navy".to_owned()],
            on_sale,
        }
    }

    #[tokio::test]
    async fn saved_product_is_found_by_id() {
        let catalog = catalog().await;
        let saved = product("p-1", false);
        catalog.save(&saved, 0).await.expect("save");

        let found = catalog.find_product(&saved.id).await.expect("find");
        assert_eq!(found, Some(saved));
    }

    #[tokio::test]
    async fn trending_orders_by_views_and_sale_filters() {
        let catalog = catalog().await;
        catalog.save(&product("p-1", false), 5).await.expect("save");
        catalog.save(&product("p-2", true), 50).await.expect("save");
        catalog.save(&product("p-3", true), 1).await.expect("save");

        let trending = catalog.browse(BrowseTrigger::Trending, 10).await.expect("trending");
        let ids = trending.iter().map(|product| product.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["p-2", "p-1", "p-3"]);

        let sale = catalog.browse(BrowseTrigger::Sale, 10).await.expect("sale");
        assert_eq!(sale.len(), 2);
        assert!(sale.iter().all(|product| product.on_sale));
    }

    #[tokio::test]
    async fn inactive_products_are_hidden_and_limit_applies() {
        let catalog = catalog().await;
        for index in 0..4 {
            catalog.save(&product(&format!("p-{index}"), false), 0).await.expect("save");
        }
        sqlx::query("UPDATE product SET is_active = 0 WHERE id = 'p-0'")
            .execute(&catalog.pool)
            .await
            .expect("hide p-0");

        let listed = catalog.browse(BrowseTrigger::NewArrivals, 2).await.expect("browse");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|product| product.id.0 != "p-0"));
    }

    #[tokio::test]
    async fn attribute_search_ranks_active_matches() {
        let catalog = catalog().await;
        let mut dress = product("p-1", false);
        dress.name = "Navy Wrap Dress".to_owned();
        catalog.save(&dress, 0).await.expect("save");
        catalog.save(&product("p-2", false), 0).await.expect("save");
        let mut hidden = product("p-3", false);
        hidden.name = "Navy Slip Dress".to_owned();
        catalog.save(&hidden, 0).await.expect("save");
        sqlx::query("UPDATE product SET is_active = 0 WHERE id = 'p-3'")
            .execute(&catalog.pool)
            .await
            .expect("hide p-3");

        let attributes = ClothingAttributes {
            garment_type: "Dress".to_owned(),
            colors: vec!["navy".to_owned()],
            ..ClothingAttributes::default()
        };
        let found = catalog.search_by_attributes(&attributes, 5).await.expect("search");
        let ids = found.iter().map(|product| product.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["p-1", "p-2"]);
    }
}
