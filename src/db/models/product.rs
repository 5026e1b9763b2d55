//! Product models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{escape_like, now_timestamp};
use super::pagination::{ListQuery, PageWindow};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price in minor currency units
    pub price: i64,
    pub category_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: i64,
    pub category_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<String>,
}

/// Product list query: the common list parameters plus a category filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub category_id: Option<String>,
}

/// Filters applied to a product listing
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter<'a> {
    pub name: Option<&'a str>,
    pub category_id: Option<&'a str>,
}

impl Product {
    pub async fn find(db: &SqlitePool, id: &str) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn create(db: &SqlitePool, req: &CreateProductRequest) -> Result<Product, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, category_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(req.price)
        .bind(&req.category_id)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Ok(Product {
            id,
            name: req.name.trim().to_string(),
            price: req.price,
            category_id: req.category_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// List products in insertion order with optional name/category filters
    pub async fn list(
        db: &SqlitePool,
        filter: ProductFilter<'_>,
        window: PageWindow,
    ) -> Result<(Vec<Product>, i64), sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(name) = filter.name {
            conditions.push("name LIKE ? ESCAPE '\\'");
            bindings.push(format!("%{}%", escape_like(name)));
        }

        if let Some(category_id) = filter.category_id {
            conditions.push("category_id = ?");
            bindings.push(category_id.to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM products {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for binding in &bindings {
            count_query = count_query.bind(binding);
        }
        let total = count_query.fetch_one(db).await?;

        let sql = format!(
            "SELECT * FROM products {} ORDER BY rowid LIMIT ? OFFSET ?",
            where_clause
        );
        let mut query = sqlx::query_as::<_, Product>(&sql);
        for binding in &bindings {
            query = query.bind(binding);
        }
        let items = query
            .bind(window.limit)
            .bind(window.offset())
            .fetch_all(db)
            .await?;

        Ok((items, total))
    }

    pub async fn list_by_category(
        db: &SqlitePool,
        category_id: &str,
    ) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM products WHERE category_id = ? ORDER BY rowid")
            .bind(category_id)
            .fetch_all(db)
            .await
    }

    /// Apply a partial update. Returns `None` if the product does not exist.
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        req: &UpdateProductRequest,
    ) -> Result<Option<Product>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?, name),
                price = COALESCE(?, price),
                category_id = COALESCE(?, category_id),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.price)
        .bind(&req.category_id)
        .bind(now_timestamp())
        .bind(id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find(db, id).await
    }

    pub async fn delete(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, Category, CreateCategoryRequest};

    async fn category(db: &SqlitePool, name: &str) -> Category {
        Category::create(
            db,
            &CreateCategoryRequest {
                name: name.to_string(),
                image: None,
            },
        )
        .await
        .unwrap()
    }

    fn product(name: &str, price: i64, category_id: &str) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            price,
            category_id: category_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_category() {
        let db = connect("sqlite::memory:").await.unwrap();

        let err = Product::create(&db, &product("Phone", 500, "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = connect("sqlite::memory:").await.unwrap();
        let phones = category(&db, "Phones").await;
        let laptops = category(&db, "Laptops").await;

        Product::create(&db, &product("Smartphone X", 500, &phones.id)).await.unwrap();
        Product::create(&db, &product("Smartphone Y", 600, &phones.id)).await.unwrap();
        Product::create(&db, &product("Smart Laptop", 1500, &laptops.id)).await.unwrap();

        let window = PageWindow { page: 1, limit: 10 };

        let (_, total) = Product::list(&db, ProductFilter::default(), window).await.unwrap();
        assert_eq!(total, 3);

        let filter = ProductFilter {
            name: Some("smart"),
            category_id: Some(&laptops.id),
        };
        let (items, total) = Product::list(&db, filter, window).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "Smart Laptop");

        let in_phones = Product::list_by_category(&db, &phones.id).await.unwrap();
        assert_eq!(in_phones.len(), 2);
        assert_eq!(Category::product_count(&db, &phones.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let db = connect("sqlite::memory:").await.unwrap();
        let phones = category(&db, "Phones").await;
        let created = Product::create(&db, &product("Phone", 500, &phones.id)).await.unwrap();

        let updated = Product::update(
            &db,
            &created.id,
            &UpdateProductRequest {
                price: Some(450),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.price, 450);
        assert_eq!(updated.name, "Phone");
        assert_eq!(updated.category_id, phones.id);
    }
}
