//! Category models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{escape_like, now_timestamp};
use super::pagination::PageWindow;
use super::product::Product;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Category with its products, returned by `GET /category/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithProducts {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl Category {
    pub async fn find(db: &SqlitePool, id: &str) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn exists(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn create(db: &SqlitePool, req: &CreateCategoryRequest) -> Result<Category, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(&req.image)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Ok(Category {
            id,
            name: req.name.trim().to_string(),
            image: req.image.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// List categories in insertion order, optionally filtered by name
    pub async fn list(
        db: &SqlitePool,
        name: Option<&str>,
        window: PageWindow,
    ) -> Result<(Vec<Category>, i64), sqlx::Error> {
        let pattern = name.map(|n| format!("%{}%", escape_like(n)));
        let where_clause = if pattern.is_some() {
            "WHERE name LIKE ? ESCAPE '\\'"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) FROM categories {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(p) = &pattern {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(db).await?;

        let sql = format!(
            "SELECT * FROM categories {} ORDER BY rowid LIMIT ? OFFSET ?",
            where_clause
        );
        let mut query = sqlx::query_as::<_, Category>(&sql);
        if let Some(p) = &pattern {
            query = query.bind(p);
        }
        let items = query
            .bind(window.limit)
            .bind(window.offset())
            .fetch_all(db)
            .await?;

        Ok((items, total))
    }

    /// Apply a partial update. Returns `None` if the category does not exist.
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        req: &UpdateCategoryRequest,
    ) -> Result<Option<Category>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = COALESCE(?, name),
                image = COALESCE(?, image),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.image)
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
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn product_count(db: &SqlitePool, id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?")
            .bind(id)
            .fetch_one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;

    fn create_req(name: &str) -> CreateCategoryRequest {
        CreateCategoryRequest {
            name: name.to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_list_pagination_and_filter() {
        let db = connect("sqlite::memory:").await.unwrap();
        for i in 1..=12 {
            Category::create(&db, &create_req(&format!("Item {}", i))).await.unwrap();
        }
        Category::create(&db, &create_req("Phones")).await.unwrap();

        let (page, total) = Category::list(&db, None, PageWindow { page: 2, limit: 5 })
            .await
            .unwrap();
        assert_eq!(total, 13);
        let names: Vec<_> = page.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Item 6", "Item 7", "Item 8", "Item 9", "Item 10"]);

        let (page, total) = Category::list(&db, Some("PHONE"), PageWindow { page: 1, limit: 10 })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].name, "Phones");

        let (page, total) = Category::list(&db, Some("item 1"), PageWindow { page: 1, limit: 2 })
            .await
            .unwrap();
        // "Item 1", "Item 10", "Item 11", "Item 12"
        assert_eq!(total, 4);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_like_wildcards_are_literal() {
        let db = connect("sqlite::memory:").await.unwrap();
        Category::create(&db, &create_req("50% off")).await.unwrap();
        Category::create(&db, &create_req("500 off")).await.unwrap();

        let (_, total) = Category::list(&db, Some("0%"), PageWindow { page: 1, limit: 10 })
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_update_partial_and_missing() {
        let db = connect("sqlite::memory:").await.unwrap();
        let category = Category::create(
            &db,
            &CreateCategoryRequest {
                name: "Phones".to_string(),
                image: Some("phones.png".to_string()),
            },
        )
        .await
        .unwrap();

        let updated = Category::update(
            &db,
            &category.id,
            &UpdateCategoryRequest {
                name: Some("Mobiles".to_string()),
                image: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.name, "Mobiles");
        assert_eq!(updated.image.as_deref(), Some("phones.png"));

        let missing = Category::update(&db, "nope", &UpdateCategoryRequest::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
