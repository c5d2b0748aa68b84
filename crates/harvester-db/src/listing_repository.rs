use chrono::{DateTime, Utc};
use harvester_core::error::AppError;
use harvester_core::models::{Listing, PropertyDetails, Source, StoreOutcome};
use harvester_core::traits::ListingStore;
use sqlx::{PgPool, Pool, Postgres, Transaction};

/// Idempotent listing persistence in PostgreSQL.
///
/// A listing is written as an organization (find-or-create), a `posts` row
/// and one detail row in the table of its property type, all in one
/// transaction. `(source, external_id)` on `posts` is the idempotency key.
#[derive(Clone)]
pub struct ListingRepository {
    pool: Pool<Postgres>,
}

/// A stored post as read back from the database.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredPost {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub type_of_property: String,
    pub type_of_service: String,
    pub url: String,
    pub title: String,
    pub total_price_usd: i64,
    pub price_per_sqm: Option<f64>,
    pub polygon_id: Option<i64>,
    pub content_hash: String,
    pub organization_url: String,
    pub created_at: DateTime<Utc>,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn store_if_absent(&self, listing: &Listing) -> Result<StoreOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let organization_id = upsert_organization(&mut tx, listing).await?;

        let header = &listing.header;
        let post_id: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO posts (
                source, external_id, type_of_property, type_of_service, organization_id,
                url, title, description, total_price_usd, price_per_sqm,
                polygon_id, polygon_keyword, content_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (source, external_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(header.source.as_str())
        .bind(&header.external_id)
        .bind(header.type_of_property.as_str())
        .bind(header.type_of_service.as_str())
        .bind(organization_id)
        .bind(&header.url)
        .bind(&header.title)
        .bind(&header.description)
        .bind(listing.total_price_usd)
        .bind(listing.price_per_sqm())
        .bind(header.polygon_id)
        .bind(&header.polygon_keyword)
        .bind(&listing.content_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some((post_id,)) = post_id else {
            tx.rollback().await.map_err(db_error)?;
            tracing::debug!(
                source = header.source.as_str(),
                external_id = %header.external_id,
                "Listing already stored"
            );
            return Ok(StoreOutcome::AlreadyExists);
        };

        insert_details(&mut tx, post_id, &listing.details).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(StoreOutcome::Created)
    }

    pub async fn contains_url(&self, url: &str) -> Result<bool, AppError> {
        let (exists,): (bool,) =
            sqlx::query_as(r#"SELECT EXISTS (SELECT 1 FROM posts WHERE url = $1)"#)
                .bind(url)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(exists)
    }

    pub async fn find_post(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<StoredPost>, AppError> {
        sqlx::query_as::<_, StoredPost>(
            r#"
            SELECT p.id, p.source, p.external_id, p.type_of_property, p.type_of_service,
                   p.url, p.title, p.total_price_usd, p.price_per_sqm, p.polygon_id,
                   p.content_hash, o.url AS organization_url, p.created_at
            FROM posts p
            JOIN organizations o ON o.id = p.organization_id
            WHERE p.source = $1 AND p.external_id = $2
            "#,
        )
        .bind(source.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    /// Number of stored posts.
    pub async fn count(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM posts"#)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count)
    }
}

async fn upsert_organization(
    tx: &mut Transaction<'_, Postgres>,
    listing: &Listing,
) -> Result<i64, AppError> {
    // DO UPDATE so that RETURNING yields the id of an existing row too.
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO organizations (platform, url)
        VALUES ($1, $2)
        ON CONFLICT (platform, url) DO UPDATE SET url = EXCLUDED.url
        RETURNING id
        "#,
    )
    .bind(listing.header.source.as_str())
    .bind(&listing.header.organization_url)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(id)
}

async fn insert_details(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    details: &PropertyDetails,
) -> Result<(), AppError> {
    let query = match details {
        PropertyDetails::Apartment(d) => sqlx::query(
            r#"
            INSERT INTO apartments (
                post_id, rooms, floor, total_floor, total_area_sqm,
                is_new_building, has_furniture, repair, building_material
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(post_id)
        .bind(d.rooms)
        .bind(d.floor)
        .bind(d.total_floor)
        .bind(d.total_area_sqm)
        .bind(d.is_new_building)
        .bind(d.has_furniture)
        .bind(d.repair.map(|r| r.as_str()))
        .bind(d.building_material.map(|m| m.as_str())),
        PropertyDetails::Commerce(d) => sqlx::query(
            r#"
            INSERT INTO commerce_properties (
                post_id, floor, total_floor, total_area_sqm, land_area_sqm, repair, purpose
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post_id)
        .bind(d.floor)
        .bind(d.total_floor)
        .bind(d.total_area_sqm)
        .bind(d.land_area_sqm)
        .bind(d.repair.map(|r| r.as_str()))
        .bind(d.purpose.map(|p| p.as_str())),
        PropertyDetails::House(d) => sqlx::query(
            r#"
            INSERT INTO houses (
                post_id, rooms, total_floor, total_area_sqm, land_area_sqm,
                repair, building_material, house_type, has_furniture
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(post_id)
        .bind(d.rooms)
        .bind(d.total_floor)
        .bind(d.total_area_sqm)
        .bind(d.land_area_sqm)
        .bind(d.repair.map(|r| r.as_str()))
        .bind(d.building_material.map(|m| m.as_str()))
        .bind(d.house_type.map(|h| h.as_str()))
        .bind(d.has_furniture),
    };

    query.execute(&mut **tx).await.map_err(db_error)?;
    Ok(())
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

impl ListingStore for ListingRepository {
    async fn store_if_absent(&self, listing: &Listing) -> Result<StoreOutcome, AppError> {
        ListingRepository::store_if_absent(self, listing).await
    }

    async fn contains_url(&self, url: &str) -> Result<bool, AppError> {
        ListingRepository::contains_url(self, url).await
    }
}
