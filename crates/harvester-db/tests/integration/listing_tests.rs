use harvester_core::models::{Source, StoreOutcome};
use harvester_db::{Database, ListingRepository};

use crate::integration::common::{apartment, house, setup_test_db};

#[tokio::test]
async fn store_and_find_apartment() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool.clone());
    let listing = apartment("48213377");

    let outcome = repo.store_if_absent(&listing).await.unwrap();
    assert_eq!(outcome, StoreOutcome::Created);

    let post = repo
        .find_post(Source::Olx, "48213377")
        .await
        .unwrap()
        .expect("Should find the post");
    assert_eq!(post.type_of_property, "apartment");
    assert_eq!(post.type_of_service, "sale");
    assert_eq!(post.url, listing.header.url);
    assert_eq!(post.total_price_usd, 62_000);
    assert_eq!(post.price_per_sqm, Some(794.87));
    assert_eq!(post.polygon_id, Some(7));
    assert_eq!(post.content_hash, listing.content_hash);
    assert_eq!(post.organization_url, "https://www.olx.uz/list/user/Xk2p9/");

    let (rooms, repair): (i16, Option<String>) =
        sqlx::query_as("SELECT rooms, repair FROM apartments WHERE post_id = $1")
            .bind(post.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rooms, 3);
    assert_eq!(repair.as_deref(), Some("euro"));
}

#[tokio::test]
async fn second_store_is_a_no_op() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool.clone());
    let listing = apartment("100");

    assert_eq!(
        repo.store_if_absent(&listing).await.unwrap(),
        StoreOutcome::Created
    );

    let mut changed = listing.clone();
    changed.total_price_usd = 1;
    assert_eq!(
        repo.store_if_absent(&changed).await.unwrap(),
        StoreOutcome::AlreadyExists
    );

    assert_eq!(repo.count().await.unwrap(), 1);
    let post = repo.find_post(Source::Olx, "100").await.unwrap().unwrap();
    assert_eq!(post.total_price_usd, 62_000);

    let (details,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM apartments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(details, 1);
}

#[tokio::test]
async fn organizations_are_shared() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool.clone());

    repo.store_if_absent(&apartment("1")).await.unwrap();
    repo.store_if_absent(&house("2")).await.unwrap();

    let (organizations,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(organizations, 1);
    assert_eq!(repo.count().await.unwrap(), 2);

    let (land,): (Option<i64>,) = sqlx::query_as(
        "SELECT h.land_area_sqm FROM houses h JOIN posts p ON p.id = h.post_id WHERE p.external_id = '2'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(land, Some(400));
}

#[tokio::test]
async fn concurrent_stores_create_one_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let listing = apartment("777");

    let (a, b) = tokio::join!(repo.store_if_absent(&listing), repo.store_if_absent(&listing));
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| o.as_str());

    assert_eq!(
        outcomes,
        vec![StoreOutcome::AlreadyExists, StoreOutcome::Created]
    );
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn contains_checks() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let listing = house("55");

    assert!(!repo.contains_url(&listing.header.url).await.unwrap());
    assert!(repo.find_post(Source::Olx, "55").await.unwrap().is_none());

    repo.store_if_absent(&listing).await.unwrap();

    assert!(repo.contains_url(&listing.header.url).await.unwrap());
    assert!(repo.find_post(Source::Olx, "55").await.unwrap().is_some());
    assert!(!repo.contains_url("https://www.olx.uz/other").await.unwrap());
}

#[tokio::test]
async fn health_check_and_count() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);
    db.health_check().await.unwrap();

    let repo = db.listing_repo();
    assert_eq!(repo.count().await.unwrap(), 0);
    repo.store_if_absent(&apartment("1")).await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 1);
}
