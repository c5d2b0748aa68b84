use harvester_core::models::{
    ApartmentDetails, HouseDetails, Listing, ListingHeader, PropertyDetails, Repair, Source,
    TypeOfProperty, TypeOfService, compute_hash,
};
use harvester_db::Database;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Spins up a PostgreSQL container, migrates it and returns a connected pool.
///
/// Dropping the `ContainerAsync` stops the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "harvester_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string =
        format!("postgresql://postgres:postgres@{host}:{port}/harvester_test");

    // The server restarts once after init; retry until it accepts connections.
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    Database::from_pool(pool.clone())
        .migrate()
        .await
        .expect("Failed to run migrations");

    (pool, container)
}

pub fn apartment(external_id: &str) -> Listing {
    Listing {
        header: header(TypeOfProperty::Apartment, external_id),
        total_price_usd: 62_000,
        details: PropertyDetails::Apartment(ApartmentDetails {
            rooms: 3,
            floor: 4,
            total_floor: 9,
            total_area_sqm: 78,
            is_new_building: false,
            has_furniture: true,
            repair: Some(Repair::Euro),
            building_material: None,
        }),
        content_hash: compute_hash(external_id),
    }
}

pub fn house(external_id: &str) -> Listing {
    Listing {
        header: header(TypeOfProperty::House, external_id),
        total_price_usd: 800,
        details: PropertyDetails::House(HouseDetails {
            total_area_sqm: Some(150),
            land_area_sqm: Some(400),
            ..Default::default()
        }),
        content_hash: compute_hash(external_id),
    }
}

fn header(type_of_property: TypeOfProperty, external_id: &str) -> ListingHeader {
    ListingHeader {
        type_of_property,
        type_of_service: TypeOfService::Sale,
        source: Source::Olx,
        external_id: external_id.to_string(),
        organization_url: "https://www.olx.uz/list/user/Xk2p9/".into(),
        title: format!("Объявление {external_id}"),
        description: "Описание".into(),
        url: format!("https://www.olx.uz/d/obyavlenie/item-ID{external_id}.html"),
        polygon_id: Some(7),
        polygon_keyword: Some("чиланзар".into()),
    }
}
