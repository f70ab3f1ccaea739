//! Record store behavior against PostgreSQL.
//!
//! Runs only when `COLDVAULT_TEST_POSTGRES_URL` points at a disposable
//! database; otherwise each test returns early.

mod common;

use common::fixtures::{self, Specimen};
use coldvault_metadata::{
    MetadataStore, PostgresStore, Provider, ProviderRepo, RecordRepo, RecordStore, WhereClause,
};
use std::sync::Arc;

async fn postgres() -> Option<Arc<dyn MetadataStore>> {
    let Ok(url) = std::env::var("COLDVAULT_TEST_POSTGRES_URL") else {
        eprintln!("COLDVAULT_TEST_POSTGRES_URL not set, skipping");
        return None;
    };
    let store = PostgresStore::from_url(&url, 4)
        .await
        .expect("Failed to connect to PostgreSQL");
    Some(Arc::new(store))
}

#[tokio::test]
async fn test_postgres_round_trip_and_lifecycle() {
    let Some(store) = postgres().await else {
        return;
    };
    let specimens = RecordStore::<Specimen>::new(store.clone());
    specimens.drop_table().await.unwrap();
    specimens.create_table().await.unwrap();
    assert!(store.table_exists("specimen").await.unwrap());

    let original = Specimen::sample();
    specimens.insert(std::slice::from_ref(&original)).await.unwrap();
    let found = specimens
        .search(&[WhereClause::eq("id", original.id)])
        .await
        .unwrap();
    assert_eq!(found, vec![original]);

    specimens.drop_table().await.unwrap();
    assert!(!store.table_exists("specimen").await.unwrap());
}

#[tokio::test]
async fn test_postgres_reservation_is_conditional() {
    let Some(store) = postgres().await else {
        return;
    };
    let providers = RecordStore::<Provider>::new(store.clone());
    providers.create_table().await.unwrap();

    let provider = fixtures::provider(1_000, 0);
    providers.insert(std::slice::from_ref(&provider)).await.unwrap();
    assert!(store.reserve_capacity(provider.id, 1_000).await.unwrap());
    assert!(!store.reserve_capacity(provider.id, 1).await.unwrap());
    store.release_capacity(provider.id, 2_000).await.unwrap();
    assert_eq!(
        store.get_provider(provider.id).await.unwrap().unwrap().consumed_bytes,
        0
    );

    providers
        .delete(&[WhereClause::eq("id", provider.id)])
        .await
        .unwrap();
}
