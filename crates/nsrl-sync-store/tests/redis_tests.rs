#![cfg(feature = "redis")]

use nsrl_sync::HashSetStore;
use nsrl_sync_store::RedisHashStore;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into())
}

#[tokio::test]
#[ignore = "requires redis"]
async fn sadd_and_sismember() {
    let store = RedisHashStore::connect(&redis_url()).await.unwrap();
    let key = format!("nsrl-sync-test-{}", std::process::id());

    store
        .add_members(&key, &["AA".to_owned(), "BB".to_owned(), "AA".to_owned()])
        .await
        .unwrap();

    assert!(store.is_member(&key, "AA").await.unwrap());
    assert!(!store.is_member(&key, "CC").await.unwrap());
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let result = RedisHashStore::connect("redis://127.0.0.1:9/").await;
    assert!(matches!(result, Err(nsrl_sync::StoreError::Unavailable(_))));
}
