use gatekeeper_service::caching::CacheError;
use gatekeeper_service::content::CollectionName;
use serde_json::json;

use crate::utils::{request_headers, setup_governance};

fn name(name: &str) -> CollectionName {
    CollectionName::new(name).unwrap()
}

#[tokio::test]
async fn test_edits_show_up_after_invalidation() {
    let (governance, content_dir) = setup_governance(None);
    let pages = name("pages");
    gatekeeper_test::write_collection(content_dir.path(), "pages", &json!([{"title": "v1"}]));

    let cached = governance.cached_collection(&pages).await.unwrap().unwrap();
    assert_eq!(*cached, json!([{"title": "v1"}]));

    gatekeeper_test::write_collection(content_dir.path(), "pages", &json!([{"title": "v2"}]));

    let cached = governance.cached_collection(&pages).await.unwrap().unwrap();
    assert_eq!(*cached, json!([{"title": "v1"}]));
    let fresh = governance.fresh_collection(&pages).await.unwrap();
    assert_eq!(fresh, Some(json!([{"title": "v2"}])));

    governance.invalidate_collection(&pages);
    let cached = governance.cached_collection(&pages).await.unwrap().unwrap();
    assert_eq!(*cached, json!([{"title": "v2"}]));
}

#[tokio::test]
async fn test_missing_collections_are_cached() {
    let (governance, content_dir) = setup_governance(None);
    let news = name("news");

    assert_eq!(governance.cached_collection(&news).await.unwrap(), None);

    gatekeeper_test::write_collection(content_dir.path(), "news", &json!([]));
    assert_eq!(governance.cached_collection(&news).await.unwrap(), None);

    governance.invalidate_all_content();
    let cached = governance.cached_collection(&news).await.unwrap();
    assert_eq!(cached.as_deref(), Some(&json!([])));
}

#[tokio::test]
async fn test_broken_collection_is_not_cached() {
    let (governance, content_dir) = setup_governance(None);
    let pages = name("pages");
    std::fs::write(content_dir.path().join("pages.json"), "[{").unwrap();

    let err = governance.cached_collection(&pages).await.unwrap_err();
    match &err {
        CacheError::Fetch { key, details } => {
            assert_eq!(key, "pages");
            assert!(details.starts_with("invalid JSON in"), "{details}");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Failures are not stored, so fixing the file is enough.
    gatekeeper_test::write_collection(content_dir.path(), "pages", &json!([]));
    assert!(governance.cached_collection(&pages).await.unwrap().is_some());
}

#[tokio::test]
async fn test_rate_limit_scopes() {
    let (governance, _content_dir) = setup_governance(None);
    let client = request_headers("203.0.113.1", None);

    // The admin scope allows 30 requests per minute by default.
    for _ in 0..30 {
        assert!(governance.check_rate_limit("admin", &client).success);
    }
    let outcome = governance.check_rate_limit("admin", &client);
    assert!(!outcome.success);
    assert_eq!(outcome.limit, 30);
    assert_eq!(outcome.remaining, 0);

    // Scopes and clients are counted separately.
    assert!(governance.check_rate_limit("public", &client).success);
    let other = request_headers("203.0.113.2", None);
    assert!(governance.check_rate_limit("admin", &other).success);
}
