use gatekeeper_service::auth::{AuthError, Role};
use gatekeeper_service::content::CollectionName;
use gatekeeper_service::error::ErrorKind;

use crate::utils::{IDENTITY, request_headers, setup_governance};

#[tokio::test]
async fn test_sessions_from_config() {
    let (governance, _content_dir) = setup_governance(Some(IDENTITY));
    let sessions = &governance.sessions;

    let alice = sessions.verify_token("tok-alice").await.unwrap();
    assert_eq!(alice.role, Role::SuperAdmin);
    assert_eq!(alice.email, "alice@example.com");

    let bob = governance
        .sessions
        .verify(&request_headers("203.0.113.1", Some("tok-bob")))
        .await
        .unwrap();
    assert_eq!(bob.role, Role::Editor);
    assert_eq!(bob.email, "bob@example.com");
    assert_eq!(bob.name, "Bob");

    let err = sessions.verify_token("tok-bob-old").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidSession(_)), "{err:?}");

    let err = sessions.verify_token("tok-carol").await.unwrap_err();
    assert!(matches!(err, AuthError::ProfileMissing), "{err:?}");
}

#[tokio::test]
async fn test_missing_identity_section() {
    let (governance, _content_dir) = setup_governance(None);

    let headers = request_headers("203.0.113.1", Some("tok-alice"));
    let err = governance.sessions.verify(&headers).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // Requests without a session never reach the identity provider.
    let headers = request_headers("203.0.113.1", None);
    let err = governance.sessions.verify(&headers).await.unwrap_err();
    assert!(matches!(err, AuthError::NotAuthenticated));

    // Public reads keep working.
    let pages = CollectionName::new("pages").unwrap();
    assert_eq!(governance.cached_collection(&pages).await.unwrap(), None);
}
