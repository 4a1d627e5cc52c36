use axum::http::{HeaderMap, HeaderValue};
use gatekeeper_service::auth::IdentityConfig;
use gatekeeper_service::config::Config;
use gatekeeper_service::services::Governance;
use gatekeeper_test::TempDir;

/// Creates services reading content from a fresh temporary directory.
///
/// `identity` is the YAML `identity` section, if any.
pub fn setup_governance(identity: Option<&str>) -> (Governance, TempDir) {
    gatekeeper_test::setup();
    let content_dir = gatekeeper_test::tempdir();

    let config = Config {
        content_dir: content_dir.path().to_owned(),
        identity: identity.map(|yaml| serde_yaml::from_str::<IdentityConfig>(yaml).unwrap()),
        ..Default::default()
    };

    (Governance::new(config), content_dir)
}

/// Headers of a request coming from `ip`, optionally carrying a session.
pub fn request_headers(ip: &str, token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
    if let Some(token) = token {
        let cookie = gatekeeper_test::session_cookie(token);
        headers.insert("cookie", HeaderValue::from_str(&cookie).unwrap());
    }
    headers
}

pub const IDENTITY: &str = r#"
sessions:
  tok-alice:
    uid: alice
    email: alice@example.com
  tok-bob:
    uid: bob
  tok-bob-old:
    uid: bob
    revoked: true
  tok-carol:
    uid: carol
profiles:
  alice:
    role: super_admin
    name: Alice
    active: false
  bob:
    role: editor
    name: Bob
    email: bob@example.com
"#;
