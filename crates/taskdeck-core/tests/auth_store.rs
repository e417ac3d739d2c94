mod common;

use std::sync::Arc;

use common::{FakeAuth, user};
use taskdeck_core::error::{ApiError, ErrorKind};
use taskdeck_core::session::Session;
use taskdeck_core::store::AuthStore;
use taskdeck_core::store::auth::{AuthError, UserUpdate};
use taskdeck_shared::{AuthData, ErrorBody};
use tempfile::tempdir;

#[tokio::test]
async fn login_persists_the_session_to_disk() {
    let temp = tempdir().expect("tempdir");
    let fake = Arc::new(FakeAuth::default());
    *fake.login_result.lock() = Some(Ok(AuthData {
        user: user("ada@example.com"),
        token: "tok-1".to_string(),
    }));

    let store = AuthStore::new(fake.clone(), Session::open(temp.path()).expect("session"));
    assert!(matches!(store.require_auth(), Err(AuthError::NotAuthenticated)));

    let signed_in = store
        .login(" ada@example.com ", "secret1")
        .await
        .expect("login");
    assert_eq!(signed_in.email, "ada@example.com");
    assert_eq!(fake.logins.lock()[0].email, "ada@example.com");
    assert!(store.is_authenticated());

    let reopened = Session::open(temp.path()).expect("reopen");
    assert_eq!(reopened.token().as_deref(), Some("tok-1"));
    let restored = AuthStore::new(fake, reopened);
    assert_eq!(restored.require_auth().expect("user").name, "Ada");
}

#[tokio::test]
async fn failed_login_records_the_message() {
    let fake = Arc::new(FakeAuth::default());
    *fake.login_result.lock() = Some(Err(ApiError::from_status(
        400,
        ErrorBody {
            message: Some("Invalid email or password".to_string()),
            errors: None,
        },
    )));
    let store = AuthStore::new(fake, Session::in_memory());

    let err = store.login("ada@example.com", "wrong12").await.expect_err("refused");
    assert!(matches!(err, AuthError::Api(ref api) if api.kind() == ErrorKind::Generic));

    let state = store.snapshot();
    assert!(!state.loading);
    assert!(!state.is_authenticated());
    assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
}

#[tokio::test]
async fn restore_signs_out_when_the_server_rejects_the_token() {
    let session = Session::in_memory();
    session.set("stale".to_string(), user("ada@example.com")).expect("seed");
    let store = AuthStore::new(Arc::new(FakeAuth::default()), session.clone());
    assert!(store.is_authenticated());

    let restored = store.restore().await.expect("restore");
    assert!(restored.is_none());
    assert!(!session.is_signed_in());
    assert!(store.user().is_none());
}

#[tokio::test]
async fn restore_refreshes_the_stored_user() {
    let session = Session::in_memory();
    session.set("tok".to_string(), user("old@example.com")).expect("seed");
    let fake = Arc::new(FakeAuth::default());
    *fake.me_result.lock() = Some(Ok(user("new@example.com")));
    let store = AuthStore::new(fake, session.clone());

    let restored = store.restore().await.expect("restore").expect("user");
    assert_eq!(restored.email, "new@example.com");
    assert_eq!(session.user().map(|u| u.email).as_deref(), Some("new@example.com"));
}

#[tokio::test]
async fn signup_then_profile_edit_then_logout() {
    let session = Session::in_memory();
    let store = AuthStore::new(Arc::new(FakeAuth::default()), session.clone());

    store
        .signup("Grace", "grace@example.com", "hopper1")
        .await
        .expect("signup");
    assert_eq!(session.token().as_deref(), Some("fresh-token"));

    let updated = store
        .update_user(UserUpdate {
            name: Some("Grace H.".to_string()),
            email: None,
        })
        .expect("update");
    assert_eq!(updated.name, "Grace H.");
    assert_eq!(updated.email, "grace@example.com");
    assert_eq!(session.user().map(|u| u.name).as_deref(), Some("Grace H."));

    store.logout().expect("logout");
    assert!(!store.is_authenticated());
    assert!(matches!(
        store.update_user(UserUpdate::default()),
        Err(AuthError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn a_401_seen_by_the_client_ends_the_session() {
    let session = Session::in_memory();
    session.set("tok".to_string(), user("ada@example.com")).expect("seed");
    let store = AuthStore::new(Arc::new(FakeAuth::default()), session.clone());

    // the HTTP client clears the shared session on a 401
    session.clear().expect("clear");
    assert!(!store.is_authenticated());
    assert_eq!(
        store.require_auth().expect_err("signed out").to_string(),
        "Please login to continue"
    );
}
