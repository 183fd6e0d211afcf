mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use roguevault::crypto::token::SessionToken;
use roguevault::error::AppError;
use roguevault::services::auth;
use roguevault::store::{AccountRepository, SessionCache};

use common::{Faults, seed_account, spawn_app, spawn_app_with_cache, spawn_app_with_faults};

#[tokio::test]
async fn register_login_resolve_logout() {
    let app = spawn_app().await;
    let state = &app.state;

    let account_id = auth::register(state, "trainer1", "secretpass").await.unwrap();

    let duplicate = auth::register(state, "trainer1", "secretpass").await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let token = auth::login(state, "trainer1", "secretpass").await.unwrap();
    assert_eq!(token.as_bytes().len(), 32);

    let session = auth::resolve_token(state, &token.encode()).await.unwrap();
    assert_eq!(session.account_id, account_id);
    assert_eq!(session.username, "trainer1");

    auth::logout(state, &token).await.unwrap();
    let after = auth::resolve_token(state, &token.encode()).await;
    assert!(matches!(after, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn login_records_last_login() {
    let app = spawn_app().await;
    let account_id = auth::register(&app.state, "trainer1", "secretpass").await.unwrap();

    auth::login(&app.state, "trainer1", "secretpass").await.unwrap();

    let account = app.backend.find_by_id(&account_id).await.unwrap().unwrap();
    assert!(account.last_logged_in.is_some());
}

#[tokio::test]
async fn invalid_usernames_are_rejected_whatever_the_password() {
    let app = spawn_app().await;

    for username in ["", "seventeen_chars__", "no spaces", "bad-dash", "ünïcode"] {
        for password in ["secretpass", "123"] {
            assert!(
                matches!(auth::register(&app.state, username, password).await, Err(AppError::Validation(_))),
                "register accepted {:?}",
                username
            );
            assert!(
                matches!(auth::login(&app.state, username, password).await, Err(AppError::Validation(_))),
                "login accepted {:?}",
                username
            );
        }
    }

    assert!(app.backend.find_by_username("no spaces").await.unwrap().is_none());
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let app = spawn_app().await;
    let account_id = auth::register(&app.state, "trainer1", "secretpass").await.unwrap();

    assert!(matches!(auth::register(&app.state, "trainer2", "12345").await, Err(AppError::Validation(_))));
    assert!(matches!(auth::login(&app.state, "trainer1", "12345").await, Err(AppError::Validation(_))));
    assert!(matches!(
        auth::change_password(&app.state, &account_id, "12345").await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn login_failures() {
    let app = spawn_app().await;
    auth::register(&app.state, "trainer1", "secretpass").await.unwrap();

    assert!(matches!(auth::login(&app.state, "nobody", "secretpass").await, Err(AppError::NotFound)));
    assert!(matches!(
        auth::login(&app.state, "trainer1", "wrongpass").await,
        Err(AppError::Unauthorized(_))
    ));
    // Usernames are case sensitive.
    assert!(matches!(auth::login(&app.state, "Trainer1", "secretpass").await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn repeated_logout_reports_not_found() {
    let app = spawn_app().await;
    auth::register(&app.state, "trainer1", "secretpass").await.unwrap();
    let token = auth::login(&app.state, "trainer1", "secretpass").await.unwrap();

    auth::logout(&app.state, &token).await.unwrap();
    let again = auth::logout(&app.state, &token).await.unwrap_err();
    assert!(again.is_not_found());
}

#[tokio::test]
async fn malformed_and_unknown_tokens_are_unauthorized() {
    let app = spawn_app().await;

    let unknown = SessionToken::generate().encode();
    for encoded in ["", "not base64 !!", "c2hvcnQ", unknown.as_str()] {
        assert!(
            matches!(auth::resolve_token(&app.state, encoded).await, Err(AppError::Unauthorized(_))),
            "resolved {:?}",
            encoded
        );
    }
}

#[tokio::test]
async fn expired_tokens_never_resolve_and_are_dropped() {
    let app = spawn_app().await;
    let account_id = seed_account(&app, "trainer1").await;

    let token = SessionToken::generate();
    app.backend
        .insert_token(&token, &account_id, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    let resolved = auth::resolve(&app.state, &token).await;
    assert!(matches!(resolved, Err(AppError::Unauthorized(_))));
    assert!(app.backend.find_token(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn purge_removes_only_expired_sessions() {
    let app = spawn_app().await;
    let account_id = seed_account(&app, "trainer1").await;

    let live = SessionToken::generate();
    let stale = SessionToken::generate();
    app.backend
        .insert_token(&live, &account_id, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    app.backend
        .insert_token(&stale, &account_id, Utc::now() - Duration::days(1))
        .await
        .unwrap();

    assert_eq!(auth::purge_expired_sessions(&app.state).await.unwrap(), 1);
    assert!(app.backend.find_token(&live).await.unwrap().is_some());
    assert!(app.backend.find_token(&stale).await.unwrap().is_none());
}

#[tokio::test]
async fn change_password_replaces_credentials() {
    let app = spawn_app().await;
    let account_id = auth::register(&app.state, "trainer1", "secretpass").await.unwrap();
    let before = app.backend.find_by_id(&account_id).await.unwrap().unwrap();

    auth::change_password(&app.state, &account_id, "newsecret").await.unwrap();

    let after = app.backend.find_by_id(&account_id).await.unwrap().unwrap();
    assert_ne!(before.password_salt, after.password_salt);
    assert_ne!(before.password_hash, after.password_hash);

    assert!(matches!(
        auth::login(&app.state, "trainer1", "secretpass").await,
        Err(AppError::Unauthorized(_))
    ));
    auth::login(&app.state, "trainer1", "newsecret").await.unwrap();
}

#[tokio::test]
async fn change_password_for_unknown_account() {
    let app = spawn_app().await;
    let result = auth::change_password(&app.state, &uuid::Uuid::new_v4(), "newsecret").await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn cached_sessions_are_evicted_on_logout() {
    let app = spawn_app_with_cache().await;
    let cache = app.cache.clone().unwrap();

    auth::register(&app.state, "trainer1", "secretpass").await.unwrap();
    let token = auth::login(&app.state, "trainer1", "secretpass").await.unwrap();

    auth::resolve(&app.state, &token).await.unwrap();
    assert!(cache.get_session(&token).await.unwrap().is_some());

    auth::logout(&app.state, &token).await.unwrap();
    assert!(cache.get_session(&token).await.unwrap().is_none());
    assert!(matches!(
        auth::resolve(&app.state, &token).await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn concurrent_logins_pass_through_the_gate() {
    let app = Arc::new(spawn_app().await);
    auth::register(&app.state, "trainer1", "secretpass").await.unwrap();

    let logins = (0..8).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { auth::login(&app.state, "trainer1", "secretpass").await })
    });

    let tokens: Vec<SessionToken> = futures::future::join_all(logins)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(tokens.len(), 8);
    assert_eq!(app.state.kdf.available_permits(), app.state.kdf.max_concurrent());
}

#[tokio::test]
async fn resolve_during_logout_does_not_outlive_it() {
    let faults = Faults {
        slow_token_delete: Some(std::time::Duration::from_millis(100)),
        ..Default::default()
    };
    let app = spawn_app_with_faults(faults, true).await;
    let cache = app.cache.clone().unwrap();

    auth::register(&app.state, "trainer1", "secretpass").await.unwrap();
    let token = auth::login(&app.state, "trainer1", "secretpass").await.unwrap();
    auth::resolve(&app.state, &token).await.unwrap();

    let logout = {
        let state = app.state.clone();
        let token = token.clone();
        tokio::spawn(async move { auth::logout(&state, &token).await })
    };

    // The row still exists while the delete is in flight, so this caches it again.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    auth::resolve(&app.state, &token).await.unwrap();

    logout.await.unwrap().unwrap();

    assert!(cache.get_session(&token).await.unwrap().is_none());
    assert!(matches!(
        auth::resolve(&app.state, &token).await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn login_survives_a_failed_last_login_update() {
    let faults = Faults {
        fail_last_login: true,
        ..Default::default()
    };
    let app = spawn_app_with_faults(faults, false).await;

    let account_id = auth::register(&app.state, "trainer1", "secretpass").await.unwrap();
    let token = auth::login(&app.state, "trainer1", "secretpass").await.unwrap();

    let session = auth::resolve(&app.state, &token).await.unwrap();
    assert_eq!(session.account_id, account_id);

    let account = app.backend.find_by_id(&account_id).await.unwrap().unwrap();
    assert!(account.last_logged_in.is_none());
}
