/// Email verification and password reset tests

mod common;

use chrono::Duration;
use common::{TestContext, PASSWORD, TOKEN_PEPPER};
use projectcamp_shared::auth::one_time::OneTimeTokenIssuer;
use projectcamp_shared::clock::Clock;
use projectcamp_shared::error::ErrorKind;
use projectcamp_shared::service::verification::{RESET_PASSWORD_SUBJECT, VERIFY_EMAIL_SUBJECT};
use projectcamp_shared::store::UserStore;

#[tokio::test]
async fn test_verification_email_carries_token_matching_stored_hash() {
    let ctx = TestContext::new();
    let registration = ctx.register("alice").await;

    let email = ctx.mailer.last_to("alice@x.com").await.unwrap();
    assert_eq!(email.subject, VERIFY_EMAIL_SUBJECT);
    assert!(email
        .body
        .contains("https://camp.test/v1/users/verify-email/"));

    let token = ctx.last_token_for("alice@x.com").await;
    assert_eq!(token.len(), 40);

    let issuer = OneTimeTokenIssuer::new(TOKEN_PEPPER, Duration::minutes(20), ctx.clock.clone());
    let stored = ctx
        .store
        .find_user_by_id(registration.user.id)
        .await
        .unwrap()
        .unwrap()
        .email_verification()
        .unwrap();
    assert_eq!(issuer.hash_one_time_token(&token), stored.hash);
    assert_eq!(stored.expires_at, ctx.clock.now() + Duration::minutes(20));
}

#[tokio::test]
async fn test_verify_email_is_single_use() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    let token = ctx.last_token_for("alice@x.com").await;

    let user = ctx.services.verification.verify_email(&token).await.unwrap();
    assert!(user.is_email_verified);

    let err = ctx
        .services
        .verification
        .verify_email(&token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);
}

#[tokio::test]
async fn test_verify_email_just_before_and_after_expiry() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    ctx.register("bobby").await;
    let alice_token = ctx.last_token_for("alice@x.com").await;
    let bob_token = ctx.last_token_for("bobby@x.com").await;

    ctx.clock.advance(Duration::minutes(19));
    assert!(ctx
        .services
        .verification
        .verify_email(&alice_token)
        .await
        .is_ok());

    ctx.clock.advance(Duration::minutes(2));
    let err = ctx
        .services
        .verification
        .verify_email(&bob_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);

    let bob = ctx
        .store
        .find_user_by_email("bobby@x.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!bob.is_email_verified);
}

#[tokio::test]
async fn test_verify_email_rejects_unknown_and_empty_tokens() {
    let ctx = TestContext::new();
    ctx.register("alice").await;

    for token in ["", "   ", "0000000000000000000000000000000000000000"] {
        let err = ctx
            .services
            .verification
            .verify_email(token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);
    }
}

#[tokio::test]
async fn test_resend_invalidates_previous_token() {
    let ctx = TestContext::new();
    let registration = ctx.register("alice").await;
    let old_token = ctx.last_token_for("alice@x.com").await;

    ctx.services
        .verification
        .resend_verification(registration.user.id)
        .await
        .unwrap();
    let new_token = ctx.last_token_for("alice@x.com").await;
    assert_ne!(old_token, new_token);
    assert_eq!(ctx.mailer.outbox().await.len(), 2);

    assert!(ctx
        .services
        .verification
        .verify_email(&old_token)
        .await
        .is_err());
    assert!(ctx
        .services
        .verification
        .verify_email(&new_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_resend_for_verified_user_conflicts() {
    let ctx = TestContext::new();
    let registration = ctx.register("alice").await;
    let token = ctx.last_token_for("alice@x.com").await;
    ctx.services.verification.verify_email(&token).await.unwrap();

    let err = ctx
        .services
        .verification
        .resend_verification(registration.user.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_resend_with_failing_mailer_is_internal() {
    let ctx = TestContext::new();
    let registration = ctx.register("alice").await;
    ctx.mailer.set_failing(true);

    let err = ctx
        .services
        .verification
        .resend_verification(registration.user.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_forgot_password_does_not_enumerate() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    let before = ctx.mailer.outbox().await.len();

    ctx.services
        .verification
        .request_password_reset("nobody@x.com")
        .await;
    assert_eq!(ctx.mailer.outbox().await.len(), before);

    ctx.services
        .verification
        .request_password_reset("ALICE@x.com")
        .await;
    let email = ctx.mailer.last_to("alice@x.com").await.unwrap();
    assert_eq!(email.subject, RESET_PASSWORD_SUBJECT);
    assert!(email
        .body
        .contains("https://camp.test/v1/users/reset-password/"));

    ctx.mailer.set_failing(true);
    ctx.services
        .verification
        .request_password_reset("alice@x.com")
        .await;
}

#[tokio::test]
async fn test_spawned_password_reset_delivers_in_background() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    let before = ctx.mailer.outbox().await.len();

    ctx.services
        .verification
        .spawn_password_reset("nobody@x.com")
        .await
        .unwrap();
    assert_eq!(ctx.mailer.outbox().await.len(), before);

    ctx.services
        .verification
        .spawn_password_reset("alice@x.com")
        .await
        .unwrap();
    let email = ctx.mailer.last_to("alice@x.com").await.unwrap();
    assert_eq!(email.subject, RESET_PASSWORD_SUBJECT);
}

#[tokio::test]
async fn test_reset_password_is_single_use_and_revokes_session() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    let login = ctx.services.sessions.login("alice", PASSWORD).await.unwrap();

    ctx.services
        .verification
        .request_password_reset("alice@x.com")
        .await;
    let token = ctx.last_token_for("alice@x.com").await;

    ctx.services
        .verification
        .reset_password(&token, "Fresh#789x")
        .await
        .unwrap();

    assert!(ctx.services.sessions.login("alice", PASSWORD).await.is_err());
    assert!(ctx
        .services
        .sessions
        .login("alice", "Fresh#789x")
        .await
        .is_ok());

    let err = ctx
        .services
        .verification
        .reset_password(&token, "Again#789x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);

    assert!(ctx
        .services
        .sessions
        .refresh(&login.tokens.refresh_token)
        .await
        .is_err());
}

#[tokio::test]
async fn test_reset_password_weak_password_keeps_token() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    ctx.services
        .verification
        .request_password_reset("alice@x.com")
        .await;
    let token = ctx.last_token_for("alice@x.com").await;

    let err = ctx
        .services
        .verification
        .reset_password(&token, "weak")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(ctx
        .services
        .verification
        .reset_password(&token, "Fresh#789x")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_reset_password_expired() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    ctx.services
        .verification
        .request_password_reset("alice@x.com")
        .await;
    let token = ctx.last_token_for("alice@x.com").await;

    ctx.clock.advance(Duration::minutes(20));
    let err = ctx
        .services
        .verification
        .reset_password(&token, "Fresh#789x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);

    assert!(ctx.services.sessions.login("alice", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn test_verification_and_reset_tokens_are_separate() {
    let ctx = TestContext::new();
    ctx.register("alice").await;
    let verify_token = ctx.last_token_for("alice@x.com").await;

    let err = ctx
        .services
        .verification
        .reset_password(&verify_token, "Fresh#789x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrExpiredToken);

}
