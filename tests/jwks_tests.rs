mod common;

use common::{
    LINKEDIN_CLIENT_ID, ROGUE_KEY_PEM, TEST_KID, jwks_document, linkedin_claims, now_secs, sign,
    sign_with, SIGNING_KEY_PEM,
};
use identity_linker::LinkerError;
use identity_linker::config::LINKEDIN_ISSUER;
use identity_linker::oauth::{JwksVerifier, LinkedinClaims};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOUR: Duration = Duration::from_secs(3600);
const REFETCH_FLOOR: Duration = Duration::from_secs(10);

fn verifier(server: &MockServer, ttl: Duration, min_refetch: Duration) -> JwksVerifier {
    let jwks_url = Url::parse(&format!("{}/oauth/openid/jwks", server.uri())).unwrap();
    JwksVerifier::new(
        reqwest::Client::new(),
        jwks_url,
        LINKEDIN_ISSUER.to_string(),
        LINKEDIN_CLIENT_ID.to_string(),
        ttl,
        min_refetch,
    )
}

async fn serve_jwks(server: &MockServer, kids: &[&str], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/oauth/openid/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(kids)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_token_is_verified_and_keys_are_cached() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let token = sign(&linkedin_claims("li-123"));
    let claims: LinkedinClaims = verifier.verify(&token).await.unwrap();
    assert_eq!(claims.sub, "li-123");
    assert_eq!(claims.email.as_deref(), Some("ada@example.com"));

    let again: LinkedinClaims = verifier.verify(&token).await.unwrap();
    assert_eq!(again, claims);
}

#[tokio::test]
async fn expired_cache_is_refetched() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 2).await;
    let verifier = verifier(&server, Duration::ZERO, REFETCH_FLOOR);

    let token = sign(&linkedin_claims("li-123"));
    verifier.verify::<LinkedinClaims>(&token).await.unwrap();
    verifier.verify::<LinkedinClaims>(&token).await.unwrap();
}

#[tokio::test]
async fn unknown_kid_refetches_once_then_fails() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 2).await;
    let verifier = verifier(&server, HOUR, Duration::ZERO);

    verifier
        .verify::<LinkedinClaims>(&sign(&linkedin_claims("li-123")))
        .await
        .unwrap();

    let stranger = sign_with(SIGNING_KEY_PEM, "unknown-kid", &linkedin_claims("li-123"));
    let err = verifier
        .verify::<LinkedinClaims>(&stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::KeyNotFound { ref kid } if kid == "unknown-kid"));
}

#[tokio::test]
async fn unknown_kid_on_fresh_set_does_not_refetch() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, Duration::from_secs(60));

    verifier
        .verify::<LinkedinClaims>(&sign(&linkedin_claims("li-123")))
        .await
        .unwrap();

    for attempt in 0..3 {
        let stranger = sign_with(
            SIGNING_KEY_PEM,
            &format!("unknown-{attempt}"),
            &linkedin_claims("li-123"),
        );
        let err = verifier
            .verify::<LinkedinClaims>(&stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkerError::KeyNotFound { .. }));
    }
}

#[tokio::test]
async fn rotated_key_is_picked_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/openid/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&["old-key"])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    serve_jwks(&server, &["new-key"], 1).await;
    let verifier = verifier(&server, HOUR, Duration::ZERO);

    let old = sign_with(SIGNING_KEY_PEM, "old-key", &linkedin_claims("li-123"));
    verifier.verify::<LinkedinClaims>(&old).await.unwrap();

    let new = sign_with(SIGNING_KEY_PEM, "new-key", &linkedin_claims("li-123"));
    let claims: LinkedinClaims = verifier.verify(&new).await.unwrap();
    assert_eq!(claims.sub, "li-123");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let mut claims = linkedin_claims("li-123");
    claims["iat"] = (now_secs() - 7200).into();
    claims["exp"] = (now_secs() - 3600).into();

    let err = verifier
        .verify::<LinkedinClaims>(&sign(&claims))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::Jwt(_)));
}

#[tokio::test]
async fn wrong_audience_is_rejected() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let mut claims = linkedin_claims("li-123");
    claims["aud"] = "someone-else".into();

    let err = verifier
        .verify::<LinkedinClaims>(&sign(&claims))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::Jwt(_)));
}

#[tokio::test]
async fn wrong_issuer_is_rejected() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let mut claims = linkedin_claims("li-123");
    claims["iss"] = "https://issuer.example".into();

    let err = verifier
        .verify::<LinkedinClaims>(&sign(&claims))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::Jwt(_)));
}

#[tokio::test]
async fn foreign_signature_is_rejected() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 1).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let forged = sign_with(ROGUE_KEY_PEM, TEST_KID, &linkedin_claims("li-123"));
    let err = verifier
        .verify::<LinkedinClaims>(&forged)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::Jwt(_)));
}

#[tokio::test]
async fn token_without_kid_is_rejected_before_fetching_keys() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 0).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(SIGNING_KEY_PEM).unwrap();
    let token = jsonwebtoken::encode(&header, &linkedin_claims("li-123"), &key).unwrap();

    let err = verifier
        .verify::<LinkedinClaims>(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::KeyNotFound { .. }));
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let server = MockServer::start().await;
    serve_jwks(&server, &[TEST_KID], 0).await;
    let verifier = verifier(&server, HOUR, REFETCH_FLOOR);

    let err = verifier
        .verify::<LinkedinClaims>("not-a-jwt")
        .await
        .unwrap_err();
    assert!(matches!(err, LinkerError::Jwt(_)));
}
