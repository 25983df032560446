#![allow(dead_code)]

use identity_linker::LinkerError;
use identity_linker::config::LINKEDIN_ISSUER;
use identity_linker::db::UsersStorage;
use identity_linker::oauth::{
    GithubIdentity, GithubProfile, LinkedinClaims, LinkedinIdentity, LinkedinTokens,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use oauth2::CsrfToken;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

pub const SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/jwks_signing_key.pem");
pub const ROGUE_KEY_PEM: &[u8] = include_bytes!("../fixtures/rogue_signing_key.pem");
/// Base64url modulus of `SIGNING_KEY_PEM`.
pub const SIGNING_KEY_N: &str = "qAsDABRTutgjMeUVHrEqPJ1jQ5VVa2hZeTj869BLULCvm2j-8ndzEv9CcgTE3P2n4HlIWiDt6ixjeGkpJeA6buIR3o8Tb2eEtaZbahSQWr_jGRvyrzMMSiwdU2i_5dgyESaU4IuCn09hK1W9zTG-Fd34cmcss2eB3Pm0l-DVEeK6zMBarw63yLiqeXziKul19fQqn-twpMVjIP38QeGGHO7EFelvSRjSIaefdNST9pQNFaiQnwbUxVUPkhVnYiXykVOmS8Z_fZ7hDMZekk4Y6z-fOkYXTyWcdcSOeISsoUWyOdBcqTebUsN4_CzuphFQs_-BlbHZzWJz6cz6ytqi_w";
pub const TEST_KID: &str = "test-key";
pub const LINKEDIN_CLIENT_ID: &str = "li-client";

static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh on-disk SQLite database with the schema applied.
pub struct TempDb {
    pub storage: UsersStorage,
    path: PathBuf,
}

impl TempDb {
    pub async fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let seq = DB_COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut path = std::env::temp_dir();
        path.push(format!(
            "identity-linker-{}-{}-{}.sqlite",
            std::process::id(),
            nanos,
            seq
        ));

        let database_url = format!("sqlite:{}", path.display());
        let storage = UsersStorage::connect(&database_url)
            .await
            .expect("failed to open temp database");
        Self { storage, path }
    }

    pub async fn count_users(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.storage.pool())
            .await
            .expect("count query failed")
    }

    pub async fn count_linkedin(&self, linkedin_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE linkedin_id = ?")
            .bind(linkedin_id)
            .fetch_one(self.storage.pool())
            .await
            .expect("count query failed")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// In-process GitHub stand-in.
#[derive(Clone)]
pub struct FakeGithub {
    pub access_token: String,
    pub profile: GithubProfile,
    pub fail_exchange: bool,
}

impl FakeGithub {
    pub fn new(login: &str, access_token: &str, avatar_url: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            profile: GithubProfile {
                login: login.to_string(),
                avatar_url: avatar_url.to_string(),
            },
            fail_exchange: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_exchange: true,
            ..Self::new("nobody", "unused", "")
        }
    }
}

impl GithubIdentity for FakeGithub {
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        let url = Url::parse("https://github.test/login/oauth/authorize")?;
        Ok((url, CsrfToken::new("state".to_string())))
    }

    async fn exchange_code(&self, _code: &str) -> Result<String, LinkerError> {
        if self.fail_exchange {
            return Err(LinkerError::Oauth2Server {
                error: "bad_verification_code".to_string(),
            });
        }
        Ok(self.access_token.clone())
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<GithubProfile, LinkerError> {
        Ok(self.profile.clone())
    }
}

/// In-process LinkedIn stand-in; `claims: None` makes verification fail.
#[derive(Clone)]
pub struct FakeLinkedin {
    pub access_token: String,
    pub claims: Option<LinkedinClaims>,
}

impl FakeLinkedin {
    pub fn new(sub: &str, access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            claims: Some(LinkedinClaims {
                sub: sub.to_string(),
                name: Some("Ada Lovelace".to_string()),
                email: Some("ada@example.com".to_string()),
                picture: None,
            }),
        }
    }

    pub fn rejecting(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            claims: None,
        }
    }
}

impl LinkedinIdentity for FakeLinkedin {
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        let url = Url::parse("https://linkedin.test/oauth/v2/authorization")?;
        Ok((url, CsrfToken::new("state".to_string())))
    }

    async fn exchange_code(&self, _code: &str) -> Result<LinkedinTokens, LinkerError> {
        Ok(LinkedinTokens {
            access_token: self.access_token.clone(),
            id_token: "header.payload.signature".to_string(),
        })
    }

    async fn verify_id_token(&self, _id_token: &str) -> Result<LinkedinClaims, LinkerError> {
        self.claims.clone().ok_or(LinkerError::KeyNotFound {
            kid: "missing".to_string(),
        })
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_secs()
}

/// JWKS document publishing the test signing key under each of `kids`.
pub fn jwks_document(kids: &[&str]) -> Value {
    let keys: Vec<Value> = kids
        .iter()
        .map(|kid| {
            json!({
                "kty": "RSA",
                "kid": kid,
                "use": "sig",
                "alg": "RS256",
                "n": SIGNING_KEY_N,
                "e": "AQAB",
            })
        })
        .collect();
    json!({ "keys": keys })
}

pub fn linkedin_claims(sub: &str) -> Value {
    let now = now_secs();
    json!({
        "iss": LINKEDIN_ISSUER,
        "aud": LINKEDIN_CLIENT_ID,
        "sub": sub,
        "iat": now,
        "exp": now + 600,
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "picture": "https://media.example/ada.png",
    })
}

pub fn sign_with(pem: &[u8], kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem).expect("test key should parse");
    encode(&header, claims, &key).expect("token should encode")
}

pub fn sign(claims: &Value) -> String {
    sign_with(SIGNING_KEY_PEM, TEST_KID, claims)
}
