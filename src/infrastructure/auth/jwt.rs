//! Access token generation and validation backed by a JWKS key set

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use crate::domain::user::User;
use crate::domain::DomainError;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at (Unix epoch)
    pub iat: i64,
    /// Not before (Unix epoch)
    pub nbf: i64,
    /// Expiration (Unix epoch)
    pub exp: i64,
    /// Id of the key the token was signed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Namespaced custom claims
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl AccessClaims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// JWT settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Key under which custom claims are attached
    pub claims_namespace: String,
    /// Access token lifetime in seconds
    pub exp: u64,
    /// Audience, empty when unused
    pub aud: String,
    /// Allowed clock skew in seconds
    pub acceptable_skew: u64,
    /// `kid` of the signing key
    pub default_key: String,
    /// JWKS JSON document
    pub keys: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            claims_namespace: "https://authzy.local/claims".to_string(),
            exp: 3600,
            aud: String::new(),
            acceptable_skew: 30,
            default_key: String::new(),
            keys: String::new(),
        }
    }
}

/// Access token operations
pub trait TokenService: Send + Sync + Debug {
    /// Build fresh claims for a subject
    fn generate(&self, subject: &str) -> AccessClaims;

    /// Sign claims with the default key
    fn sign(&self, claims: AccessClaims) -> Result<String, DomainError>;

    /// Verify the signature and decode claims, ignoring time-based claims
    fn parse(&self, token: &str) -> Result<AccessClaims, DomainError>;

    /// Check expiry, not-before and audience
    fn validate(&self, claims: &AccessClaims) -> Result<(), DomainError>;

    /// Key under which custom claims are attached
    fn claims_namespace(&self) -> &str;

    /// Token lifetime in seconds
    fn expires_in(&self) -> u64;

    /// Claims for a user, with username and email under the claims namespace
    fn claims_for_user(&self, user: &User) -> AccessClaims {
        let mut claims = self.generate(user.id().as_str());
        claims.custom.insert(
            self.claims_namespace().to_string(),
            json!({ "username": user.username(), "email": user.email() }),
        );
        claims
    }
}

/// JWK key structure for manual parsing (includes private key components)
#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    /// Key type (RSA or oct)
    kty: String,
    kid: Option<String>,
    alg: Option<String>,
    /// RSA modulus (base64url)
    n: Option<String>,
    /// RSA public exponent (base64url)
    e: Option<String>,
    /// RSA private exponent (base64url)
    d: Option<String>,
    p: Option<String>,
    q: Option<String>,
    /// Symmetric key value (base64url)
    k: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<JwkKey>,
}

#[derive(Clone)]
struct SigningKey {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Token service over a JWKS key set
#[derive(Clone)]
pub struct JwksTokenService {
    keys: HashMap<String, SigningKey>,
    default_key: String,
    ttl: u64,
    audience: Option<String>,
    acceptable_skew: i64,
    claims_namespace: String,
}

impl Debug for JwksTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();

        f.debug_struct("JwksTokenService")
            .field("keys", &kids)
            .field("default_key", &self.default_key)
            .field("ttl", &self.ttl)
            .field("audience", &self.audience)
            .field("acceptable_skew", &self.acceptable_skew)
            .field("claims_namespace", &self.claims_namespace)
            .finish()
    }
}

impl JwksTokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, DomainError> {
        if config.claims_namespace.len() < 3 {
            return Err(DomainError::configuration(
                "JWT claims namespace must be at least 3 characters",
            ));
        }

        let jwks: Jwks = serde_json::from_str(&config.keys)
            .map_err(|e| DomainError::configuration(format!("Invalid JWT key set: {}", e)))?;

        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for key in &jwks.keys {
            let kid = key
                .kid
                .clone()
                .ok_or_else(|| DomainError::configuration("JWT key is missing 'kid'"))?;

            let signing_key = match key.kty.as_str() {
                "RSA" => rsa_signing_key(key)?,
                "oct" => symmetric_signing_key(key)?,
                other => {
                    return Err(DomainError::configuration(format!(
                        "Unsupported key type: {}. Use RSA or oct.",
                        other
                    )))
                }
            };
            keys.insert(kid, signing_key);
        }

        if !keys.contains_key(&config.default_key) {
            return Err(DomainError::configuration(format!(
                "Default JWT key missing: {}",
                config.default_key
            )));
        }

        Ok(Self {
            keys,
            default_key: config.default_key.clone(),
            ttl: config.exp,
            audience: Some(config.aud.clone()).filter(|aud| !aud.is_empty()),
            acceptable_skew: config.acceptable_skew as i64,
            claims_namespace: config.claims_namespace.clone(),
        })
    }

    fn key(&self, kid: Option<&str>) -> Result<&SigningKey, DomainError> {
        let kid = kid.unwrap_or(&self.default_key);
        self.keys
            .get(kid)
            .ok_or_else(|| DomainError::credential(format!("Unknown signing key: {}", kid)))
    }
}

impl TokenService for JwksTokenService {
    fn generate(&self, subject: &str) -> AccessClaims {
        let now = Utc::now().timestamp();

        AccessClaims {
            sub: subject.to_string(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + self.ttl as i64,
            jti: None,
            custom: Map::new(),
        }
    }

    fn sign(&self, mut claims: AccessClaims) -> Result<String, DomainError> {
        let key = self.key(None)?;
        claims.jti = Some(self.default_key.clone());

        let mut header = Header::new(key.algorithm);
        header.kid = Some(self.default_key.clone());

        encode(&header, &claims, &key.encoding)
            .map_err(|e| DomainError::credential(format!("Failed to sign token: {}", e)))
    }

    fn parse(&self, token: &str) -> Result<AccessClaims, DomainError> {
        let header = decode_header(token)
            .map_err(|e| DomainError::credential(format!("Failed to parse token: {}", e)))?;
        let key = self.key(header.kid.as_deref())?;

        let mut validation = Validation::new(key.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<AccessClaims>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::credential(format!("Failed to parse token: {}", e)))
    }

    fn validate(&self, claims: &AccessClaims) -> Result<(), DomainError> {
        let now = Utc::now().timestamp();

        if claims.exp < now - self.acceptable_skew {
            return Err(DomainError::expired("Token is expired"));
        }
        if claims.nbf > now + self.acceptable_skew {
            return Err(DomainError::credential("Token is not valid yet"));
        }
        if let Some(audience) = &self.audience {
            if claims.aud.as_deref() != Some(audience.as_str()) {
                return Err(DomainError::credential("Token audience mismatch"));
            }
        }

        Ok(())
    }

    fn claims_namespace(&self) -> &str {
        &self.claims_namespace
    }

    fn expires_in(&self) -> u64 {
        self.ttl
    }
}

fn rsa_signing_key(key: &JwkKey) -> Result<SigningKey, DomainError> {
    let algorithm = match key.alg.as_deref() {
        Some("RS256") | None => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some(alg) => {
            return Err(DomainError::configuration(format!(
                "Unsupported RSA algorithm: {}",
                alg
            )))
        }
    };

    let component = |value: &Option<String>, field: &str| -> Result<BigUint, DomainError> {
        let value = value
            .as_deref()
            .ok_or_else(|| DomainError::configuration(format!("RSA key missing '{}'", field)))?;
        Ok(BigUint::from_bytes_be(&decode_base64url(value, field)?))
    };

    let n = component(&key.n, "n")?;
    let e = component(&key.e, "e")?;
    let d = component(&key.d, "d")?;
    let primes = match (&key.p, &key.q) {
        (Some(_), Some(_)) => vec![component(&key.p, "p")?, component(&key.q, "q")?],
        _ => Vec::new(),
    };

    let private_key = RsaPrivateKey::from_components(n, e, d, primes)
        .map_err(|e| DomainError::configuration(format!("Invalid RSA key components: {}", e)))?;

    let private_pem = private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|e| DomainError::configuration(format!("Failed to encode RSA private key: {}", e)))?;
    let public_pem = private_key
        .to_public_key()
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|e| DomainError::configuration(format!("Failed to encode RSA public key: {}", e)))?;

    let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
        .map_err(|e| DomainError::configuration(format!("Failed to create encoding key: {}", e)))?;
    let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
        .map_err(|e| DomainError::configuration(format!("Failed to create decoding key: {}", e)))?;

    Ok(SigningKey {
        algorithm,
        encoding,
        decoding,
    })
}

fn symmetric_signing_key(key: &JwkKey) -> Result<SigningKey, DomainError> {
    let k = key
        .k
        .as_deref()
        .ok_or_else(|| DomainError::configuration("Symmetric key missing 'k' value"))?;

    let algorithm = match key.alg.as_deref() {
        Some("HS256") | None => Algorithm::HS256,
        Some("HS384") => Algorithm::HS384,
        Some("HS512") => Algorithm::HS512,
        Some(alg) => {
            return Err(DomainError::configuration(format!(
                "Unsupported symmetric algorithm: {}",
                alg
            )))
        }
    };

    let secret = decode_base64url(k, "k")?;

    Ok(SigningKey {
        algorithm,
        encoding: EncodingKey::from_secret(&secret),
        decoding: DecodingKey::from_secret(&secret),
    })
}

fn decode_base64url(s: &str, field: &str) -> Result<Vec<u8>, DomainError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| DomainError::configuration(format!("Invalid base64url in '{}': {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserId;

    fn oct_jwks(entries: &[(&str, &str, &str)]) -> String {
        let keys: Vec<Value> = entries
            .iter()
            .map(|(kid, alg, secret)| {
                json!({ "kty": "oct", "kid": kid, "alg": alg, "k": URL_SAFE_NO_PAD.encode(secret) })
            })
            .collect();
        json!({ "keys": keys }).to_string()
    }

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            default_key: "key-1".to_string(),
            keys: oct_jwks(&[
                ("key-1", "HS256", "first-secret-for-testing-purposes"),
                ("key-2", "HS512", "second-secret-for-testing-purposes"),
            ]),
            ..JwtConfig::default()
        }
    }

    fn create_service() -> JwksTokenService {
        JwksTokenService::new(&create_test_config()).unwrap()
    }

    #[test]
    fn test_sign_and_parse() {
        let service = create_service();
        let claims = service.generate("user-1");

        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, claims.iat + 3600);
        assert!(claims.aud.is_none());

        let token = service.sign(claims.clone()).unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key-1"));
        assert_eq!(header.alg, Algorithm::HS256);

        let parsed = service.parse(&token).unwrap();
        assert_eq!(parsed.sub, "user-1");
        assert_eq!(parsed.jti.as_deref(), Some("key-1"));
        assert_eq!(parsed.exp, claims.exp);
        service.validate(&parsed).unwrap();
    }

    #[test]
    fn test_parse_selects_key_by_kid() {
        let service = create_service();
        let other = JwksTokenService::new(&JwtConfig {
            default_key: "key-2".to_string(),
            ..create_test_config()
        })
        .unwrap();

        let token = other.sign(other.generate("user-1")).unwrap();
        assert_eq!(decode_header(&token).unwrap().alg, Algorithm::HS512);

        let parsed = service.parse(&token).unwrap();
        assert_eq!(parsed.jti.as_deref(), Some("key-2"));
    }

    #[test]
    fn test_parse_rejects_foreign_signature() {
        let service = create_service();
        let foreign = JwksTokenService::new(&JwtConfig {
            keys: oct_jwks(&[("key-1", "HS256", "some-other-secret-entirely")]),
            ..create_test_config()
        })
        .unwrap();

        let token = foreign.sign(foreign.generate("user-1")).unwrap();
        assert!(matches!(
            service.parse(&token),
            Err(DomainError::Credential { .. })
        ));
        assert!(service.parse("not-a-token").is_err());
    }

    #[test]
    fn test_parse_ignores_expiry_and_validate_catches_it() {
        let service = create_service();
        let mut claims = service.generate("user-1");
        claims.iat -= 7200;
        claims.nbf -= 7200;
        claims.exp = claims.iat + 60;

        let parsed = service.parse(&service.sign(claims).unwrap()).unwrap();
        assert!(matches!(
            service.validate(&parsed),
            Err(DomainError::Expired { .. })
        ));
    }

    #[test]
    fn test_validate_with_skew() {
        let service = create_service();

        let mut claims = service.generate("user-1");
        claims.exp = claims.iat - 10;
        service.validate(&claims).unwrap();

        let mut claims = service.generate("user-1");
        claims.nbf += 10;
        service.validate(&claims).unwrap();

        claims.nbf += 120;
        assert!(matches!(
            service.validate(&claims),
            Err(DomainError::Credential { .. })
        ));
    }

    #[test]
    fn test_audience() {
        let service = JwksTokenService::new(&JwtConfig {
            aud: "authzy".to_string(),
            ..create_test_config()
        })
        .unwrap();

        let claims = service.generate("user-1");
        assert_eq!(claims.aud.as_deref(), Some("authzy"));
        service.validate(&claims).unwrap();

        let mut claims = service.generate("user-1");
        claims.aud = Some("someone-else".to_string());
        assert!(service.validate(&claims).is_err());
    }

    #[test]
    fn test_claims_for_user() {
        let service = create_service();
        let user = User::new(UserId::new("user-1").unwrap(), "a@x.com", "alice");

        let claims = service.claims_for_user(&user);
        let parsed = service.parse(&service.sign(claims).unwrap()).unwrap();

        assert_eq!(parsed.user_id(), "user-1");
        assert_eq!(
            parsed.custom.get("https://authzy.local/claims"),
            Some(&json!({ "username": "alice", "email": "a@x.com" }))
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let missing_default = JwtConfig {
            default_key: "missing".to_string(),
            ..create_test_config()
        };
        let short_namespace = JwtConfig {
            claims_namespace: "ns".to_string(),
            ..create_test_config()
        };
        let bad_json = JwtConfig {
            keys: "not valid json".to_string(),
            ..create_test_config()
        };
        let bad_kty = JwtConfig {
            keys: r#"{"keys":[{"kty":"EC","kid":"key-1"}]}"#.to_string(),
            ..create_test_config()
        };

        for config in [missing_default, short_namespace, bad_json, bad_kty] {
            assert!(matches!(
                JwksTokenService::new(&config),
                Err(DomainError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", create_service());

        assert!(debug.contains("key-1"));
        assert!(!debug.contains("first-secret"));
    }

    #[test]
    fn test_rs256_key_set() {
        use argon2::password_hash::rand_core::OsRng;
        use rsa::traits::{PrivateKeyParts, PublicKeyParts};

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let encode_uint = |value: &BigUint| URL_SAFE_NO_PAD.encode(value.to_bytes_be());
        let primes = private_key.primes();

        let keys = json!({
            "keys": [{
                "kty": "RSA",
                "kid": "rsa-key",
                "alg": "RS256",
                "n": encode_uint(private_key.n()),
                "e": encode_uint(private_key.e()),
                "d": encode_uint(private_key.d()),
                "p": encode_uint(&primes[0]),
                "q": encode_uint(&primes[1]),
            }]
        });

        let service = JwksTokenService::new(&JwtConfig {
            default_key: "rsa-key".to_string(),
            keys: keys.to_string(),
            ..JwtConfig::default()
        })
        .unwrap();

        let token = service.sign(service.generate("user-1")).unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("rsa-key"));
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(service.parse(&token).unwrap().sub, "user-1");
    }
}
