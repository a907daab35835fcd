//! WS-Security UsernameToken (PasswordDigest profile)
//!
//! `digest = base64(sha1(nonce || created || password))`
//!
//! Un jeton est généré pour un seul envoi : nonce neuf et horodatage lu au
//! moment de la génération. Il n'est jamais réutilisé.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use quick_xml::escape::escape;
use sha1::{Digest, Sha1};
use uuid::Uuid;

pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
pub const BASE64_ENCODING_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Jeton de sécurité éphémère
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    /// Nonce brut (UUID textuel), tel qu'injecté dans le digest
    nonce: String,
    /// Horodatage RFC 3339 (UTC, à la seconde)
    created: String,
    /// base64(sha1(nonce || created || password))
    digest: String,
}

impl SecurityToken {
    /// Génère un jeton avec un nonce neuf.
    ///
    /// L'horodatage vaut `camera_time + token_age` si l'heure de la caméra
    /// est connue, sinon `now + token_age`.
    pub fn generate(password: &str, token_age: TimeDelta, camera_time: Option<DateTime<Utc>>) -> Self {
        let nonce = Uuid::new_v4().to_string();
        let created = token_timestamp(token_age, camera_time, Utc::now());
        Self::from_parts(nonce, created, password)
    }

    /// Construit un jeton à partir d'un nonce et d'un horodatage imposés
    pub fn from_parts(nonce: impl Into<String>, created: impl Into<String>, password: &str) -> Self {
        let nonce = nonce.into();
        let created = created.into();
        let digest = password_digest(nonce.as_bytes(), &created, password);
        Self {
            nonce,
            created,
            digest,
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Nonce encodé pour le transport
    pub fn nonce_base64(&self) -> String {
        BASE64.encode(self.nonce.as_bytes())
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Fragment `<Security>` à placer dans le `<s:Header>`
    ///
    /// Le fragment est indenté ; la compaction des blancs est faite par
    /// l'Envelope Builder sur le document complet.
    pub fn to_xml(&self, username: &str) -> String {
        format!(
            r#"<Security s:mustUnderstand="1" xmlns="{WSSE_NS}">
  <UsernameToken>
    <Username>{username}</Username>
    <Password Type="{PASSWORD_DIGEST_TYPE}">{digest}</Password>
    <Nonce EncodingType="{BASE64_ENCODING_TYPE}">{nonce}</Nonce>
    <Created xmlns="{WSU_NS}">{created}</Created>
  </UsernameToken>
</Security>"#,
            username = escape(username),
            digest = self.digest,
            nonce = self.nonce_base64(),
            created = self.created,
        )
    }
}

/// Calcule le PasswordDigest WS-Security
///
/// L'ordre de concaténation fait partie du contrat filaire : nonce brut,
/// horodatage textuel, mot de passe en clair.
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Horodatage affirmé par le jeton, ancré sur l'heure caméra si elle est fournie
///
/// Un décalage qui sort de la plage de `chrono` est ignoré : l'ancre seule
/// est alors affirmée.
pub fn token_timestamp(
    token_age: TimeDelta,
    camera_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let anchor = camera_time.unwrap_or(now);
    anchor
        .checked_add_signed(token_age)
        .unwrap_or(anchor)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
