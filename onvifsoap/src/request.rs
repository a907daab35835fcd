//! Request Descriptor : description immuable d'un appel SOAP

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::tree::XmlTree;

/// Identifiants utilisés à la fois pour WS-Security et pour HTTP Digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Description d'une requête SOAP vers une caméra ONVIF
///
/// La valeur n'est jamais modifiée pendant un envoi : le nonce et
/// l'horodatage sont produits à chaque appel de [`SoapRequest::send`], ce qui
/// permet de partager un même descripteur entre plusieurs threads.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    /// Fragment XML placé tel quel dans `<s:Body>`
    pub body: String,
    /// Déclarations `xmlns:…="…"` ajoutées à l'enveloppe, dans l'ordre
    pub namespaces: Vec<String>,
    pub credentials: Option<Credentials>,
    /// Décalage appliqué à l'horodatage du jeton (peut être négatif)
    pub token_age: TimeDelta,
    /// URI WS-Addressing ; produit un en-tête `<Action>`
    pub action: Option<String>,
    /// Désactive la trace des corps de requête et de réponse
    pub suppress_debug: bool,
    /// Heure de la caméra, si elle est connue (protection anti-rejeu)
    pub camera_time: Option<DateTime<Utc>>,
}

impl Default for SoapRequest {
    fn default() -> Self {
        Self {
            body: String::new(),
            namespaces: Vec::new(),
            credentials: None,
            token_age: TimeDelta::zero(),
            action: None,
            suppress_debug: false,
            camera_time: None,
        }
    }
}

impl SoapRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, declaration: impl Into<String>) -> Self {
        self.namespaces.push(declaration.into());
        self
    }

    pub fn with_namespaces<I, S>(mut self, declarations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces
            .extend(declarations.into_iter().map(Into::into));
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_token_age(mut self, token_age: TimeDelta) -> Self {
        self.token_age = token_age;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_camera_time(mut self, camera_time: DateTime<Utc>) -> Self {
        self.camera_time = Some(camera_time);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.suppress_debug = true;
        self
    }

    /// Identifiants effectifs : un nom d'utilisateur vide vaut absence
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.is_empty())
    }

    /// Action effective : une chaîne vide vaut absence
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }

    /// Envoie la requête vers `xaddr` avec le transport Digest par défaut
    pub fn send(&self, xaddr: &str) -> Result<XmlTree> {
        crate::dispatch::send_request(self, xaddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_username_counts_as_absent() {
        let request = SoapRequest::new("<GetDeviceInformation/>").with_credentials("", "secret");
        assert!(request.credentials.is_some());
        assert!(request.credentials().is_none());
    }

    #[test]
    fn test_empty_action_counts_as_absent() {
        let request = SoapRequest::new("<x/>").with_action("");
        assert!(request.action().is_none());

        let request = SoapRequest::new("<x/>").with_action("http://www.onvif.org/ver10/device/wsdl/GetUsers");
        assert_eq!(
            request.action(),
            Some("http://www.onvif.org/ver10/device/wsdl/GetUsers")
        );
    }

    #[test]
    fn test_builder_keeps_namespace_order() {
        let request = SoapRequest::new("<x/>")
            .with_namespace(r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#)
            .with_namespaces([r#"xmlns:tt="http://www.onvif.org/ver10/schema""#]);
        assert_eq!(request.namespaces.len(), 2);
        assert!(request.namespaces[0].starts_with("xmlns:tds"));
        assert!(request.namespaces[1].starts_with("xmlns:tt"));
    }

    #[test]
    fn test_defaults() {
        let request = SoapRequest::default();
        assert_eq!(request.token_age, TimeDelta::zero());
        assert!(request.camera_time.is_none());
        assert!(!request.suppress_debug);
        assert!(request.quiet().suppress_debug);
    }
}
