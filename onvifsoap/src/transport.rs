//! Transport HTTP avec authentification Digest
//!
//! Le dispatcher ne connaît que le trait [`Transport`]. L'implémentation par
//! défaut, [`UreqDigestTransport`], s'appuie sur un agent `ureq` bloquant et
//! délègue la réponse au challenge Digest au crate `digest_auth`.

use std::io::Read;
use std::time::Duration;

use digest_auth::AuthContext;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use ureq::Agent;
use ureq::http::StatusCode;
use ureq::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use url::{Position, Url};

use crate::error::TransportError;

/// Requête HTTP prête à partir
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: &'static str,
    /// URL cible ; les identifiants Digest éventuels sont dans le user-info
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn post(url: Url, body: Vec<u8>) -> Self {
        Self {
            method: "POST",
            url,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Réponse HTTP dont le corps reste à lire
pub struct HttpResponse {
    pub status: u16,
    pub body: Box<dyn Read>,
}

/// Un aller-retour HTTP, challenge Digest compris
pub trait Transport {
    fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).round_trip(request)
    }
}

/// Transport bloquant `ureq` avec réponse au challenge HTTP Digest
///
/// Les identifiants sont lus dans le user-info de l'URL, puis retirés avant
/// l'envoi : ils ne circulent jamais en clair.
pub struct UreqDigestTransport {
    agent: Agent,
}

impl Default for UreqDigestTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl UreqDigestTransport {
    /// `timeout` borne l'ensemble de l'échange, challenge compris
    pub fn new(timeout: Option<Duration>) -> Self {
        // Les statuts 4xx/5xx ne sont pas des erreurs : un SOAP Fault arrive
        // souvent avec un 400 ou un 500 et son corps doit rester lisible.
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();

        Self {
            agent: config.into(),
        }
    }

    fn post(
        &self,
        url: &Url,
        request: &HttpRequest,
        authorization: Option<&str>,
    ) -> Result<ureq::http::Response<ureq::Body>, TransportError> {
        let mut builder = self.agent.post(url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        Ok(builder.send(request.body.as_slice())?)
    }
}

impl Transport for UreqDigestTransport {
    fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.method != "POST" {
            return Err(TransportError::Other(format!(
                "unsupported HTTP method {}",
                request.method
            )));
        }

        let credentials = url_credentials(&request.url)?;
        let target = without_credentials(&request.url);

        let response = self.post(&target, &request, None)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(into_http_response(response));
        }

        let Some((username, password)) = credentials else {
            return Ok(into_http_response(response));
        };

        // Avec des identifiants, un 401 sans challenge Digest est un refus
        let challenge = match response.headers().get(WWW_AUTHENTICATE) {
            Some(value) => value
                .to_str()
                .map_err(|e| TransportError::InvalidChallenge(e.to_string()))?
                .to_string(),
            None => return Err(TransportError::unauthorized(&response)),
        };

        if !is_digest_challenge(&challenge) {
            debug!(endpoint = %target, "Camera did not offer a Digest challenge");
            return Err(TransportError::unauthorized(&response));
        }

        let uri = &target[Position::BeforePath..];
        let context = AuthContext::new_post(
            username.as_str(),
            password.as_str(),
            uri,
            Some(request.body.as_slice()),
        );
        let mut prompt = digest_auth::parse(&challenge)?;
        let authorization = prompt.respond(&context)?.to_header_string();

        debug!(endpoint = %target, "Answering HTTP Digest challenge");
        let response = self.post(&target, &request, Some(&authorization))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint = %target, "Camera rejected the Digest credentials");
            return Err(TransportError::unauthorized(&response));
        }
        Ok(into_http_response(response))
    }
}

impl TransportError {
    fn unauthorized(response: &ureq::http::Response<ureq::Body>) -> Self {
        TransportError::Unauthorized {
            status: response.status().as_u16(),
        }
    }
}

fn into_http_response(response: ureq::http::Response<ureq::Body>) -> HttpResponse {
    let status = response.status().as_u16();
    HttpResponse {
        status,
        body: Box::new(response.into_body().into_reader()),
    }
}

fn is_digest_challenge(challenge: &str) -> bool {
    challenge
        .trim_start()
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
}

/// Identifiants décodés du user-info de l'URL
pub fn url_credentials(url: &Url) -> Result<Option<(String, String)>, TransportError> {
    if url.username().is_empty() {
        return Ok(None);
    }

    let decode = |raw: &str| {
        percent_decode_str(raw)
            .decode_utf8()
            .map(|s| s.into_owned())
            .map_err(|e| TransportError::Credentials(e.to_string()))
    };

    let username = decode(url.username())?;
    let password = decode(url.password().unwrap_or_default())?;
    Ok(Some((username, password)))
}

/// Copie de l'URL sans user-info
pub fn without_credentials(url: &Url) -> Url {
    let mut clean = url.clone();
    // Ne peut échouer que pour les URL sans hôte, qui n'ont pas de user-info
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean
}
