//! Envoi d'une requête SOAP et classification de la réponse
//!
//! Un envoi correspond exactement à un aller-retour réseau (plus le second
//! passage imposé par un challenge Digest). Aucune relance n'est faite ici.

use std::io::Read;

use tracing::{debug, warn};
use url::Url;

use crate::envelope::build_envelope;
use crate::error::{Result, SoapError};
use crate::request::{Credentials, SoapRequest};
use crate::transport::{HttpRequest, Transport, UreqDigestTransport, without_credentials};
use crate::tree::{XmlTree, soap_fault};

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml";
pub const SOAP_CHARSET: &str = "utf-8";

/// Client SOAP sans état propre : tout l'état d'un envoi est local à l'appel
pub struct SoapClient<T: Transport = UreqDigestTransport> {
    transport: T,
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SoapClient {
    pub fn new() -> Self {
        Self {
            transport: UreqDigestTransport::default(),
        }
    }
}

impl<T: Transport> SoapClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Envoie `request` vers l'adresse de service `xaddr`
    ///
    /// Retourne l'arbre de la réponse, ou l'erreur de la première étape en
    /// échec. Un SOAP Fault dans la réponse est une erreur.
    pub fn send(&self, request: &SoapRequest, xaddr: &str) -> Result<XmlTree> {
        let envelope = build_envelope(request);
        let url = endpoint_url(xaddr, request.credentials())?;

        if !request.suppress_debug {
            debug!(endpoint = %without_credentials(&url), "ONVIF request: {}", envelope);
        }

        let http_request = HttpRequest::post(url, envelope.into_bytes())
            .with_header("Content-Type", SOAP_CONTENT_TYPE)
            .with_header("Charset", SOAP_CHARSET);

        let response = self.transport.round_trip(http_request)?;
        let status = response.status;

        let mut body = Vec::new();
        let mut reader = response.body;
        reader.read_to_end(&mut body).map_err(SoapError::Read)?;

        if !request.suppress_debug {
            debug!(status, "ONVIF response: {}", String::from_utf8_lossy(&body));
        }

        let tree = XmlTree::parse(&body)?;

        if let Some(message) = soap_fault(&tree) {
            warn!(status, fault = %message, "ONVIF camera returned a SOAP fault");
            return Err(SoapError::fault(message));
        }

        Ok(tree)
    }
}

/// Envoie une requête avec le transport Digest par défaut
pub fn send_request(request: &SoapRequest, xaddr: &str) -> Result<XmlTree> {
    SoapClient::new().send(request, xaddr)
}

/// Valide l'adresse de service et y place les identifiants Digest
pub fn endpoint_url(xaddr: &str, credentials: Option<&Credentials>) -> Result<Url> {
    // `url` retire silencieusement certains caractères de contrôle ; on les refuse
    if let Some(c) = xaddr.chars().find(|c| c.is_control()) {
        return Err(SoapError::invalid_endpoint(
            xaddr,
            format!("control character {:?}", c),
        ));
    }

    let mut url = Url::parse(xaddr).map_err(|e| SoapError::invalid_endpoint(xaddr, e))?;

    if let Some(credentials) = credentials {
        url.set_username(&credentials.username)
            .and_then(|_| url.set_password(Some(&credentials.password)))
            .map_err(|_| SoapError::invalid_endpoint(xaddr, "address cannot carry credentials"))?;
    }

    Ok(url)
}
