//! Gestion des erreurs pour le client SOAP ONVIF

use thiserror::Error;

/// Type Result personnalisé pour onvifsoap
pub type Result<T> = std::result::Result<T, SoapError>;

/// Erreurs possibles lors d'un envoi SOAP
///
/// Chaque variante identifie l'étape qui a échoué. Aucune n'est rattrapée
/// en interne : l'appelant décide d'un éventuel nouvel essai.
#[derive(Error, Debug)]
pub enum SoapError {
    /// Adresse du service mal formée (aucun appel réseau n'a eu lieu)
    #[error("Invalid endpoint address '{address}': {reason}")]
    InvalidEndpoint { address: String, reason: String },

    /// Échec réseau ou de la négociation Digest
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Le corps de la réponse n'a pas pu être lu entièrement
    #[error("Failed to read SOAP response body: {0}")]
    Read(#[source] std::io::Error),

    /// La réponse n'est pas un document XML bien formé
    #[error("Malformed XML in SOAP response: {0}")]
    MalformedXml(#[from] xmltree::ParseError),

    /// La caméra a renvoyé un SOAP Fault
    #[error("{message}")]
    Fault { message: String },
}

impl SoapError {
    pub fn invalid_endpoint(address: &str, reason: impl ToString) -> Self {
        SoapError::InvalidEndpoint {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        SoapError::Fault {
            message: message.into(),
        }
    }

    /// Vérifie si l'erreur provient d'un SOAP Fault renvoyé par la caméra
    pub fn is_fault(&self) -> bool {
        matches!(self, SoapError::Fault { .. })
    }

    /// Message du fault, si c'en est un
    pub fn fault_message(&self) -> Option<&str> {
        match self {
            SoapError::Fault { message } => Some(message),
            _ => None,
        }
    }
}

/// Erreurs du transport HTTP authentifié
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("Digest authentication error: {0}")]
    Digest(#[from] digest_auth::Error),

    /// La caméra refuse les identifiants, challenge Digest compris
    #[error("Authentication rejected by camera (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Invalid WWW-Authenticate header: {0}")]
    InvalidChallenge(String),

    #[error("Invalid credentials in endpoint URL: {0}")]
    Credentials(String),

    #[error("{0}")]
    Other(String),
}
