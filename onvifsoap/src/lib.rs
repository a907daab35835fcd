//! # onvifsoap - Requêtes SOAP 1.2 authentifiées vers des caméras ONVIF
//!
//! Ce crate construit l'enveloppe SOAP d'une requête ONVIF, l'authentifie à
//! deux niveaux (HTTP Digest sur le transport, WS-Security UsernameToken dans
//! le message) puis analyse la réponse et détecte les SOAP Faults.
//!
//! ## Architecture
//!
//! - [`SecurityToken`] : nonce, horodatage et PasswordDigest d'un envoi
//! - [`build_envelope`] : enveloppe complète, blancs compactés
//! - [`SoapClient`] : envoi via un [`Transport`] et classification de la réponse
//! - [`XmlTree`] : arbre typé de la réponse, adressable par chemin pointé
//!
//! ## Example
//!
//! ```no_run
//! use onvifsoap::SoapRequest;
//!
//! let request = SoapRequest::new("<tds:GetDeviceInformation/>")
//!     .with_namespace(r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#)
//!     .with_credentials("admin", "pass");
//!
//! let tree = request.send("http://192.168.1.10/onvif/device_service")?;
//! let model = tree.value_for_path("Envelope.Body.GetDeviceInformationResponse.Model");
//! println!("{:?}", model);
//! # Ok::<(), onvifsoap::SoapError>(())
//! ```

pub mod clock;
pub mod dispatch;
pub mod envelope;
mod error;
pub mod request;
pub mod security;
pub mod transport;
pub mod tree;

pub use clock::camera_time;
pub use dispatch::{SoapClient, send_request};
pub use envelope::{build_envelope, build_envelope_with_token, compact_whitespace};
pub use error::{Result, SoapError, TransportError};
pub use request::{Credentials, SoapRequest};
pub use security::SecurityToken;
pub use transport::{HttpRequest, HttpResponse, Transport, UreqDigestTransport};
pub use tree::{PathValue, XmlNode, XmlTree, soap_fault};
