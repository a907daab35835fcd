//! Construction de l'enveloppe SOAP 1.2

use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;

use crate::request::SoapRequest;
use crate::security::SecurityToken;

pub const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WS_ADDRESSING_NS: &str = "http://www.w3.org/2005/08/addressing";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

// Blancs ASCII uniquement : les espaces Unicode du corps ne sont pas touchés
static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">[\t\n\x0C\r ]+<").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\t\n\x0C\r ]+").unwrap());

/// Construit l'enveloppe complète d'une requête
///
/// Un jeton WS-Security neuf est généré si la requête porte des identifiants.
pub fn build_envelope(request: &SoapRequest) -> String {
    let token = request.credentials().map(|c| {
        SecurityToken::generate(&c.password, request.token_age, request.camera_time)
    });
    build_envelope_with_token(request, token.as_ref())
}

/// Construit l'enveloppe avec un jeton déjà calculé
///
/// Le jeton n'est utilisé que si la requête porte un nom d'utilisateur.
/// L'ordre des éléments est fixe : déclaration, `Envelope`, `Header`
/// (`Action` puis `Security`), `Body`.
pub fn build_envelope_with_token(request: &SoapRequest, token: Option<&SecurityToken>) -> String {
    let mut xml = String::with_capacity(1024 + request.body.len());

    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<s:Envelope xmlns:s=""#);
    xml.push_str(SOAP_ENVELOPE_NS);
    xml.push('"');
    for namespace in &request.namespaces {
        xml.push(' ');
        xml.push_str(namespace);
    }
    xml.push('>');

    let action = request.action();
    let security = request
        .credentials()
        .zip(token)
        .map(|(c, t)| t.to_xml(&c.username));

    if action.is_some() || security.is_some() {
        xml.push_str("<s:Header>");

        if let Some(action) = action {
            xml.push_str(&format!(
                r#"<Action mustUnderstand="1"
        xmlns="{WS_ADDRESSING_NS}">{}</Action>"#,
                escape(action)
            ));
        }

        if let Some(security) = security {
            xml.push_str(&security);
        }

        xml.push_str("</s:Header>");
    }

    // Le corps est inséré sans échappement ni validation
    xml.push_str("<s:Body>");
    xml.push_str(&request.body);
    xml.push_str("</s:Body>");

    xml.push_str("</s:Envelope>");

    compact_whitespace(&xml)
}

/// Supprime les blancs entre balises puis réduit toute suite de blancs à un espace
///
/// L'opération est idempotente.
pub fn compact_whitespace(xml: &str) -> String {
    let tight = BETWEEN_TAGS.replace_all(xml, "><");
    WHITESPACE_RUN.replace_all(&tight, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password_digest;
    use crate::tree::XmlTree;
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

    const TDS: &str = r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#;

    #[test]
    fn test_no_header_without_credentials_or_action() {
        let request = SoapRequest::new("<tds:GetDeviceInformation/>").with_namespace(TDS);
        let xml = build_envelope(&request);

        assert!(!xml.contains("Header"));
        assert!(!xml.contains("Security"));
        assert_eq!(
            xml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl">"#,
                r#"<s:Body><tds:GetDeviceInformation/></s:Body></s:Envelope>"#
            )
        );
    }

    #[test]
    fn test_empty_username_means_no_security() {
        let request = SoapRequest::new("<x/>").with_credentials("", "pass");
        let xml = build_envelope(&request);
        assert!(!xml.contains("<s:Header>"));
        assert!(!xml.contains("Security"));
    }

    #[test]
    fn test_action_only_header() {
        let request = SoapRequest::new("<x/>").with_action("http://example.com/Do");
        let xml = build_envelope(&request);

        assert!(xml.contains(concat!(
            r#"<s:Header><Action mustUnderstand="1" xmlns="http://www.w3.org/2005/08/addressing">"#,
            r#"http://example.com/Do</Action></s:Header>"#
        )));
        assert!(!xml.contains("Security"));
    }

    #[test]
    fn test_action_precedes_security() {
        let request = SoapRequest::new("<x/>")
            .with_action("http://example.com/Do")
            .with_credentials("admin", "pass");
        let xml = build_envelope(&request);

        let action = xml.find("<Action").unwrap();
        let security = xml.find("<Security").unwrap();
        let body = xml.find("<s:Body>").unwrap();
        assert!(action < security);
        assert!(security < body);
    }

    #[test]
    fn test_security_fragment_is_compacted() {
        let token = SecurityToken::from_parts("abc", "2024-01-01T00:00:00Z", "pass");
        let request = SoapRequest::new("<x/>").with_credentials("admin", "pass");
        let xml = build_envelope_with_token(&request, Some(&token));

        let expected = format!(
            concat!(
                r#"<s:Header><Security s:mustUnderstand="1" xmlns="{}"><UsernameToken>"#,
                r#"<Username>admin</Username><Password Type="{}">{}</Password>"#,
                r#"<Nonce EncodingType="{}">YWJj</Nonce>"#,
                r#"<Created xmlns="{}">2024-01-01T00:00:00Z</Created>"#,
                r#"</UsernameToken></Security></s:Header>"#
            ),
            crate::security::WSSE_NS,
            crate::security::PASSWORD_DIGEST_TYPE,
            token.digest(),
            crate::security::BASE64_ENCODING_TYPE,
            crate::security::WSU_NS,
        );
        assert!(xml.contains(&expected), "{xml}");
    }

    #[test]
    fn test_embedded_digest_can_be_recomputed() {
        let request = SoapRequest::new("<tds:GetDeviceInformation/>")
            .with_namespace(TDS)
            .with_credentials("admin", "pass");
        let xml = build_envelope(&request);

        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let token = "Envelope.Header.Security.UsernameToken";
        let digest = tree.value_for_path(&format!("{token}.Password")).unwrap();
        let nonce64 = tree.value_for_path(&format!("{token}.Nonce")).unwrap();
        let created = tree.value_for_path(&format!("{token}.Created")).unwrap();

        let nonce = BASE64.decode(nonce64).unwrap();
        assert_eq!(digest, password_digest(&nonce, created, "pass"));
        assert_eq!(
            tree.value_for_path(&format!("{token}.Username")),
            Some("admin")
        );
    }

    #[test]
    fn test_camera_time_is_asserted_exactly() {
        use chrono::{TimeDelta, TimeZone, Utc};

        let camera = Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap();
        let request = SoapRequest::new("<x/>")
            .with_credentials("admin", "pass")
            .with_camera_time(camera)
            .with_token_age(TimeDelta::seconds(4));
        let xml = build_envelope(&request);

        assert!(xml.contains(">2020-02-03T04:05:10Z</Created>"));
    }

    #[test]
    fn test_huge_token_age_does_not_panic() {
        use chrono::{TimeDelta, TimeZone, Utc};

        let camera = Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap();
        let request = SoapRequest::new("<x/>")
            .with_credentials("admin", "pass")
            .with_camera_time(camera)
            .with_token_age(TimeDelta::MAX);
        let xml = build_envelope(&request);

        assert!(xml.contains(">2020-02-03T04:05:06Z</Created>"));
    }

    #[test]
    fn test_body_is_verbatim_apart_from_whitespace() {
        let request = SoapRequest::new("<a  attr=\"1\">\n   <b>x &amp; y</b>\n</a>");
        let xml = build_envelope(&request);
        assert!(xml.contains("<s:Body><a attr=\"1\"><b>x &amp; y</b></a></s:Body>"));
    }

    #[test]
    fn test_compaction_is_idempotent() {
        let request = SoapRequest::new("<a>\n  text   with\tspaces  <b/>\n</a>")
            .with_namespace(TDS)
            .with_action("urn:act")
            .with_credentials("admin", "pass");
        let once = build_envelope(&request);
        let twice = compact_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_compact_whitespace() {
        assert_eq!(compact_whitespace("<a>  \n <b> x \t y </b>\n</a>"), "<a><b> x y </b></a>");
    }

    #[test]
    fn test_namespaces_in_order() {
        let request = SoapRequest::new("<x/>")
            .with_namespace(r#"xmlns:a="urn:a""#)
            .with_namespace(r#"xmlns:b="urn:b""#);
        let xml = build_envelope(&request);
        assert!(xml.contains(r#"soap-envelope" xmlns:a="urn:a" xmlns:b="urn:b">"#));
    }
}
