//! Heure de la caméra
//!
//! Les caméras avec protection anti-rejeu refusent un jeton dont l'horodatage
//! s'écarte de plus de quelques secondes de leur propre horloge. La réponse à
//! `GetSystemDateAndTime` (appel non authentifié) fournit cette horloge, à
//! reporter dans [`SoapRequest::camera_time`](crate::SoapRequest).

use chrono::{DateTime, NaiveDate, Utc};

use crate::tree::{XmlNode, XmlTree};

/// Corps de la requête `GetSystemDateAndTime`
pub const GET_SYSTEM_DATE_AND_TIME: &str = "<tds:GetSystemDateAndTime/>";
/// Namespace du service Device, à déclarer pour [`GET_SYSTEM_DATE_AND_TIME`]
pub const DEVICE_NS_DECLARATION: &str = r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl""#;

const UTC_DATE_TIME_PATH: &str =
    "Envelope.Body.GetSystemDateAndTimeResponse.SystemDateAndTime.UTCDateTime";

/// Extrait l'heure UTC de la caméra d'une réponse `GetSystemDateAndTime`
///
/// Retourne `None` si un champ manque ou si la date est invalide.
pub fn camera_time(tree: &XmlTree) -> Option<DateTime<Utc>> {
    let utc = tree.lookup(UTC_DATE_TIME_PATH)?.as_element()?;

    let date = utc.child("Date")?;
    let time = utc.child("Time")?;

    let field = |node: &XmlNode, name: &str| -> Option<u32> { node.child(name)?.text.as_deref()?.parse().ok() };

    let year = date.child("Year")?.text.as_deref()?.parse::<i32>().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(date, "Month")?, field(date, "Day")?)?
        .and_hms_opt(field(time, "Hour")?, field(time, "Minute")?, field(time, "Second")?)?;

    Some(naive.and_utc())
}
