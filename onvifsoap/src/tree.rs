//! Arbre XML typé des réponses SOAP
//!
//! La réponse est convertie en un arbre possédé, adressable par chemin pointé
//! (`Envelope.Body.Fault.faultstring`). Les préfixes d'espace de noms sont
//! ignorés dans les chemins ; `#text` désigne le texte d'un élément et
//! `-nom` un de ses attributs.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufReader;

use xmltree::{Element, XMLNode};

/// Chemin du message de fault SOAP 1.2
pub const SOAP12_FAULT_PATH: &str = "Envelope.Body.Fault.Reason.Text.#text";
/// Chemin du message de fault SOAP 1.1
pub const SOAP11_FAULT_PATH: &str = "Envelope.Body.Fault.faultstring";

const TEXT_KEY: &str = "#text";
const ATTRIBUTE_PREFIX: char = '-';

/// Élément de l'arbre de réponse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Nom local (sans préfixe)
    pub name: String,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    /// Attributs, clés sans préfixe de namespace
    pub attributes: BTreeMap<String, String>,
    /// Texte direct de l'élément, blancs de bord retirés (`None` si vide)
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

/// Valeur trouvée au bout d'un chemin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathValue<'a> {
    Element(&'a XmlNode),
    Text(&'a str),
    Attribute(&'a str),
}

impl<'a> PathValue<'a> {
    /// Valeur textuelle : texte de l'élément, texte ou valeur d'attribut
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            PathValue::Element(node) => node.text.as_deref(),
            PathValue::Text(text) | PathValue::Attribute(text) => Some(text),
        }
    }

    pub fn as_element(&self) -> Option<&'a XmlNode> {
        match *self {
            PathValue::Element(node) => Some(node),
            _ => None,
        }
    }
}

impl XmlNode {
    fn from_element(element: &Element) -> Self {
        let mut text = String::new();
        let mut children = Vec::new();

        for child in &element.children {
            match child {
                XMLNode::Element(e) => children.push(XmlNode::from_element(e)),
                XMLNode::Text(t) | XMLNode::CData(t) => text.push_str(t),
                _ => {}
            }
        }

        let attributes = element
            .attributes
            .iter()
            .map(|(k, v)| (local_name(k).to_string(), v.clone()))
            .collect();

        let text = text.trim();

        XmlNode {
            name: element.name.clone(),
            prefix: element.prefix.clone(),
            namespace: element.namespace.clone(),
            attributes,
            text: (!text.is_empty()).then(|| text.to_string()),
            children,
        }
    }

    /// Premier enfant portant ce nom local
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Résout un chemin relatif à cet élément (le premier segment désigne un enfant)
    pub fn lookup(&self, path: &str) -> Option<PathValue<'_>> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        resolve_first(self, &segments)
    }

    fn collect_leaves(&self, path: &str, out: &mut Vec<(String, String)>) {
        for (key, value) in &self.attributes {
            out.push((format!("{path}.{ATTRIBUTE_PREFIX}{key}"), value.clone()));
        }
        if let Some(text) = &self.text {
            if self.attributes.is_empty() && self.children.is_empty() {
                out.push((path.to_string(), text.clone()));
            } else {
                out.push((format!("{path}.{TEXT_KEY}"), text.clone()));
            }
        }
        for child in &self.children {
            child.collect_leaves(&format!("{path}.{}", child.name), out);
        }
    }
}

fn local_name(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map(|(_, local)| local)
        .unwrap_or(qualified)
}

fn resolve_first<'a>(node: &'a XmlNode, segments: &[&str]) -> Option<PathValue<'a>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(PathValue::Element(node));
    };

    // `#text` et `-attr` terminent forcément le chemin
    if *head == TEXT_KEY {
        return match rest {
            [] => node.text.as_deref().map(PathValue::Text),
            _ => None,
        };
    }

    if let Some(attr) = head.strip_prefix(ATTRIBUTE_PREFIX) {
        return match rest {
            [] => node.attribute(attr).map(PathValue::Attribute),
            _ => None,
        };
    }

    // Parmi plusieurs frères homonymes, le premier qui résout le reste gagne
    node.children_named(head)
        .find_map(|child| resolve_first(child, rest))
}

fn resolve_all<'a>(node: &'a XmlNode, segments: &[&str], out: &mut Vec<PathValue<'a>>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(PathValue::Element(node));
        return;
    };

    if *head == TEXT_KEY {
        if let (true, Some(text)) = (rest.is_empty(), node.text.as_deref()) {
            out.push(PathValue::Text(text));
        }
        return;
    }

    if let Some(attr) = head.strip_prefix(ATTRIBUTE_PREFIX) {
        if let (true, Some(value)) = (rest.is_empty(), node.attribute(attr)) {
            out.push(PathValue::Attribute(value));
        }
        return;
    }

    for child in node.children_named(head) {
        resolve_all(child, rest, out);
    }
}

/// Réponse SOAP analysée
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    root: XmlNode,
}

impl XmlTree {
    /// Analyse un document XML complet
    pub fn parse(xml: &[u8]) -> Result<Self, xmltree::ParseError> {
        let root = Element::parse(BufReader::new(xml))?;
        Ok(Self {
            root: XmlNode::from_element(&root),
        })
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// Résout un chemin pointé dont le premier segment est l'élément racine
    pub fn lookup(&self, path: &str) -> Option<PathValue<'_>> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let (head, rest) = segments.split_first()?;
        if *head != self.root.name {
            return None;
        }
        resolve_first(&self.root, rest)
    }

    /// Valeur textuelle au bout du chemin, absente si le chemin ne résout pas
    /// ou si l'élément n'a pas de texte
    pub fn value_for_path(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(|v| v.as_str())
    }

    /// Toutes les valeurs correspondant au chemin (frères homonymes compris)
    pub fn values_for_path(&self, path: &str) -> Vec<PathValue<'_>> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let mut out = Vec::new();
        if let Some((head, rest)) = segments.split_first() {
            if *head == self.root.name {
                resolve_all(&self.root, rest, &mut out);
            }
        }
        out
    }

    /// Liste aplatie `(chemin, valeur)` de toutes les feuilles de l'arbre
    pub fn leaf_paths(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.root.collect_leaves(&self.root.name, &mut out);
        out
    }
}

impl fmt::Display for XmlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, value) in self.leaf_paths() {
            writeln!(f, "{path} = {value}")?;
        }
        Ok(())
    }
}

/// Message de SOAP Fault porté par la réponse, s'il y en a un
///
/// Le chemin SOAP 1.2 est consulté en premier ; la première valeur non vide
/// fait foi.
pub fn soap_fault(tree: &XmlTree) -> Option<&str> {
    [SOAP12_FAULT_PATH, SOAP11_FAULT_PATH]
        .into_iter()
        .find_map(|path| tree.value_for_path(path).filter(|m| !m.is_empty()))
}
