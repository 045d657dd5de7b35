//! IMS content-packaging manifest model.
//!
//! [`Manifest::from_xml`] reads `imsmanifest.xml` into an
//! organization / item / resource tree. Elements are matched by local name so
//! the same code reads SCORM 1.2 and SCORM 2004 manifests regardless of
//! namespace prefixes. [`Manifest::to_xml`] writes a manifest back out with
//! the namespaces of the requested version.

use crate::{Error, ResourceId, Result, ScormVersion};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Package-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestMetadata {
    pub schema: String,
    pub schema_version: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub duration: String,
}

/// A node in an organization's activity tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub identifier: String,
    pub title: String,
    /// Resource launched by this item; container items have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_identifier: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    pub children: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_time_allowed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_from_lms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mastery_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_threshold: Option<String>,
}

impl Item {
    /// A launchable leaf item.
    pub fn leaf(
        identifier: impl Into<String>,
        title: impl Into<String>,
        resource: impl Into<ResourceId>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            resource_identifier: Some(resource.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    pub identifier: String,
    pub title: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    pub identifier: ResourceId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// `sco` or `asset`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scorm_type: Option<String>,
    pub files: Vec<String>,
    pub dependencies: Vec<ResourceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    pub identifier: String,
    pub version: String,
    pub metadata: ManifestMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_organization: Option<String>,
    pub organizations: Vec<Organization>,
    /// Resources in document order.
    pub resources: Vec<Resource>,
}

impl Manifest {
    /// Parse a manifest document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).map_err(|e| Error::InvalidManifest(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "manifest" {
            return Err(Error::InvalidManifest(format!(
                "expected <manifest> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let organizations = child(root, "organizations");
        Ok(Self {
            identifier: attr(root, "identifier").unwrap_or_default(),
            version: attr(root, "version").unwrap_or_default(),
            metadata: child(root, "metadata").map(parse_metadata).unwrap_or_default(),
            default_organization: organizations.and_then(|o| attr(o, "default")),
            organizations: organizations
                .map(|o| children(o, "organization").map(parse_organization).collect())
                .unwrap_or_default(),
            resources: child(root, "resources")
                .map(|r| children(r, "resource").map(parse_resource).collect())
                .unwrap_or_default(),
        })
    }

    pub fn resource(&self, identifier: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.identifier == identifier)
    }

    /// The organization named as default, or the first one.
    pub fn default_organization(&self) -> Option<&Organization> {
        self.default_organization
            .as_deref()
            .and_then(|id| self.organizations.iter().find(|o| o.identifier == id))
            .or_else(|| self.organizations.first())
    }

    /// Every item of every organization, depth first.
    pub fn items(&self) -> Vec<&Item> {
        fn walk<'a>(items: &'a [Item], out: &mut Vec<&'a Item>) {
            for item in items {
                out.push(item);
                walk(&item.children, out);
            }
        }
        let mut out = Vec::new();
        for org in &self.organizations {
            walk(&org.items, &mut out);
        }
        out
    }

    /// Launch file of the first launchable item of the default organization.
    pub fn launch_href(&self) -> Option<&str> {
        fn first_launchable(items: &[Item]) -> Option<&str> {
            items.iter().find_map(|item| {
                item.resource_identifier
                    .as_deref()
                    .or_else(|| first_launchable(&item.children))
            })
        }
        let resource = first_launchable(&self.default_organization()?.items)?;
        self.resource(resource)?.href.as_deref()
    }

    /// Write the manifest as XML with the namespaces of `version`.
    pub fn to_xml(&self, version: ScormVersion) -> String {
        let mut w = XmlWriter::new();
        let mut root_attrs = vec![
            ("identifier", self.identifier.as_str()),
            ("version", non_empty(&self.version).unwrap_or("1.0")),
        ];
        match version {
            ScormVersion::Scorm12 => root_attrs.extend([
                ("xmlns", "http://www.imsproject.org/xsd/imscp_rootv1p1p2"),
                ("xmlns:adlcp", "http://www.adlnet.org/xsd/adlcp_rootv1p2"),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
                (
                    "xsi:schemaLocation",
                    "http://www.imsproject.org/xsd/imscp_rootv1p1p2 imscp_rootv1p1p2.xsd \
                     http://www.imsglobal.org/xsd/imsmd_rootv1p2p1 imsmd_rootv1p2p1.xsd \
                     http://www.adlnet.org/xsd/adlcp_rootv1p2 adlcp_rootv1p2.xsd",
                ),
            ]),
            ScormVersion::Scorm2004 => root_attrs.extend([
                ("xmlns", "http://www.imsglobal.org/xsd/imscp_v1p1"),
                ("xmlns:adlcp", "http://www.adlnet.org/xsd/adlcp_v1p3"),
                ("xmlns:adlseq", "http://www.adlnet.org/xsd/adlseq_v1p3"),
                ("xmlns:adlnav", "http://www.adlnet.org/xsd/adlnav_v1p3"),
                ("xmlns:imsss", "http://www.imsglobal.org/xsd/imsss"),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
                (
                    "xsi:schemaLocation",
                    "http://www.imsglobal.org/xsd/imscp_v1p1 imscp_v1p1.xsd \
                     http://www.adlnet.org/xsd/adlcp_v1p3 adlcp_v1p3.xsd \
                     http://www.adlnet.org/xsd/adlseq_v1p3 adlseq_v1p3.xsd \
                     http://www.adlnet.org/xsd/adlnav_v1p3 adlnav_v1p3.xsd \
                     http://www.imsglobal.org/xsd/imsss imsss_v1p0.xsd",
                ),
            ]),
        }
        w.open("manifest", &root_attrs);

        let (default_schema_version, scorm_type_attr) = match version {
            ScormVersion::Scorm12 => ("1.2", "adlcp:scormtype"),
            ScormVersion::Scorm2004 => ("2004 4th Edition", "adlcp:scormType"),
        };
        w.open("metadata", &[]);
        w.text_element("schema", non_empty(&self.metadata.schema).unwrap_or("ADL SCORM"));
        w.text_element(
            "schemaversion",
            non_empty(&self.metadata.schema_version).unwrap_or(default_schema_version),
        );
        w.close("metadata");

        let default_org = self
            .default_organization
            .clone()
            .or_else(|| self.organizations.first().map(|o| o.identifier.clone()))
            .unwrap_or_default();
        w.open("organizations", &[("default", default_org.as_str())]);
        for org in &self.organizations {
            w.open("organization", &[("identifier", org.identifier.as_str())]);
            w.text_element("title", &org.title);
            for item in &org.items {
                write_item(&mut w, item, version);
            }
            w.close("organization");
        }
        w.close("organizations");

        w.open("resources", &[]);
        for resource in &self.resources {
            let mut attrs = vec![
                ("identifier", resource.identifier.as_str()),
                ("type", non_empty(&resource.kind).unwrap_or("webcontent")),
            ];
            if let Some(scorm_type) = resource.scorm_type.as_deref() {
                attrs.push((scorm_type_attr, scorm_type));
            }
            if let Some(href) = resource.href.as_deref() {
                attrs.push(("href", href));
            }
            if resource.files.is_empty() && resource.dependencies.is_empty() {
                w.empty("resource", &attrs);
                continue;
            }
            w.open("resource", &attrs);
            for file in &resource.files {
                w.empty("file", &[("href", file.as_str())]);
            }
            for dep in &resource.dependencies {
                w.empty("dependency", &[("identifierref", dep.as_str())]);
            }
            w.close("resource");
        }
        w.close("resources");

        w.close("manifest");
        w.finish()
    }
}

/// Parse a manifest, logging and swallowing failures.
pub fn parse_manifest(xml: &str) -> Option<Manifest> {
    Manifest::from_xml(xml)
        .inspect_err(|e| error!(error = %e, "Failed to parse manifest"))
        .ok()
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

/// Attribute by local name, ignoring namespace prefix and ASCII case.
fn attr(node: Node, name: &str) -> Option<String> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name).map(text).filter(|t| !t.is_empty())
}

/// Text of a LOM language-string container (`<string>` or `<langstring>`).
fn lang_string(node: Node) -> String {
    node.descendants()
        .find(|n| n.is_element() && matches!(n.tag_name().name(), "string" | "langstring"))
        .map(text)
        .unwrap_or_else(|| text(node))
}

fn parse_metadata(metadata: Node) -> ManifestMetadata {
    let lom = metadata
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "lom");
    let general = lom.and_then(|l| child(l, "general"));

    let from_lom = |name: &str| {
        general
            .and_then(|g| child(g, name))
            .map(lang_string)
            .filter(|t| !t.is_empty())
    };

    ManifestMetadata {
        schema: child_text(metadata, "schema").unwrap_or_default(),
        schema_version: child_text(metadata, "schemaversion").unwrap_or_default(),
        title: from_lom("title")
            .or_else(|| child_text(metadata, "title"))
            .unwrap_or_default(),
        description: from_lom("description")
            .or_else(|| child_text(metadata, "description"))
            .unwrap_or_default(),
        keywords: general
            .map(|g| {
                children(g, "keyword")
                    .map(lang_string)
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        duration: lom
            .and_then(|l| child(l, "technical"))
            .and_then(|t| child(t, "duration"))
            .map(|d| {
                child_text(d, "datetime")
                    .or_else(|| child_text(d, "duration"))
                    .unwrap_or_else(|| text(d))
            })
            .unwrap_or_default(),
    }
}

fn parse_organization(node: Node) -> Organization {
    Organization {
        identifier: attr(node, "identifier").unwrap_or_default(),
        title: child_text(node, "title").unwrap_or_default(),
        items: children(node, "item").map(parse_item).collect(),
    }
}

fn parse_item(node: Node) -> Item {
    Item {
        identifier: attr(node, "identifier").unwrap_or_default(),
        title: child_text(node, "title").unwrap_or_default(),
        resource_identifier: attr(node, "identifierref"),
        parameters: attr(node, "parameters"),
        children: children(node, "item").map(parse_item).collect(),
        prerequisites: child_text(node, "prerequisites"),
        max_time_allowed: child_text(node, "maxtimeallowed"),
        time_limit_action: child_text(node, "timelimitaction"),
        data_from_lms: child_text(node, "datafromlms"),
        mastery_score: child_text(node, "masteryscore"),
        completion_threshold: child(node, "completionThreshold").and_then(|c| {
            non_empty(&text(c))
                .map(str::to_string)
                .or_else(|| attr(c, "minProgressMeasure"))
        }),
    }
}

fn parse_resource(node: Node) -> Resource {
    Resource {
        identifier: attr(node, "identifier").unwrap_or_default(),
        kind: attr(node, "type").unwrap_or_default(),
        href: attr(node, "href"),
        scorm_type: attr(node, "scormtype"),
        files: children(node, "file").filter_map(|f| attr(f, "href")).collect(),
        dependencies: children(node, "dependency")
            .filter_map(|d| attr(d, "identifierref"))
            .collect(),
    }
}

fn write_item(w: &mut XmlWriter, item: &Item, version: ScormVersion) {
    let mut attrs = vec![("identifier", item.identifier.as_str())];
    if let Some(res) = item.resource_identifier.as_deref() {
        attrs.push(("identifierref", res));
    }
    if let Some(params) = item.parameters.as_deref() {
        attrs.push(("parameters", params));
    }
    w.open("item", &attrs);
    w.text_element("title", &item.title);

    let extensions: &[(&str, &Option<String>)] = match version {
        ScormVersion::Scorm12 => &[
            ("adlcp:prerequisites", &item.prerequisites),
            ("adlcp:maxtimeallowed", &item.max_time_allowed),
            ("adlcp:timelimitaction", &item.time_limit_action),
            ("adlcp:datafromlms", &item.data_from_lms),
            ("adlcp:masteryscore", &item.mastery_score),
        ],
        ScormVersion::Scorm2004 => &[
            ("adlcp:timeLimitAction", &item.time_limit_action),
            ("adlcp:dataFromLMS", &item.data_from_lms),
            ("adlcp:completionThreshold", &item.completion_threshold),
        ],
    };
    for (tag, value) in extensions {
        if let Some(value) = value.as_deref() {
            w.text_element(tag, value);
        }
    }

    for child in &item.children {
        write_item(w, child, version);
    }
    w.close("item");
}

/// Minimal indenting XML emitter.
struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.out.push_str(&"  ".repeat(self.depth));
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value));
            self.out.push('"');
        }
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push_str("/>\n");
    }

    fn text_element(&mut self, tag: &str, text: &str) {
        self.start_tag(tag, &[]);
        self.out.push('>');
        self.out.push_str(&escape(text));
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.out.push_str(&"  ".repeat(self.depth));
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn finish(self) -> String {
        self.out
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
