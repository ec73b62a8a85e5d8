use crate::binary_xml::{RawAttribute, XmlNode, parse_document};
use crate::canonical::{Attribute, Element, content_hash};
use crate::interpolator::validate;
use crate::source::RawResource;
use crate::value::{ResourceNames, convert};
use crate::{ANDROID_NS, DecodeError};
use std::collections::BTreeSet;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Tags that make up a tween animation
pub const TWEEN_TAGS: [&str; 5] = ["alpha", "scale", "translate", "rotate", "set"];

/// Attributes a tween animation tag can carry
pub const TWEEN_ATTRIBUTES: [&str; 28] = [
    "duration",
    "startOffset",
    "fillEnabled",
    "fillBefore",
    "fillAfter",
    "repeatCount",
    "repeatMode",
    "zAdjustment",
    "backdropColor",
    "detachWallpaper",
    "showWallpaper",
    "hasRoundedCorners",
    "interpolator",
    "shareInterpolator",
    "fromAlpha",
    "toAlpha",
    "fromXScale",
    "toXScale",
    "fromYScale",
    "toYScale",
    "pivotX",
    "pivotY",
    "fromDegrees",
    "toDegrees",
    "fromXDelta",
    "toXDelta",
    "fromYDelta",
    "toYDelta",
];

/// Package id of `android:` framework resources
const FRAMEWORK_PACKAGE_ID: u32 = 0x01;

/// Which table a decoded resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Animation,
    Interpolator,
}

impl ResourceKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Animation => "anim",
            Self::Interpolator => "interpolator",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Animation => "animations",
            Self::Interpolator => "interpolators",
        }
    }
}

/// One decoded animation or interpolator, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub hash: String,
    pub package_name: String,
    pub file_name: String,
    pub content: String,
}

impl ResourceEntry {
    /// Build an entry, hashing `content`
    pub fn new(
        package_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            hash: content_hash(&content),
            package_name: package_name.into(),
            file_name: file_name.into(),
            content,
        }
    }
}

/// The tag and attribute names recognized in tween animations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tags: BTreeSet<String>,
    attributes: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new<T, A>(tags: T, attributes: A) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_tag(&self, name: &str) -> bool {
        self.tags.contains(name)
    }

    pub fn is_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(TWEEN_TAGS, TWEEN_ATTRIBUTES)
    }
}

/// What to do with animation attributes outside the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownAttributes {
    #[default]
    Drop,
    Keep,
}

#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    pub vocabulary: Vocabulary,
    pub unknown_attributes: UnknownAttributes,
    /// Names used when rendering references; unnamed ids stay numeric
    pub names: ResourceNames,
}

/// A resource that decoded successfully
#[derive(Debug, Clone)]
pub struct DecodedResource {
    pub kind: ResourceKind,
    pub element: Element,
    pub entry: ResourceEntry,
}

/// A resource that could not be decoded, and why
#[derive(Debug)]
pub struct ResourceFailure {
    pub file_name: String,
    pub error: DecodeError,
}

/// Everything decoded from one application
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub animations: Vec<ResourceEntry>,
    pub interpolators: Vec<ResourceEntry>,
    pub failures: Vec<ResourceFailure>,
    /// Files whose root tag is neither a tween animation nor an interpolator
    pub out_of_scope: Vec<String>,
}

pub struct ResourceDecoder {
    config: DecoderConfig,
}

impl ResourceDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode every resource of one application.
    ///
    /// A resource that fails to decode is recorded in `failures` and does not stop the
    /// others.
    pub fn decode(&self, resources: &[RawResource], package_name: &str) -> DecodeOutcome {
        let mut outcome = DecodeOutcome::default();

        for resource in resources {
            match self.decode_resource(&resource.bytes, &resource.path, package_name) {
                Ok(Some(decoded)) => {
                    debug!(
                        file = %resource.path,
                        kind = decoded.kind.label(),
                        references = decoded.element.references().len(),
                        "decoded resource"
                    );
                    match decoded.kind {
                        ResourceKind::Animation => outcome.animations.push(decoded.entry),
                        ResourceKind::Interpolator => outcome.interpolators.push(decoded.entry),
                    }
                }
                Ok(None) => {
                    debug!(file = %resource.path, "skipping resource outside the tween vocabulary");
                    outcome.out_of_scope.push(resource.path.clone());
                }
                Err(error) => {
                    warn!(package = package_name, file = %resource.path, %error, "failed to decode resource");
                    outcome.failures.push(ResourceFailure {
                        file_name: resource.path.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            package = package_name,
            animations = outcome.animations.len(),
            interpolators = outcome.interpolators.len(),
            failures = outcome.failures.len(),
            out_of_scope = outcome.out_of_scope.len(),
            "decoded application resources"
        );
        outcome
    }

    /// Decode a single compiled XML file.
    ///
    /// Returns `Ok(None)` when the root tag is neither a tween animation nor an interpolator.
    pub fn decode_resource(
        &self,
        bytes: &[u8],
        file_name: &str,
        package_name: &str,
    ) -> Result<Option<DecodedResource>, DecodeError> {
        let document = parse_document(Cursor::new(bytes))?;
        let Some(kind) = self.classify(&document.root.name) else {
            return Ok(None);
        };

        let element = self.convert_node(&document.root, &document.strings, kind)?;
        if kind == ResourceKind::Interpolator {
            validate(&element)?;
        }

        let content = element.to_canonical_xml()?;
        Ok(Some(DecodedResource {
            kind,
            entry: ResourceEntry::new(package_name, file_name, content),
            element,
        }))
    }

    fn classify(&self, root: &str) -> Option<ResourceKind> {
        if self.config.vocabulary.is_tag(root) {
            Some(ResourceKind::Animation)
        } else if root.ends_with("Interpolator") {
            // unknown interpolator types are rejected by validation, not skipped
            Some(ResourceKind::Interpolator)
        } else {
            None
        }
    }

    /// Only framework attributes count. The platform reads tween parameters by their
    /// `android:` resource id, so `app:duration` or a bare `fromAlpha` without a framework
    /// id are unknown.
    fn is_tween_attribute(&self, attr: &RawAttribute) -> bool {
        let framework = attr.namespace.as_deref() == Some(ANDROID_NS)
            || attr.resource_id.is_some_and(|id| id >> 24 == FRAMEWORK_PACKAGE_ID);
        framework && self.config.vocabulary.is_attribute(&attr.name)
    }

    /// Convert a compiled element tree to text attributes.
    ///
    /// References and theme attributes are never resolved: they are stored as their
    /// symbolic `@...` / `?...` text, and literals as their canonical value text.
    fn convert_node(
        &self,
        node: &XmlNode,
        strings: &[String],
        kind: ResourceKind,
    ) -> Result<Element, DecodeError> {
        let mut element = Element::new(node.name.as_str());
        element.namespaces = node.namespaces.clone();

        for attr in &node.attributes {
            let qualified = attr.qualified_name();
            if kind == ResourceKind::Animation
                && self.config.unknown_attributes == UnknownAttributes::Drop
                && !self.is_tween_attribute(attr)
            {
                debug!(tag = %node.name, attribute = %qualified, "dropping unknown attribute");
                continue;
            }

            let value = convert(attr.data_type, attr.data, strings, &self.config.names)
                .map_err(|source| DecodeError::Conversion {
                    attribute: qualified.clone(),
                    source,
                })?;
            element.attributes.push(Attribute::new(qualified, value));
        }

        for child in &node.children {
            if kind == ResourceKind::Animation && !self.config.vocabulary.is_tag(&child.name) {
                debug!(tag = %child.name, "dropping tag outside the tween vocabulary");
                continue;
            }
            element.children.push(self.convert_node(child, strings, kind)?);
        }

        Ok(element)
    }
}
