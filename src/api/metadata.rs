//! Metadata catalog for OData v2 services
//!
//! Parses EDMX metadata documents into an in-memory entity/relationship graph:
//! entity sets, entity types (with properties and navigation properties) and
//! association sets. The catalog is built once per session and looked up by
//! name afterwards.

use anyhow::Result;
use log::{debug, info};
use roxmltree::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::constants::{NAV_NAME_SUFFIX, NUMERIC_SUFFIX_SET};

/// Leaf data field of an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Declared wire type, e.g. `Edm.String` or `Edm.DateTime`
    pub wire_type: String,
    /// Optional display label from the `sap:label` annotation
    pub label: Option<String>,
}

/// Typed edge from one entity to another, resolved through an association set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    /// Relationship identifier, possibly namespace-qualified
    pub relationship: String,
    /// Role of the endpoint this edge targets
    pub to_role: String,
}

/// One endpoint of a relationship, binding a role to an entity set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndElement {
    pub role: String,
    pub entity_set: String,
}

/// Relationship declaration with its role-to-entity-set endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationSet {
    pub name: String,
    pub ends: Vec<EndElement>,
}

/// Entity-set declaration as it appears in the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    /// Entity type name with any namespace prefix stripped
    pub entity_type: String,
}

/// Entity-type declaration with its attribute bags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub properties: Vec<Property>,
    pub navigations: Vec<NavigationProperty>,
}

/// Entity set annotated with its entity type's properties and navigation
/// properties. Immutable once parsed; looked up by set name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity-set name, the key used for lookup and navigation targets
    pub name: String,
    pub entity_type: String,
    pub properties: Vec<Property>,
    pub navigations: Vec<NavigationProperty>,
}

/// Find a navigation property by name, honouring the convention that the
/// declared name may carry a `Details` suffix on top of the requested one.
pub fn find_navigation<'a>(
    navigations: &'a [NavigationProperty],
    name: &str,
) -> Option<&'a NavigationProperty> {
    navigations
        .iter()
        .find(|n| n.name == name || n.name.strip_suffix(NAV_NAME_SUFFIX) == Some(name))
}

impl Entity {
    /// Navigation property of this entity under `name`, if any
    pub fn navigation(&self, name: &str) -> Option<&NavigationProperty> {
        find_navigation(&self.navigations, name)
    }
}

/// Raw parse result of one metadata document page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub entity_sets: Vec<EntitySet>,
    pub entity_types: Vec<EntityType>,
    pub association_sets: Vec<AssociationSet>,
}

/// Options controlling which entity sets pass the presentation filter.
/// Resolution always sees the full, unfiltered catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Entity-set names always retained for presentation
    pub allowed_sets: Vec<String>,
}

impl CatalogOptions {
    pub fn with_allowed(sets: &[&str]) -> Self {
        Self { allowed_sets: sets.iter().map(|s| s.to_string()).collect() }
    }

    fn retains(&self, set_name: &str) -> bool {
        self.allowed_sets.iter().any(|s| s == set_name) || NUMERIC_SUFFIX_SET.is_match(set_name)
    }
}

/// Strip a namespace qualifier, keeping the text after the last `.`
pub(crate) fn strip_namespace(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// Parse one EDMX metadata page into its raw declarations
pub fn parse_metadata(metadata_xml: &str) -> Result<MetadataDocument> {
    let doc = Document::parse(metadata_xml)
        .map_err(|e| anyhow::anyhow!("Failed to parse metadata XML: {}", e))?;

    let mut parsed = MetadataDocument::default();

    for entity_type in doc.descendants().filter(|n| n.has_tag_name("EntityType")) {
        let Some(name) = entity_type.attribute("Name") else { continue };

        let mut properties = Vec::new();
        for property in entity_type.children().filter(|n| n.has_tag_name("Property")) {
            if let Some(prop_name) = property.attribute("Name") {
                properties.push(Property {
                    name: prop_name.to_string(),
                    wire_type: property.attribute("Type").unwrap_or("unknown").to_string(),
                    label: property
                        .attribute(("http://www.sap.com/Protocols/SAPData", "label"))
                        .map(|s| s.to_string()),
                });
            }
        }

        let mut navigations = Vec::new();
        for nav in entity_type.children().filter(|n| n.has_tag_name("NavigationProperty")) {
            let (Some(nav_name), Some(relationship), Some(to_role)) = (
                nav.attribute("Name"),
                nav.attribute("Relationship"),
                nav.attribute("ToRole"),
            ) else {
                continue;
            };
            navigations.push(NavigationProperty {
                name: nav_name.to_string(),
                relationship: relationship.to_string(),
                to_role: to_role.to_string(),
            });
        }

        debug!(
            "Parsed entity type {} ({} properties, {} navigations)",
            name,
            properties.len(),
            navigations.len()
        );
        parsed.entity_types.push(EntityType {
            name: name.to_string(),
            properties,
            navigations,
        });
    }

    for entity_set in doc.descendants().filter(|n| n.has_tag_name("EntitySet")) {
        let (Some(name), Some(entity_type)) =
            (entity_set.attribute("Name"), entity_set.attribute("EntityType"))
        else {
            continue;
        };
        parsed.entity_sets.push(EntitySet {
            name: name.to_string(),
            entity_type: strip_namespace(entity_type).to_string(),
        });
    }

    for assoc in doc.descendants().filter(|n| n.has_tag_name("AssociationSet")) {
        let Some(name) = assoc.attribute("Name") else { continue };
        let ends = assoc
            .children()
            .filter(|n| n.has_tag_name("End"))
            .filter_map(|end| {
                let (role, entity_set) = (end.attribute("Role")?, end.attribute("EntitySet")?);
                Some(EndElement {
                    role: role.to_string(),
                    entity_set: entity_set.to_string(),
                })
            })
            .collect();
        parsed.association_sets.push(AssociationSet {
            name: name.to_string(),
            ends,
        });
    }

    Ok(parsed)
}

/// Name-indexed entity/relationship graph built from one or more metadata
/// pages. All entity sets are kept for navigation resolution; a filtered
/// subset is exposed for presentation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, Entity>,
    /// Presentation subset, in declaration order
    filtered: Vec<String>,
    associations: HashMap<String, AssociationSet>,
}

impl Catalog {
    /// Build a catalog from parsed metadata pages. Entity sets are annotated
    /// with their entity type's properties when a name match exists.
    pub fn from_documents(pages: Vec<MetadataDocument>, options: &CatalogOptions) -> Self {
        let mut types: HashMap<String, EntityType> = HashMap::new();
        let mut sets: Vec<EntitySet> = Vec::new();
        let mut associations: HashMap<String, AssociationSet> = HashMap::new();

        for page in pages {
            for entity_type in page.entity_types {
                types.insert(entity_type.name.clone(), entity_type);
            }
            sets.extend(page.entity_sets);
            for assoc in page.association_sets {
                associations.insert(assoc.name.clone(), assoc);
            }
        }

        let mut entities = HashMap::new();
        let mut filtered = Vec::new();
        for set in sets {
            let (properties, navigations) = match types.get(&set.entity_type) {
                Some(t) => (t.properties.clone(), t.navigations.clone()),
                None => (Vec::new(), Vec::new()),
            };
            if options.retains(&set.name) {
                filtered.push(set.name.clone());
            }
            entities.insert(
                set.name.clone(),
                Entity {
                    name: set.name,
                    entity_type: set.entity_type,
                    properties,
                    navigations,
                },
            );
        }

        info!(
            "Catalog built: {} entity sets ({} retained for presentation), {} association sets",
            entities.len(),
            filtered.len(),
            associations.len()
        );

        Self { entities, filtered, associations }
    }

    /// Parse and build in one step from raw metadata pages. A parse failure
    /// of any page discards everything; no partial catalog is produced.
    pub fn from_pages(pages: &[String], options: &CatalogOptions) -> Result<Self> {
        let mut parsed = Vec::with_capacity(pages.len());
        for page in pages {
            parsed.push(parse_metadata(page)?);
        }
        Ok(Self::from_documents(parsed, options))
    }

    pub fn entity(&self, set_name: &str) -> Option<&Entity> {
        self.entities.get(set_name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationSet> {
        self.associations.get(name)
    }

    /// Entity sets retained by the presentation filter, in declaration order
    pub fn filtered_entities(&self) -> impl Iterator<Item = &Entity> {
        self.filtered.iter().filter_map(|name| self.entities.get(name))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
