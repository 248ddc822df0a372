//! Navigation resolution over the metadata catalog
//!
//! Resolves a navigation-property name against a source entity by joining
//! navigation property -> association set -> end element -> entity set.
//! A missing link anywhere in the chain means "no further navigation
//! possible", never an error.

use log::debug;

use super::metadata::{find_navigation, strip_namespace, AssociationSet, Catalog, Entity, NavigationProperty};

/// Resolve one navigation hop: find the entity reachable from the given
/// navigation properties under `property_name`.
///
/// A navigation property matches by exact name, or by carrying the
/// conventional `Details` suffix on top of the requested name.
pub fn resolve<'a>(
    property_name: &str,
    navigations: &[NavigationProperty],
    lookup_association: impl Fn(&str) -> Option<&'a AssociationSet>,
    lookup_entity: impl Fn(&str) -> Option<&'a Entity>,
) -> Option<&'a Entity> {
    let nav = find_navigation(navigations, property_name)?;

    let relationship = strip_namespace(&nav.relationship);
    let association = lookup_association(relationship)?;
    let end = association.ends.iter().find(|e| e.role == nav.to_role)?;
    let target = lookup_entity(&end.entity_set);
    if target.is_none() {
        debug!(
            "Navigation {} resolved to entity set {} which is not in the catalog",
            property_name, end.entity_set
        );
    }
    target
}

impl Catalog {
    /// Resolve a single navigation hop from `source`
    pub fn resolve_navigation<'a>(&'a self, source: &Entity, property_name: &str) -> Option<&'a Entity> {
        resolve(
            property_name,
            &source.navigations,
            |name| self.association(name),
            |name| self.entity(name),
        )
    }

    /// Resolve a multi-hop navigation chain such as `a/b/c` by resolving each
    /// segment against the previous hop's target. `None` as soon as any hop
    /// is unresolvable.
    pub fn resolve_path<'a>(&'a self, root: &'a Entity, hops: &[String]) -> Option<&'a Entity> {
        let mut current = root;
        for hop in hops {
            current = self.resolve_navigation(current, hop)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metadata::{CatalogOptions, EndElement, Property};

    fn nav(name: &str, relationship: &str, to_role: &str) -> NavigationProperty {
        NavigationProperty {
            name: name.to_string(),
            relationship: relationship.to_string(),
            to_role: to_role.to_string(),
        }
    }

    fn entity(name: &str, navigations: Vec<NavigationProperty>) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: name.to_string(),
            properties: vec![Property {
                name: "Id".to_string(),
                wire_type: "Edm.String".to_string(),
                label: None,
            }],
            navigations,
        }
    }

    fn assoc(name: &str, ends: &[(&str, &str)]) -> AssociationSet {
        AssociationSet {
            name: name.to_string(),
            ends: ends
                .iter()
                .map(|(role, set)| EndElement {
                    role: role.to_string(),
                    entity_set: set.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_resolve_through_association() {
        let navs = vec![nav("Manager", "ZHR.EmpToMgr", "ToMgr")];
        let assocs = vec![assoc("EmpToMgr", &[("FromEmp", "Employees"), ("ToMgr", "Managers")])];
        let managers = entity("Managers", vec![]);

        let resolved = resolve(
            "Manager",
            &navs,
            |name| assocs.iter().find(|a| a.name == name),
            |name| (name == "Managers").then_some(&managers),
        );
        assert_eq!(resolved.map(|e| e.name.as_str()), Some("Managers"));
    }

    #[test]
    fn test_resolve_accepts_suffixed_navigation_name() {
        let navs = vec![nav("ManagerDetails", "ZHR.EmpToMgr", "ToMgr")];
        let assocs = vec![assoc("EmpToMgr", &[("ToMgr", "Managers")])];
        let managers = entity("Managers", vec![]);

        let resolved = resolve(
            "Manager",
            &navs,
            |name| assocs.iter().find(|a| a.name == name),
            |name| (name == "Managers").then_some(&managers),
        );
        assert!(resolved.is_some());
    }

    #[test]
    fn test_resolve_misses_are_none_not_errors() {
        let navs = vec![nav("Manager", "ZHR.EmpToMgr", "ToMgr")];
        let managers = entity("Managers", vec![]);

        // Unknown property name
        assert!(resolve("Unknown", &navs, |_| None, |_| Some(&managers)).is_none());
        // Missing association set
        assert!(resolve("Manager", &navs, |_| None, |_| Some(&managers)).is_none());
        // Missing end role
        let wrong_role = vec![assoc("EmpToMgr", &[("FromEmp", "Employees")])];
        assert!(
            resolve(
                "Manager",
                &navs,
                |name| wrong_role.iter().find(|a| a.name == name),
                |_| Some(&managers)
            )
            .is_none()
        );
        // Missing target entity
        let assocs = vec![assoc("EmpToMgr", &[("ToMgr", "Managers")])];
        assert!(
            resolve(
                "Manager",
                &navs,
                |name| assocs.iter().find(|a| a.name == name),
                |_| None
            )
            .is_none()
        );
    }

    #[test]
    fn test_resolve_path_multi_hop() {
        let xml = r#"<edmx:Edmx xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema xmlns="http://schemas.microsoft.com/ado/2008/09/edm" Namespace="Z">
      <EntityType Name="Order">
        <Property Name="Id" Type="Edm.String"/>
        <NavigationProperty Name="Customer" Relationship="Z.OrdToCust" ToRole="ToCust" FromRole="FromOrd"/>
      </EntityType>
      <EntityType Name="Customer">
        <Property Name="Name" Type="Edm.String"/>
        <NavigationProperty Name="Region" Relationship="Z.CustToReg" ToRole="ToReg" FromRole="FromCust"/>
      </EntityType>
      <EntityType Name="Region">
        <Property Name="Code" Type="Edm.String"/>
      </EntityType>
      <EntityContainer Name="C">
        <EntitySet Name="Orders" EntityType="Z.Order"/>
        <EntitySet Name="Customers" EntityType="Z.Customer"/>
        <EntitySet Name="Regions" EntityType="Z.Region"/>
        <AssociationSet Name="OrdToCust" Association="Z.OrdToCust">
          <End Role="FromOrd" EntitySet="Orders"/>
          <End Role="ToCust" EntitySet="Customers"/>
        </AssociationSet>
        <AssociationSet Name="CustToReg" Association="Z.CustToReg">
          <End Role="FromCust" EntitySet="Customers"/>
          <End Role="ToReg" EntitySet="Regions"/>
        </AssociationSet>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

        let catalog = Catalog::from_pages(&[xml.to_string()], &CatalogOptions::default()).unwrap();
        let orders = catalog.entity("Orders").unwrap();

        let region = catalog
            .resolve_path(orders, &["Customer".to_string(), "Region".to_string()])
            .unwrap();
        assert_eq!(region.name, "Regions");

        assert!(catalog
            .resolve_path(orders, &["Customer".to_string(), "Missing".to_string()])
            .is_none());
    }
}
