//! Entity query configuration and wire-parameter compilation
//!
//! An [`EntityQuery`] is the declarative description of one configured table
//! column set: the entity, the selected property paths (possibly combined
//! into joint output columns) and one root filter tree. It is read once to
//! build a request and discarded after the results arrive.

use anyhow::Result;

use super::filter::FilterNode;
use super::paths::{plan, PropertyPath, QueryPlan};
use crate::api::constants::params;
use crate::api::metadata::Catalog;

/// One output column: a single path, or several paths joined into one
/// combined column by a separator (the joining itself happens downstream).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    Single(PropertyPath),
    Combined {
        paths: Vec<PropertyPath>,
        separator: String,
    },
}

impl ColumnSpec {
    pub fn single(path: impl Into<PropertyPath>) -> Self {
        Self::Single(path.into())
    }

    pub fn combined(paths: &[&str], separator: impl Into<String>) -> Self {
        Self::Combined {
            paths: paths.iter().map(|p| PropertyPath::parse(p)).collect(),
            separator: separator.into(),
        }
    }

    fn paths(&self) -> &[PropertyPath] {
        match self {
            Self::Single(path) => std::slice::from_ref(path),
            Self::Combined { paths, .. } => paths,
        }
    }
}

/// Declarative selection of an entity, its columns and a filter
#[derive(Debug, Clone)]
pub struct EntityQuery {
    pub entity: String,
    pub columns: Vec<ColumnSpec>,
    pub filter: FilterNode,
}

impl EntityQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            columns: Vec::new(),
            filter: FilterNode::empty(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn select_path(self, path: &str) -> Self {
        self.column(ColumnSpec::single(path))
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = filter;
        self
    }

    /// All selected paths, combined columns flattened, in column order
    pub fn selected_paths(&self) -> Vec<PropertyPath> {
        self.columns.iter().flat_map(|c| c.paths().iter().cloned()).collect()
    }

    /// Compute the select/expand plan against the catalog
    pub fn plan(&self, catalog: &Catalog) -> Result<QueryPlan> {
        let root = catalog
            .entity(&self.entity)
            .ok_or_else(|| anyhow::anyhow!("Unknown entity set: {}", self.entity))?;
        Ok(plan(&self.selected_paths(), root))
    }

    /// Compile the non-paging query parameters, in emission order:
    /// `$format`, `$inlinecount`, then `$select`/`$expand`/`$filter` only
    /// when non-empty. Paging is appended per page by the scheduler.
    pub fn to_query_params(&self, catalog: &Catalog) -> Result<Vec<(String, String)>> {
        let plan = self.plan(catalog)?;

        let mut query_params = vec![
            (params::FORMAT.to_string(), params::FORMAT_JSON.to_string()),
            (params::INLINECOUNT.to_string(), params::INLINECOUNT_ALL.to_string()),
        ];

        if !plan.select.is_empty() {
            query_params.push((params::SELECT.to_string(), plan.select.join(",")));
        }
        if !plan.expand.is_empty() {
            query_params.push((params::EXPAND.to_string(), plan.expand.join(",")));
        }
        let filter = self.filter.compile();
        if !filter.is_empty() {
            query_params.push((params::FILTER.to_string(), filter));
        }

        Ok(query_params)
    }

    /// Compile the parameters into a percent-encoded query string. The
    /// encoder escapes everything outside `[A-Za-z0-9-._~]`, which covers
    /// the `! ' ( ) *` set default encoders leave untouched.
    pub fn to_query_string(&self, catalog: &Catalog) -> Result<String> {
        let query_params = self.to_query_params(catalog)?;
        Ok(encode_params(&query_params))
    }
}

/// Join parameters into a query string, percent-encoding each value
pub fn encode_params(query_params: &[(String, String)]) -> String {
    query_params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metadata::CatalogOptions;
    use crate::api::query::filter::{Connector, FilterOperator};

    fn catalog() -> Catalog {
        let xml = r#"<edmx:Edmx xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema xmlns="http://schemas.microsoft.com/ado/2008/09/edm" Namespace="Z">
      <EntityType Name="Employee">
        <Property Name="Name" Type="Edm.String"/>
        <Property Name="HireDate" Type="Edm.DateTime"/>
        <NavigationProperty Name="Manager" Relationship="Z.EmpToMgr" ToRole="ToMgr" FromRole="FromEmp"/>
      </EntityType>
      <EntityType Name="Manager">
        <Property Name="Name" Type="Edm.String"/>
      </EntityType>
      <EntityContainer Name="C">
        <EntitySet Name="Employees" EntityType="Z.Employee"/>
        <EntitySet Name="Managers" EntityType="Z.Manager"/>
        <AssociationSet Name="EmpToMgr" Association="Z.EmpToMgr">
          <End Role="FromEmp" EntitySet="Employees"/>
          <End Role="ToMgr" EntitySet="Managers"/>
        </AssociationSet>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;
        Catalog::from_pages(&[xml.to_string()], &CatalogOptions::default()).unwrap()
    }

    #[test]
    fn test_query_params_select_and_expand() {
        let query = EntityQuery::new("Employees")
            .select_path("Name")
            .select_path("Manager/Name");

        let query_params = query.to_query_params(&catalog()).unwrap();
        assert_eq!(
            query_params,
            vec![
                ("$format".to_string(), "json".to_string()),
                ("$inlinecount".to_string(), "allpages".to_string()),
                ("$select".to_string(), "Name,Manager/Name".to_string()),
                ("$expand".to_string(), "Manager".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_params_with_filter() {
        let query = EntityQuery::new("Employees")
            .select_path("Name")
            .with_filter(FilterNode::group(
                Connector::And,
                vec![FilterNode::condition("Name", FilterOperator::Eq, "Ann")],
            ));

        let query_string = query.to_query_string(&catalog()).unwrap();
        assert!(query_string.contains("$filter=%28Name%20eq%20%27Ann%27%29"));
    }

    #[test]
    fn test_whole_entity_selection_omits_select_and_expand() {
        let query = EntityQuery::new("Employees").select_path("*");
        let query_params = query.to_query_params(&catalog()).unwrap();
        assert_eq!(
            query_params,
            vec![
                ("$format".to_string(), "json".to_string()),
                ("$inlinecount".to_string(), "allpages".to_string()),
            ]
        );
    }

    #[test]
    fn test_combined_columns_contribute_all_paths() {
        let query = EntityQuery::new("Employees")
            .column(ColumnSpec::combined(&["Name", "Manager/Name"], " / "));

        let query_params = query.to_query_params(&catalog()).unwrap();
        let select = query_params.iter().find(|(k, _)| k == "$select").unwrap();
        assert_eq!(select.1, "Name,Manager/Name");
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        let query = EntityQuery::new("Nope").select_path("Name");
        assert!(query.to_query_params(&catalog()).is_err());
    }

    #[test]
    fn test_extended_character_encoding() {
        let encoded = encode_params(&[("$filter".to_string(), "x eq 'a(b)*!'".to_string())]);
        assert!(!encoded.contains('('));
        assert!(!encoded.contains('\''));
        assert!(!encoded.contains('*'));
        assert!(!encoded.contains('!'));
        assert_eq!(encoded, "$filter=x%20eq%20%27a%28b%29%2A%21%27");
    }
}
