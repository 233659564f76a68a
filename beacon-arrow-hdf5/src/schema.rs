use std::{collections::BTreeSet, sync::Arc};

use arrow::datatypes::{Field, Schema, SchemaRef};
use indexmap::{IndexMap, IndexSet};

use crate::{
    attributes::AttributeMap,
    data_types::ElementType,
    discovery::{ColumnInfo, RawColumnCatalog},
    error::ArrowHdf5Error,
    path, Hdf5Result,
};

/// Physical location of a column inside the file, resolved once when the schema is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLocation {
    /// The column is a whole dataset at this absolute path.
    DirectDataset(String),
    /// The column is a named field of a compound dataset.
    CompositeField { dataset: String, field: String },
}

impl ColumnLocation {
    fn resolve(root: &str, info: &ColumnInfo) -> Self {
        let dataset = path::trim_trailing(&path::join(root, &info.owning_dataset)).to_string();
        match &info.field {
            Some(field) => ColumnLocation::CompositeField {
                dataset,
                field: field.clone(),
            },
            None => ColumnLocation::DirectDataset(dataset),
        }
    }

    pub fn dataset(&self) -> &str {
        match self {
            ColumnLocation::DirectDataset(dataset) => dataset,
            ColumnLocation::CompositeField { dataset, .. } => dataset,
        }
    }
}

impl std::fmt::Display for ColumnLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnLocation::DirectDataset(dataset) => write!(f, "{}", dataset),
            ColumnLocation::CompositeField { dataset, field } => write!(f, "{}[{}]", dataset, field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrozenColumn {
    /// Name the column is exposed under.
    pub name: String,
    /// Key the column was discovered under, relative to the original root.
    pub key: String,
    pub element_type: ElementType,
    pub location: ColumnLocation,
}

/// Ordered, immutable column catalog with unique display names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrozenSchema {
    columns: IndexMap<String, FrozenColumn>,
}

impl FrozenSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FrozenColumn> {
        self.columns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrozenColumn> {
        self.columns.values()
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .values()
                .map(|column| {
                    Field::new(&column.name, column.element_type.arrow_data_type(), false)
                })
                .collect::<Vec<_>>(),
        ))
    }
}

/// Outcome of schema freezing: everything the reader keeps for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenState {
    pub effective_root: String,
    pub schema: FrozenSchema,
    pub attributes: AttributeMap,
    pub row_count: usize,
}

/// Returns the single row count shared by every column in the catalog.
pub fn check_sizes(catalog: &RawColumnCatalog, root: &str) -> Hdf5Result<usize> {
    let sizes = catalog
        .values()
        .map(|info| info.row_count)
        .collect::<BTreeSet<_>>();

    match sizes.len() {
        0 => Err(ArrowHdf5Error::EmptySchema(root.to_string())),
        1 => Ok(sizes.into_iter().next().unwrap_or_default()),
        _ => Err(ArrowHdf5Error::SizeMismatch(
            catalog
                .iter()
                .map(|(name, info)| (name.clone(), info.row_count))
                .collect(),
        )),
    }
}

/// Resolves user exclusions to canonical paths without leading separators.
///
/// Each exclusion is tried as given and then relative to `root`; `exists` answers
/// whether a path names a node in the file.
pub fn resolve_exclusions<S, F>(root: &str, exclude: &[S], exists: F) -> Hdf5Result<Vec<String>>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    exclude
        .iter()
        .map(|excluded| {
            let excluded = excluded.as_ref();
            let canonical = if exists(excluded) {
                excluded.to_string()
            } else {
                let joined = path::join(root, excluded);
                if !exists(&joined) {
                    return Err(ArrowHdf5Error::InvalidExclusion(excluded.to_string()));
                }
                joined
            };
            Ok(path::strip_leading(&canonical).to_string())
        })
        .collect()
}

/// Removes every column whose absolute path starts with one of the canonical exclusions.
pub fn apply_exclusions(catalog: &mut RawColumnCatalog, root: &str, exclusions: &[String]) {
    catalog.retain(|key, _| {
        let absolute = path::join(root, key);
        let absolute = path::strip_leading(&absolute);
        let excluded = exclusions.iter().any(|ex| absolute.starts_with(ex.as_str()));
        if excluded {
            tracing::info!(column = %key, "ignoring excluded column");
        }
        !excluded
    });
}

/// Validates, excludes and freezes a discovered catalog.
///
/// Sizes are checked before exclusions are applied, so an excluded dataset of a
/// different length still fails construction.
pub fn freeze(
    root: &str,
    mut catalog: RawColumnCatalog,
    mut attributes: AttributeMap,
    exclusions: &[String],
) -> Hdf5Result<FrozenState> {
    let row_count = check_sizes(&catalog, root)?;

    apply_exclusions(&mut catalog, root, exclusions);
    if catalog.is_empty() {
        return Err(ArrowHdf5Error::EmptySchema(root.to_string()));
    }

    let owning_datasets = catalog
        .values()
        .map(|info| info.owning_dataset.as_str())
        .collect::<IndexSet<_>>();
    let single_structured = owning_datasets.len() == 1 && catalog.len() > 1;

    let mut effective_root = root.to_string();
    if single_structured {
        let dataset = owning_datasets
            .first()
            .map(|dataset| dataset.to_string())
            .unwrap_or_default();
        effective_root = path::trim_trailing(&path::join(root, &dataset)).to_string();
        let dataset_attributes = attributes.shift_remove(&dataset).unwrap_or_default();
        attributes = AttributeMap::from([(String::new(), dataset_attributes)]);
        tracing::info!(
            root = %effective_root,
            "detected single structured array stored as dataset; changing root"
        );
    }

    let mut columns = IndexMap::new();
    for (key, info) in catalog {
        let name = display_name(root, &key, single_structured);
        let column = FrozenColumn {
            location: ColumnLocation::resolve(root, &info),
            name: name.clone(),
            key,
            element_type: info.element_type,
        };
        columns.insert(name, column);
    }

    Ok(FrozenState {
        effective_root,
        schema: FrozenSchema { columns },
        attributes,
        row_count,
    })
}

fn display_name(root: &str, key: &str, single_structured: bool) -> String {
    if key.is_empty() {
        // The root is the dataset itself.
        return path::last_segment(root).to_string();
    }
    if single_structured {
        return path::last_segment(key).to_string();
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attributes::{AttributeValue, Attributes},
        data_types::PrimitiveType,
    };

    fn column(key: &str, dataset: &str, field: Option<&str>, rows: usize) -> (String, ColumnInfo) {
        (
            key.to_string(),
            ColumnInfo {
                name: key.to_string(),
                row_count: rows,
                element_type: ElementType::scalar(PrimitiveType::Float64),
                owning_dataset: dataset.to_string(),
                field: field.map(str::to_string),
            },
        )
    }

    fn mixed_catalog() -> RawColumnCatalog {
        RawColumnCatalog::from([
            column("X", "X", None, 1000),
            column("Y/a", "Y", Some("a"), 1000),
            column("Y/b", "Y", Some("b"), 1000),
        ])
    }

    fn attributes_for(datasets: &[&str]) -> AttributeMap {
        datasets
            .iter()
            .map(|dataset| {
                let attributes = Attributes::from([(
                    "name".to_string(),
                    AttributeValue::String(dataset.to_string()),
                )]);
                (dataset.to_string(), attributes)
            })
            .collect()
    }

    #[test]
    fn test_freeze_mixed_catalog() {
        let state = freeze("/", mixed_catalog(), attributes_for(&["X", "Y"]), &[]).unwrap();
        assert_eq!(state.row_count, 1000);
        assert_eq!(state.effective_root, "/");
        assert_eq!(state.schema.names().collect::<Vec<_>>(), vec!["X", "Y/a", "Y/b"]);
        assert_eq!(
            state.schema.get("X").unwrap().location,
            ColumnLocation::DirectDataset("/X".to_string())
        );
        assert_eq!(
            state.schema.get("Y/b").unwrap().location,
            ColumnLocation::CompositeField {
                dataset: "/Y".to_string(),
                field: "b".to_string()
            }
        );
        assert_eq!(state.attributes.len(), 2);
    }

    #[test]
    fn test_size_mismatch_lists_both_datasets() {
        let catalog = RawColumnCatalog::from([column("A", "A", None, 10), column("B", "B", None, 12)]);
        match freeze("/", catalog, AttributeMap::new(), &[]) {
            Err(ArrowHdf5Error::SizeMismatch(sizes)) => {
                assert_eq!(sizes, vec![("A".to_string(), 10), ("B".to_string(), 12)]);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_sizes_checked_before_exclusion() {
        let catalog = RawColumnCatalog::from([column("A", "A", None, 10), column("B", "B", None, 12)]);
        let result = freeze("/", catalog, AttributeMap::new(), &["B".to_string()]);
        assert!(matches!(result, Err(ArrowHdf5Error::SizeMismatch(_))));
    }

    #[test]
    fn test_empty_catalog() {
        let result = freeze("/grp", RawColumnCatalog::new(), AttributeMap::new(), &[]);
        assert!(matches!(result, Err(ArrowHdf5Error::EmptySchema(root)) if root == "/grp"));

        let catalog = RawColumnCatalog::from([column("A", "A", None, 10)]);
        let result = freeze("/", catalog, AttributeMap::new(), &["A".to_string()]);
        assert!(matches!(result, Err(ArrowHdf5Error::EmptySchema(_))));
    }

    #[test]
    fn test_exclusion_removes_prefixed_columns() {
        let mut catalog = mixed_catalog();
        apply_exclusions(&mut catalog, "/", &["Y".to_string()]);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["X"]);

        let mut catalog = RawColumnCatalog::from([
            column("a/X", "a/X", None, 5),
            column("b/X", "b/X", None, 5),
        ]);
        apply_exclusions(&mut catalog, "/grp", &["grp/a".to_string()]);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["b/X"]);
    }

    #[test]
    fn test_resolve_exclusions() {
        let existing = ["/grp", "/grp/X", "/other"];
        let exists = |p: &str| existing.contains(&path::join("/", p).as_str());

        let resolved = resolve_exclusions("/grp", &["/other", "X", "/grp/X"], exists).unwrap();
        assert_eq!(resolved, vec!["other", "grp/X", "grp/X"]);

        let result = resolve_exclusions("/grp", &["missing"], exists);
        assert!(matches!(result, Err(ArrowHdf5Error::InvalidExclusion(ex)) if ex == "missing"));
    }

    #[test]
    fn test_single_structured_dataset_collapse() {
        let mut catalog = mixed_catalog();
        catalog.shift_remove("X");
        let state = freeze("/", catalog, attributes_for(&["X", "Y"]), &[]).unwrap();

        assert_eq!(state.effective_root, "/Y");
        assert_eq!(state.schema.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(state.schema.get("a").unwrap().key, "Y/a");
        assert_eq!(
            state.schema.get("a").unwrap().location,
            ColumnLocation::CompositeField {
                dataset: "/Y".to_string(),
                field: "a".to_string()
            }
        );
        assert_eq!(state.attributes.len(), 1);
        assert_eq!(state.attributes[""]["name"].as_str(), Some("Y"));
    }

    #[test]
    fn test_collapse_after_exclusion() {
        let state = freeze(
            "/",
            mixed_catalog(),
            attributes_for(&["X", "Y"]),
            &["X".to_string()],
        )
        .unwrap();
        assert_eq!(state.effective_root, "/Y");
        assert_eq!(state.schema.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_single_column_does_not_collapse() {
        let catalog = RawColumnCatalog::from([column("grp/X", "grp/X", None, 3)]);
        let state = freeze("/", catalog, attributes_for(&["grp/X"]), &[]).unwrap();
        assert_eq!(state.effective_root, "/");
        assert_eq!(state.schema.names().collect::<Vec<_>>(), vec!["grp/X"]);
    }

    #[test]
    fn test_root_dataset_named_after_itself() {
        let catalog = RawColumnCatalog::from([column("", "", None, 3)]);
        let state = freeze("/grp/X", catalog, attributes_for(&[""]), &[]).unwrap();
        let column = state.schema.get("X").unwrap();
        assert_eq!(column.location, ColumnLocation::DirectDataset("/grp/X".to_string()));
        assert_eq!(state.effective_root, "/grp/X");
    }

    #[test]
    fn test_arrow_schema_follows_frozen_order() {
        let state = freeze("/", mixed_catalog(), AttributeMap::new(), &[]).unwrap();
        let schema = state.schema.arrow_schema();
        let names = schema.fields().iter().map(|f| f.name().as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["X", "Y/a", "Y/b"]);
    }
}
