//! Walks the hierarchy below a root and describes every leaf dataset.
//!
//! The walk itself only returns [`DiscoveredLeaf`] records; turning them into a
//! column catalog and an attribute map is done separately by [`build_catalog`].

use hdf5::{Dataset, File, Group, LinkType, LocationToken, LocationType};
use indexmap::IndexMap;

use crate::{
    attributes::{read_attributes, AttributeMap, Attributes},
    data_types::{compound_members, CompoundMember, ElementType},
    error::ArrowHdf5Error,
    path, Hdf5Result,
};

/// A single column found during discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Root-relative key, `dataset` or `dataset/field`.
    pub name: String,
    pub row_count: usize,
    pub element_type: ElementType,
    /// Root-relative path of the dataset holding the column.
    pub owning_dataset: String,
    /// Field of the compound element, if the dataset is structured.
    pub field: Option<String>,
}

/// Columns keyed by their root-relative path, in discovery order.
pub type RawColumnCatalog = IndexMap<String, ColumnInfo>;

#[derive(Debug, Clone, PartialEq)]
pub enum LeafKind {
    /// Homogeneous array; the leading dimension indexes rows.
    Array(ElementType),
    /// Structured array; `None` marks fields without an Arrow representation.
    Compound(Vec<CompoundMember>),
    /// Dataset that cannot contribute columns, with the reason.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredLeaf {
    /// Path relative to the root; empty when the root is the dataset itself.
    pub path: String,
    pub row_count: usize,
    pub attributes: Attributes,
    pub kind: LeafKind,
}

/// Returns the leaves below `root`, depth-first in member-name order.
///
/// Only hard links are followed and every object is visited once, so soft-link
/// cycles and aliased datasets do not repeat columns.
pub fn discover(file: &File, root: &str) -> Hdf5Result<Vec<DiscoveredLeaf>> {
    let root = path::normalize_root(root);

    let group = if path::is_file_root(&root) {
        file.group("/")?
    } else {
        if !file.link_exists(&root) {
            return Err(ArrowHdf5Error::InvalidPath(root));
        }
        match file.loc_type_by_name(&root)? {
            LocationType::Dataset => return Ok(vec![describe_leaf(&file.dataset(&root)?, "")?]),
            LocationType::Group => file.group(&root)?,
            _ => return Err(ArrowHdf5Error::InvalidPath(root)),
        }
    };

    let mut visited = vec![group.loc_info()?.token];
    let mut leaves = Vec::new();
    visit_group(&group, "", &mut visited, &mut leaves)?;
    Ok(leaves)
}

fn visit_group(
    group: &Group,
    prefix: &str,
    visited: &mut Vec<LocationToken>,
    leaves: &mut Vec<DiscoveredLeaf>,
) -> Hdf5Result<()> {
    let mut members = group.iter_visit_default(Vec::new(), |_, name, link, members| {
        members.push((name.to_string(), link.link_type));
        true
    })?;
    members.sort_by(|a, b| a.0.cmp(&b.0));

    for (member, link_type) in members {
        let relative = path::join(prefix, &member);
        if link_type != LinkType::Hard {
            tracing::debug!("Skipping {:?} link {}", link_type, relative);
            continue;
        }

        let info = group.loc_info_by_name(&member)?;
        if visited.contains(&info.token) {
            tracing::debug!("Skipping {}, already visited under another name", relative);
            continue;
        }
        visited.push(info.token);

        match info.loc_type {
            LocationType::Dataset => leaves.push(describe_leaf(&group.dataset(&member)?, &relative)?),
            LocationType::Group => visit_group(&group.group(&member)?, &relative, visited, leaves)?,
            _ => tracing::debug!("Skipping non-dataset member {}", relative),
        }
    }
    Ok(())
}

fn describe_leaf(dataset: &Dataset, relative: &str) -> Hdf5Result<DiscoveredLeaf> {
    let attributes = read_attributes(dataset)?;
    let shape = dataset.shape();
    let row_count = shape.first().copied().unwrap_or(0);
    let dtype = dataset.dtype()?;

    let kind = if shape.is_empty() {
        LeafKind::Unsupported("scalar dataset has no rows".to_string())
    } else if let Some(members) = compound_members(&dtype, &dataset.name())? {
        if shape.len() == 1 {
            LeafKind::Compound(members)
        } else {
            LeafKind::Unsupported(format!("structured dataset with shape {:?}", shape))
        }
    } else {
        match dtype.to_descriptor() {
            Ok(descriptor) => match ElementType::try_from_dataset(&descriptor, &shape) {
                Some(element_type) => LeafKind::Array(element_type),
                None => LeafKind::Unsupported(format!("{:?}", descriptor)),
            },
            Err(err) => LeafKind::Unsupported(err.to_string()),
        }
    };

    tracing::debug!(
        "Discovered dataset {} with {} rows: {:?}",
        dataset.name(),
        row_count,
        kind
    );

    Ok(DiscoveredLeaf {
        path: relative.to_string(),
        row_count,
        attributes,
        kind,
    })
}

/// Folds discovered leaves into the raw column catalog and the per-dataset attribute map.
pub fn build_catalog(leaves: Vec<DiscoveredLeaf>) -> (RawColumnCatalog, AttributeMap) {
    let mut catalog = RawColumnCatalog::new();
    let mut attributes = AttributeMap::new();

    for leaf in leaves {
        match leaf.kind {
            LeafKind::Array(element_type) => {
                catalog.insert(
                    leaf.path.clone(),
                    ColumnInfo {
                        name: leaf.path.clone(),
                        row_count: leaf.row_count,
                        element_type,
                        owning_dataset: leaf.path.clone(),
                        field: None,
                    },
                );
            }
            LeafKind::Compound(fields) => {
                for (field, element_type) in fields {
                    let key = path::join(&leaf.path, &field);
                    let Some(element_type) = element_type else {
                        tracing::warn!("Skipping field {} with unsupported data type", key);
                        continue;
                    };
                    catalog.insert(
                        key.clone(),
                        ColumnInfo {
                            name: key,
                            row_count: leaf.row_count,
                            element_type,
                            owning_dataset: leaf.path.clone(),
                            field: Some(field),
                        },
                    );
                }
            }
            LeafKind::Unsupported(reason) => {
                tracing::warn!("Skipping dataset '{}': {}", leaf.path, reason);
            }
        }
        attributes.insert(leaf.path, leaf.attributes);
    }

    (catalog, attributes)
}
