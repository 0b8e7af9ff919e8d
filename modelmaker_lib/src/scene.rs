//! JSON scene manifest recording the generated models and their hierarchy
//!
//! The manifest consists of hierarchy nodes and models. Every model is attached to a hierarchy
//! node, by default the root node of the run. An optional hierarchy template adds named nodes
//! below the root, a model is then attached to the template node named like its color (or like
//! its label number without a color table).

use crate::Label;
use anyhow::{Context, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the root hierarchy node created if the manifest does not have one
pub const DEFAULT_ROOT_NAME: &str = "Models";

/// Display color of models without a color table entry
pub const DEFAULT_COLOR: [f64; 3] = [0.5, 0.5, 0.5];

/// Target of the manifest, parsed from `<path>[#<hierarchy id>]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneTarget {
    pub path: PathBuf,
    /// Id of the hierarchy node that models are attached to
    pub hierarchy_id: Option<String>,
}

impl SceneTarget {
    pub fn parse(target: &str) -> Self {
        match target.rsplit_once('#') {
            Some((path, id)) if !id.is_empty() => Self {
                path: PathBuf::from(path),
                hierarchy_id: Some(id.to_string()),
            },
            Some((path, _)) => Self {
                path: PathBuf::from(path),
                hierarchy_id: None,
            },
            None => Self {
                path: PathBuf::from(target),
                hierarchy_id: None,
            },
        }
    }

    /// Directory that model files are written to
    pub fn root_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// A node of the model hierarchy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    /// Id of the parent node, `None` for top level nodes
    #[serde(default)]
    pub parent: Option<String>,
    /// Whether the node was created from a hierarchy template
    #[serde(default)]
    pub from_template: bool,
}

/// A generated model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub label: Label,
    /// Path of the mesh file relative to the manifest
    pub file: String,
    pub color: [f64; 3],
    pub visible: bool,
    /// Id of the hierarchy node the model is attached to
    pub parent: String,
}

/// A node of a hierarchy template file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub name: String,
    /// Name of the parent template node, `None` for nodes directly below the root
    #[serde(default)]
    pub parent: Option<String>,
}

/// The scene manifest
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(default)]
    pub hierarchy: Vec<HierarchyNode>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl SceneManifest {
    /// Loads an existing manifest or returns an empty one if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| anyhow!("Failed to read scene file \"{}\"", path.display()))?;
        let manifest: Self = serde_json::from_str(&content)
            .with_context(|| anyhow!("Failed to parse scene file \"{}\"", path.display()))?;
        info!(
            "Loaded existing scene \"{}\" with {} model(s)",
            path.display(),
            manifest.models.len()
        );
        Ok(manifest)
    }

    /// Writes the manifest as pretty printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create parent directory of scene file")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize scene")?;
        fs::write(path, json)
            .with_context(|| anyhow!("Failed to write scene file \"{}\"", path.display()))
    }

    /// Returns the id of the root node, creating it if necessary
    ///
    /// If `id` is given and no node with this id exists, a new root node with this id is created.
    /// Without an id, the first top level node is used.
    pub fn ensure_root(&mut self, id: Option<&str>) -> String {
        let existing = match id {
            Some(id) => self.hierarchy.iter().find(|n| n.id == id),
            None => self
                .hierarchy
                .iter()
                .find(|n| n.parent.is_none() && !n.from_template),
        };
        if let Some(node) = existing {
            return node.id.clone();
        }

        let id = id.map_or_else(|| self.unique_id("Hierarchy"), str::to_string);
        debug!("Creating root hierarchy node \"{}\"", id);
        self.hierarchy.push(HierarchyNode {
            id: id.clone(),
            name: DEFAULT_ROOT_NAME.to_string(),
            parent: None,
            from_template: false,
        });
        id
    }

    /// Adds the nodes of a hierarchy template below the given root node
    ///
    /// Nodes are matched by name, existing nodes are not duplicated. Fails if a node refers to a
    /// parent that is not part of the template.
    pub fn apply_template(&mut self, template: &[TemplateNode], root_id: &str) -> Result<(), anyhow::Error> {
        let mut pending = template.iter().collect::<Vec<_>>();
        while !pending.is_empty() {
            let num_pending = pending.len();
            let mut deferred = Vec::new();

            for node in pending {
                let parent_id = match &node.parent {
                    None => Some(root_id.to_string()),
                    Some(parent) => self.template_node_id(parent),
                };
                let Some(parent_id) = parent_id else {
                    deferred.push(node);
                    continue;
                };
                if self.template_node_id(&node.name).is_none() {
                    let id = self.unique_id("Hierarchy");
                    self.hierarchy.push(HierarchyNode {
                        id,
                        name: node.name.clone(),
                        parent: Some(parent_id),
                        from_template: true,
                    });
                }
            }

            if deferred.len() == num_pending {
                return Err(anyhow!(
                    "Hierarchy template node \"{}\" refers to unknown parent \"{}\"",
                    deferred[0].name,
                    deferred[0].parent.as_deref().unwrap_or_default()
                ));
            }
            pending = deferred;
        }
        Ok(())
    }

    /// Adds a model below the template node named `group_name`, or below the root if there is no such node
    ///
    /// A model with the same name is replaced.
    pub fn add_model(
        &mut self,
        name: &str,
        label: Label,
        file: &str,
        color: Option<[f64; 3]>,
        group_name: &str,
        root_id: &str,
    ) {
        let parent = self
            .template_node_id(group_name)
            .unwrap_or_else(|| root_id.to_string());

        self.models.retain(|m| m.name != name);
        self.models.push(ModelEntry {
            id: format!("Model_{}", name),
            name: name.to_string(),
            label,
            file: file.to_string(),
            color: color.unwrap_or(DEFAULT_COLOR),
            visible: true,
            parent,
        });
    }

    /// Removes template nodes that have neither models nor child nodes
    pub fn prune_empty_template_nodes(&mut self) {
        loop {
            let empty = self
                .hierarchy
                .iter()
                .filter(|node| node.from_template)
                .filter(|node| !self.models.iter().any(|m| m.parent == node.id))
                .filter(|node| {
                    !self
                        .hierarchy
                        .iter()
                        .any(|child| child.parent.as_deref() == Some(node.id.as_str()))
                })
                .map(|node| node.id.clone())
                .collect::<Vec<_>>();
            if empty.is_empty() {
                break;
            }
            debug!("Pruning empty hierarchy nodes {:?}", empty);
            self.hierarchy.retain(|node| !empty.contains(&node.id));
        }
    }

    fn template_node_id(&self, name: &str) -> Option<String> {
        self.hierarchy
            .iter()
            .find(|n| n.from_template && n.name == name)
            .map(|n| n.id.clone())
    }

    fn unique_id(&self, prefix: &str) -> String {
        (1..)
            .map(|i| format!("{}{}", prefix, i))
            .find(|id| !self.hierarchy.iter().any(|n| &n.id == id))
            .unwrap_or_else(|| prefix.to_string())
    }
}

/// Reads a hierarchy template, a JSON list of nodes with names and optional parent names
pub fn read_hierarchy_template<P: AsRef<Path>>(path: P) -> Result<Vec<TemplateNode>, anyhow::Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| anyhow!("Failed to read hierarchy template \"{}\"", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| anyhow!("Failed to parse hierarchy template \"{}\"", path.display()))
}
