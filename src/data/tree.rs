//! Display tree mirroring the nested field structure of each topic's
//! message type.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Topic roots are
//! indexed by topic name, and every node is indexed by its path key
//! (`/topic/field/sub[2]/leaf`) within its topic, so value updates resolve
//! fields in constant time. Path keys are only unique inside one topic:
//! `/a` with a field `b` and a topic `/a/b` share the key `/a/b`. The
//! indexes are rebuilt together with the nodes: [`TopicTree::clear`] drops
//! them all.

use std::collections::{HashMap, HashSet};

use super::message::MessageValue;
use super::schema::{parse_array_type, MessageSchema, TypeResolver};

/// Nesting limit for subtree construction.
const MAX_TREE_DEPTH: usize = 32;

/// Handle to a node of a [`TopicTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Stable identity of a node across rebuilds: `(topic, path)`.
pub type NodeKey = (String, String);

/// One field in the display hierarchy.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub label: String,
    /// Declared type, possibly carrying an array suffix.
    pub type_name: String,
    pub path: String,
    /// Topic root this node belongs to (itself for roots).
    pub root: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub value: String,
    pub rate: String,
    pub bandwidth: String,
    pub expanded: bool,
    pub depth: usize,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Label shown for a node: the full path for topic roots, otherwise the
/// last path segment, or its bracketed index for array elements.
pub fn node_label(path: &str, is_root: bool) -> String {
    if is_root {
        return path.to_string();
    }
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.find('[') {
        Some(pos) => last[pos..].to_string(),
        None => last.to_string(),
    }
}

/// The message trees of all displayed topics.
#[derive(Debug, Default)]
pub struct TopicTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
    topics: HashMap<String, NodeId>,
    index: HashMap<(NodeId, String), NodeId>,
}

impl TopicTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every node and index entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.topics.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    /// Root node of `topic`.
    pub fn find_topic(&self, topic: &str) -> Option<NodeId> {
        self.topics.get(topic).copied()
    }

    /// Look up the node at `path` within `topic`.
    pub fn find_in(&self, topic: &str, path: &str) -> Option<NodeId> {
        let root = self.find_topic(topic)?;
        self.index.get(&(root, path.to_string())).copied()
    }

    /// Look up the node at a path key.
    ///
    /// A topic root wins over a field with the same key. Otherwise the
    /// topics owning `path` are tried from the longest name down.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        if let Some(root) = self.find_topic(path) {
            return Some(root);
        }
        path.char_indices()
            .rev()
            .filter(|&(pos, c)| c == '/' && pos > 0)
            .find_map(|(pos, _)| self.find_in(&path[..pos], path))
    }

    pub fn key(&self, id: NodeId) -> Option<NodeKey> {
        let node = self.node(id)?;
        let root = self.node(node.root)?;
        Some((root.path.clone(), node.path.clone()))
    }

    pub fn find_key(&self, key: &NodeKey) -> Option<NodeId> {
        self.find_in(&key.0, &key.1)
    }

    /// The topic root above `id` (or `id` itself).
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).map(|n| n.root)
    }

    fn insert_node(&mut self, parent: Option<NodeId>, path: &str, type_name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (root, depth) = match parent.and_then(|p| self.nodes.get(p.0)) {
            Some(p) => (p.root, p.depth + 1),
            None => (id, 0),
        };
        let existing = match parent {
            Some(_) => self.index.get(&(root, path.to_string())),
            None => self.topics.get(path),
        };
        if let Some(existing) = existing {
            return *existing;
        }

        self.nodes.push(TreeNode {
            label: node_label(path, parent.is_none()),
            type_name: type_name.to_string(),
            path: path.to_string(),
            root,
            parent,
            children: Vec::new(),
            value: String::new(),
            rate: String::new(),
            bandwidth: String::new(),
            expanded: false,
            depth,
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => {
                self.roots.push(id);
                self.topics.insert(path.to_string(), id);
            }
        }
        self.index.insert((root, path.to_string()), id);
        id
    }

    /// Create the root node of a topic and its field subtree.
    ///
    /// With a composite `sample` the structure follows the sample, so
    /// variable-length arrays are expanded to the elements it carries.
    /// Without one the fields of `schema` are expanded. A message type that
    /// contains itself is expanded once; the repeated field stays a leaf.
    pub fn build_topic(
        &mut self,
        topic: &str,
        type_name: &str,
        schema: &MessageSchema,
        sample: Option<&MessageValue>,
        resolver: &dyn TypeResolver,
    ) -> NodeId {
        let mut lineage = vec![schema.name.clone()];
        if sample.is_some_and(MessageValue::is_composite) {
            return self.build_subtree(None, topic, type_name, sample, resolver, &mut lineage);
        }

        let root = self.insert_node(None, topic, type_name);
        for field in &schema.fields {
            let path = format!("{}/{}", topic, field.name);
            self.build_subtree(Some(root), &path, &field.type_name, None, resolver, &mut lineage);
        }
        root
    }

    /// Recursively create the node at `path` and everything below it.
    /// `lineage` holds the message types being expanded above `path`.
    fn build_subtree(
        &mut self,
        parent: Option<NodeId>,
        path: &str,
        type_name: &str,
        sample: Option<&MessageValue>,
        resolver: &dyn TypeResolver,
        lineage: &mut Vec<String>,
    ) -> NodeId {
        let node = self.insert_node(parent, path, type_name);
        if self.nodes[node.0].depth >= MAX_TREE_DEPTH {
            return node;
        }

        if let Some(MessageValue::Message(message)) = sample {
            for field in &message.fields {
                let child = format!("{}/{}", path, field.name);
                self.build_subtree(
                    Some(node),
                    &child,
                    &field.type_name,
                    Some(&field.value),
                    resolver,
                    lineage,
                );
            }
            return node;
        }

        let array = parse_array_type(type_name);
        if let Some(elements) = sample.and_then(MessageValue::composite_elements) {
            for (index, element) in elements.iter().enumerate() {
                let child = format!("{}[{}]", path, index);
                self.build_subtree(Some(node), &child, &array.base, Some(element), resolver, lineage);
            }
            return node;
        }

        match array.size {
            // Composite field known only by its type name
            None if sample.is_none() => {
                let Some(schema) = resolver.schema(type_name) else {
                    return node;
                };
                if lineage.contains(&schema.name) {
                    return node;
                }
                lineage.push(schema.name.clone());
                for field in &schema.fields {
                    let child = format!("{}/{}", path, field.name);
                    self.build_subtree(Some(node), &child, &field.type_name, None, resolver, lineage);
                }
                lineage.pop();
            }
            // Fixed-size array without live elements
            Some(size) if size > 0 => {
                let default = resolver
                    .default_instance(&array.base)
                    .filter(MessageValue::is_composite);
                if let Some(default) = default {
                    for index in 0..size {
                        let child = format!("{}[{}]", path, index);
                        self.build_subtree(
                            Some(node),
                            &child,
                            &array.base,
                            Some(&default),
                            resolver,
                            lineage,
                        );
                    }
                }
            }
            // Variable-length arrays grow in update_value
            _ => {}
        }
        node
    }

    /// Push a fresh sample value into the subtree at `path` of `topic`.
    ///
    /// Composite-array elements without a node are created on the fly with
    /// the element type taken from the array node. Paths without a node
    /// are ignored.
    pub fn update_value(
        &mut self,
        topic: &str,
        path: &str,
        value: &MessageValue,
        resolver: &dyn TypeResolver,
    ) {
        if let Some(root) = self.find_topic(topic) {
            self.update_at(root, path, value, resolver);
        }
    }

    fn update_at(&mut self, root: NodeId, path: &str, value: &MessageValue, resolver: &dyn TypeResolver) {
        if let MessageValue::Message(message) = value {
            for field in &message.fields {
                self.update_at(root, &format!("{}/{}", path, field.name), &field.value, resolver);
            }
            return;
        }

        if let Some(elements) = value.composite_elements() {
            for (index, element) in elements.iter().enumerate() {
                let child = format!("{}[{}]", path, index);
                if !self.index.contains_key(&(root, child.clone())) {
                    let Some(&parent) = self.index.get(&(root, path.to_string())) else {
                        return;
                    };
                    let base = parse_array_type(&self.nodes[parent.0].type_name).base;
                    let mut lineage = Vec::new();
                    self.build_subtree(Some(parent), &child, &base, Some(element), resolver, &mut lineage);
                }
                self.update_at(root, &child, element, resolver);
            }
            return;
        }

        if let Some(&id) = self.index.get(&(root, path.to_string())) {
            self.nodes[id.0].value = value.to_string();
        }
    }

    /// Set the per-topic columns of a topic root.
    pub fn set_topic_columns(&mut self, topic: &str, rate: String, bandwidth: String, value: String) {
        if let Some(id) = self.find_topic(topic) {
            let node = &mut self.nodes[id.0];
            node.rate = rate;
            node.bandwidth = bandwidth;
            node.value = value;
        }
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.expanded = expanded;
        }
    }

    pub fn toggle_expanded(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.expanded = !node.expanded;
        }
    }

    /// Expand or collapse `id` and all of its descendants.
    pub fn set_expanded_recursive(&mut self, id: NodeId, expanded: bool) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.0) else {
                continue;
            };
            node.expanded = expanded;
            stack.extend(node.children.iter().copied());
        }
    }

    /// Nodes in display order, descending only into expanded nodes.
    pub fn visible_rows(&self) -> Vec<NodeId> {
        let mut rows = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            rows.push(id);
            let node = &self.nodes[id.0];
            if node.expanded {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        rows
    }

    /// Keys of all expanded nodes.
    pub fn expanded_keys(&self) -> HashSet<NodeKey> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.nodes[id.0].expanded)
            .filter_map(|id| self.key(id))
            .collect()
    }

    /// Re-expand nodes whose keys are in `keys`.
    pub fn restore_expanded(&mut self, keys: &HashSet<NodeKey>) {
        for key in keys {
            if let Some(id) = self.find_key(key) {
                self.nodes[id.0].expanded = true;
            }
        }
    }
}
