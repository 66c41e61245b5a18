//! View tree
//!
//! Owns every live view together with its props and its parent/child links.
//! Tags of removed views are retired and may not be created again.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use tether_core::{ValueMap, ViewTag};

use crate::manager::NativeView;
use crate::{UiError, UiResult};

/// One live view
pub(crate) struct ViewNode {
    pub tag: ViewTag,
    pub type_name: String,
    pub root_tag: ViewTag,
    pub props: ValueMap,
    pub parent: Option<ViewTag>,
    pub children: Vec<ViewTag>,
    pub view: Option<NativeView>,
    pub manager: usize,
}

/// Copy of a view's tree state, without the native view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub tag: ViewTag,
    pub type_name: String,
    pub root_tag: ViewTag,
    pub props: ValueMap,
    pub parent: Option<ViewTag>,
    pub children: Vec<ViewTag>,
}

/// Live views by tag
#[derive(Default)]
pub struct ViewTree {
    nodes: HashMap<ViewTag, ViewNode>,
    retired: HashSet<ViewTag>,
}

impl ViewTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live views
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no view is live
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if `tag` is live
    pub fn contains(&self, tag: ViewTag) -> bool {
        self.nodes.contains_key(&tag)
    }

    /// Check if `tag` belonged to a removed view
    pub fn is_retired(&self, tag: ViewTag) -> bool {
        self.retired.contains(&tag)
    }

    /// Parent of `tag`
    pub fn parent(&self, tag: ViewTag) -> Option<ViewTag> {
        self.nodes.get(&tag).and_then(|n| n.parent)
    }

    /// Children of `tag` in order
    pub fn children(&self, tag: ViewTag) -> Option<&[ViewTag]> {
        self.nodes.get(&tag).map(|n| n.children.as_slice())
    }

    /// Current props of `tag`
    pub fn props(&self, tag: ViewTag) -> Option<&ValueMap> {
        self.nodes.get(&tag).map(|n| &n.props)
    }

    /// Snapshot of `tag`
    pub fn snapshot(&self, tag: ViewTag) -> Option<ViewSnapshot> {
        self.nodes.get(&tag).map(|n| ViewSnapshot {
            tag: n.tag,
            type_name: n.type_name.clone(),
            root_tag: n.root_tag,
            props: n.props.clone(),
            parent: n.parent,
            children: n.children.clone(),
        })
    }

    pub(crate) fn node(&self, tag: ViewTag) -> UiResult<&ViewNode> {
        self.nodes.get(&tag).ok_or(UiError::UnknownTag(tag))
    }

    pub(crate) fn node_mut(&mut self, tag: ViewTag) -> UiResult<&mut ViewNode> {
        self.nodes.get_mut(&tag).ok_or(UiError::UnknownTag(tag))
    }

    /// Fail unless `tag` can be used for a new view
    pub(crate) fn check_fresh(&self, tag: ViewTag) -> UiResult<()> {
        if !tag.is_valid() {
            return Err(UiError::InvalidTag(tag));
        }
        if self.nodes.contains_key(&tag) {
            return Err(UiError::ViewAlreadyExists(tag));
        }
        if self.retired.contains(&tag) {
            return Err(UiError::TagReused(tag));
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, node: ViewNode) -> UiResult<()> {
        self.check_fresh(node.tag)?;
        self.nodes.insert(node.tag, node);
        Ok(())
    }

    /// Remove `tag` and retire it
    pub(crate) fn remove(&mut self, tag: ViewTag) -> Option<ViewNode> {
        let node = self.nodes.remove(&tag)?;
        self.retired.insert(tag);
        Some(node)
    }

    /// Native view of `tag`
    pub(crate) fn view_mut(&mut self, tag: ViewTag) -> Option<&mut dyn Any> {
        match self.nodes.get_mut(&tag)?.view.as_mut() {
            Some(view) => Some(&mut **view),
            None => None,
        }
    }

    /// Temporarily take the native view of `tag` out of the tree
    pub(crate) fn take_view(&mut self, tag: ViewTag) -> Option<NativeView> {
        self.nodes.get_mut(&tag)?.view.take()
    }

    pub(crate) fn restore_view(&mut self, tag: ViewTag, view: Option<NativeView>) {
        if let Some(node) = self.nodes.get_mut(&tag) {
            node.view = view;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tag: u32) -> ViewNode {
        ViewNode {
            tag: ViewTag::new(tag),
            type_name: "RCTView".into(),
            root_tag: ViewTag::new(1),
            props: ValueMap::new(),
            parent: None,
            children: Vec::new(),
            view: Some(Box::new(tag)),
            manager: 0,
        }
    }

    #[test]
    fn test_removed_tags_are_retired() {
        let mut tree = ViewTree::new();
        tree.insert(node(5)).unwrap();
        assert_eq!(tree.insert(node(5)), Err(UiError::ViewAlreadyExists(ViewTag::new(5))));
        assert!(tree.remove(ViewTag::new(5)).is_some());
        assert!(tree.is_retired(ViewTag::new(5)));
        assert_eq!(tree.insert(node(5)), Err(UiError::TagReused(ViewTag::new(5))));
    }

    #[test]
    fn test_tag_zero_invalid() {
        let mut tree = ViewTree::new();
        assert_eq!(tree.insert(node(0)), Err(UiError::InvalidTag(ViewTag::INVALID)));
    }

    #[test]
    fn test_take_and_restore_view() {
        let mut tree = ViewTree::new();
        tree.insert(node(2)).unwrap();
        let view = tree.take_view(ViewTag::new(2));
        assert!(tree.view_mut(ViewTag::new(2)).is_none());
        tree.restore_view(ViewTag::new(2), view);
        let view = tree.view_mut(ViewTag::new(2)).unwrap();
        assert_eq!(view.downcast_ref::<u32>(), Some(&2));
    }
}
