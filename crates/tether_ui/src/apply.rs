//! Applying operations to the view tree
//!
//! Runs on the layout queue only. Each operation is validated against the
//! current tree before anything is mutated, so a rejected operation leaves
//! the tree as it was.

use std::collections::HashSet;

use tether_core::{Value, ValueMap, ViewTag};

use crate::manager::{ViewManagerError, ViewManagerRegistry};
use crate::operation::{Frame, UiOperation};
use crate::side_table::ViewSideTable;
use crate::tree::{ViewNode, ViewTree};
use crate::{UiError, UiResult};

/// Everything owned by the layout queue
#[derive(Default)]
pub(crate) struct UiState {
    pub tree: ViewTree,
    pub frames: ViewSideTable<Frame>,
    pub managers: ViewManagerRegistry,
}

fn manager_error(manager: &str, error: ViewManagerError) -> UiError {
    UiError::ViewManager {
        manager: manager.to_string(),
        message: error.0,
    }
}

fn unsupported(manager: &str, operation: &str) -> UiError {
    UiError::UnsupportedOperation {
        manager: manager.to_string(),
        operation: operation.to_string(),
    }
}

impl UiState {
    pub fn new(managers: ViewManagerRegistry) -> Self {
        Self {
            managers,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, op: UiOperation) -> UiResult<()> {
        match op {
            UiOperation::CreateView {
                tag,
                type_name,
                root_tag,
                props,
            } => self.create_view(tag, type_name, root_tag, props),
            UiOperation::UpdateProps { tag, props } => self.update_props(tag, props),
            UiOperation::ManageChildren {
                tag,
                move_from,
                move_to,
                add_child_tags,
                add_at_indices,
                remove_from,
            } => self.manage_children(
                tag,
                &move_from,
                &move_to,
                &add_child_tags,
                &add_at_indices,
                &remove_from,
            ),
            UiOperation::SetChildren { tag, child_tags } => self.set_children(tag, &child_tags),
            UiOperation::SetDimensions { tag, frame } => self.set_dimensions(tag, frame),
            UiOperation::UpdateExtraData { tag, payload } => self.update_extra_data(tag, &payload),
            UiOperation::RemoveView { tag } => self.remove_view(tag),
            UiOperation::Measure { tag, callback } => {
                let args = match self.frames.get(tag) {
                    Some(frame) if self.tree.contains(tag) => frame.to_values(),
                    _ => Vec::new(),
                };
                if let Err(e) = callback.invoke(args) {
                    log::warn!("measure reply for {} dropped: {}", tag, e);
                }
                Ok(())
            }
        }
    }

    fn create_view(
        &mut self,
        tag: ViewTag,
        type_name: String,
        root_tag: ViewTag,
        mut props: ValueMap,
    ) -> UiResult<()> {
        self.tree.check_fresh(tag)?;
        let index = self
            .managers
            .index_of(&type_name)
            .ok_or_else(|| UiError::UnknownViewManager(type_name.clone()))?;
        let manager = self
            .managers
            .get_mut(index)
            .ok_or_else(|| UiError::UnknownViewManager(type_name.clone()))?;

        let mut view = manager
            .create_view(tag)
            .map_err(|e| manager_error(&type_name, e))?;

        props.retain(|_, value| !value.is_null());
        if !props.is_empty() {
            if let Some(updater) = manager.as_prop_updatable() {
                updater
                    .update_props(&mut *view, &props)
                    .map_err(|e| manager_error(&type_name, e))?;
            }
        }

        self.tree.insert(ViewNode {
            tag,
            type_name,
            root_tag,
            props,
            parent: None,
            children: Vec::new(),
            view: Some(view),
            manager: index,
        })
    }

    fn update_props(&mut self, tag: ViewTag, props: ValueMap) -> UiResult<()> {
        let node = self.tree.node_mut(tag)?;
        for (key, value) in &props {
            if value.is_null() {
                node.props.remove(key);
            } else {
                node.props.insert(key.clone(), value.clone());
            }
        }

        let index = node.manager;
        let name = self.managers.name_of(index).to_string();
        let Some(manager) = self.managers.get_mut(index) else {
            return Err(UiError::UnknownViewManager(name));
        };
        if let (Some(updater), Some(view)) = (manager.as_prop_updatable(), self.tree.view_mut(tag)) {
            updater
                .update_props(view, &props)
                .map_err(|e| manager_error(&name, e))?;
        }
        Ok(())
    }

    fn manage_children(
        &mut self,
        tag: ViewTag,
        move_from: &[usize],
        move_to: &[usize],
        add_child_tags: &[ViewTag],
        add_at_indices: &[usize],
        remove_from: &[usize],
    ) -> UiResult<()> {
        let node = self.tree.node(tag)?;
        let len = node.children.len();
        let index = node.manager;

        if move_from.len() != move_to.len() {
            return Err(UiError::InvalidArgument(format!(
                "manageChildren on {}: moveFrom has {} entries, moveTo has {}",
                tag,
                move_from.len(),
                move_to.len()
            )));
        }
        if add_child_tags.len() != add_at_indices.len() {
            return Err(UiError::InvalidArgument(format!(
                "manageChildren on {}: addChildTags has {} entries, addAtIndices has {}",
                tag,
                add_child_tags.len(),
                add_at_indices.len()
            )));
        }

        let mut detached = HashSet::new();
        for &i in move_from.iter().chain(remove_from) {
            if i >= len {
                return Err(UiError::InvalidIndex { tag, index: i, len });
            }
            if !detached.insert(i) {
                return Err(UiError::InvalidArgument(format!(
                    "manageChildren on {}: index {} detached twice",
                    tag, i
                )));
            }
        }

        let mut seen = HashSet::new();
        for &child in add_child_tags {
            let child_node = self.tree.node(child)?;
            if !seen.insert(child) {
                return Err(UiError::InvalidArgument(format!(
                    "manageChildren on {}: {} added twice",
                    tag, child
                )));
            }
            if let Some(parent) = child_node.parent {
                return Err(UiError::ChildAlreadyParented { child, parent });
            }
            self.check_not_ancestor(tag, child)?;
        }

        let mut inserts: Vec<(usize, ViewTag)> = move_from
            .iter()
            .zip(move_to)
            .map(|(&from, &to)| (to, node.children[from]))
            .chain(add_at_indices.iter().copied().zip(add_child_tags.iter().copied()))
            .collect();
        inserts.sort_by_key(|&(at, _)| at);

        let mut simulated = len - detached.len();
        for &(at, _) in &inserts {
            if at > simulated {
                return Err(UiError::InvalidIndex {
                    tag,
                    index: at,
                    len: simulated,
                });
            }
            simulated += 1;
        }

        let name = self.managers.name_of(index).to_string();
        let has_capability = self
            .managers
            .get_mut(index)
            .map_or(false, |m| m.as_child_managing().is_some());
        if !has_capability {
            return Err(unsupported(&name, "manageChildren"));
        }

        let mut removals: Vec<usize> = detached.into_iter().collect();
        removals.sort_unstable_by(|a, b| b.cmp(a));
        for at in removals {
            let child = self.tree.node_mut(tag)?.children.remove(at);
            self.tree.node_mut(child)?.parent = None;
            self.with_child_manager(index, &name, |manager, tree| {
                let parent = tree.view_mut(tag).ok_or(UiError::UnknownTag(tag))?;
                manager
                    .remove_child_at(parent, at)
                    .map_err(|e| manager_error(&name, e))
            })?;
        }

        for (at, child) in inserts {
            self.attach(index, &name, tag, child, at)?;
        }
        Ok(())
    }

    fn set_children(&mut self, tag: ViewTag, child_tags: &[ViewTag]) -> UiResult<()> {
        let node = self.tree.node(tag)?;
        let index = node.manager;
        let start = node.children.len();

        let mut seen = HashSet::new();
        for &child in child_tags {
            let child_node = self.tree.node(child)?;
            if !seen.insert(child) {
                return Err(UiError::InvalidArgument(format!(
                    "setChildren on {}: {} listed twice",
                    tag, child
                )));
            }
            if let Some(parent) = child_node.parent {
                return Err(UiError::ChildAlreadyParented { child, parent });
            }
            self.check_not_ancestor(tag, child)?;
        }

        let name = self.managers.name_of(index).to_string();
        let has_capability = self
            .managers
            .get_mut(index)
            .map_or(false, |m| m.as_child_managing().is_some());
        if !has_capability {
            return Err(unsupported(&name, "setChildren"));
        }

        for (offset, &child) in child_tags.iter().enumerate() {
            self.attach(index, &name, tag, child, start + offset)?;
        }
        Ok(())
    }

    /// Reject attaching `child` under `parent` when `child` is `parent` or one
    /// of its ancestors
    fn check_not_ancestor(&self, parent: ViewTag, child: ViewTag) -> UiResult<()> {
        let mut current = Some(parent);
        while let Some(tag) = current {
            if tag == child {
                return Err(UiError::InvalidArgument(format!(
                    "{} cannot become a descendant of itself under {}",
                    child, parent
                )));
            }
            current = self.tree.node(tag)?.parent;
        }
        Ok(())
    }

    /// Link `child` under `parent` at `at` and tell the parent's manager
    fn attach(
        &mut self,
        index: usize,
        name: &str,
        parent: ViewTag,
        child: ViewTag,
        at: usize,
    ) -> UiResult<()> {
        self.tree.node_mut(parent)?.children.insert(at, child);
        self.tree.node_mut(child)?.parent = Some(parent);

        let mut child_view = self.tree.take_view(child);
        let result = self.with_child_manager(index, name, |manager, tree| {
            let parent_view = tree.view_mut(parent).ok_or(UiError::UnknownTag(parent))?;
            let child_view = child_view.as_deref_mut().ok_or(UiError::UnknownTag(child))?;
            manager
                .add_child(parent_view, child_view, at)
                .map_err(|e| manager_error(name, e))
        });
        self.tree.restore_view(child, child_view);
        result
    }

    fn with_child_manager<F>(&mut self, index: usize, name: &str, f: F) -> UiResult<()>
    where
        F: FnOnce(&mut dyn crate::manager::ChildManaging, &mut ViewTree) -> UiResult<()>,
    {
        let manager = self
            .managers
            .get_mut(index)
            .and_then(|m| m.as_child_managing())
            .ok_or_else(|| unsupported(name, "child management"))?;
        f(manager, &mut self.tree)
    }

    fn set_dimensions(&mut self, tag: ViewTag, frame: Frame) -> UiResult<()> {
        let index = self.tree.node(tag)?.manager;
        self.frames.insert(tag, frame);

        let name = self.managers.name_of(index).to_string();
        if let Some(manager) = self.managers.get_mut(index) {
            if let (Some(aware), Some(view)) = (manager.as_dimension_aware(), self.tree.view_mut(tag)) {
                aware
                    .set_dimensions(view, frame)
                    .map_err(|e| manager_error(&name, e))?;
            }
        }
        Ok(())
    }

    fn update_extra_data(&mut self, tag: ViewTag, payload: &Value) -> UiResult<()> {
        let index = self.tree.node(tag)?.manager;
        let name = self.managers.name_of(index).to_string();
        if let Some(manager) = self.managers.get_mut(index) {
            if let (Some(consumer), Some(view)) =
                (manager.as_extra_data_consuming(), self.tree.view_mut(tag))
            {
                consumer
                    .update_extra_data(view, payload)
                    .map_err(|e| manager_error(&name, e))?;
            }
        }
        Ok(())
    }

    fn remove_view(&mut self, tag: ViewTag) -> UiResult<()> {
        let node = self.tree.node(tag)?;
        if let Some(&child) = node.children.first() {
            return Err(UiError::DanglingChildReference { tag, child });
        }

        if let Some(parent) = node.parent {
            let parent_node = self.tree.node(parent)?;
            let parent_index = parent_node.manager;
            if let Some(at) = parent_node.children.iter().position(|&c| c == tag) {
                self.tree.node_mut(parent)?.children.remove(at);
                let name = self.managers.name_of(parent_index).to_string();
                self.with_child_manager(parent_index, &name, |manager, tree| {
                    let parent_view = tree.view_mut(parent).ok_or(UiError::UnknownTag(parent))?;
                    manager
                        .remove_child_at(parent_view, at)
                        .map_err(|e| manager_error(&name, e))
                })?;
            }
        }

        self.frames.remove(tag);
        if let Some(node) = self.tree.remove(tag) {
            if let (Some(manager), Some(view)) = (self.managers.get_mut(node.manager), node.view) {
                manager.drop_view(tag, view);
            }
        }
        Ok(())
    }
}
