//! View managers
//!
//! A view manager creates native views of one type. Everything beyond
//! creation is an optional capability; a manager implements only what its
//! views support:
//!
//! | Capability | Used by |
//! |---|---|
//! | [`PropUpdatable`] | initial props, `UpdateProps` |
//! | [`ChildManaging`] | `ManageChildren`, `SetChildren` |
//! | [`DimensionAware`] | `SetDimensions` |
//! | [`ExtraDataConsuming`] | `UpdateExtraData` |
//!
//! Managers run on the layout queue only.

use std::any::Any;
use std::collections::HashMap;
use thiserror::Error;

use tether_core::{Value, ValueMap, ViewTag};

use crate::operation::Frame;
use crate::UiError;

/// Opaque native view owned by the view tree
pub type NativeView = Box<dyn Any + Send>;

/// Error raised by a view manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ViewManagerError(pub String);

impl ViewManagerError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Applies props to a view
pub trait PropUpdatable {
    fn update_props(&mut self, view: &mut dyn Any, props: &ValueMap) -> Result<(), ViewManagerError>;
}

/// Attaches and detaches child views
pub trait ChildManaging {
    fn add_child(
        &mut self,
        parent: &mut dyn Any,
        child: &mut dyn Any,
        index: usize,
    ) -> Result<(), ViewManagerError>;

    fn remove_child_at(&mut self, parent: &mut dyn Any, index: usize) -> Result<(), ViewManagerError>;
}

/// Receives layout results
pub trait DimensionAware {
    fn set_dimensions(&mut self, view: &mut dyn Any, frame: Frame) -> Result<(), ViewManagerError>;
}

/// Receives opaque layout data
pub trait ExtraDataConsuming {
    fn update_extra_data(&mut self, view: &mut dyn Any, data: &Value) -> Result<(), ViewManagerError>;
}

/// Creates native views of one type
pub trait ViewManager: Send {
    /// View type name used by `createView`
    fn name(&self) -> &str;

    /// Create the native view for `tag`
    fn create_view(&mut self, tag: ViewTag) -> Result<NativeView, ViewManagerError>;

    /// Release a view that was removed from the tree
    fn drop_view(&mut self, _tag: ViewTag, _view: NativeView) {}

    /// Constants exported to script under this manager's name
    fn constants(&self) -> Option<ValueMap> {
        None
    }

    fn as_prop_updatable(&mut self) -> Option<&mut dyn PropUpdatable> {
        None
    }

    fn as_child_managing(&mut self) -> Option<&mut dyn ChildManaging> {
        None
    }

    fn as_dimension_aware(&mut self) -> Option<&mut dyn DimensionAware> {
        None
    }

    fn as_extra_data_consuming(&mut self) -> Option<&mut dyn ExtraDataConsuming> {
        None
    }
}

/// View managers by type name
#[derive(Default)]
pub struct ViewManagerRegistry {
    managers: Vec<Box<dyn ViewManager>>,
    by_name: HashMap<String, usize>,
}

impl ViewManagerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view manager
    pub fn register(&mut self, manager: Box<dyn ViewManager>) -> Result<(), UiError> {
        let name = manager.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(UiError::DuplicateViewManager(name));
        }
        self.by_name.insert(name, self.managers.len());
        self.managers.push(manager);
        Ok(())
    }

    /// Number of managers
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Check if no manager is registered
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Manager names in registration order
    pub fn names(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.name().to_string()).collect()
    }

    /// Constants of every manager, keyed by manager name
    pub fn constants(&self) -> ValueMap {
        self.managers
            .iter()
            .map(|m| (m.name().to_string(), Value::from(m.constants())))
            .collect()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn ViewManager>> {
        self.managers.get_mut(index)
    }

    pub(crate) fn name_of(&self, index: usize) -> &str {
        self.managers.get(index).map_or("<unknown>", |m| m.name())
    }
}
