//! `UIManager` native module
//!
//! Translates script-side view calls into buffered UI operations. The buffer
//! is committed to the layout queue when the current batch of native calls
//! completes.

use std::sync::Arc;

use tether_core::{Value, ValueMap, ViewTag};
use tether_modules::{Arguments, MethodError, MethodSpec, NativeModule, ParamKind};
use tether_ui::UiOperationQueue;

/// Bubbling events with capture and bubble phase handler names
const BUBBLING_EVENTS: &[(&str, &str)] = &[
    ("topChange", "onChange"),
    ("topSelect", "onSelect"),
    ("topTouchStart", "onTouchStart"),
    ("topTouchMove", "onTouchMove"),
    ("topTouchEnd", "onTouchEnd"),
    ("topTouchCancel", "onTouchCancel"),
    ("topMouseOver", "onMouseOver"),
    ("topMouseOut", "onMouseOut"),
];

/// Direct events with their handler names
const DIRECT_EVENTS: &[(&str, &str)] = &[
    ("topSelectionChange", "onSelectionChange"),
    ("topLoadingStart", "onLoadingStart"),
    ("topLoadingFinish", "onLoadingFinish"),
    ("topLoadingError", "onLoadingError"),
    ("topLayout", "onLayout"),
    ("topMouseEnter", "onMouseEnter"),
    ("topMouseLeave", "onMouseLeave"),
    ("topMessage", "onMessage"),
];

fn bubbling_event_types() -> Value {
    BUBBLING_EVENTS
        .iter()
        .map(|&(event, handler)| {
            let phases: Value = [
                ("bubbled", handler.to_string()),
                ("captured", format!("{}Capture", handler)),
            ]
            .into_iter()
            .collect();
            let registration: Value = [("phasedRegistrationNames", phases)].into_iter().collect();
            (event, registration)
        })
        .collect()
}

fn direct_event_types() -> Value {
    DIRECT_EVENTS
        .iter()
        .map(|&(event, handler)| {
            let registration: Value = [("registrationName", handler)].into_iter().collect();
            (event, registration)
        })
        .collect()
}

fn tag(args: &Arguments, index: usize) -> Result<ViewTag, MethodError> {
    let raw = args.i64(index)?;
    u32::try_from(raw)
        .map(ViewTag::new)
        .map_err(|_| MethodError::Argument {
            index,
            message: format!("{} is not a view tag", raw),
        })
}

fn props(args: &Arguments, index: usize) -> Result<ValueMap, MethodError> {
    match args.value(index)? {
        Value::Null => Ok(ValueMap::new()),
        _ => Ok(args.map(index)?.clone()),
    }
}

fn numbers<T>(
    args: &Arguments,
    index: usize,
    convert: impl Fn(u32) -> T,
) -> Result<Vec<T>, MethodError> {
    if args.value(index)?.is_null() {
        return Ok(Vec::new());
    }
    args.array(index)?
        .iter()
        .map(|v| {
            v.as_u32().map(&convert).ok_or_else(|| MethodError::Argument {
                index,
                message: format!("expected non-negative integers, found {}", v.kind()),
            })
        })
        .collect()
}

fn indices(args: &Arguments, index: usize) -> Result<Vec<usize>, MethodError> {
    numbers(args, index, |n| n as usize)
}

fn tags(args: &Arguments, index: usize) -> Result<Vec<ViewTag>, MethodError> {
    numbers(args, index, ViewTag::new)
}

/// Native module exposing the view tree to script
pub struct UiManagerModule {
    ui: Arc<UiOperationQueue>,
    lazy_constants: bool,
}

impl UiManagerModule {
    /// Create the module over `ui`
    pub fn new(ui: Arc<UiOperationQueue>) -> Self {
        Self {
            ui,
            lazy_constants: false,
        }
    }

    /// Only export `ViewManagerNames`; per-manager constants are requested
    /// by script on demand
    pub fn with_lazy_constants(mut self, lazy: bool) -> Self {
        self.lazy_constants = lazy;
        self
    }

    /// The queue operations are buffered in
    pub fn ui(&self) -> &Arc<UiOperationQueue> {
        &self.ui
    }

    fn create_view(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui
            .enqueue_create_view(tag(&args, 0)?, args.str(1)?, tag(&args, 2)?, props(&args, 3)?);
        Ok(())
    }

    fn update_view(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui.enqueue_update_props(tag(&args, 0)?, props(&args, 2)?);
        Ok(())
    }

    fn manage_children(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui.enqueue_manage_children(
            tag(&args, 0)?,
            indices(&args, 1)?,
            indices(&args, 2)?,
            tags(&args, 3)?,
            indices(&args, 4)?,
            indices(&args, 5)?,
        );
        Ok(())
    }

    fn set_children(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui.enqueue_set_children(tag(&args, 0)?, tags(&args, 1)?);
        Ok(())
    }

    fn remove_view(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui.enqueue_remove_view(tag(&args, 0)?);
        Ok(())
    }

    fn measure(&self, args: Arguments) -> Result<(), MethodError> {
        self.ui.enqueue_measure(tag(&args, 0)?, args.callback(1)?);
        Ok(())
    }
}

impl NativeModule for UiManagerModule {
    fn name(&self) -> &str {
        "UIManager"
    }

    fn methods(&self) -> Vec<MethodSpec<Self>> {
        vec![
            MethodSpec::new("createView", |m: &Self, args| m.create_view(args))
                .param("reactTag", ParamKind::Int)
                .param("viewName", ParamKind::String)
                .param("rootTag", ParamKind::Int)
                .nullable_param("props", ParamKind::Map),
            MethodSpec::new("updateView", |m: &Self, args| m.update_view(args))
                .param("reactTag", ParamKind::Int)
                .param("viewName", ParamKind::String)
                .nullable_param("props", ParamKind::Map),
            MethodSpec::new("manageChildren", |m: &Self, args| m.manage_children(args))
                .param("containerTag", ParamKind::Int)
                .nullable_param("moveFrom", ParamKind::Array)
                .nullable_param("moveTo", ParamKind::Array)
                .nullable_param("addChildTags", ParamKind::Array)
                .nullable_param("addAtIndices", ParamKind::Array)
                .nullable_param("removeFrom", ParamKind::Array),
            MethodSpec::new("setChildren", |m: &Self, args| m.set_children(args))
                .param("containerTag", ParamKind::Int)
                .param("reactTags", ParamKind::Array),
            MethodSpec::new("removeView", |m: &Self, args| m.remove_view(args))
                .param("reactTag", ParamKind::Int),
            MethodSpec::new("measure", |m: &Self, args| m.measure(args))
                .param("reactTag", ParamKind::Int)
                .callback("callback"),
        ]
    }

    fn constants(&self) -> Option<ValueMap> {
        let mut constants = ValueMap::new();
        let names: Vec<Value> = self
            .ui
            .view_manager_names()
            .iter()
            .map(|n| Value::from(n.as_str()))
            .collect();
        constants.insert("ViewManagerNames".to_string(), Value::from(names));

        if !self.lazy_constants {
            match self.ui.view_manager_constants() {
                Ok(managers) => {
                    for (name, value) in managers {
                        constants.insert(name, value);
                    }
                }
                Err(e) => log::error!("Failed to collect view manager constants: {}", e),
            }
            constants.insert("genericBubblingEventTypes".to_string(), bubbling_event_types());
            constants.insert("genericDirectEventTypes".to_string(), direct_event_types());
        }
        Some(constants)
    }

    fn on_batch_complete(&self) {
        if let Err(e) = self.ui.commit() {
            log::error!("UI commit failed: {}", e);
        }
    }
}
