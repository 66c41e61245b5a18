//! Flushed-call batches
//!
//! Validation is all-or-nothing: a response is either accepted whole or
//! rejected with [`BridgeError::InvalidResponse`] before any call is handed
//! out.

use tether_core::{MethodId, ModuleId, Value};

use crate::{BridgeError, BridgeResult};

/// One decoded native call
#[derive(Debug, Clone, PartialEq)]
pub struct FlushedCall {
    pub module_id: ModuleId,
    pub method_id: MethodId,
    pub params: Vec<Value>,
}

/// A validated batch of native calls from one flush
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlushedCalls {
    /// Calls in ascending index order
    pub calls: Vec<FlushedCall>,
    /// Optional call id sent as the fourth element
    pub call_id: Option<i64>,
}

fn invalid(message: impl Into<String>) -> BridgeError {
    BridgeError::InvalidResponse(message.into())
}

fn id_array(value: &Value, what: &str) -> BridgeResult<Vec<u32>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(format!("{} must be an array, got {}", what, value.kind())))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_u32().ok_or_else(|| {
                invalid(format!("{}[{}] must be a non-negative integer, got {:?}", what, i, item))
            })
        })
        .collect()
}

impl FlushedCalls {
    /// A batch with no calls
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if the batch has no calls
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Validate an engine response. `None` (undefined) and `null` are empty
    /// batches.
    pub fn from_response(response: Option<Value>) -> BridgeResult<Self> {
        let response = match response {
            None | Some(Value::Null) => return Ok(Self::empty()),
            Some(value) => value,
        };

        let kind = response.kind();
        let mut parts = response
            .into_array()
            .ok_or_else(|| invalid(format!("expected an array, got {}", kind)))?;

        if parts.len() != 3 && parts.len() != 4 {
            return Err(invalid(format!(
                "expected 3 or 4 elements, got {}",
                parts.len()
            )));
        }

        let call_id = match parts.get(3) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| {
                invalid(format!("callId must be an integer, got {}", value.kind()))
            })?),
        };

        let module_ids = id_array(&parts[0], "moduleIds")?;
        let method_ids = id_array(&parts[1], "methodIds")?;

        let params_kind = parts[2].kind();
        let params = std::mem::take(&mut parts[2])
            .into_array()
            .ok_or_else(|| invalid(format!("paramsArrays must be an array, got {}", params_kind)))?;

        if module_ids.len() != method_ids.len() || module_ids.len() != params.len() {
            return Err(invalid(format!(
                "length mismatch: {} module ids, {} method ids, {} argument arrays",
                module_ids.len(),
                method_ids.len(),
                params.len()
            )));
        }

        let calls = module_ids
            .into_iter()
            .zip(method_ids)
            .zip(params)
            .enumerate()
            .map(|(i, ((module_id, method_id), args))| {
                let args_kind = args.kind();
                let params = args.into_array().ok_or_else(|| {
                    invalid(format!("paramsArrays[{}] must be an array, got {}", i, args_kind))
                })?;
                Ok(FlushedCall {
                    module_id: ModuleId::new(module_id),
                    method_id: MethodId::new(method_id),
                    params,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Self { calls, call_id })
    }
}

impl IntoIterator for FlushedCalls {
    type Item = FlushedCall;
    type IntoIter = std::vec::IntoIter<FlushedCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.into_iter()
    }
}
