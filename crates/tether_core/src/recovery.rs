//! Panic containment
//!
//! Native code runs user-supplied closures (queue tasks, module methods,
//! view manager hooks). A panic in one of them is converted into an error
//! message so the calling loop can report it and keep going.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run `f`, turning a panic into `Err(message)`
pub fn catch_panic<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_panic() {
        assert_eq!(catch_panic(|| 42), Ok(42));

        let result: Result<(), String> = catch_panic(|| panic!("test panic"));
        assert_eq!(result, Err("test panic".to_string()));

        let code = 7;
        let result: Result<(), String> = catch_panic(|| panic!("failed with {}", code));
        assert_eq!(result, Err("failed with 7".to_string()));
    }
}
