use std::time::{SystemTime, UNIX_EPOCH};

use crate::{callable::NativeFunction, value::Value};

/// Native callables injected into the global frame before a program runs.
pub fn builtins() -> Vec<NativeFunction> {
    vec![NativeFunction::new("clock", 0, clock)]
}

fn clock(_args: &[Value]) -> Result<Value, String> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::Number(elapsed.as_secs_f64()))
        .map_err(|e| format!("Clock error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_positive_seconds() {
        match clock(&[]) {
            Ok(Value::Number(n)) => assert!(n > 1_600_000_000.0),
            other => panic!("unexpected clock result: {other:?}"),
        }
    }

    #[test]
    fn builtins_are_named() {
        let names: Vec<String> = builtins().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["clock".to_string()]);
    }
}
