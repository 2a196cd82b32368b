//! Shared fixtures for unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    runtime::{MethodDef, MethodTable},
    target::{TargetId, TypeSig},
    value::Value,
    ThrownException,
};

pub const CALCULATOR_ADD: &str = "Calculator.add(int,int)";
pub const CALCULATOR_DIVIDE: &str = "Calculator.divide(int,int)";
pub const SERVICE_FETCH: &str = "Service.fetch(String)";

fn int_arg(args: &[Value], index: usize) -> i64 {
    args.get(index).and_then(Value::as_i64).unwrap_or(0)
}

// Table with Calculator.add and Calculator.divide; divide throws on a zero divisor
pub fn calculator_table() -> Arc<MethodTable> {
    let table = Arc::new(MethodTable::new());
    table
        .register(MethodDef::new(
            TargetId::parse(CALCULATOR_ADD).unwrap(),
            TypeSig::INT,
            |args: &[Value]| Ok(Value::Int((int_arg(args, 0) + int_arg(args, 1)) as i32)),
        ))
        .unwrap();
    table
        .register(MethodDef::new(
            TargetId::parse(CALCULATOR_DIVIDE).unwrap(),
            TypeSig::INT,
            |args: &[Value]| {
                let divisor = int_arg(args, 1);
                if divisor == 0 {
                    return Err(ThrownException::new(
                        "java.lang.ArithmeticException",
                        "/ by zero",
                    ));
                }
                Ok(Value::Int((int_arg(args, 0) / divisor) as i32))
            },
        ))
        .unwrap();
    table
}

// Registers Service.fetch echoing "fetched:<key>" and counting body executions
pub fn service_table(executions: Arc<AtomicUsize>) -> Arc<MethodTable> {
    let table = Arc::new(MethodTable::new());
    table
        .register(MethodDef::new(
            TargetId::parse(SERVICE_FETCH).unwrap(),
            TypeSig::STRING,
            move |args: &[Value]| {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(Value::str(format!("fetched:{}", args[0])))
            },
        ))
        .unwrap();
    table
}

pub fn rules_json(rules: &[&str]) -> Vec<u8> {
    format!(r#"{{ "rules": [ {} ] }}"#, rules.join(", ")).into_bytes()
}
