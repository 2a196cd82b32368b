#![no_main]

use libfuzzer_sys::fuzz_target;
use mockscope::{expr::Expression, Value};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(expression) = Expression::compile(source) {
        let _ = expression.evaluate(&[Value::Int(7), Value::str("key"), Value::Null]);
    }
});
