//! End-to-end interception tests.
//!
//! Each test registers a small host program in a `MethodTable`, attaches an agent with a
//! configuration and checks what callers observe.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};

use mockscope::prelude::*;
use mockscope::{Disposition, FallbackReason, SlotState};

struct Calculator {
    add: MethodHandle,
    subtract: MethodHandle,
    divide: MethodHandle,
}

fn int(args: &[Value], index: usize) -> i32 {
    args.get(index).and_then(Value::as_i64).unwrap_or(0) as i32
}

fn calculator(table: &MethodTable) -> Calculator {
    let add = table
        .register(MethodDef::new(
            TargetId::parse("Calculator.add(int,int)").unwrap(),
            TypeSig::INT,
            |args: &[Value]| Ok(Value::Int(int(args, 0) + int(args, 1))),
        ))
        .unwrap();
    let subtract = table
        .register(MethodDef::new(
            TargetId::parse("Calculator.subtract(int,int)").unwrap(),
            TypeSig::INT,
            |args: &[Value]| Ok(Value::Int(int(args, 0) - int(args, 1))),
        ))
        .unwrap();
    let divide = table
        .register(MethodDef::new(
            TargetId::parse("Calculator.divide(int,int)").unwrap(),
            TypeSig::INT,
            |args: &[Value]| match int(args, 1) {
                0 => Err(ThrownException::new(
                    "java.lang.ArithmeticException",
                    "/ by zero",
                )),
                divisor => Ok(Value::Int(int(args, 0) / divisor)),
            },
        ))
        .unwrap();
    Calculator {
        add,
        subtract,
        divide,
    }
}

fn active_agent(table: &Arc<MethodTable>, config: &str) -> Agent {
    let agent = Agent::new(Arc::clone(table), AgentConfig::testing());
    agent
        .initialize(&ConfigSource::bytes(config))
        .expect("configuration should load");
    agent
}

#[test]
fn calculator_add_is_substituted() {
    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Calculator.add(int,int)", "action": { "return": 42 } } ] }"#,
    );

    assert_eq!(calc.add.call(&[Value::Int(2), Value::Int(2)]), Ok(Value::Int(42)));
    assert_eq!(calc.subtract.call(&[Value::Int(5), Value::Int(3)]), Ok(Value::Int(2)));

    assert_eq!(calc.subtract.state(), SlotState::Uninstalled);
    assert!(agent.journal().was_substituted(calc.add.target()));
    assert_eq!(agent.journal().calls_to(calc.subtract.target()), 0);
}

#[test]
fn service_fetch_conditional_throw() {
    let table = Arc::new(MethodTable::new());
    let executions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executions);
    let fetch = table
        .register(MethodDef::new(
            TargetId::parse("Service.fetch(String)").unwrap(),
            TypeSig::STRING,
            move |args: &[Value]| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::str(format!("fetched:{}", args[0])))
            },
        ))
        .unwrap();

    let agent = Agent::new(Arc::clone(&table), AgentConfig::testing());
    agent.register_exception("com.acme.NotFoundException");
    agent
        .initialize(&ConfigSource::bytes(
            r#"{ "rules": [
                { "target": "Service.fetch(String)", "condition": "arg0 == \"missing\"",
                  "action": { "throw": { "type": "NotFoundException", "message": "not found" } } },
                { "target": "Service.fetch(String)", "action": { "return": "default" } }
            ] }"#,
        ))
        .unwrap();

    let thrown = fetch.call(&[Value::str("missing")]).unwrap_err();
    assert_eq!(thrown.type_name(), "com.acme.NotFoundException");
    assert_eq!(thrown.message(), "not found");
    assert!(thrown.is_mocked());

    assert_eq!(fetch.call(&[Value::str("x")]), Ok(Value::str("default")));

    // Substituted calls never run the original body
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let dispositions: Vec<Disposition> = agent
        .journal()
        .events()
        .into_iter()
        .map(|event| event.disposition)
        .collect();
    assert_eq!(dispositions, vec![Disposition::Thrown, Disposition::Substituted]);
}

#[test]
fn unmatched_calls_behave_like_the_original() {
    let plain = Arc::new(MethodTable::new());
    let reference = calculator(&plain);

    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let _agent = active_agent(
        &table,
        r#"{ "rules": [
            { "target": "Calculator.divide(int,int)", "condition": "arg0 == 999",
              "action": { "return": -1 } },
            { "target": "Calculator.add(int,int)", "condition": "arg0 > 1000",
              "action": { "return": 0 } }
        ] }"#,
    );
    assert_eq!(calc.divide.state(), SlotState::Installed);

    for (a, b) in [(10, 2), (7, 0), (-9, 3), (0, 0), (1000, 1)] {
        let args = [Value::Int(a), Value::Int(b)];
        assert_eq!(calc.divide.call(&args), reference.divide.call(&args));
        assert_eq!(calc.add.call(&args), reference.add.call(&args));
    }

    // The original's exception comes through unchanged
    let thrown = calc.divide.call(&[Value::Int(1), Value::Int(0)]).unwrap_err();
    assert!(thrown.is("ArithmeticException"));
    assert!(!thrown.is_mocked());
}

#[test]
fn priority_then_declaration_order() {
    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let _agent = active_agent(
        &table,
        r#"{ "rules": [
            { "target": "Calculator.add(int,int)", "action": { "return": 1 } },
            { "target": "Calculator.add(int,int)", "action": { "return": 2 } },
            { "target": "Calculator.add(int,int)", "condition": "arg0 == 5", "priority": 10,
              "action": { "return": 3 } }
        ] }"#,
    );

    assert_eq!(calc.add.call(&[Value::Int(0), Value::Int(0)]), Ok(Value::Int(1)));
    assert_eq!(calc.add.call(&[Value::Int(5), Value::Int(0)]), Ok(Value::Int(3)));
}

#[test]
fn unresolvable_exception_runs_original() {
    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Calculator.add(int,int)",
              "action": { "throw": { "type": "com.acme.Unknown", "message": "boom" } } } ] }"#,
    );

    assert_eq!(calc.add.call(&[Value::Int(2), Value::Int(3)]), Ok(Value::Int(5)));
    let events = agent.journal().events();
    assert_eq!(
        events[0].disposition,
        Disposition::Fallback(FallbackReason::ExceptionUnavailable)
    );
}

#[test]
fn computed_substitute() {
    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let _agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Calculator.add(int,int)",
              "action": { "computed": "arg0 * 100 + arg1" } } ] }"#,
    );
    assert_eq!(calc.add.call(&[Value::Int(4), Value::Int(2)]), Ok(Value::Int(402)));
}

#[test]
fn reentrant_calls_resolve_independently() {
    let table = Arc::new(MethodTable::new());
    let fib_handle: Arc<OnceLock<MethodHandle>> = Arc::new(OnceLock::new());
    let inner = Arc::clone(&fib_handle);
    let fib = table
        .register(MethodDef::new(
            TargetId::parse("Math.fib(int)").unwrap(),
            TypeSig::LONG,
            move |args: &[Value]| {
                let n = int(args, 0);
                let fib = inner.get().expect("handle is set before the first call");
                let a = fib.call(&[Value::Int(n - 1)])?;
                let b = fib.call(&[Value::Int(n - 2)])?;
                Ok(Value::Long(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
            },
        ))
        .unwrap();
    fib_handle.set(fib.clone()).unwrap();

    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Math.fib(int)", "condition": "arg0 < 2",
              "action": { "return": 1 } } ] }"#,
    );

    assert_eq!(fib.call(&[Value::Int(10)]), Ok(Value::Long(89)));
    assert_eq!(agent.journal().substitution_count(fib.target()), 89);
}

#[test]
fn abstract_target_without_rule_is_unsupported() {
    let table = Arc::new(MethodTable::new());
    let find = table
        .register(MethodDef::abstract_method(
            TargetId::parse("com.acme.Repository.find(long)").unwrap(),
            TypeSig::OBJECT,
        ))
        .unwrap();
    let _agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "com.acme.Repository.find(long)",
              "condition": "arg0 == 1", "action": { "return": { "id": 1 } } } ] }"#,
    );

    let found = find.call(&[Value::Long(1)]).unwrap();
    assert_eq!(found.field("id"), Some(&Value::Int(1)));

    let thrown = find.call(&[Value::Long(2)]).unwrap_err();
    assert!(thrown.is("UnsupportedOperationException"));
}

#[test]
fn legacy_configuration_via_attach() {
    let table = Arc::new(MethodTable::new());
    let count = table
        .register(MethodDef::new(
            TargetId::parse("com.acme.Repo.count()").unwrap(),
            TypeSig::INT,
            |_: &[Value]| Ok(Value::Int(0)),
        ))
        .unwrap();
    let save = table
        .register(MethodDef::new(
            TargetId::parse("com.acme.Repo.save(String,long)").unwrap(),
            TypeSig::BOOLEAN,
            |_: &[Value]| Ok(Value::Bool(true)),
        ))
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"{ "mockMethods": [
            { "className": "com.acme.Repo", "methodName": "count", "signature": "()",
              "returnValue": "3", "returnType": "int" },
            { "className": "com.acme.Repo", "methodName": "save", "signature": "(String, long)",
              "throwException": true, "exceptionType": "java.lang.IllegalStateException",
              "exceptionMessage": "read only" }
        ] }"#,
    )
    .unwrap();

    let args = format!("config={},journal=true", file.path().display());
    let agent = mockscope::attach(Arc::clone(&table), Some(&args));
    assert_eq!(agent.installed_targets().len(), 2);

    assert_eq!(count.call(&[]), Ok(Value::Int(3)));
    let thrown = save
        .call(&[Value::str("a"), Value::Long(1)])
        .unwrap_err();
    assert_eq!(thrown.type_name(), "java.lang.IllegalStateException");
    assert_eq!(thrown.message(), "read only");
    assert_eq!(agent.journal().len(), 2);

    drop(agent);
    assert_eq!(count.call(&[]), Ok(Value::Int(0)));
}

#[test]
fn reload_switches_targets() {
    let table = Arc::new(MethodTable::new());
    let calc = calculator(&table);
    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Calculator.add(int,int)", "action": { "return": 42 } } ] }"#,
    );

    let report = agent
        .reload_handle()
        .reload(&ConfigSource::bytes(
            r#"{ "rules": [ { "target": "Calculator.subtract(int,int)", "action": { "return": 0 } } ] }"#,
        ))
        .unwrap();
    assert_eq!(report.removed, vec![calc.add.target().clone()]);
    assert_eq!(report.installed, vec![calc.subtract.target().clone()]);
    assert_eq!(agent.generation(), 2);

    assert_eq!(calc.add.call(&[Value::Int(2), Value::Int(2)]), Ok(Value::Int(4)));
    assert_eq!(calc.subtract.call(&[Value::Int(5), Value::Int(3)]), Ok(Value::Int(0)));

    // A malformed document keeps the previous generation
    assert!(agent.reload(&ConfigSource::bytes("{ \"rules\": [ { } ] }")).is_err());
    assert_eq!(agent.generation(), 2);
    assert_eq!(calc.subtract.call(&[Value::Int(5), Value::Int(3)]), Ok(Value::Int(0)));
}

#[test]
fn boxed_and_primitive_overloads_are_separate_targets() {
    let table = Arc::new(MethodTable::new());
    let primitive = table
        .register(MethodDef::new(
            TargetId::parse("Svc.f(int)").unwrap(),
            TypeSig::parse("String").unwrap(),
            |_: &[Value]| Ok(Value::str("primitive")),
        ))
        .unwrap();
    let boxed = table
        .register(MethodDef::new(
            TargetId::parse("Svc.f(java.lang.Integer)").unwrap(),
            TypeSig::parse("String").unwrap(),
            |_: &[Value]| Ok(Value::str("boxed")),
        ))
        .unwrap();
    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Svc.f(Integer)", "action": { "return": "mocked" } } ] }"#,
    );

    assert_eq!(agent.installed_targets(), vec![boxed.target().clone()]);
    assert_eq!(primitive.state(), SlotState::Uninstalled);
    assert_eq!(primitive.call(&[Value::Int(1)]), Ok(Value::str("primitive")));
    assert_eq!(boxed.call(&[Value::Int(1)]), Ok(Value::str("mocked")));
}

#[test]
fn boxed_return_can_be_mocked_to_null() {
    let table = Arc::new(MethodTable::new());
    let lookup = table
        .register(MethodDef::new(
            TargetId::parse("Svc.h()").unwrap(),
            TypeSig::parse("java.lang.Integer").unwrap(),
            |_: &[Value]| Ok(Value::Int(5)),
        ))
        .unwrap();
    let agent = active_agent(
        &table,
        r#"{ "rules": [ { "target": "Svc.h()", "action": { "return": null } } ] }"#,
    );

    assert_eq!(lookup.call(&[]), Ok(Value::Null));
    assert_eq!(
        agent.journal().events()[0].disposition,
        Disposition::Substituted
    );
}
