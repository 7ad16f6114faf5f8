use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use okra::{
    error::{ErrorKind, OkraError},
    interpreter::Interpreter,
    run_source, stdlib, RunError,
};
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

fn interpreter() -> (Interpreter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::new(Box::new(buffer.clone()));
    interpreter.load_stdlib(stdlib::builtins());
    (interpreter, buffer)
}

fn run(source: &str) -> (String, Result<(), RunError>) {
    let (mut interpreter, buffer) = interpreter();
    let result = run_source(source, &mut interpreter);
    (buffer.contents(), result)
}

fn output(source: &str) -> String {
    let (out, result) = run(source);
    if let Err(e) = result {
        panic!("program failed: {e:?}\noutput so far:\n{out}");
    }
    out
}

fn runtime_error(source: &str) -> (String, OkraError) {
    match run(source) {
        (out, Err(RunError::Runtime(error))) => (out, error),
        (out, other) => panic!("expected a runtime error, got {other:?} with output {out:?}"),
    }
}

#[test]
fn prints_values() {
    let source = r#"
        print 1 + 2;
        print "a" + 'b';
        print 7 / 2;
        print null;
        print !0;
        print 1 / 0;
    "#;
    assert_eq!(output(source), "3\nab\n3.5\nnull\nfalse\ninf\n");
}

#[test]
fn block_shadowing_does_not_leak() {
    let source = "var x = 1; { var x = 2; print x == 2; } print x == 1;";
    assert_eq!(output(source), "true\ntrue\n");
}

#[test]
fn assignment_reaches_enclosing_frame() {
    let source = "var x = 1; { x = 2; { x = x + 1; } } print x;";
    assert_eq!(output(source), "3\n");
}

#[test]
fn closure_keeps_outer_parameter_alive() {
    let source = r#"
        func outer(a) {
            func inner() { return a; }
            return inner;
        }
        var f = outer(7);
        print f();
    "#;
    assert_eq!(output(source), "7\n");
}

#[test]
fn closures_share_their_defining_frame() {
    let source = r#"
        func makeCounter() {
            var count = 0;
            func increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
    "#;
    assert_eq!(output(source), "1\n2\n1\n");
}

#[test]
fn closures_see_defining_scope_not_call_site() {
    let source = r#"
        var name = "global";
        func show() { print name; }
        func caller() {
            var name = "local";
            show();
        }
        caller();
    "#;
    assert_eq!(output(source), "global\n");
}

#[test]
fn struct_method_lookup_falls_through_to_methods() {
    let source = r#"
        struct Foo { func bar() { return 1; } }
        var f = Foo();
        print f.bar() == 1;
        f.bar = 5;
        print f.bar;
    "#;
    assert_eq!(output(source), "true\n5\n");
}

#[test]
fn fields_are_created_on_first_assignment() {
    let source = r#"
        struct Point {}
        var p = Point();
        p.x = 3;
        p.y = p.x * 2;
        print p.x + p.y;
    "#;
    assert_eq!(output(source), "9\n");
}

#[test]
fn this_and_initializer() {
    let source = r#"
        struct Counter {
            func init(start) { this.n = start; }
            func inc() {
                this.n = this.n + 1;
                return this.n;
            }
        }
        var c = Counter(5);
        print c.inc();
        print c.inc();
        var m = c.inc;
        print m();
        print c.init(0) == c;
    "#;
    assert_eq!(output(source), "6\n7\n8\ntrue\n");
}

#[test]
fn initializer_arity_is_checked() {
    let source = "struct P { func init(x, y) {} } var p = P(1);";
    let (_, error) = runtime_error(source);
    assert_eq!(error.kind, ErrorKind::ArityError);
    assert_eq!(error.message, "Expected 2 arguments but got 1.");
}

#[test]
fn instances_outlive_struct_redefinition() {
    let source = r#"
        struct A { func m() { return 1; } }
        var a = A();
        struct A { func m() { return 2; } }
        print a.m();
        print A().m();
    "#;
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn callables_and_instances_compare_by_identity() {
    let source = r#"
        struct Foo {}
        func f() {}
        var a = Foo();
        var b = Foo();
        var g = f;
        print a == a;
        print a == b;
        print g == f;
        print f == "f";
    "#;
    assert_eq!(output(source), "true\nfalse\ntrue\nfalse\n");
}

#[test]
fn renders_callables_and_instances() {
    let source = r#"
        struct Foo {}
        func bar() {}
        print Foo;
        print Foo();
        print bar;
        print clock;
    "#;
    assert_eq!(
        output(source),
        "<struct Foo>\n<Foo instance>\n<func bar>\n<native func clock>\n"
    );
}

#[test]
fn return_unwinds_through_loops_and_branches() {
    let source = r#"
        func find() {
            var i = 0;
            while (true) {
                if (i == 3) { return i; }
                i = i + 1;
            }
        }
        func nothing() { return; }
        print find();
        print nothing();
    "#;
    assert_eq!(output(source), "3\nnull\n");
}

#[test]
fn recursion() {
    let source = r#"
        func fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);
    "#;
    assert_eq!(output(source), "610\n");
}

#[test]
fn for_and_while_loops() {
    let source = r#"
        for (var i = 0; i < 3; i = i + 1) print i;
        var j = 3;
        while (j > 0) j = j - 1;
        print j;
    "#;
    assert_eq!(output(source), "0\n1\n2\n0\n");
}

#[test]
fn logical_operators_short_circuit() {
    let source = r#"
        var calls = 0;
        func touch() { calls = calls + 1; return true; }
        print false and touch();
        print true or touch();
        print null or "fallback";
        print calls;
    "#;
    assert_eq!(output(source), "false\ntrue\nfallback\n0\n");
}

#[test]
fn undefined_variable_is_reported_not_fatal() {
    let (out, error) = runtime_error("print 1;\nprint undefinedVar;\nprint 2;");
    assert_eq!(out, "1\n");
    assert_eq!(
        error,
        OkraError::new(
            ErrorKind::NameError,
            2,
            7,
            "Undefined variable 'undefinedVar'."
        )
    );
}

#[test]
fn assigning_an_undeclared_name_fails() {
    let (_, error) = runtime_error("{ ghost = 1; }");
    assert_eq!(error.kind, ErrorKind::NameError);
}

#[test]
fn arity_mismatch_is_reported() {
    let (_, error) = runtime_error("func f(a, b) { return a; }\nf(1);");
    assert_eq!(error.kind, ErrorKind::ArityError);
    assert_eq!((error.line, error.col), (2, 4));
    assert_eq!(error.to_string(), "[line 2:4] ArityError: Expected 2 arguments but got 1.");
}

#[test]
fn undefined_property_is_a_name_error() {
    let (_, error) = runtime_error("struct S {} S().missing;");
    assert_eq!(error.kind, ErrorKind::NameError);
    assert_eq!(error.message, "Undefined property 'missing'.");
}

#[test]
fn type_errors_carry_operator_location() {
    let (_, error) = runtime_error("var s = 'a';\nprint s + 1;");
    assert_eq!(error.kind, ErrorKind::TypeError);
    assert_eq!((error.line, error.col), (2, 9));
}

#[test]
fn static_errors_prevent_execution() {
    let (out, result) = run("print 1;\nvar = 2;\nprint (3;");
    assert_eq!(out, "");
    match result {
        Err(RunError::Static(errors)) => {
            assert!(errors.iter().all(|e| e.kind == ErrorKind::SyntaxError));
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected static errors, got {other:?}"),
    }
}

#[test]
fn failed_statement_leaves_globals_consistent() {
    let (mut interpreter, buffer) = interpreter();

    assert!(run_source("var x = 1;", &mut interpreter).is_ok());
    assert!(run_source("x = 'a' + 1;", &mut interpreter).is_err());
    assert!(run_source("{ var y = 2; x = missing; }", &mut interpreter).is_err());
    run_source("print x;", &mut interpreter).unwrap();

    assert_eq!(buffer.contents(), "1\n");
}

#[test]
fn clock_builtin() {
    assert_eq!(output("print clock() > 0;"), "true\n");
}

#[test]
fn non_callable_callee_skips_its_arguments() {
    let (mut interpreter, buffer) = interpreter();
    let setup = r#"
        var x = 0;
        func side() { print "side effect"; x = 1; return 1; }
    "#;
    run_source(setup, &mut interpreter).unwrap();

    match run_source("\"str\"(side());", &mut interpreter) {
        Err(RunError::Runtime(error)) => {
            assert_eq!(
                error,
                OkraError::new(
                    ErrorKind::TypeError,
                    1,
                    13,
                    "Can only call functions and structs."
                )
            );
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }

    run_source("print x;", &mut interpreter).unwrap();
    assert_eq!(buffer.contents(), "0\n");
}

#[test]
fn setting_a_field_on_a_non_instance() {
    let (out, error) = runtime_error("print 1;\n(1).x = 2;");
    assert_eq!(out, "1\n");
    assert_eq!(
        error,
        OkraError::new(ErrorKind::TypeError, 2, 5, "Only instances have fields.")
    );
}

#[test]
fn too_many_arguments_is_a_static_error() {
    let args = vec!["1"; 256].join(", ");
    let (out, result) = run(&format!("print 0;\nclock({args});"));
    assert_eq!(out, "");
    match result {
        Err(RunError::Static(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, ErrorKind::SyntaxError);
            assert_eq!(errors[0].line, 2);
            assert_eq!(errors[0].message, "Can't have more than 255 arguments.");
        }
        other => panic!("expected static errors, got {other:?}"),
    }
}

#[test]
fn initializer_returning_a_value_is_rejected() {
    let (out, result) = run("struct P { func init() { return 1; } }\nprint P();");
    assert_eq!(out, "");
    match result {
        Err(RunError::Static(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, "Can't return a value from an initializer.");
        }
        other => panic!("expected static errors, got {other:?}"),
    }
}
