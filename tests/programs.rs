use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::thread;

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::value::Value;
use rox::{Lox, Outcome, Reporter};

/// `print` sink whose contents stay readable after the interpreter takes it.
#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects rendered diagnostics instead of printing them.
#[derive(Clone, Default)]
struct Collect(Rc<RefCell<Vec<String>>>);

impl Reporter for Collect {
    fn report(&mut self, error: &LoxError) {
        self.0.borrow_mut().push(error.to_string());
    }
}

struct Session {
    lox: Lox<Collect>,
    out: Capture,
    errors: Collect,
}

impl Session {
    fn new() -> Self {
        let out = Capture::default();
        let errors = Collect::default();

        Self {
            lox: Lox::with_parts(
                Interpreter::with_output(Box::new(out.clone())),
                errors.clone(),
            ),
            out,
            errors,
        }
    }

    fn run(&mut self, source: &str) -> Outcome {
        self.lox.run(source)
    }

    fn output(&self) -> String {
        self.out.text()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.0.borrow().clone()
    }
}

fn run(source: &str) -> (Outcome, String, Vec<String>) {
    let mut session = Session::new();
    let outcome = session.run(source);
    (outcome, session.output(), session.errors())
}

/// Runs `source` on a thread whose stack fits the interpreter's call-depth
/// limit; the default test thread stack does not.
fn run_deep(source: &'static str) -> (Outcome, String, Vec<String>) {
    thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(move || run(source))
        .unwrap()
        .join()
        .unwrap()
}

fn run_ok(source: &str) -> String {
    let (outcome, out, errors) = run(source);
    assert_eq!(outcome, Outcome::Ok, "errors: {:?}", errors);
    out
}

fn run_runtime_error(source: &str) -> String {
    let (outcome, _, errors) = run(source);
    assert_eq!(outcome, Outcome::RuntimeError, "errors: {:?}", errors);
    assert_eq!(errors.len(), 1);
    errors[0].clone()
}

// ─────────────────────────── expressions ───────────────────────────

#[test]
fn arithmetic_and_concatenation() {
    assert_eq!(
        run_ok("print 1 + 2; print \"a\" + \"b\"; print 10 / 4; print -(3 * 2);"),
        "3\nab\n2.5\n-6\n"
    );
}

#[test]
fn adding_string_to_number_names_the_operator() {
    let err = run_runtime_error("print \"a\" + 1;");
    assert_eq!(err, "Operands of '+' must be two numbers or two strings.\n[line 1]");
}

#[test]
fn comparison_type_error_names_operand_role() {
    let err = run_runtime_error("\n\nprint \"a\" < 1;");
    assert_eq!(err, "Left operand of '<' must be a number, got string.\n[line 3]");

    let err = run_runtime_error("print 1 - nil;");
    assert_eq!(err, "Right operand of '-' must be a number, got nil.\n[line 1]");
}

#[test]
fn unary_minus_requires_number() {
    let err = run_runtime_error("print -\"x\";");
    assert_eq!(err, "Operand of '-' must be a number.\n[line 1]");
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(
        run_ok("print 1 / 0; print -1 / 0; print 0 / 0 == 0 / 0;"),
        "inf\n-inf\nfalse\n"
    );
}

#[test]
fn truthiness_and_equality() {
    let out = run_ok(
        "
        if (0) print \"zero is truthy\";
        if (\"\") print \"empty is truthy\";
        if (nil) print \"unreachable\"; else print \"nil is falsy\";
        print 1 == \"1\";
        print nil == nil;
        print nil == false;
        print !nil;
        ",
    );
    assert_eq!(
        out,
        "zero is truthy\nempty is truthy\nnil is falsy\nfalse\ntrue\nfalse\ntrue\n"
    );
}

#[test]
fn logical_operators_short_circuit() {
    let out = run_ok(
        "
        fun boom() { print \"boom\"; return true; }
        print false and boom();
        print true or boom();
        print nil or \"fallback\";
        print 1 and 2;
        ",
    );
    assert_eq!(out, "false\ntrue\nfallback\n2\n");
}

#[test]
fn display_forms() {
    let out = run_ok(
        "
        fun f() {}
        class K {}
        print nil; print true; print 3.0; print 2.5;
        print clock; print f; print K; print K();
        ",
    );
    assert_eq!(
        out,
        "nil\ntrue\n3\n2.5\n<native fn>\n<fn f>\n<class K>\nK instance\n"
    );
}

#[test]
fn large_integral_numbers_print_every_digit() {
    let out = run_ok(
        "
        var big = 1;
        for (var i = 0; i < 100; i = i + 1) big = big * 2;
        print big;
        ",
    );
    assert_eq!(out, "1267650600228229401496703205376\n");
}

#[test]
fn clock_returns_seconds() {
    let out = run_ok("var t = clock(); print t > 0; print clock() >= t;");
    assert_eq!(out, "true\ntrue\n");
}

// ──────────────────────────── statements ───────────────────────────

#[test]
fn inner_scope_shadows_and_is_restored() {
    assert_eq!(
        run_ok("{ var x = 1; { var x = 2; print x; } print x; }"),
        "2\n1\n"
    );
}

#[test]
fn for_loop_counts() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn while_and_if_else() {
    let out = run_ok(
        "
        var i = 0;
        while (i < 4) {
            if (i == 1) print \"one\"; else if (i == 2) print \"two\"; else print i;
            i = i + 1;
        }
        ",
    );
    assert_eq!(out, "0\none\ntwo\n3\n");
}

#[test]
fn assignment_to_undeclared_global_fails() {
    let err = run_runtime_error("y = 1;");
    assert_eq!(err, "Undefined variable 'y'.\n[line 1]");
}

#[test]
fn global_redeclaration_overwrites() {
    assert_eq!(run_ok("var a = 1; var a = 2; print a;"), "2\n");
}

// ───────────────────────── functions & closures ─────────────────────────

#[test]
fn recursion() {
    let out = run_ok(
        "
        fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
        print fib(10);
        ",
    );
    assert_eq!(out, "55\n");
}

#[test]
fn closures_accumulate_across_calls() {
    let out = run_ok(
        "
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; return i; }
            return count;
        }
        var c = makeCounter();
        print c();
        print c();
        var d = makeCounter();
        print d();
        print c();
        ",
    );
    assert_eq!(out, "1\n2\n1\n3\n");
}

#[test]
fn separate_closures_do_not_share_locals() {
    let out = run_ok(
        "
        fun make(n) { fun get() { return n; } return get; }
        var a = make(1);
        var b = make(2);
        print a(); print b(); print a();
        ",
    );
    assert_eq!(out, "1\n2\n1\n");
}

#[test]
fn closures_bind_statically() {
    let out = run_ok(
        "
        var a = \"global\";
        {
            fun showA() { print a; }
            showA();
            var a = \"block\";
            showA();
        }
        ",
    );
    assert_eq!(out, "global\nglobal\n");
}

#[test]
fn return_unwinds_through_loops_and_blocks() {
    let out = run_ok(
        "
        fun find() {
            var i = 0;
            while (true) {
                { if (i == 3) return i; }
                i = i + 1;
            }
        }
        print find();
        fun nothing() { return; }
        print nothing();
        fun implicit() {}
        print implicit();
        ",
    );
    assert_eq!(out, "3\nnil\nnil\n");
}

#[test]
fn arity_mismatch_cites_both_counts() {
    let err = run_runtime_error("fun f(a, b) {}\nf(1);");
    assert_eq!(err, "Expected 2 arguments but got 1.\n[line 2]");
}

#[test]
fn calling_a_non_callable_fails() {
    let err = run_runtime_error("\"x\"();");
    assert_eq!(err, "Can only call functions and classes.\n[line 1]");
}

#[test]
fn callee_then_arguments_evaluate_left_to_right() {
    let out = run_ok(
        "
        fun p(x) { print x; return x; }
        fun f(a, b) {}
        f(p(1), p(2));
        fun callee() { print \"callee\"; return f; }
        callee()(p(3), p(4));
        ",
    );
    assert_eq!(out, "1\n2\ncallee\n3\n4\n");
}

#[test]
fn unbounded_recursion_is_a_runtime_error() {
    let (outcome, out, errors) = run_deep("fun f() { f(); }\nf();\nprint \"unreachable\";");
    assert_eq!(outcome, Outcome::RuntimeError);
    assert_eq!(out, "");
    assert_eq!(errors, vec!["Stack overflow.\n[line 1]"]);
}

#[test]
fn deep_but_bounded_recursion_completes() {
    let (outcome, out, errors) = run_deep(
        "
        fun f(n) { if (n == 0) return 0; return f(n - 1) + 1; }
        print f(900);
        ",
    );
    assert_eq!(outcome, Outcome::Ok, "errors: {:?}", errors);
    assert_eq!(out, "900\n");
}

#[test]
fn session_recovers_after_stack_overflow() {
    let (first, second, out) = thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let mut session = Session::new();
            let first = session.run(
                "fun f(n) { if (n == 0) return 0; return f(n - 1) + 1; } print f(3000);",
            );
            let second = session.run("print f(10);");
            (first, second, session.output())
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(first, Outcome::RuntimeError);
    assert_eq!(second, Outcome::Ok);
    assert_eq!(out, "10\n");
}

// ─────────────────────────────── classes ───────────────────────────────

#[test]
fn initializer_and_method() {
    let out = run_ok(
        "
        class C { init(x) { this.x = x; } get() { return this.x; } }
        print C(5).get();
        ",
    );
    assert_eq!(out, "5\n");
}

#[test]
fn constructor_arity_is_checked() {
    let err = run_runtime_error("class C { init(x) { this.x = x; } }\nC();");
    assert_eq!(err, "Expected 1 arguments but got 0.\n[line 2]");

    let err = run_runtime_error("class Empty {}\nEmpty(1);");
    assert_eq!(err, "Expected 0 arguments but got 1.\n[line 2]");
}

#[test]
fn initializer_returns_the_instance() {
    let out = run_ok(
        "
        class C { init(x) { this.x = x; return; } }
        var c = C(1);
        print c.init(2) == c;
        print c.x;
        ",
    );
    assert_eq!(out, "true\n2\n");
}

#[test]
fn bound_methods_remember_this() {
    let out = run_ok(
        "
        class P { init(n) { this.n = n; } say() { return this.n; } }
        var m = P(\"x\").say;
        print m();
        ",
    );
    assert_eq!(out, "x\n");
}

#[test]
fn fields_shadow_methods() {
    let out = run_ok(
        "
        class A { m() { return 1; } }
        var a = A();
        print a.m();
        a.m = 2;
        print a.m;
        ",
    );
    assert_eq!(out, "1\n2\n");
}

#[test]
fn unknown_property_is_a_runtime_error() {
    let err = run_runtime_error("class A {}\nprint A().nope;");
    assert_eq!(err, "Undefined property 'nope'.\n[line 2]");
}

#[test]
fn properties_need_instances() {
    let err = run_runtime_error("var x = 1; print x.y;");
    assert_eq!(err, "Only instances have properties.\n[line 1]");

    let err = run_runtime_error("var x = 1; x.y = 2;");
    assert_eq!(err, "Only instances have fields.\n[line 1]");
}

#[test]
fn methods_see_class_scope_closures() {
    let out = run_ok(
        "
        fun outer() {
            var greeting = \"hi\";
            class G { greet(name) { return greeting + \" \" + name; } }
            return G();
        }
        print outer().greet(\"bob\");
        ",
    );
    assert_eq!(out, "hi bob\n");
}

// ─────────────────────────── error gating ───────────────────────────

#[test]
fn syntax_error_skips_execution() {
    let (outcome, out, errors) = run("print 1;\nprint ;");
    assert_eq!(outcome, Outcome::StaticError);
    assert_eq!(out, "");
    assert_eq!(errors, vec!["[line 2] Error at ';': Expect expression."]);
}

#[test]
fn lexical_error_skips_execution() {
    let (outcome, out, errors) = run("print 1; @");
    assert_eq!(outcome, Outcome::StaticError);
    assert_eq!(out, "");
    assert_eq!(errors, vec!["[line 1] Error: Unexpected character: @"]);
}

#[test]
fn resolve_error_skips_execution() {
    let (outcome, out, errors) = run("print 1;\n{ var a = a; }");
    assert_eq!(outcome, Outcome::StaticError);
    assert_eq!(out, "");
    assert_eq!(
        errors,
        vec!["[line 2] Error at 'a': Can't read local variable in its own initializer."]
    );
}

#[test]
fn runtime_error_stops_the_run_after_earlier_output() {
    let (outcome, out, errors) = run("print 1; print nope; print 2;");
    assert_eq!(outcome, Outcome::RuntimeError);
    assert_eq!(out, "1\n");
    assert_eq!(errors, vec!["Undefined variable 'nope'.\n[line 1]"]);
}

// ───────────────────────────── REPL use ─────────────────────────────

#[test]
fn globals_survive_between_runs_and_errors() {
    let mut session = Session::new();

    assert_eq!(session.run("var a = 1;"), Outcome::Ok);
    assert_eq!(session.run("var x = 10; { var x = 2; print y; }"), Outcome::RuntimeError);
    assert_eq!(session.run("print a; print x;"), Outcome::Ok);
    assert_eq!(session.run("print ;"), Outcome::StaticError);
    assert_eq!(session.run("a = a + 1; print a;"), Outcome::Ok);

    assert_eq!(session.output(), "1\n10\n2\n");
    assert_eq!(session.errors().len(), 2);
    assert_eq!(session.lox.interpreter().get_global("a"), Some(Value::Number(2.0)));
}

#[test]
fn functions_defined_on_earlier_lines_stay_callable() {
    let mut session = Session::new();

    session.run("fun add(a, b) { return a + b; }");
    session.run("var total = add(2, 3);");

    assert_eq!(
        session.lox.interpreter().get_global("total"),
        Some(Value::Number(5.0))
    );
}
