#[cfg(test)]
mod parser_tests {
    use rox::ast::Stmt;
    use rox::ast_printer::AstPrinter;
    use rox::error::LoxError;
    use rox::parser::Parser;
    use rox::scanner::scan_tokens;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<String>) {
        let mut errors: Vec<String> = Vec::new();
        let mut sink = |e: &LoxError| errors.push(e.to_string());

        let tokens = scan_tokens(source, &mut sink);
        let statements = Parser::new(&tokens, &mut sink).parse();

        (statements, errors)
    }

    fn print_all(statements: &[Stmt]) -> Vec<String> {
        statements.iter().map(AstPrinter::print_stmt).collect()
    }

    const PROGRAM: &str = r#"
        var greeting = "hi";
        fun add(a, b) { return a + b; }
        class Point {
            init(x, y) { this.x = x; this.y = y; }
            sum() { return add(this.x, this.y); }
        }
        for (var i = 0; i < 2; i = i + 1) {
            if (i == 0 and greeting != nil) print Point(i, 2).sum(); else print -i;
        }
        while (false) {}
    "#;

    #[test]
    fn test_reparsing_prints_identically() {
        let (first, first_errors) = parse(PROGRAM);
        let (second, second_errors) = parse(PROGRAM);

        assert!(first_errors.is_empty(), "{:?}", first_errors);
        assert!(second_errors.is_empty(), "{:?}", second_errors);
        assert_eq!(first.len(), 5);
        assert_eq!(print_all(&first), print_all(&second));
    }

    #[test]
    fn test_function_and_class_forms() {
        let (statements, errors) = parse(PROGRAM);
        assert!(errors.is_empty());

        let printed = print_all(&statements);

        assert_eq!(printed[0], "(var greeting hi)");
        assert_eq!(printed[1], "(fun add (a b) (return (+ a b)))");
        assert_eq!(
            printed[2],
            "(class Point \
             (method init (x y) (; (= (. this x) x)) (; (= (. this y) y))) \
             (method sum () (return (call add (. this x) (. this y)))))"
        );
        assert_eq!(printed[4], "(while false (block))");
    }

    #[test]
    fn test_for_loop_prints_as_desugared_while() {
        let (statements, errors) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errors.is_empty());

        assert_eq!(
            print_all(&statements),
            vec!["(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"]
        );
    }

    #[test]
    fn test_errors_in_several_declarations_are_all_reported() {
        let (statements, errors) = parse("var = 1;\nprint 2;\nfun (a) {}\nprint 3;");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 3] Error at '(': Expect function name.",
            ]
        );
        assert_eq!(print_all(&statements), vec!["(print 2.0)", "(print 3.0)"]);
    }
}
