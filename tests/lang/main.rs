use tuga::{
    ast::{BinOp, Block, Decl, Expr, Function, Literal, Param, Program, Stmt},
    codegen, semantic,
    semantic::Type,
    vm::Vm,
    CaptureOutput, Loc,
};

fn loc(line: usize) -> Loc {
    Loc::new(line)
}

fn int(line: usize, value: i32) -> Expr {
    Expr::Literal(loc(line), Literal::Int(value))
}

fn real(line: usize, value: f64) -> Expr {
    Expr::Literal(loc(line), Literal::Real(value))
}

fn text(line: usize, value: &str) -> Expr {
    Expr::Literal(loc(line), Literal::Str(value.to_string()))
}

fn boolean(line: usize, value: bool) -> Expr {
    Expr::Literal(loc(line), Literal::Bool(value))
}

fn var(line: usize, name: &str) -> Expr {
    Expr::Var(loc(line), name.to_string())
}

fn binary(line: usize, op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(loc(line), op, Box::new(left), Box::new(right))
}

fn call(line: usize, name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(loc(line), name.to_string(), args)
}

fn write(line: usize, expr: Expr) -> Stmt {
    Stmt::Write(loc(line), expr)
}

fn assign(line: usize, name: &str, value: Expr) -> Stmt {
    Stmt::Assign(loc(line), name.to_string(), value)
}

fn ret(line: usize, value: Expr) -> Stmt {
    Stmt::Return(loc(line), Some(value))
}

fn decl(line: usize, ty: Type, names: &[&str]) -> Decl {
    Decl {
        loc: loc(line),
        ty,
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

fn block(line: usize, decls: Vec<Decl>, stmts: Vec<Stmt>) -> Block {
    Block { loc: loc(line), decls, stmts }
}

fn function(line: usize, name: &str, params: Vec<(&str, Type)>, ret: Option<Type>, body: Block) -> Function {
    Function {
        loc: loc(line),
        name: name.to_string(),
        params: params
            .into_iter()
            .map(|(name, ty)| Param { loc: loc(line), name: name.to_string(), ty })
            .collect(),
        ret,
        body,
    }
}

fn principal(decls: Vec<Decl>, stmts: Vec<Stmt>) -> Function {
    function(1, "principal", vec![], None, block(1, decls, stmts))
}

fn program(globals: Vec<Decl>, functions: Vec<Function>) -> Program {
    Program { globals, functions, end: loc(99) }
}

/// Checks, compiles and executes a program, returning everything it printed.
fn run(program: &Program) -> String {
    let (mut table, diagnostics) = semantic::check(program);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);

    let compiled = codegen::generate(program, &mut table).expect("generates");

    let output = Box::new(CaptureOutput::default());
    Vm::default()
        .with_output(output.clone())
        .run(&compiled)
        .expect("no runtime errors");

    output.to_string().trim().to_string()
}

fn diagnostics(program: &Program) -> Vec<String> {
    let (_, diagnostics) = semantic::check(program);
    diagnostics.iter().map(|d| d.to_string()).collect()
}

#[test]
fn arithmetic_precedence() {
    let program = program(
        vec![],
        vec![principal(
            vec![],
            vec![write(
                2,
                binary(2, BinOp::Add, int(2, 2), binary(2, BinOp::Mul, int(2, 3), int(2, 4))),
            )],
        )],
    );

    assert_eq!(run(&program), "14");
}

#[test]
fn concatenation_converts_the_number() {
    let program = program(
        vec![],
        vec![principal(
            vec![],
            vec![write(2, binary(2, BinOp::Add, text(2, "n="), int(2, 5)))],
        )],
    );

    assert_eq!(run(&program), "n=5");
}

#[test]
fn division_follows_operand_types() {
    let program = program(
        vec![],
        vec![principal(
            vec![],
            vec![
                write(2, binary(2, BinOp::Div, int(2, 7), int(2, 2))),
                write(3, binary(3, BinOp::Div, real(3, 7.0), int(3, 2))),
            ],
        )],
    );

    assert_eq!(run(&program), "3\n3.5");
}

#[test]
fn whole_reals_print_with_a_decimal() {
    let program = program(
        vec![decl(1, Type::Real, &["x"])],
        vec![principal(
            vec![],
            vec![assign(2, "x", int(2, 5)), write(3, var(3, "x"))],
        )],
    );

    assert_eq!(run(&program), "5.0");
}

#[test]
fn logical_operators_evaluate_both_sides() {
    // `lado` prints before returning, so its output proves the right-hand
    // operand ran even though the left-hand `falso` already decides `e`.
    let lado = function(
        1,
        "lado",
        vec![],
        Some(Type::Boolean),
        block(
            1,
            vec![],
            vec![write(2, text(2, "avaliado")), ret(3, boolean(3, true))],
        ),
    );
    let program = program(
        vec![],
        vec![lado, principal(
            vec![],
            vec![write(6, binary(6, BinOp::And, boolean(6, false), call(6, "lado", vec![])))],
        )],
    );

    assert_eq!(run(&program), "avaliado\nfalso");
}

#[test]
fn while_loop_accumulates() {
    // soma <- 0; i <- 1; enquanto (i <= 5) { soma <- soma + i; i <- i + 1; }
    let program = program(
        vec![decl(1, Type::Integer, &["soma", "i"])],
        vec![principal(
            vec![],
            vec![
                assign(2, "soma", int(2, 0)),
                assign(3, "i", int(3, 1)),
                Stmt::While(
                    loc(4),
                    binary(4, BinOp::Le, var(4, "i"), int(4, 5)),
                    Box::new(Stmt::Block(block(
                        4,
                        vec![],
                        vec![
                            assign(5, "soma", binary(5, BinOp::Add, var(5, "soma"), var(5, "i"))),
                            assign(6, "i", binary(6, BinOp::Add, var(6, "i"), int(6, 1))),
                        ],
                    ))),
                ),
                write(8, var(8, "soma")),
            ],
        )],
    );

    assert_eq!(run(&program), "15");
}

#[test]
fn block_shadowing() {
    let program = program(
        vec![decl(1, Type::Integer, &["x"])],
        vec![principal(
            vec![],
            vec![
                assign(2, "x", int(2, 1)),
                Stmt::Block(block(
                    3,
                    vec![decl(4, Type::String, &["x"])],
                    vec![assign(5, "x", text(5, "interior")), write(6, var(6, "x"))],
                )),
                write(8, var(8, "x")),
            ],
        )],
    );

    assert_eq!(run(&program), "interior\n1");
}

#[test]
fn recursion_unwinds_each_frame() {
    // fatorial(n) = n < 2 ? 1 : n * fatorial(n - 1)
    let fatorial = function(
        1,
        "fatorial",
        vec![("n", Type::Integer)],
        Some(Type::Integer),
        block(
            1,
            vec![],
            vec![Stmt::If(
                loc(2),
                binary(2, BinOp::Lt, var(2, "n"), int(2, 2)),
                Box::new(ret(2, int(2, 1))),
                Some(Box::new(ret(
                    3,
                    binary(
                        3,
                        BinOp::Mul,
                        var(3, "n"),
                        call(3, "fatorial", vec![binary(3, BinOp::Sub, var(3, "n"), int(3, 1))]),
                    ),
                ))),
            )],
        ),
    );
    let program = program(
        vec![],
        vec![fatorial, principal(vec![], vec![write(6, call(6, "fatorial", vec![int(6, 5)]))])],
    );

    assert_eq!(run(&program), "120");
}

#[test]
fn mutual_recursion_resolves_forward() {
    // `par` is declared before `impar` yet calls it, exercising call
    // backpatching in both directions.
    let par = function(
        1,
        "par",
        vec![("n", Type::Integer)],
        Some(Type::Boolean),
        block(
            1,
            vec![],
            vec![Stmt::If(
                loc(2),
                binary(2, BinOp::Eq, var(2, "n"), int(2, 0)),
                Box::new(ret(2, boolean(2, true))),
                Some(Box::new(ret(
                    3,
                    call(3, "impar", vec![binary(3, BinOp::Sub, var(3, "n"), int(3, 1))]),
                ))),
            )],
        ),
    );
    let impar = function(
        5,
        "impar",
        vec![("n", Type::Integer)],
        Some(Type::Boolean),
        block(
            5,
            vec![],
            vec![Stmt::If(
                loc(6),
                binary(6, BinOp::Eq, var(6, "n"), int(6, 0)),
                Box::new(ret(6, boolean(6, false))),
                Some(Box::new(ret(
                    7,
                    call(7, "par", vec![binary(7, BinOp::Sub, var(7, "n"), int(7, 1))]),
                ))),
            )],
        ),
    );
    let program = program(
        vec![],
        vec![par, impar, principal(
            vec![],
            vec![
                write(10, call(10, "par", vec![int(10, 5)])),
                write(11, call(11, "impar", vec![int(11, 5)])),
            ],
        )],
    );

    assert_eq!(run(&program), "falso\nverdadeiro");
}

#[test]
fn void_function_statements() {
    let saudacao = function(
        1,
        "saudacao",
        vec![("nome", Type::String)],
        None,
        block(
            1,
            vec![],
            vec![write(2, binary(2, BinOp::Add, text(2, "ola, "), var(2, "nome")))],
        ),
    );
    let program = program(
        vec![],
        vec![saudacao, principal(
            vec![],
            vec![Stmt::Call(loc(5), "saudacao".to_string(), vec![text(5, "mundo")])],
        )],
    );

    assert_eq!(run(&program), "ola, mundo");
}

#[test]
fn guard_return_falls_through_to_the_rest_of_the_body() {
    // The guard only returns when its condition holds, so the statement
    // after it still runs.
    let talvez = function(
        1,
        "talvez",
        vec![],
        None,
        block(
            1,
            vec![],
            vec![
                Stmt::If(
                    loc(2),
                    boolean(2, false),
                    Box::new(Stmt::Return(loc(2), None)),
                    None,
                ),
                write(3, text(3, "depois")),
            ],
        ),
    );
    let program = program(
        vec![],
        vec![talvez, principal(
            vec![],
            vec![Stmt::Call(loc(6), "talvez".to_string(), vec![])],
        )],
    );

    assert_eq!(run(&program), "depois");
}

#[test]
fn later_returns_stay_reachable_after_a_guard() {
    let escolhe = function(
        1,
        "escolhe",
        vec![],
        Some(Type::Integer),
        block(
            1,
            vec![],
            vec![
                Stmt::If(loc(2), boolean(2, false), Box::new(ret(2, int(2, 1))), None),
                ret(3, int(3, 2)),
            ],
        ),
    );
    let program = program(
        vec![],
        vec![escolhe, principal(
            vec![],
            vec![write(6, call(6, "escolhe", vec![]))],
        )],
    );

    assert_eq!(run(&program), "2");
}

#[test]
fn uninitialized_global_read_is_fatal() {
    let program = program(
        vec![decl(1, Type::Integer, &["x"])],
        vec![principal(vec![], vec![write(2, var(2, "x"))])],
    );

    let (mut table, diagnostics) = semantic::check(&program);
    assert!(diagnostics.is_empty());

    let compiled = codegen::generate(&program, &mut table).expect("generates");

    let output = Box::new(CaptureOutput::default());
    Vm::default()
        .with_output(output.clone())
        .run(&compiled)
        .expect_err("reading an unassigned variable fails");
}

#[test]
fn diagnostics_come_out_sorted() {
    let program = program(
        vec![decl(1, Type::Integer, &["x"])],
        vec![principal(
            vec![],
            vec![
                assign(5, "y", int(5, 1)),
                assign(3, "x", boolean(3, true)),
            ],
        )],
    );

    assert_eq!(
        diagnostics(&program),
        vec![
            "erro na linha 3: operador '<-' eh invalido entre inteiro e booleano",
            "erro na linha 5: 'y' nao foi declarado",
        ]
    );
}

#[test]
fn missing_return_is_reported() {
    let quase = function(
        2,
        "quase",
        vec![],
        Some(Type::Integer),
        block(2, vec![], vec![write(3, int(3, 1))]),
    );
    let program = program(vec![], vec![quase, principal(vec![], vec![])]);

    assert_eq!(
        diagnostics(&program),
        vec!["erro na linha 2: funcao 'quase' deve retornar um valor do tipo inteiro"]
    );
}

#[test]
fn serialized_programs_run_identically() {
    let source = program(
        vec![decl(1, Type::Real, &["x"])],
        vec![principal(
            vec![],
            vec![
                assign(2, "x", real(2, 2.5)),
                write(3, binary(3, BinOp::Add, text(3, "x="), var(3, "x"))),
            ],
        )],
    );

    let (mut table, diagnostics) = semantic::check(&source);
    assert!(diagnostics.is_empty());
    let compiled = codegen::generate(&source, &mut table).expect("generates");

    let path = std::env::temp_dir().join(format!("tuga-lang-suite-{}.bc", std::process::id()));
    compiled.save(&path).expect("saves");
    let restored = tuga::vm::Program::load(&path).expect("loads");
    let _ = std::fs::remove_file(&path);

    assert_eq!(restored, compiled);

    let output = Box::new(CaptureOutput::default());
    Vm::default()
        .with_output(output.clone())
        .run(&restored)
        .expect("no runtime errors");
    assert_eq!(output.to_string().trim(), "x=2.5");
}
