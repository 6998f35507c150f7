use crate::asm::encode::{decode, encode};
use crate::asm::machine::Machine;
use crate::driver::{CompileError, compile_file, compile_source};
use crate::load_binary;
use crate::parser::ParseError;
use crate::parser::file_cache::FileCache;
use crate::tac::error::report_errors;
use std::path::Path;

fn run(source: &str, input: &[i64]) -> Vec<i64> {
    let _ = env_logger::builder().is_test(true).try_init();

    let compilation = compile_source(Path::new("test.imp"), source).unwrap();
    Machine::default()
        .run(&compilation.asm, input)
        .unwrap()
        .output
}

fn floor_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }

    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    if b == 0 { 0 } else { a - b * floor_div(a, b) }
}

#[test]
fn if_with_equal_literals() {
    assert_eq!(
        run("PROGRAM IS BEGIN IF 17 = 17 THEN WRITE 1; ENDIF END", &[]),
        vec![1]
    );
}

#[test]
fn while_counts_to_ten() {
    let source = "PROGRAM IS i BEGIN i := 1; WHILE i <= 10 DO WRITE i; i := i + 1; ENDWHILE END";

    assert_eq!(run(source, &[]), (1..=10).collect::<Vec<_>>());
}

#[test]
fn for_counts_down() {
    let source = "PROGRAM IS BEGIN FOR i FROM 10 DOWNTO 5 DO WRITE i; ENDFOR END";

    assert_eq!(run(source, &[]), vec![10, 9, 8, 7, 6, 5]);
}

#[test]
fn arguments_are_references() {
    let source = "PROCEDURE add(x, y, z) IS BEGIN z := x + y; END
                  PROGRAM IS x, y, z BEGIN x := 15; y := 17; add(x, y, z); WRITE z; END";

    assert_eq!(run(source, &[]), vec![32]);
}

#[test]
fn division_rounds_down() {
    assert_eq!(
        run("PROGRAM IS x BEGIN x := 10 / -2; WRITE x; END", &[]),
        vec![-5]
    );
}

#[test]
fn conditions_for_every_operator() {
    let source = "PROGRAM IS a, b BEGIN
        READ a;
        READ b;
        IF a = b THEN WRITE 1; ELSE WRITE 0; ENDIF
        IF a != b THEN WRITE 1; ELSE WRITE 0; ENDIF
        IF a < b THEN WRITE 1; ELSE WRITE 0; ENDIF
        IF a <= b THEN WRITE 1; ELSE WRITE 0; ENDIF
        IF a > b THEN WRITE 1; ELSE WRITE 0; ENDIF
        IF a >= b THEN WRITE 1; ELSE WRITE 0; ENDIF
    END";

    for (a, b) in [(3, 5), (5, 5), (5, 3), (-4, 2), (0, -1)] {
        let expected = vec![
            (a == b) as i64,
            (a != b) as i64,
            (a < b) as i64,
            (a <= b) as i64,
            (a > b) as i64,
            (a >= b) as i64,
        ];

        assert_eq!(run(source, &[a, b]), expected, "{a} {b}");
    }
}

#[test]
fn conditions_against_negative_literals() {
    let source = "PROGRAM IS a BEGIN
        READ a;
        IF a > -3 THEN WRITE 1; ENDIF
        IF -3 >= a THEN WRITE 2; ENDIF
    END";

    assert_eq!(run(source, &[-2]), vec![1]);
    assert_eq!(run(source, &[-3]), vec![2]);
    assert_eq!(run(source, &[-9]), vec![2]);
}

#[test]
fn repeat_runs_until_the_condition_holds() {
    let source = "PROGRAM IS i BEGIN
        i := 1;
        REPEAT
            WRITE i;
            i := i + 1;
        UNTIL i > 10;
    END";

    assert_eq!(run(source, &[]), (1..=10).collect::<Vec<_>>());

    // The body always runs once.
    let source = "PROGRAM IS i BEGIN i := 50; REPEAT WRITE i; UNTIL i > 10; END";
    assert_eq!(run(source, &[]), vec![50]);
}

#[test]
fn for_reads_its_bounds() {
    let source = "PROGRAM IS a, b BEGIN
        READ a;
        READ b;
        FOR i FROM a TO b DO WRITE i; ENDFOR
    END";

    assert_eq!(run(source, &[5, 10]), vec![5, 6, 7, 8, 9, 10]);
    assert_eq!(run(source, &[3, 1]), Vec::<i64>::new());
}

#[test]
fn nested_for_loops() {
    let source = "PROGRAM IS BEGIN
        FOR i FROM 1 TO 3 DO
            FOR j FROM 1 TO i DO
                WRITE j;
            ENDFOR
        ENDFOR
        # The iterator is still there after the loop.
        WRITE i;
    END";

    assert_eq!(run(source, &[]), vec![1, 1, 2, 1, 2, 3, 4]);
}

#[test]
fn reads_into_arrays_with_negative_bounds() {
    let source = "PROGRAM IS t[-5:5], n BEGIN
        READ t[-2];
        READ n;
        READ t[n];
        WRITE t[-2];
        WRITE t[n];
        t[-5] := t[-2] + t[n];
        WRITE t[-5];
        n := -5;
        WRITE t[n];
    END";

    assert_eq!(run(source, &[7, 4, 9]), vec![7, 9, 16, 16]);
}

#[test]
fn fills_an_array_in_a_loop() {
    let source = "PROGRAM IS t[-3:3], i BEGIN
        FOR j FROM -3 TO 3 DO
            t[j] := j * j;
        ENDFOR
        i := 3;
        WHILE i >= -3 DO
            WRITE t[i];
            i := i - 1;
        ENDWHILE
    END";

    assert_eq!(run(source, &[]), vec![9, 4, 1, 0, 1, 4, 9]);
}

#[test]
fn arrays_far_from_zero() {
    let source = "PROGRAM IS t[100:102], i BEGIN
        t[100] := 1;
        i := 102;
        t[i] := 3;
        WRITE t[100];
        WRITE t[i];
        WRITE t[101];
    END";

    assert_eq!(run(source, &[]), vec![1, 3, 0]);
}

#[test]
fn arithmetic_over_every_sign() {
    let source = "PROGRAM IS a, b, r BEGIN
        READ a;
        READ b;
        r := a + b; WRITE r;
        r := a - b; WRITE r;
        r := a * b; WRITE r;
        r := a / b; WRITE r;
        r := a % b; WRITE r;
    END";

    let cases: [(i64, i64); 9] = [
        (17, 5),
        (-17, 5),
        (17, -5),
        (-17, -5),
        (548, -2901),
        (-20, 4),
        (0, -3),
        (6, 0),
        (1, 1),
    ];

    for (a, b) in cases {
        let expected = vec![a + b, a - b, a * b, floor_div(a, b), floor_mod(a, b)];

        assert_eq!(run(source, &[a, b]), expected, "{a} {b}");
    }
}

#[test]
fn arithmetic_with_literals() {
    let source = "PROGRAM IS a, r BEGIN
        READ a;
        r := a * -3; WRITE r;
        r := 5 - a; WRITE r;
        r := 100 / a; WRITE r;
        r := a % 4; WRITE r;
        r := 548 % -2901; WRITE r;
    END";

    assert_eq!(run(source, &[7]), vec![-21, -2, 14, 3, -2353]);
    assert_eq!(run(source, &[-7]), vec![21, 12, -15, 1, -2353]);
}

#[test]
fn procedures_take_arrays() {
    let source = "PROCEDURE add(T a, T b, T c) IS BEGIN
            c[0] := a[0] + b[0];
            c[1] := a[1] + b[1];
        END
        PROGRAM IS x[0:1], y[0:1], z[0:1] BEGIN
            x[0] := 1;
            x[1] := 2;
            y[0] := 10;
            y[1] := 20;
            add(x, y, z);
            WRITE z[0];
            WRITE z[1];
        END";

    assert_eq!(run(source, &[]), vec![11, 22]);
}

#[test]
fn procedures_pass_arguments_through() {
    let source = "PROCEDURE set(T t, i, v) IS BEGIN
            t[i] := v;
        END
        PROCEDURE fill(T t, n) IS k BEGIN
            FOR i FROM 1 TO n DO
                k := i * 10;
                set(t, i, k);
            ENDFOR
        END
        PROGRAM IS a[1:4], n BEGIN
            n := 3;
            fill(a, n);
            WRITE a[1];
            WRITE a[2];
            WRITE a[3];
            WRITE a[4];
        END";

    assert_eq!(run(source, &[]), vec![10, 20, 30, 0]);
}

#[test]
fn procedures_return_to_each_caller() {
    let source = "PROCEDURE double(x) IS BEGIN x := x + x; END
        PROCEDURE quad(y) IS BEGIN double(y); double(y); END
        PROGRAM IS a BEGIN
            READ a;
            quad(a);
            WRITE a;
            quad(a);
            WRITE a;
        END";

    assert_eq!(run(source, &[5]), vec![20, 80]);
}

#[test]
fn procedures_read_into_arguments() {
    let source = "PROCEDURE get(x, T t) IS BEGIN
            READ x;
            READ t[x];
        END
        PROGRAM IS n, t[0:9] BEGIN
            get(n, t);
            WRITE n;
            WRITE t[n];
        END";

    assert_eq!(run(source, &[4, 77]), vec![4, 77]);
}

#[test]
fn binary_output_runs_the_same() {
    let source = "PROGRAM IS a, b BEGIN READ a; b := a * a; WRITE b; END";
    let compilation = compile_source(Path::new("test.imp"), source).unwrap();

    let decoded = decode(&encode(&compilation.asm).unwrap()).unwrap();
    assert_eq!(decoded, compilation.asm);
    assert_eq!(
        Machine::default().run(&decoded, &[12]).unwrap().output,
        vec![144]
    );
}

#[test]
fn loads_binary_files() {
    let source = "PROGRAM IS a BEGIN READ a; WRITE a; END";
    let compilation = compile_source(Path::new("test.imp"), source).unwrap();

    let path = std::env::temp_dir().join(format!("impc-{}.bin", std::process::id()));
    std::fs::write(&path, encode(&compilation.asm).unwrap()).unwrap();
    let loaded = load_binary(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.unwrap(), compilation.asm);
}

#[test]
fn rejects_binary_files_with_unknown_opcodes() {
    let path = std::env::temp_dir().join(format!("impc-bad-{}.bin", std::process::id()));
    std::fs::write(&path, [0xff]).unwrap();
    let loaded = load_binary(&path);
    std::fs::remove_file(&path).unwrap();

    assert!(loaded.is_err());
}

#[test]
fn graph_has_a_part_per_procedure() {
    let source = "PROCEDURE p(x) IS BEGIN x := 1; END
        PROCEDURE q(x) IS BEGIN p(x); END
        PROGRAM IS a BEGIN q(a); WRITE a; END";
    let compilation = compile_source(Path::new("test.imp"), source).unwrap();

    let graph = compilation.graph();
    let names: Vec<_> = graph.procedures.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["p", "q"]);
    assert!(graph.to_string().starts_with("procedure p:\n"));
}

#[test]
fn compiles_cached_files() {
    let cache = FileCache::default();
    let path = Path::new("cached.imp");
    cache.insert(path, "PROGRAM IS x BEGIN READ x; WRITE x; END".to_string());

    let compilation = compile_file(path, &cache).unwrap();
    assert_eq!(
        Machine::default().run(&compilation.asm, &[3]).unwrap().output,
        vec![3]
    );
}

#[test]
fn reports_every_error_together() {
    let cache = FileCache::default();
    let path = Path::new("bad.imp");
    let source = cache.insert(
        path,
        "PROGRAM IS x BEGIN y := 1; WRITE z; x[2] := 1; END".to_string(),
    );

    let Err(CompileError::Generate(errors)) = compile_source(path, source) else {
        panic!("expected generation errors");
    };

    assert_eq!(errors.len(), 3);
    assert!(report_errors(&errors, &cache).is_ok());
}

#[test]
fn reports_syntax_errors() {
    let result = compile_source(Path::new("test.imp"), "PROGRAM IS BEGIN END");

    assert!(matches!(
        result,
        Err(CompileError::Parse(ParseError::Syntax(_)))
    ));
}
