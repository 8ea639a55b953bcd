//! Parses each scenario's surface source through `myia-parser` and runs it
//! on the VM, exercising the front end and the evaluator together.

use myia_core::{GraphManager, MapResolver, NamespaceValue, Primitive};
use myia_vm::{Value, Vm};

fn operator_resolver() -> MapResolver {
    use Primitive::*;
    [Add, Sub, Gt]
        .into_iter()
        .filter_map(|p| p.operator_symbol().map(|sym| (sym, p)))
        .fold(MapResolver::new(), |r, (sym, p)| r.with(sym, NamespaceValue::Primitive(p)))
}

#[test]
fn straight_line_addition() {
    let src = "def f(x, y):\n    return x + y\n";
    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let result = vm.evaluate(g, vec![Value::Int(2), Value::Int(3)], None).unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn branch_on_sign() {
    let src = "def f(x):\n    if x > 0:\n        return x\n    else:\n        return -x\n";
    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let result = vm.evaluate(g, vec![Value::Int(-7)], None).unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn loop_accumulates_sum() {
    let src = "def f(n):\n    s = 0\n    i = 0\n    while i < n:\n        s = s + i\n        i = i + 1\n    return s\n";
    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let result = vm.evaluate(g, vec![Value::Int(5)], None).unwrap();
    assert_eq!(result, Value::Int(10));
}

#[test]
fn closure_over_enclosing_parameter() {
    let src = "def outer(x):\n    def inner(y):\n        return x + y\n    return inner\n";
    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let closure = vm.evaluate(g, vec![Value::Int(10)], None).unwrap();
    assert!(matches!(closure, Value::Closure(_)));
    let result = vm.call(closure, vec![Value::Int(3)]).unwrap();
    assert_eq!(result, Value::Int(13));
}

#[test]
fn tuple_destructuring_assignment() {
    let src = "def f(p):\n    a, b = p\n    return a - b\n";
    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let result = vm.evaluate(g, vec![Value::Tuple(vec![Value::Int(9), Value::Int(4)])], None).unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn deeply_tail_recursive_sum_does_not_grow_the_stack() {
    let src = "def f(n, acc):\n    if n == 0:\n        return acc\n    else:\n        return f(n - 1, acc + n)\n";
    let mut core = GraphManager::new();
    let resolver = {
        use Primitive::*;
        [Sub, Add, Eq]
            .into_iter()
            .filter_map(|p| p.operator_symbol().map(|sym| (sym, p)))
            .fold(MapResolver::new(), |r, (sym, p)| r.with(sym, NamespaceValue::Primitive(p)))
    };
    let g = myia_parser::parse_one(src, &mut core, &resolver).unwrap();

    let mut vm = Vm::new(&core, &resolver);
    let result = vm.evaluate(g, vec![Value::Int(100_000), Value::Int(0)], None).unwrap();
    assert_eq!(result, Value::Int(100_000 * 100_001 / 2));
}
