//! The frame-based tree-walking evaluator.

use crate::error::VMError;
use crate::frame::Frame;
use crate::value::{Closure, Partial, Value};
use myia_core::graph_utils::Inclusion;
use myia_core::{ANFNodeData, ConstValue, GraphId, GraphManager, NamespaceValue, NodeId, Primitive, Resolver};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub(crate) fn const_to_value(v: &ConstValue) -> Value {
    match v {
        ConstValue::Int(i) => Value::Int(*i),
        ConstValue::Float(f) => Value::Float(*f),
        ConstValue::Bool(b) => Value::Bool(*b),
        ConstValue::Str(s) => Value::Str(s.clone()),
        ConstValue::None_ => Value::None_,
        ConstValue::EmptyTuple => Value::Tuple(Vec::new()),
        ConstValue::Graph(g) => Value::Graph(*g),
        ConstValue::Primitive(p) => Value::Primitive(*p),
        ConstValue::Namespace(ns) => Value::Namespace(ns.clone()),
    }
}

fn namespace_value_to_value(v: NamespaceValue) -> Value {
    match v {
        NamespaceValue::Primitive(p) => Value::Primitive(p),
        NamespaceValue::Int(i) => Value::Int(i),
        NamespaceValue::Float(f) => Value::Float(f),
        NamespaceValue::Bool(b) => Value::Bool(b),
        NamespaceValue::Str(s) => Value::Str(s),
    }
}

/// What happened while processing one node, re-expressing the source's
/// call/return control-transfer exceptions as an explicit result instead of
/// unwinding.
enum Step {
    Continue,
    EnterFrame(Frame),
    Return(Value),
}

/// A frame-based evaluator for ANF graphs.
///
/// Mirrors `myia.vm.VM`: an explicit frame stack, per-frame work list, and
/// tail-call elimination by replacing the top frame in place rather than
/// pushing. Free variables of every graph in `core` are discovered lazily on
/// first use and cached for the VM's lifetime (`vars`, grounded in
/// `VM._vars`/`_acquire_graph`).
pub struct Vm<'a> {
    core: &'a GraphManager,
    resolver: &'a dyn Resolver,
    vars: HashMap<GraphId, HashSet<NodeId>>,
}

impl<'a> Vm<'a> {
    pub fn new(core: &'a GraphManager, resolver: &'a dyn Resolver) -> Self {
        Vm {
            core,
            resolver,
            vars: HashMap::new(),
        }
    }

    fn acquire_graph(&mut self, graph: GraphId) -> Result<(), VMError> {
        if self.vars.contains_key(&graph) {
            return Ok(());
        }
        for g in self.core.graph_ids() {
            let fvs: HashSet<NodeId> = self.core.free_variables_total(g)?.into_iter().collect();
            self.vars.insert(g, fvs);
        }
        Ok(())
    }

    fn free_vars_of(&self, graph: GraphId) -> HashSet<NodeId> {
        self.vars.get(&graph).cloned().unwrap_or_default()
    }

    /// `incoming` restricted to inputs that stay within `node`'s owning
    /// graph, plus any input that is itself a graph constant (which may need
    /// rewriting to a closure before the calling frame can use it), plus,
    /// when `node` is a graph constant, that graph's free variables
    /// (acquired and cached on demand).
    fn succ_vm(&mut self, node: NodeId) -> Result<Vec<NodeId>, VMError> {
        let data = self.core.node(node)?;
        let owner = data.owner();
        let mut out = Vec::new();
        for &i in data.incoming() {
            if self.core.owner(i) == owner || self.core.is_constant_graph(i).is_some() {
                out.push(i);
            }
        }
        if let Some(g) = self.core.is_constant_graph(node) {
            self.acquire_graph(g)?;
            out.extend(self.free_vars_of(g));
        }
        Ok(out)
    }

    /// A topological ordering (dependencies first, `root` last) over
    /// `succ_vm`, implemented directly rather than through
    /// `graph_utils::toposort` because the successor function here needs
    /// mutable access to the VM's free-variable cache.
    fn work_list(&mut self, root: NodeId) -> Result<Vec<NodeId>, VMError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            OnStack,
            Done,
        }

        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> = Vec::new();

        marks.insert(root, Mark::OnStack);
        stack.push((root, self.succ_vm(root)?.into_iter()));

        while let Some((node, iter)) = stack.last_mut() {
            let node = *node;
            match iter.next() {
                Some(next) => match marks.get(&next) {
                    Some(Mark::Done) => continue,
                    Some(Mark::OnStack) => return Err(VMError::Core(myia_core::CoreError::InvalidGraph { node })),
                    None => {
                        marks.insert(next, Mark::OnStack);
                        let succs = self.succ_vm(next)?;
                        stack.push((next, succs.into_iter()));
                    }
                },
                None => {
                    marks.insert(node, Mark::Done);
                    out.push(node);
                    stack.pop();
                }
            }
        }
        Ok(out)
    }

    fn set_node_value(&self, frame: &mut Frame, node: NodeId, value: Value) {
        tracing::trace!(?node, ?value, "vm node value set");
        frame.values.insert(node, value);
    }

    /// Evaluate `graph` applied to `args`, with an optional free-variable
    /// snapshot when `graph` is being run as a closure body.
    pub fn evaluate(&mut self, graph: GraphId, args: Vec<Value>, closure: Option<HashMap<NodeId, Value>>) -> Result<Value, VMError> {
        let top = self.build_frame(graph, args, closure)?;
        let mut frames = vec![top];

        loop {
            let frame = frames.last_mut().expect("frame stack is never empty inside the loop");
            let Some(&node) = frame.todo.last() else {
                // A well-formed graph's work list always ends in a `return_`
                // apply, which always yields `Step::Return` below, so this
                // is unreachable for any graph produced by the parser.
                return Err(VMError::UncallableValue("frame ran out of work without returning".into()));
            };

            match self.handle_node(node, frames.last_mut().unwrap())? {
                Step::Continue => {
                    frames.last_mut().unwrap().todo.pop();
                }
                Step::EnterFrame(new_frame) => {
                    // A tail call: only the triggering apply and the
                    // trailing `return_` remain in the caller's todo.
                    let tail = frames.last().unwrap().todo.len() == 2;
                    if tail {
                        *frames.last_mut().unwrap() = new_frame;
                    } else {
                        frames.push(new_frame);
                    }
                }
                Step::Return(value) => {
                    frames.pop();
                    match frames.last_mut() {
                        Some(caller) => {
                            let target = *caller.todo.last().expect("caller has a pending call site");
                            self.set_node_value(caller, target, value);
                            caller.todo.pop();
                        }
                        None => return Ok(self.export(value)),
                    }
                }
            }
        }
    }

    fn build_frame(&mut self, graph: GraphId, args: Vec<Value>, closure: Option<HashMap<NodeId, Value>>) -> Result<Frame, VMError> {
        self.acquire_graph(graph)?;
        let params = self.core.graph(graph)?.parameters.clone();
        if args.len() != params.len() {
            return Err(VMError::WrongArity {
                graph,
                expected: params.len(),
                got: args.len(),
            });
        }
        let return_node = self
            .core
            .graph(graph)?
            .return_
            .ok_or_else(|| VMError::UncallableValue(format!("graph {graph} has no return node set")))?;
        let nodes = self.work_list(return_node)?;
        let mut frame = Frame::new(graph, nodes, closure);
        for (p, a) in params.into_iter().zip(args) {
            self.set_node_value(&mut frame, p, a);
        }
        Ok(frame)
    }

    fn handle_node(&mut self, node: NodeId, frame: &mut Frame) -> Result<Step, VMError> {
        match self.core.node(node)?.clone() {
            ANFNodeData::Constant { value, .. } => {
                if let Some(closure) = &frame.closure {
                    if closure.contains_key(&node) {
                        return Ok(Step::Continue);
                    }
                }
                if let ConstValue::Graph(g) = value {
                    let fvs = self.free_vars_of(g);
                    if !fvs.is_empty() {
                        let mut captured = HashMap::new();
                        for v in fvs {
                            captured.insert(v, frame.get(self.core, v)?);
                        }
                        let closure_value = Value::Closure(Rc::new(Closure { graph: g, captured }));
                        self.set_node_value(frame, node, closure_value);
                    }
                }
                Ok(Step::Continue)
            }
            ANFNodeData::Parameter { .. } => Ok(Step::Continue),
            ANFNodeData::Special { .. } => Err(VMError::UncallableValue("special nodes are not evaluable".to_string())),
            ANFNodeData::Apply { inputs, .. } => {
                let fn_value = frame.get(self.core, inputs[0])?;
                let args = inputs[1..]
                    .iter()
                    .map(|&a| frame.get(self.core, a))
                    .collect::<Result<Vec<_>, _>>()?;

                match &fn_value {
                    Value::Primitive(Primitive::If) => {
                        let cond = args[0].as_bool().ok_or_else(|| {
                            VMError::UncallableValue("if_ requires a boolean condition".to_string())
                        })?;
                        let target = if cond { args[1].clone() } else { args[2].clone() };
                        self.enter_call(target, Vec::new())
                    }
                    Value::Primitive(Primitive::Return) => Ok(Step::Return(args[0].clone())),
                    Value::Primitive(Primitive::Partial) => {
                        let (callee, pargs) = args
                            .split_first()
                            .ok_or_else(|| VMError::UncallableValue("partial requires a callee argument".to_string()))?;
                        match callee {
                            Value::Graph(_) | Value::Closure(_) => {
                                let result = Value::Partial(Rc::new(Partial {
                                    callee: callee.clone(),
                                    args: pargs.to_vec(),
                                }));
                                self.set_node_value(frame, node, result);
                                Ok(Step::Continue)
                            }
                            _ => Err(VMError::UncallableValue("partial's first argument must be callable".to_string())),
                        }
                    }
                    Value::Primitive(p) => {
                        let result = self.exec_primitive(*p, &args)?;
                        self.set_node_value(frame, node, result);
                        Ok(Step::Continue)
                    }
                    _ => self.enter_call(fn_value, args),
                }
            }
        }
    }

    /// Build (but do not push) a new frame for a tail call to `callee`
    /// applied to `extra_args`, unwrapping Partial chains along the way.
    fn enter_call(&mut self, callee: Value, extra_args: Vec<Value>) -> Result<Step, VMError> {
        match callee {
            Value::Partial(p) => {
                let mut args = p.args.clone();
                args.extend(extra_args);
                self.enter_call(p.callee.clone(), args)
            }
            Value::Closure(c) => {
                let frame = self.build_frame(c.graph, extra_args, Some(c.captured.clone()))?;
                Ok(Step::EnterFrame(frame))
            }
            Value::Graph(g) => {
                let frame = self.build_frame(g, extra_args, None)?;
                Ok(Step::EnterFrame(frame))
            }
            other => Err(VMError::UncallableValue(format!("{other:?} is not callable"))),
        }
    }

    fn exec_primitive(&self, p: Primitive, args: &[Value]) -> Result<Value, VMError> {
        use Primitive::*;
        match p {
            Resolve => {
                let name = match &args[1] {
                    Value::Str(s) => s.clone(),
                    other => return Err(VMError::UncallableValue(format!("resolve expects a string name, got {other:?}"))),
                };
                self.resolver
                    .lookup(&name)
                    .map(namespace_value_to_value)
                    .ok_or_else(|| VMError::UncallableValue(format!("unresolved name '{name}'")))
            }
            Add => numeric2(args, i64::wrapping_add, |a, b| a + b),
            Sub => numeric2(args, i64::wrapping_sub, |a, b| a - b),
            Mul => numeric2(args, i64::wrapping_mul, |a, b| a * b),
            TrueDiv => {
                let (a, b) = as_f64_pair(args)?;
                Ok(Value::Float(a / b))
            }
            FloorDiv => numeric2(args, i64::div_euclid, |a, b| (a / b).floor()),
            Mod => numeric2(args, i64::rem_euclid, |a, b| a.rem_euclid(b)),
            Pow => match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) if *b >= 0 => Ok(Value::Int(a.pow(*b as u32))),
                _ => {
                    let (a, b) = as_f64_pair(args)?;
                    Ok(Value::Float(a.powf(b)))
                }
            },
            MatMul | Distribute | Reshape | Dot | MapArray | ScanArray | ReduceArray => Err(VMError::UncallableValue(
                format!("{p} has no VM host implementation; only its shape-inference contract is defined"),
            )),
            LShift => int2(args, |a, b| a << b),
            RShift => int2(args, |a, b| a >> b),
            And => int2(args, |a, b| a & b),
            Or => int2(args, |a, b| a | b),
            Xor => int2(args, |a, b| a ^ b),
            Pos => Ok(args[0].clone()),
            Neg => match &args[0] {
                Value::Int(a) => Ok(Value::Int(-a)),
                Value::Float(a) => Ok(Value::Float(-a)),
                other => Err(VMError::UncallableValue(format!("neg expects a number, got {other:?}"))),
            },
            Invert => match &args[0] {
                Value::Int(a) => Ok(Value::Int(!a)),
                other => Err(VMError::UncallableValue(format!("invert expects an int, got {other:?}"))),
            },
            Not => Ok(Value::Bool(!args[0].truthy())),
            Eq => Ok(Value::Bool(args[0] == args[1])),
            Ne => Ok(Value::Bool(args[0] != args[1])),
            Lt => ordering2(args, |o| o == std::cmp::Ordering::Less),
            Gt => ordering2(args, |o| o == std::cmp::Ordering::Greater),
            Le => ordering2(args, |o| o != std::cmp::Ordering::Greater),
            Ge => ordering2(args, |o| o != std::cmp::Ordering::Less),
            // Object identity is not modeled distinctly from value equality
            // in this runtime; `is_`/`is_not` fall back to structural equality.
            Is => Ok(Value::Bool(args[0] == args[1])),
            IsNot => Ok(Value::Bool(args[0] != args[1])),
            Contains => match &args[1] {
                Value::Tuple(items) => Ok(Value::Bool(items.contains(&args[0]))),
                other => Err(VMError::UncallableValue(format!("contains expects a tuple, got {other:?}"))),
            },
            ConsTuple => match &args[1] {
                Value::Tuple(tail) => {
                    let mut items = vec![args[0].clone()];
                    items.extend(tail.iter().cloned());
                    Ok(Value::Tuple(items))
                }
                other => Err(VMError::UncallableValue(format!("cons_tuple expects a tuple tail, got {other:?}"))),
            },
            GetItem => match (&args[0], &args[1]) {
                (Value::Tuple(items), Value::Int(i)) => items
                    .get(*i as usize)
                    .cloned()
                    .ok_or_else(|| VMError::UncallableValue(format!("index {i} out of range"))),
                (other, _) => Err(VMError::UncallableValue(format!("getitem expects a tuple, got {other:?}"))),
            },
            GetAttr => Err(VMError::UncallableValue("getattr has no host implementation in this runtime".to_string())),
            Return | If | Partial => unreachable!("control primitives are special-cased before exec_primitive"),
        }
    }

    /// Convert a value about to cross back to the caller: graphs become
    /// closures with an empty snapshot, sequences convert element-wise.
    pub fn export(&self, value: Value) -> Value {
        match value {
            Value::Graph(g) => Value::Closure(Rc::new(Closure {
                graph: g,
                captured: HashMap::new(),
            })),
            Value::Tuple(items) => Value::Tuple(items.into_iter().map(|v| self.export(v)).collect()),
            other => other,
        }
    }

    /// Call `callee` with `args`, dispatching on whether it is a Primitive,
    /// a Graph, a Closure, or a Partial.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, VMError> {
        match callee {
            Value::Primitive(p) => self.exec_primitive(p, &args),
            Value::Graph(g) => self.evaluate(g, args, None),
            Value::Closure(c) => self.evaluate(c.graph, args, Some(c.captured.clone())),
            Value::Partial(p) => {
                let mut full_args = p.args.clone();
                full_args.extend(args);
                self.call(p.callee.clone(), full_args)
            }
            other => Err(VMError::UncallableValue(format!("{other:?} is not callable"))),
        }
    }
}

fn as_f64_pair(args: &[Value]) -> Result<(f64, f64), VMError> {
    let as_f64 = |v: &Value| match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    };
    match (as_f64(&args[0]), as_f64(&args[1])) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(VMError::UncallableValue("arithmetic requires numeric operands".to_string())),
    }
}

fn numeric2(args: &[Value], int_op: impl Fn(i64, i64) -> i64, float_op: impl Fn(f64, f64) -> f64) -> Result<Value, VMError> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        _ => {
            let (a, b) = as_f64_pair(args)?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

fn int2(args: &[Value], op: impl Fn(i64, i64) -> i64) -> Result<Value, VMError> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(op(*a, *b))),
        _ => Err(VMError::UncallableValue("bitwise operators require int operands".to_string())),
    }
}

fn ordering2(args: &[Value], accept: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, VMError> {
    let ord = match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => {
            let (a, b) = as_f64_pair(args)?;
            a.partial_cmp(&b)
        }
    };
    match ord {
        Some(o) => Ok(Value::Bool(accept(o))),
        None => Err(VMError::UncallableValue("values are not comparable".to_string())),
    }
}

// Silence an unused-import warning on platforms/configurations where
// `Inclusion` isn't otherwise referenced outside doc comments.
#[allow(unused_imports)]
use Inclusion as _UnusedInclusionImportGuard;

#[cfg(test)]
mod tests {
    use super::*;
    use myia_core::MapResolver;

    fn straight_line_graph() -> (GraphManager, GraphId) {
        let mut core = GraphManager::new();
        let g = core.new_graph();
        let x = core.parameter(g);
        let y = core.parameter(g);
        core.add_parameter(g, x).unwrap();
        core.add_parameter(g, y).unwrap();
        let add = core.constant(ConstValue::Primitive(Primitive::Add));
        let call = core.apply(g, vec![add, x, y]);
        let ret_prim = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = core.apply(g, vec![ret_prim, call]);
        core.set_return(g, ret).unwrap();
        (core, g)
    }

    #[test]
    fn evaluates_straight_line_addition() {
        let (core, g) = straight_line_graph();
        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let result = vm.evaluate(g, vec![Value::Int(2), Value::Int(3)], None).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let (core, g) = straight_line_graph();
        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let err = vm.evaluate(g, vec![Value::Int(2)], None).unwrap_err();
        assert!(matches!(err, VMError::WrongArity { .. }));
    }

    #[test]
    fn if_selects_branch_by_condition() {
        let mut core = GraphManager::new();
        let entry = core.new_graph();
        let x = core.parameter(entry);
        core.add_parameter(entry, x).unwrap();

        let true_g = core.new_graph();
        let ret_prim_t = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_t = core.apply(true_g, vec![ret_prim_t, x]);
        core.set_return(true_g, ret_t).unwrap();

        let false_g = core.new_graph();
        let neg = core.constant(ConstValue::Primitive(Primitive::Neg));
        let negated = core.apply(false_g, vec![neg, x]);
        let ret_prim_f = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_f = core.apply(false_g, vec![ret_prim_f, negated]);
        core.set_return(false_g, ret_f).unwrap();

        let zero = core.constant(ConstValue::Int(0));
        let gt = core.constant(ConstValue::Primitive(Primitive::Gt));
        let cond = core.apply(entry, vec![gt, x, zero]);
        let true_gfn = core.constant(ConstValue::Graph(true_g));
        let false_gfn = core.constant(ConstValue::Graph(false_g));
        let if_prim = core.constant(ConstValue::Primitive(Primitive::If));
        let if_call = core.apply(entry, vec![if_prim, cond, true_gfn, false_gfn]);
        let ret_prim = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = core.apply(entry, vec![ret_prim, if_call]);
        core.set_return(entry, ret).unwrap();

        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let result = vm.evaluate(entry, vec![Value::Int(-7)], None).unwrap();
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn closure_captures_free_variable() {
        let mut core = GraphManager::new();
        let outer = core.new_graph();
        let x = core.parameter(outer);
        core.add_parameter(outer, x).unwrap();

        let inner = core.new_graph();
        let y = core.parameter(inner);
        core.add_parameter(inner, y).unwrap();
        let add = core.constant(ConstValue::Primitive(Primitive::Add));
        let sum = core.apply(inner, vec![add, x, y]);
        let ret_prim_i = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_i = core.apply(inner, vec![ret_prim_i, sum]);
        core.set_return(inner, ret_i).unwrap();

        let inner_gfn = core.constant(ConstValue::Graph(inner));
        let ret_prim_o = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_o = core.apply(outer, vec![ret_prim_o, inner_gfn]);
        core.set_return(outer, ret_o).unwrap();

        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let closure_value = vm.evaluate(outer, vec![Value::Int(10)], None).unwrap();
        let closure = match &closure_value {
            Value::Closure(c) => c.clone(),
            other => panic!("expected a closure, got {other:?}"),
        };
        let result = vm.call(Value::Closure(closure), vec![Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(13));
    }

    #[test]
    fn tuple_destructure_via_getitem() {
        let mut core = GraphManager::new();
        let g = core.new_graph();
        let p = core.parameter(g);
        core.add_parameter(g, p).unwrap();

        let getitem0 = core.constant(ConstValue::Primitive(Primitive::GetItem));
        let zero = core.constant(ConstValue::Int(0));
        let a = core.apply(g, vec![getitem0, p, zero]);
        let getitem1 = core.constant(ConstValue::Primitive(Primitive::GetItem));
        let one = core.constant(ConstValue::Int(1));
        let b = core.apply(g, vec![getitem1, p, one]);
        let sub = core.constant(ConstValue::Primitive(Primitive::Sub));
        let diff = core.apply(g, vec![sub, a, b]);
        let ret_prim = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = core.apply(g, vec![ret_prim, diff]);
        core.set_return(g, ret).unwrap();

        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let result = vm.evaluate(g, vec![Value::Tuple(vec![Value::Int(9), Value::Int(4)])], None).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn deep_tail_recursion_runs_in_constant_frame_depth() {
        // f(n, acc) = if n == 0: return acc else: return f(n - 1, acc + n)
        let mut core = GraphManager::new();
        let g = core.new_graph();
        let n = core.parameter(g);
        let acc = core.parameter(g);
        core.add_parameter(g, n).unwrap();
        core.add_parameter(g, acc).unwrap();

        // Branch thunks are zero-parameter graphs that capture `n`/`acc` as
        // free variables, since `if_` invokes its selected branch with no
        // arguments (the parser never emits branches with their own
        // parameter lists for an `if` with no assignments of its own).
        let base = core.new_graph();
        let ret_prim_base = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_base = core.apply(base, vec![ret_prim_base, acc]);
        core.set_return(base, ret_base).unwrap();

        let step = core.new_graph();
        let one_s = core.constant(ConstValue::Int(1));
        let n_minus_1 = core.apply(step, vec![core.constant(ConstValue::Primitive(Primitive::Sub)), n, one_s]);
        let acc_plus_n = core.apply(step, vec![core.constant(ConstValue::Primitive(Primitive::Add)), acc, n]);
        let self_gfn = core.constant(ConstValue::Graph(g));
        let recurse = core.apply(step, vec![self_gfn, n_minus_1, acc_plus_n]);
        let ret_prim_step = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret_step = core.apply(step, vec![ret_prim_step, recurse]);
        core.set_return(step, ret_step).unwrap();

        let zero = core.constant(ConstValue::Int(0));
        let eq = core.constant(ConstValue::Primitive(Primitive::Eq));
        let cond = core.apply(g, vec![eq, n, zero]);
        let base_gfn = core.constant(ConstValue::Graph(base));
        let step_gfn = core.constant(ConstValue::Graph(step));
        let if_prim = core.constant(ConstValue::Primitive(Primitive::If));
        let if_call = core.apply(g, vec![if_prim, cond, base_gfn, step_gfn]);
        let ret_prim = core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = core.apply(g, vec![ret_prim, if_call]);
        core.set_return(g, ret).unwrap();

        let resolver = MapResolver::new();
        let mut vm = Vm::new(&core, &resolver);
        let result = vm.evaluate(g, vec![Value::Int(1000), Value::Int(0)], None).unwrap();
        assert_eq!(result, Value::Int(500500));
    }
}
