//! ANF lowering: turns a surface-AST function definition into a Graph,
//! following the block-function/φ-node algorithm in `myia/parser.py`.

use crate::ast::{AssignTarget, BinOp, CmpOp, Expr, FunctionDef, Literal, Spanned, Stmt, UnaryOp};
use crate::block::{BlockArena, BlockId};
use crate::error::ParseError;
use myia_core::{ConstValue, GraphId, GraphManager, Namespace, NodeId, Primitive, Resolver};

fn op_namespace() -> Namespace {
    Namespace::module("operator")
}

fn bin_primitive(op: BinOp) -> Primitive {
    match op {
        BinOp::Add => Primitive::Add,
        BinOp::Sub => Primitive::Sub,
        BinOp::Mul => Primitive::Mul,
        BinOp::TrueDiv => Primitive::TrueDiv,
        BinOp::FloorDiv => Primitive::FloorDiv,
        BinOp::Mod => Primitive::Mod,
        BinOp::Pow => Primitive::Pow,
        BinOp::MatMul => Primitive::MatMul,
        BinOp::LShift => Primitive::LShift,
        BinOp::RShift => Primitive::RShift,
        BinOp::BitAnd => Primitive::And,
        BinOp::BitOr => Primitive::Or,
        BinOp::BitXor => Primitive::Xor,
    }
}

fn unary_primitive(op: UnaryOp) -> Primitive {
    match op {
        UnaryOp::Pos => Primitive::Pos,
        UnaryOp::Neg => Primitive::Neg,
        UnaryOp::Invert => Primitive::Invert,
        UnaryOp::Not => Primitive::Not,
    }
}

fn cmp_primitive(op: CmpOp) -> Primitive {
    match op {
        CmpOp::Eq => Primitive::Eq,
        CmpOp::Ne => Primitive::Ne,
        CmpOp::Lt => Primitive::Lt,
        CmpOp::Gt => Primitive::Gt,
        CmpOp::Le => Primitive::Le,
        CmpOp::Ge => Primitive::Ge,
        CmpOp::Is => Primitive::Is,
        CmpOp::IsNot => Primitive::IsNot,
        CmpOp::In => Primitive::Contains,
    }
}

/// Lowers one module's worth of function definitions into the shared
/// [`GraphManager`] arena. One `Lowering` is used per `parse` call; nested
/// `def`s are processed recursively within the same instance so that graph
/// constants/free variables naturally cross nested-function boundaries.
pub struct Lowering<'a> {
    pub core: &'a mut GraphManager,
    blocks: BlockArena,
    block_map: std::collections::HashMap<BlockId, NodeId>,
    global_resolver: &'a dyn Resolver,
    closure_resolver: Option<&'a dyn Resolver>,
}

impl<'a> Lowering<'a> {
    pub fn new(core: &'a mut GraphManager, global_resolver: &'a dyn Resolver) -> Self {
        Lowering {
            core,
            blocks: BlockArena::new(),
            block_map: std::collections::HashMap::new(),
            global_resolver,
            closure_resolver: None,
        }
    }

    /// Entry point: lower one top-level function definition, returning its Graph.
    pub fn lower_function(&mut self, f: &FunctionDef) -> Result<GraphId, ParseError> {
        let (_, entry) = self.process_function(None, f)?;
        Ok(self.blocks.get(entry).graph)
    }

    fn fresh(&mut self, node: NodeId) -> NodeId {
        if let Ok(myia_core::ANFNodeData::Constant { value, .. }) = self.core.node(node) {
            return self.core.constant(value.clone());
        }
        node
    }

    fn get_block_function(&mut self, block: BlockId) -> NodeId {
        if let Some(&cached) = self.block_map.get(&block) {
            return self.fresh(cached);
        }
        let graph = self.blocks.get(block).graph;
        let node = self.core.constant(ConstValue::Graph(graph));
        self.block_map.insert(block, node);
        node
    }

    fn make_resolve(&mut self, block: BlockId, ns: Namespace, symbol: &str) -> NodeId {
        let graph = self.blocks.get(block).graph;
        let resolve = self.core.constant(ConstValue::Primitive(Primitive::Resolve));
        let ns_node = self.core.constant(ConstValue::Namespace(ns));
        let sym_node = self.core.constant(ConstValue::Str(symbol.to_string()));
        self.core.apply(graph, vec![resolve, ns_node, sym_node])
    }

    fn resolve_binop(&mut self, block: BlockId, op: BinOp) -> NodeId {
        let sym = bin_primitive(op).operator_symbol().unwrap();
        self.make_resolve(block, op_namespace(), sym)
    }

    fn resolve_unary(&mut self, block: BlockId, op: UnaryOp) -> NodeId {
        let sym = unary_primitive(op).operator_symbol().unwrap();
        self.make_resolve(block, op_namespace(), sym)
    }

    fn resolve_cmp(&mut self, block: BlockId, op: CmpOp) -> NodeId {
        let sym = cmp_primitive(op).operator_symbol().unwrap();
        self.make_resolve(block, op_namespace(), sym)
    }

    // -- Function / block construction ----------------------------------

    fn process_function(
        &mut self,
        pred: Option<BlockId>,
        f: &FunctionDef,
    ) -> Result<(BlockId, BlockId), ParseError> {
        let graph = self.core.new_graph();
        let function_block = self.blocks.alloc(graph);
        if let Some(pred) = pred {
            self.blocks.get_mut(function_block).preds.push(pred);
        }
        self.mature(function_block)?;
        self.core.set_graph_name(graph, f.name.clone())?;

        for param in &f.params {
            let p = self.core.parameter(graph);
            self.core.add_parameter(graph, p)?;
            self.write(function_block, param, p);
        }
        // Binding the function's own name lets the body refer to itself
        // recursively through ordinary variable resolution.
        let self_fn = self.get_block_function(function_block);
        self.write(function_block, &f.name, self_fn);

        let final_block = self.process_statements(function_block, &f.body)?;
        Ok((final_block, function_block))
    }

    fn process_statements(&mut self, mut block: BlockId, stmts: &[Spanned<Stmt>]) -> Result<BlockId, ParseError> {
        for s in stmts {
            block = self.process_stmt(block, s)?;
        }
        Ok(block)
    }

    fn process_stmt(&mut self, block: BlockId, stmt: &Spanned<Stmt>) -> Result<BlockId, ParseError> {
        match &stmt.node {
            Stmt::FunctionDef(f) => {
                let (_, function_block) = self.process_function(Some(block), f)?;
                let node = self.get_block_function(function_block);
                self.write(block, &f.name, node);
                Ok(block)
            }
            Stmt::Return(e) => {
                let value = self.process_expr(block, e)?;
                let graph = self.blocks.get(block).graph;
                let ret_prim = self.core.constant(ConstValue::Primitive(Primitive::Return));
                let ret = self.core.apply(graph, vec![ret_prim, value]);
                if self.core.graph(graph)?.return_.is_some() {
                    return Err(ParseError::ReturnAlreadySet { line: stmt.line });
                }
                self.core.set_return(graph, ret)?;
                Ok(block)
            }
            Stmt::Assign { targets, value } => {
                let node = self.process_expr(block, value)?;
                for t in targets {
                    self.bind_target(block, t, node)?;
                }
                Ok(block)
            }
            Stmt::Expr(e) => {
                self.process_expr(block, e)?;
                Ok(block)
            }
            Stmt::If { test, body, orelse } => self.process_if(block, test, body, orelse),
            Stmt::While { test, body } => self.process_while(block, test, body),
        }
    }

    fn bind_target(&mut self, block: BlockId, target: &Spanned<AssignTarget>, node: NodeId) -> Result<(), ParseError> {
        match &target.node {
            AssignTarget::Name(name) => {
                self.write(block, name, node);
                Ok(())
            }
            AssignTarget::Tuple(elts) => {
                let graph = self.blocks.get(block).graph;
                for (i, elt) in elts.iter().enumerate() {
                    let getitem = self.make_resolve(block, op_namespace(), "getitem");
                    let idx = self.core.constant(ConstValue::Int(i as i64));
                    let proj = self.core.apply(graph, vec![getitem, node, idx]);
                    self.bind_target(block, elt, proj)?;
                }
                Ok(())
            }
        }
    }

    fn process_if(
        &mut self,
        block: BlockId,
        test: &Spanned<Expr>,
        body: &[Spanned<Stmt>],
        orelse: &[Spanned<Stmt>],
    ) -> Result<BlockId, ParseError> {
        let cond = self.process_expr(block, test)?;
        let parent_graph = self.blocks.get(block).graph;

        let true_block = self.blocks.alloc(self.core.new_graph());
        let false_block = self.blocks.alloc(self.core.new_graph());
        self.core.set_graph_name(self.blocks.get(true_block).graph, "if_true")?;
        self.core.set_graph_name(self.blocks.get(false_block).graph, "if_false")?;
        self.blocks.get_mut(true_block).preds.push(block);
        self.blocks.get_mut(false_block).preds.push(block);
        self.mature(true_block)?;
        self.mature(false_block)?;

        let after_block = self.blocks.alloc(self.core.new_graph());
        self.core.set_graph_name(self.blocks.get(after_block).graph, "if_after")?;

        let true_end = self.process_statements(true_block, body)?;
        if self.core.graph(self.blocks.get(true_end).graph)?.return_.is_none() {
            self.jump(true_end, after_block)?;
        }

        let false_end = self.process_statements(false_block, orelse)?;
        if self.core.graph(self.blocks.get(false_end).graph)?.return_.is_none() {
            self.jump(false_end, after_block)?;
        }

        let true_gfn = self.get_block_function(true_block);
        let false_gfn = self.get_block_function(false_block);
        let if_prim = self.core.constant(ConstValue::Primitive(Primitive::If));
        let if_call = self.core.apply(parent_graph, vec![if_prim, cond, true_gfn, false_gfn]);
        let ret_prim = self.core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = self.core.apply(parent_graph, vec![ret_prim, if_call]);
        self.core.set_return(parent_graph, ret)?;

        self.mature(after_block)?;
        Ok(after_block)
    }

    fn process_while(&mut self, block: BlockId, test: &Spanned<Expr>, body: &[Spanned<Stmt>]) -> Result<BlockId, ParseError> {
        let header_block = self.blocks.alloc(self.core.new_graph());
        let body_block = self.blocks.alloc(self.core.new_graph());
        let after_block = self.blocks.alloc(self.core.new_graph());
        self.core.set_graph_name(self.blocks.get(header_block).graph, "while_header")?;
        self.core.set_graph_name(self.blocks.get(body_block).graph, "while_body")?;
        self.core.set_graph_name(self.blocks.get(after_block).graph, "while_after")?;

        self.blocks.get_mut(body_block).preds.push(header_block);
        self.blocks.get_mut(after_block).preds.push(header_block);

        self.jump(block, header_block)?;

        let cond = self.process_expr(header_block, test)?;
        self.mature(body_block)?;

        let header_graph = self.blocks.get(header_block).graph;
        let body_gfn = self.get_block_function(body_block);
        let after_gfn = self.get_block_function(after_block);
        let if_prim = self.core.constant(ConstValue::Primitive(Primitive::If));
        let if_call = self.core.apply(header_graph, vec![if_prim, cond, body_gfn, after_gfn]);
        let ret_prim = self.core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = self.core.apply(header_graph, vec![ret_prim, if_call]);
        self.core.set_return(header_graph, ret)?;

        let after_body = self.process_statements(body_block, body)?;
        if self.core.graph(self.blocks.get(after_body).graph)?.return_.is_none() {
            self.jump(after_body, header_block)?;
        }

        self.mature(header_block)?;
        self.mature(after_block)?;
        Ok(after_block)
    }

    // -- Variable resolution ----------------------------------------------

    fn write(&mut self, block: BlockId, name: &str, node: NodeId) {
        self.blocks.get_mut(block).variables.insert(name.to_string(), node);
    }

    fn read(&mut self, block: BlockId, name: &str, line: u32) -> Result<NodeId, ParseError> {
        if let Some(&node) = self.blocks.get(block).variables.get(name) {
            return Ok(self.fresh(node));
        }
        let matured = self.blocks.get(block).matured;
        if matured {
            let preds = self.blocks.get(block).preds.clone();
            if preds.len() == 1 {
                return self.read(preds[0], name, line);
            } else if preds.is_empty() {
                if self.closure_resolver.map(|r| r.contains(name)).unwrap_or(false) {
                    return Ok(self.make_resolve(block, Namespace::closure("enclosing"), name));
                }
                if self.global_resolver.contains(name) {
                    return Ok(self.make_resolve(block, Namespace::module("globals"), name));
                }
                return Err(ParseError::UnresolvedName {
                    name: name.to_string(),
                    line,
                });
            }
        }
        let graph = self.blocks.get(block).graph;
        let phi = self.core.parameter(graph);
        self.core.add_parameter(graph, phi)?;
        self.blocks.get_mut(block).phi_nodes.insert(phi, name.to_string());
        self.write(block, name, phi);
        if matured {
            self.set_phi_arguments(block, phi)?;
        }
        Ok(phi)
    }

    fn mature(&mut self, block: BlockId) -> Result<(), ParseError> {
        let graph = self.blocks.get(block).graph;
        let params = self.core.graph(graph)?.parameters.clone();
        for phi in params {
            if self.blocks.get(block).phi_nodes.contains_key(&phi) {
                self.set_phi_arguments(block, phi)?;
            }
        }
        self.blocks.get_mut(block).matured = true;
        Ok(())
    }

    fn set_phi_arguments(&mut self, block: BlockId, phi: NodeId) -> Result<(), ParseError> {
        let varname = self.blocks.get(block).phi_nodes.get(&phi).cloned().unwrap();
        let preds = self.blocks.get(block).preds.clone();
        for pred in preds {
            let arg = self.read(pred, &varname, 0)?;
            let jump_apply = *self.blocks.get(pred).jumps.get(&block).expect("jump recorded before maturation");
            if let Ok(myia_core::ANFNodeData::Apply { inputs, .. }) = self.core.node_mut(jump_apply) {
                inputs.push(arg);
            }
        }
        Ok(())
    }

    fn jump(&mut self, from: BlockId, target: BlockId) -> Result<NodeId, ParseError> {
        let target_fn = self.get_block_function(target);
        let from_graph = self.blocks.get(from).graph;
        let jump_apply = self.core.apply(from_graph, vec![target_fn]);
        self.blocks.get_mut(from).jumps.insert(target, jump_apply);
        self.blocks.get_mut(target).preds.push(from);
        let ret_prim = self.core.constant(ConstValue::Primitive(Primitive::Return));
        let ret = self.core.apply(from_graph, vec![ret_prim, jump_apply]);
        self.core.set_return(from_graph, ret)?;
        Ok(ret)
    }

    // -- Expressions ------------------------------------------------------

    fn process_expr(&mut self, block: BlockId, e: &Spanned<Expr>) -> Result<NodeId, ParseError> {
        let graph = self.blocks.get(block).graph;
        match &e.node {
            Expr::Name(name) => self.read(block, name, e.line),
            Expr::Literal(lit) => {
                let v = match lit {
                    Literal::Int(i) => ConstValue::Int(*i),
                    Literal::Float(f) => ConstValue::Float(*f),
                    Literal::Str(s) => ConstValue::Str(s.clone()),
                    Literal::Bool(b) => ConstValue::Bool(*b),
                    Literal::None_ => ConstValue::None_,
                };
                Ok(self.core.constant(v))
            }
            Expr::BinOp { op, left, right } => {
                let func = self.resolve_binop(block, *op);
                let l = self.process_expr(block, left)?;
                let r = self.process_expr(block, right)?;
                Ok(self.core.apply(graph, vec![func, l, r]))
            }
            Expr::UnaryOp { op, operand } => {
                let func = self.resolve_unary(block, *op);
                let o = self.process_expr(block, operand)?;
                Ok(self.core.apply(graph, vec![func, o]))
            }
            Expr::Compare { op, left, right } => {
                let func = self.resolve_cmp(block, *op);
                let l = self.process_expr(block, left)?;
                let r = self.process_expr(block, right)?;
                Ok(self.core.apply(graph, vec![func, l, r]))
            }
            Expr::Call { func, args } => {
                let f = self.process_expr(block, func)?;
                let mut inputs = vec![f];
                for a in args {
                    inputs.push(self.process_expr(block, a)?);
                }
                Ok(self.core.apply(graph, inputs))
            }
            Expr::Tuple(elts) => self.process_tuple(block, elts),
            Expr::Subscript { value, index } => {
                let op = self.make_resolve(block, op_namespace(), "getitem");
                let v = self.process_expr(block, value)?;
                let i = self.process_expr(block, index)?;
                Ok(self.core.apply(graph, vec![op, v, i]))
            }
            Expr::Attribute { value, attr } => {
                let op = self.make_resolve(block, Namespace::module("builtins"), "getattr");
                let v = self.process_expr(block, value)?;
                let a = self.core.constant(ConstValue::Str(attr.clone()));
                Ok(self.core.apply(graph, vec![op, v, a]))
            }
        }
    }

    fn process_tuple(&mut self, block: BlockId, elts: &[Spanned<Expr>]) -> Result<NodeId, ParseError> {
        if elts.is_empty() {
            return Ok(self.core.constant(ConstValue::EmptyTuple));
        }
        let graph = self.blocks.get(block).graph;
        let op = self.core.constant(ConstValue::Primitive(Primitive::ConsTuple));
        let head = self.process_expr(block, &elts[0])?;
        let tail = self.process_tuple(block, &elts[1..])?;
        Ok(self.core.apply(graph, vec![op, head, tail]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_module;
    use myia_core::MapResolver;

    fn lower_single(src: &str) -> (GraphManager, GraphId) {
        let module = parse_module(src).unwrap();
        let mut core = GraphManager::new();
        let resolver = MapResolver::new();
        let graph = {
            let mut lowering = Lowering::new(&mut core, &resolver);
            lowering.lower_function(&module.functions[0]).unwrap()
        };
        (core, graph)
    }

    #[test]
    fn straight_line_has_two_params_and_one_apply_chain() {
        let (core, g) = lower_single("def f(x, y):\n    return x + y\n");
        let gd = core.graph(g).unwrap();
        assert_eq!(gd.parameters.len(), 2);
        assert!(gd.return_.is_some());
    }

    #[test]
    fn branch_true_end_has_no_jump_when_it_returns() {
        let src = "def f(x):\n    if x > 0:\n        return x\n    else:\n        return 0 - x\n";
        let (core, g) = lower_single(src);
        let gd = core.graph(g).unwrap();
        assert!(gd.return_.is_some());
        // The top graph's return is `return_(if_(cond, true_gfn, false_gfn))`.
        let ret = core.node(gd.return_.unwrap()).unwrap();
        let inputs = ret.incoming();
        assert_eq!(inputs.len(), 2);
        let if_call = core.node(inputs[1]).unwrap();
        let if_inputs = if_call.incoming();
        assert_eq!(if_inputs.len(), 3);
        let true_graph = core.is_constant_graph(if_inputs[1]).unwrap();
        assert!(core.graph(true_graph).unwrap().return_.is_some());
    }

    #[test]
    fn loop_header_has_three_phi_parameters() {
        let src = "def f(n):\n    s = 0\n    i = 0\n    while i < n:\n        s = s + i\n        i = i + 1\n    return s\n";
        let (core, g) = lower_single(src);
        let gd = core.graph(g).unwrap();
        assert_eq!(gd.parameters.len(), 1);
        // The header graph is reached via the jump target of the top graph's return.
        let ret = core.node(gd.return_.unwrap()).unwrap();
        let jump_call = core.node(ret.incoming()[1]).unwrap();
        let header_graph = core.is_constant_graph(jump_call.incoming()[0]).unwrap();
        // The header is still immature when the condition `i < n` is read, so
        // both `i` and `n` each allocate a phi; the body's read of `s` adds a
        // third: [i, n, s].
        assert_eq!(core.graph(header_graph).unwrap().parameters.len(), 3);
    }

    #[test]
    fn tuple_destructure_projects_with_getitem() {
        let src = "def f(p):\n    a, b = p\n    return a - b\n";
        let (core, g) = lower_single(src);
        let gd = core.graph(g).unwrap();
        assert!(gd.return_.is_some());
    }

    #[test]
    fn nested_function_def_produces_closure_candidate_graph() {
        let src = "def outer(x):\n    def inner(y):\n        return x + y\n    return inner\n";
        let (core, g) = lower_single(src);
        let gd = core.graph(g).unwrap();
        let ret = core.node(gd.return_.unwrap()).unwrap();
        let inner_const = ret.incoming()[1];
        let inner_graph = core.is_constant_graph(inner_const).unwrap();
        let fvs = core.free_variables_total(inner_graph).unwrap();
        assert_eq!(fvs.len(), 1);
    }

    #[test]
    fn unresolved_name_is_reported() {
        let src = "def f():\n    return not_a_real_name\n";
        let module = parse_module(src).unwrap();
        let mut core = GraphManager::new();
        let resolver = MapResolver::new();
        let mut lowering = Lowering::new(&mut core, &resolver);
        let err = lowering.lower_function(&module.functions[0]).unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedName { .. }));
    }
}
