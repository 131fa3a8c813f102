//! Semantic pass: lowering the syntax tree to polyhedral objects.
//!
//! Names are resolved here. Tuple variables shadow parameters, every tuple
//! name becomes a [`TupleId`] from one [`IdContext`], and every expression
//! that must be affine is checked to be so. Statement bodies are split into
//! an access list and a [`StmtBody`] that refers to it by position.

use crate::frontend::ast::*;
use crate::polyhedral::{
    AffineExpr, AffineMap, Constraint, IdContext, IntegerSet, PwMultiAff, Space, TupleId, UnionSet,
};
use crate::schedule::Schedule;
use crate::scop::{Access, BodyExpr, BodyOp, Scop, Statement, StmtBody};
use crate::utils::errors::{ParseError, ParseErrorKind, PolyLearnError};
use crate::utils::location::Span;
use log::debug;

/// A lowered `.scop` file.
#[derive(Debug)]
pub struct ScopProgram {
    pub scop: Scop,
    pub schedule: Schedule,
    /// The identities handed out while lowering
    pub ids: IdContext,
}

/// Lower a parsed `.scop` file.
///
/// Without a `schedule` item the statements run one after another in file
/// order.
pub fn lower_file(file: &ScopFile, name: &str) -> Result<ScopProgram, PolyLearnError> {
    let mut ids = IdContext::new();
    let params = declared_params(file)?;
    let mut scop = Scop::new(name, params.clone());
    let mut lowering = Lowering::with_params(&mut ids, params);
    let mut context_seen = false;
    let mut schedule_maps = None;

    for item in &file.items {
        match item {
            Item::Params { .. } => {}
            Item::Context(set) => {
                if context_seen {
                    return Err(misplaced("a SCoP has a single context", set.span).into());
                }
                context_seen = true;
                scop = scop.with_context(lowering.context(set)?).map_err(|e| e.with_span(set.span))?;
            }
            Item::Stmt { domain, body } => {
                let span = domain.span;
                let domain = lowering.statement_domain(domain)?;
                let stmt = lowering.statement(domain, body)?;
                debug!("lowered statement {} with {} accesses", stmt.id, stmt.accesses.len());
                scop.add_statement(stmt).map_err(|e| e.with_span(span))?;
            }
            Item::Schedule(map) => {
                if schedule_maps.is_some() {
                    return Err(misplaced("a SCoP has a single schedule", map.span).into());
                }
                schedule_maps = Some(lowering.union_map(map)?);
            }
        }
    }

    let domain = scop.domain();
    let schedule = match schedule_maps {
        Some(maps) => Schedule::from_union_map(domain, maps)?,
        None => Schedule::sequential(domain),
    };
    Ok(ScopProgram { scop, schedule, ids })
}

fn declared_params(file: &ScopFile) -> Result<Vec<String>, ParseError> {
    let mut declared: Option<Vec<String>> = None;
    for item in &file.items {
        if let Item::Params { names, span } = item {
            if declared.is_some() {
                return Err(misplaced("parameters are declared twice", *span));
            }
            declared = Some(names.clone());
        }
    }
    Ok(declared.unwrap_or_default())
}

/// Name resolution and affine conversion.
pub struct Lowering<'c> {
    ids: &'c mut IdContext,
    params: Vec<String>,
    /// Whether `params` is fixed; otherwise the first prefix seen defines it
    declared: bool,
}

impl<'c> Lowering<'c> {
    /// A lowering that takes its parameters from the first `[..] ->` prefix.
    pub fn new(ids: &'c mut IdContext) -> Self {
        Self { ids, params: Vec::new(), declared: false }
    }

    /// A lowering over a fixed parameter list.
    pub fn with_params(ids: &'c mut IdContext, params: Vec<String>) -> Self {
        Self { ids, params, declared: true }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    fn adopt_params(&mut self, prefix: &[String], span: Span) -> Result<(), ParseError> {
        if !self.declared {
            self.params = prefix.to_vec();
            self.declared = !prefix.is_empty();
            return Ok(());
        }
        match prefix.iter().find(|p| !self.params.contains(p)) {
            Some(p) => Err(semantic_error(
                ParseErrorKind::UnknownName,
                format!("parameter '{}' is not declared", p),
                span,
            )),
            None => Ok(()),
        }
    }

    /// Lower a union of sets.
    pub fn union_set(&mut self, set: &SetExpr) -> Result<UnionSet, ParseError> {
        self.adopt_params(&set.params, set.span)?;
        let sets = set.parts.iter().map(|part| self.basic_set(part)).collect::<Result<_, _>>()?;
        Ok(UnionSet::from_sets(sets))
    }

    /// Lower a parameter-only set, `{ : N >= 1 }`.
    pub fn context(&mut self, set: &SetExpr) -> Result<IntegerSet, ParseError> {
        self.adopt_params(&set.params, set.span)?;
        match set.parts.as_slice() {
            [part] if part.tuple.is_none() => self.basic_set(part),
            _ => Err(misplaced("a context constrains parameters only", set.span)),
        }
    }

    /// Lower the domain of a statement: one named tuple.
    pub fn statement_domain(&mut self, set: &SetExpr) -> Result<IntegerSet, ParseError> {
        self.adopt_params(&set.params, set.span)?;
        match set.parts.as_slice() {
            [part] if part.tuple.as_ref().map_or(false, |t| t.name.is_some()) => self.basic_set(part),
            _ => Err(misplaced("a statement domain is a single named tuple", set.span)),
        }
    }

    fn basic_set(&mut self, part: &BasicSetExpr) -> Result<IntegerSet, ParseError> {
        let (names, tuple) = match &part.tuple {
            Some(tuple) => (tuple_vars(tuple)?, tuple.name.as_deref().map(|n| self.ids.id(n))),
            None => (Vec::new(), None),
        };
        let mut set = IntegerSet::from_space(self.set_space(names.len(), names.clone(), tuple));
        for chain in &part.constraints {
            for constraint in self.chain(chain, &names)? {
                set.add_constraint(constraint);
            }
        }
        Ok(set)
    }

    /// Lower a union of maps without constraints, as used for schedules.
    pub fn union_map(&mut self, map: &MapExpr) -> Result<Vec<AffineMap>, ParseError> {
        self.adopt_params(&map.params, map.span)?;
        map.parts
            .iter()
            .map(|part| match self.basic_map(part)? {
                (map, None) => Ok(map),
                (_, Some(_)) => Err(misplaced("schedule maps cannot carry constraints", part.span)),
            })
            .collect()
    }

    /// Lower a single map to a function defined on its constraints.
    pub fn pw_multi_aff(&mut self, map: &MapExpr) -> Result<PwMultiAff, ParseError> {
        self.adopt_params(&map.params, map.span)?;
        match map.parts.as_slice() {
            [part] => Ok(match self.basic_map(part)? {
                (map, None) => PwMultiAff::from_affine_map(map),
                (map, Some(domain)) => PwMultiAff::from_map_on(map, domain),
            }),
            _ => Err(misplaced("expected a single map", map.span)),
        }
    }

    fn basic_map(&mut self, part: &BasicMapExpr) -> Result<(AffineMap, Option<IntegerSet>), ParseError> {
        let names = tuple_vars(&part.input)?;
        let in_tuple = part.input.name.as_deref().map(|n| self.ids.id(n));
        let domain_space = self.set_space(names.len(), names.clone(), in_tuple);

        let outputs = part.output.elems.iter().map(|e| self.affine(e, &names)).collect::<Result<Vec<_>, _>>()?;
        let out_tuple = part.output.name.as_deref().map(|n| self.ids.id(n));
        let range = self.set_space(outputs.len(), Vec::new(), out_tuple);
        let map = AffineMap::with_space(Space::map_from(&domain_space, &range), outputs);

        if part.constraints.is_empty() {
            return Ok((map, None));
        }
        let mut domain = IntegerSet::from_space(domain_space);
        for chain in &part.constraints {
            for constraint in self.chain(chain, &names)? {
                domain.add_constraint(constraint);
            }
        }
        Ok((map, Some(domain)))
    }

    /// Lower a statement body over `domain`.
    ///
    /// The written location is access 0. Iterators and parameters read in
    /// the body become value accesses; any other bare name is a scalar.
    pub fn statement(&mut self, domain: IntegerSet, body: &BodyStmt) -> Result<Statement, PolyLearnError> {
        let mut accesses = Vec::new();
        let target = self.target(&domain, &body.target, &mut accesses)?;
        let value = self.body_expr(&domain, &body.value, &mut accesses)?;
        let body = match body.op {
            None => StmtBody::Assignment { target, value },
            Some(op) => StmtBody::CompoundAssign { target, op: body_op(op), value },
        };
        Ok(Statement::new(domain, accesses, body)?)
    }

    fn target(&mut self, domain: &IntegerSet, expr: &Expr, accesses: &mut Vec<Access>) -> Result<usize, ParseError> {
        let access = match &expr.kind {
            ExprKind::Access { array, indices } => {
                let id = self.ids.id(array);
                Access::write(id.clone(), self.index(domain, Some(id), indices)?)
            }
            ExprKind::Var(name) if self.is_affine_name(domain, name) => {
                return Err(misplaced(format!("cannot assign to '{}'", name), expr.span));
            }
            ExprKind::Var(name) => {
                let id = self.ids.id(name);
                Access::write(id.clone(), self.index(domain, Some(id), &[])?)
            }
            _ => return Err(misplaced("the target of an assignment must be an array element", expr.span)),
        };
        accesses.push(access);
        Ok(accesses.len() - 1)
    }

    fn body_expr(&mut self, domain: &IntegerSet, expr: &Expr, accesses: &mut Vec<Access>) -> Result<BodyExpr, ParseError> {
        Ok(match &expr.kind {
            ExprKind::Int(v) => BodyExpr::Int(*v),
            ExprKind::Float(text) => BodyExpr::Float(text.clone()),
            ExprKind::Var(name) if self.is_affine_name(domain, name) => {
                let index = self.index(domain, None, std::slice::from_ref(expr))?;
                accesses.push(Access::value(index));
                BodyExpr::Access(accesses.len() - 1)
            }
            ExprKind::Var(name) => {
                let id = self.ids.id(name);
                accesses.push(Access::read(id.clone(), self.index(domain, Some(id), &[])?));
                BodyExpr::Access(accesses.len() - 1)
            }
            ExprKind::Access { array, indices } => {
                let id = self.ids.id(array);
                accesses.push(Access::read(id.clone(), self.index(domain, Some(id), indices)?));
                BodyExpr::Access(accesses.len() - 1)
            }
            ExprKind::Neg(inner) => BodyExpr::Neg(Box::new(self.body_expr(domain, inner, accesses)?)),
            ExprKind::Binary { op, left, right } => {
                let left = self.body_expr(domain, left, accesses)?;
                let right = self.body_expr(domain, right, accesses)?;
                BodyExpr::binary(body_op(*op), left, right)
            }
            ExprKind::Call { func, args } => BodyExpr::Call {
                func: func.clone(),
                args: args.iter().map(|a| self.body_expr(domain, a, accesses)).collect::<Result<_, _>>()?,
            },
        })
    }

    fn is_affine_name(&self, domain: &IntegerSet, name: &str) -> bool {
        domain.space.dim_names.iter().any(|n| n == name) || self.params.iter().any(|p| p == name)
    }

    /// The index function from `domain` to `array[indices]`.
    fn index(&mut self, domain: &IntegerSet, array: Option<TupleId>, indices: &[Expr]) -> Result<PwMultiAff, ParseError> {
        let names = domain.space.dim_names.clone();
        let outputs = indices.iter().map(|e| self.affine(e, &names)).collect::<Result<Vec<_>, _>>()?;
        let range = self.set_space(outputs.len(), Vec::new(), array);
        let map = AffineMap::with_space(Space::map_from(&domain.space, &range), outputs);
        Ok(PwMultiAff::from_affine_map(map))
    }

    fn set_space(&self, n_dim: usize, names: Vec<String>, tuple: Option<TupleId>) -> Space {
        Space::set_with_params(n_dim, self.params.len())
            .with_dim_names(names)
            .with_param_names(self.params.clone())
            .with_tuple(tuple)
    }

    /// `a op b op c` as the constraints `a op b` and `b op c`.
    fn chain(&self, chain: &Chain, vars: &[String]) -> Result<Vec<Constraint>, ParseError> {
        let operands = chain.operands.iter().map(|e| self.affine(e, vars)).collect::<Result<Vec<_>, _>>()?;
        let one = AffineExpr::constant(1, vars.len(), self.params.len());
        Ok(chain
            .ops
            .iter()
            .zip(operands.windows(2))
            .map(|(op, pair)| {
                let (a, b) = (pair[0].clone(), pair[1].clone());
                match op {
                    CmpOp::Lt => Constraint::ge_zero(b - a - one.clone()),
                    CmpOp::Le => Constraint::le(a, b),
                    CmpOp::Eq => Constraint::eq(a, b),
                    CmpOp::Ge => Constraint::ge(a, b),
                    CmpOp::Gt => Constraint::ge_zero(a - b - one.clone()),
                }
            })
            .collect())
    }

    /// Convert an expression over `vars` and the parameters.
    fn affine(&self, expr: &Expr, vars: &[String]) -> Result<AffineExpr, ParseError> {
        let (n_dim, n_param) = (vars.len(), self.params.len());
        match &expr.kind {
            ExprKind::Int(v) => Ok(AffineExpr::constant(*v, n_dim, n_param)),
            ExprKind::Var(name) => {
                if let Some(k) = vars.iter().position(|v| v == name) {
                    Ok(AffineExpr::var(k, n_dim, n_param))
                } else if let Some(p) = self.params.iter().position(|p| p == name) {
                    Ok(AffineExpr::param(p, n_dim, n_param))
                } else {
                    Err(semantic_error(ParseErrorKind::UnknownName, format!("unknown name '{}'", name), expr.span))
                }
            }
            ExprKind::Neg(inner) => Ok(-self.affine(inner, vars)?),
            ExprKind::Binary { op, left, right } => {
                let l = self.affine(left, vars)?;
                let r = self.affine(right, vars)?;
                match op {
                    BinOp::Add => Ok(l + r),
                    BinOp::Sub => Ok(l - r),
                    BinOp::Mul => match (l.as_constant(), r.as_constant()) {
                        (Some(c), _) => Ok(r.scale(c)),
                        (_, Some(c)) => Ok(l.scale(c)),
                        _ => Err(non_affine("product of two non-constant terms", expr.span)),
                    },
                    BinOp::Div | BinOp::Mod => Err(non_affine(format!("'{}' is not affine", op), expr.span)),
                }
            }
            ExprKind::Float(_) => Err(non_affine("floating-point value in an affine expression", expr.span)),
            ExprKind::Call { func, .. } => Err(non_affine(format!("call to '{}' is not affine", func), expr.span)),
            ExprKind::Access { array, .. } => {
                Err(non_affine(format!("array element '{}' is not affine", array), expr.span))
            }
        }
    }
}

fn tuple_vars(tuple: &Tuple) -> Result<Vec<String>, ParseError> {
    tuple.var_names().ok_or_else(|| {
        semantic_error(ParseErrorKind::ExpectedIdentifier, "tuple elements must be variable names", tuple.span)
    })
}

fn body_op(op: BinOp) -> BodyOp {
    match op {
        BinOp::Add => BodyOp::Add,
        BinOp::Sub => BodyOp::Sub,
        BinOp::Mul => BodyOp::Mul,
        BinOp::Div => BodyOp::Div,
        BinOp::Mod => BodyOp::Mod,
    }
}

fn semantic_error(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> ParseError {
    ParseError { message: message.into(), span, kind, expected: Vec::new(), found: None }
}

fn non_affine(message: impl Into<String>, span: Span) -> ParseError {
    semantic_error(ParseErrorKind::NonAffine, message, span)
}

fn misplaced(message: impl Into<String>, span: Span) -> ParseError {
    semantic_error(ParseErrorKind::Misplaced, message, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::schedule::ScheduleNode;
    use crate::utils::errors::ScopErrorKind;

    fn set(source: &str) -> Result<UnionSet, ParseError> {
        let ast = Parser::new(Lexer::new(source))?.parse_set_only()?;
        Lowering::new(&mut IdContext::new()).union_set(&ast)
    }

    fn file(source: &str) -> Result<ScopProgram, PolyLearnError> {
        let ast = Parser::new(Lexer::new(source))?.parse_file()?;
        lower_file(&ast, "test")
    }

    fn parse_kind(err: PolyLearnError) -> ParseErrorKind {
        match err {
            PolyLearnError::Parse(e) => e.kind,
            other => panic!("expected a parse error, got {}", other),
        }
    }

    #[test]
    fn test_parametric_set() {
        let union = set("[N] -> { S[i, j] : 0 <= i < N and 0 <= j <= i }").unwrap();
        assert_eq!(union.len(), 1);
        let s = &union.sets[0];
        assert_eq!(s.tuple_id().unwrap().name(), "S");
        assert_eq!(s.dim_names(), vec!["i", "j"]);
        assert_eq!(s.param_names(), vec!["N"]);
        assert!(s.contains(&[2, 1], &[3]));
        assert!(!s.contains(&[2, 3], &[3]));
        assert!(!s.contains(&[3, 0], &[3]));
    }

    #[test]
    fn test_equality_and_implicit_multiplication() {
        let union = set("{ S[i] : 2i = 4 }").unwrap();
        let s = &union.sets[0];
        assert!(s.contains(&[2], &[]));
        assert!(!s.contains(&[1], &[]));
    }

    #[test]
    fn test_non_affine_and_unknown_names() {
        assert_eq!(set("{ S[i] : i * i >= 0 }").unwrap_err().kind, ParseErrorKind::NonAffine);
        assert_eq!(set("{ S[i] : i / 2 >= 0 }").unwrap_err().kind, ParseErrorKind::NonAffine);
        let err = set("{ S[i] : i < M }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownName);
        assert_eq!(err.span.start_column, 14);
        assert_eq!(set("{ S[i + 1] }").unwrap_err().kind, ParseErrorKind::ExpectedIdentifier);
    }

    #[test]
    fn test_map() {
        let mut ids = IdContext::new();
        let ast = Parser::new(Lexer::new("{ S[i] -> A[i + 1, 2i] }")).unwrap().parse_map_only().unwrap();
        let maps = Lowering::new(&mut ids).union_map(&ast).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].apply(&[3], &[]), vec![4, 6]);
        assert_eq!(maps[0].out_tuple(), ids.lookup("A"));
        assert_eq!(maps[0].in_tuple(), ids.lookup("S"));
    }

    #[test]
    fn test_constrained_map() {
        let mut ids = IdContext::new();
        let ast = Parser::new(Lexer::new("{ S[i] -> [i - 1] : i >= 1 }")).unwrap().parse_map_only().unwrap();
        let f = Lowering::new(&mut ids).pw_multi_aff(&ast).unwrap();
        assert_eq!(f.eval(&[3], &[]), Some(vec![2]));
        assert_eq!(f.eval(&[0], &[]), None);

        let err = Lowering::new(&mut ids).union_map(&ast).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Misplaced);
    }

    #[test]
    fn test_scop_file() {
        let program = file(
            "params N;\n\
             context [N] -> { : N >= 1 };\n\
             stmt [N] -> { S[i] : 0 <= i < N } { A[i] = A[i] + i; }\n\
             stmt { T[i] : 0 <= i < N } { B[i] += alpha * A[i]; }\n",
        )
        .unwrap();

        let scop = &program.scop;
        assert_eq!(scop.params, vec!["N"]);
        assert!(scop.context.contains(&[], &[1]));
        assert!(!scop.context.contains(&[], &[0]));
        assert_eq!(scop.n_stmt(), 2);

        let s = scop.stmt(0).unwrap();
        assert_eq!(s.accesses.len(), 3);
        assert!(s.accesses[2].array.is_none());

        let t = scop.stmt(1).unwrap();
        assert!(matches!(t.body, StmtBody::CompoundAssign { op: BodyOp::Add, .. }));
        assert_eq!(t.accesses[1].array.as_ref().map(|a| a.name()), Some("alpha"));
        assert_eq!(t.accesses[1].rank(), 0);
        assert_eq!(scop.arrays().len(), 3);

        assert!(matches!(program.schedule.root, ScheduleNode::Sequence(ref children) if children.len() == 2));
    }

    #[test]
    fn test_schedule_item() {
        let program = file(
            "stmt { S[i] : 0 <= i < 4 } { A[i] = 0; }\n\
             stmt { T[i] : 0 <= i < 4 } { B[i] = A[i]; }\n\
             schedule { S[i] -> [i, 0]; T[i] -> [i, 1] };\n",
        )
        .unwrap();
        assert!(matches!(program.schedule.root, ScheduleNode::Band(_)));

        let err = file("stmt { S[i] : 0 <= i < 4 } { A[i] = 0; }\nschedule { S[i] -> [i] : i >= 0 };").unwrap_err();
        assert_eq!(parse_kind(err), ParseErrorKind::Misplaced);
    }

    #[test]
    fn test_file_errors() {
        let err = file("stmt { S[i] : 0 <= i < 3 } { i = 0; }").unwrap_err();
        assert_eq!(parse_kind(err), ParseErrorKind::Misplaced);

        let err = file("params N;\nparams M;").unwrap_err();
        assert_eq!(parse_kind(err), ParseErrorKind::Misplaced);

        let err = file("params N;\nstmt [M] -> { S[i] : 0 <= i < M } { A[i] = 0; }").unwrap_err();
        assert_eq!(parse_kind(err), ParseErrorKind::UnknownName);

        let err = file("stmt { [i] : 0 <= i < 3 } { A[i] = 0; }").unwrap_err();
        assert_eq!(parse_kind(err), ParseErrorKind::Misplaced);

        let err = file(
            "stmt { S[i] : 0 <= i < 3 } { A[i] = 0; }\n\
             stmt { T[i] : 0 <= i < 3 } { A[i][i] = 0; }",
        )
        .unwrap_err();
        match err {
            PolyLearnError::Scop(e) => {
                assert_eq!(e.kind, ScopErrorKind::RankMismatch);
                assert_eq!(e.span.map(|s| s.start_line), Some(2));
            }
            other => panic!("expected a SCoP error, got {}", other),
        }
    }
}
