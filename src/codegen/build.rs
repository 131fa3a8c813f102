//! Scanning a schedule tree into an AST.
//!
//! Every statement reaching a band member gets a constraint system over its
//! domain variables and the loop counters built so far. Member `k` adds the
//! counter `ck` with `ck = f(i)`; the domain variables are projected out
//! (Fourier-Motzkin) and the bounds left on `ck` become the loop bounds.
//! A member with the same value for every statement becomes a constant
//! instead of a loop, and statements pinned to different constants are
//! emitted one after another.
//!
//! The builder keeps the ranges of the enclosing loops (and the context) as
//! a constraint system. A bound or guard those ranges already imply is
//! dropped; the check is a Fourier-Motzkin emptiness test.
//!
//! At each leaf the hook passed to [`AstBuilder::node_from`] sees the user
//! node together with an [`AstBuild`], which exposes the schedule of the
//! leaf as a relation `{ S[i] -> [c] }` and turns affine functions of the
//! counters into AST expressions.

use crate::codegen::ast::{AstBinOp, AstExpr, AstNode, NodeId, UserNode};
use crate::polyhedral::constraint::{split_signs, Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::id::TupleId;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::operations::{var_bounds, Bound, VarBounds};
use crate::polyhedral::pw_aff::{Piece, PwMultiAff};
use crate::polyhedral::relation::BasicMap;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::Space;
use crate::schedule::{BandNode, Schedule, ScheduleNode};
use crate::utils::errors::CodegenError;
use crate::utils::matrix::RationalMatrix;
use log::{debug, trace};
use num_integer::Integer;
use std::collections::{BTreeMap, VecDeque};

/// A loop counter; `value` is set when the counter is a constant of the
/// enclosing counters instead of a loop.
#[derive(Debug, Clone, PartialEq)]
struct Counter {
    name: String,
    value: Option<AffineExpr>,
}

/// The counters in scope and the parameter names.
#[derive(Debug, Clone, Default, PartialEq)]
struct Counters {
    stack: Vec<Counter>,
    param_names: Vec<String>,
}

impl Counters {
    fn len(&self) -> usize {
        self.stack.len()
    }

    fn names(&self) -> Vec<String> {
        self.stack.iter().map(|c| c.name.clone()).collect()
    }

    /// Replace fixed counters by their values.
    fn resolve(&self, e: &AffineExpr) -> AffineExpr {
        let mut e = e.clone();
        for k in (0..e.n_dim()).rev() {
            if e.coeff(k) == 0 {
                continue;
            }
            if let Some(value) = self.stack.get(k).and_then(|c| c.value.as_ref()) {
                e = e.substitute(k, &value.resize_dims(e.n_dim()));
            }
        }
        e
    }

    /// Positive terms first, then negative terms, then the constant.
    fn expr(&self, e: &AffineExpr) -> AstExpr {
        let e = self.resolve(e);
        let mut terms: Vec<(i64, AstExpr)> = Vec::new();
        for (k, &c) in e.coeffs.iter().enumerate() {
            if c != 0 {
                let name = self.stack.get(k).map(|c| c.name.clone()).unwrap_or_else(|| format!("c{}", k));
                terms.push((c, AstExpr::Var(name)));
            }
        }
        for (p, &c) in e.param_coeffs.iter().enumerate() {
            if c != 0 {
                let name = self.param_names.get(p).cloned().unwrap_or_else(|| format!("p{}", p));
                terms.push((c, AstExpr::Var(name)));
            }
        }

        let scaled = |c: i64, v: AstExpr| if c == 1 { v } else { AstExpr::int(c).mul(v) };
        let mut acc: Option<AstExpr> = None;
        for (c, v) in terms.iter().filter(|(c, _)| *c > 0) {
            let term = scaled(*c, v.clone());
            acc = Some(match acc {
                None => term,
                Some(a) => a.add(term),
            });
        }
        for (c, v) in terms.iter().filter(|(c, _)| *c < 0) {
            acc = Some(match acc {
                None if *c == -1 => AstExpr::Neg(Box::new(v.clone())),
                None => scaled(*c, v.clone()),
                Some(a) => a.sub(scaled(-c, v.clone())),
            });
        }

        match acc {
            None => AstExpr::Int(e.constant),
            Some(a) if e.constant > 0 => a.add(AstExpr::Int(e.constant)),
            Some(a) if e.constant < 0 => a.sub(AstExpr::Int(-e.constant)),
            Some(a) => a,
        }
    }

    fn bound_expr(&self, bound: &Bound, lower: bool) -> AstExpr {
        match bound.as_affine() {
            Some(e) => self.expr(&e),
            None if lower => AstExpr::CeilDiv(Box::new(self.expr(&bound.expr)), bound.div),
            None => AstExpr::FloorDiv(Box::new(self.expr(&bound.expr)), bound.div),
        }
    }

    /// Conjunction of `constraints`; constant truths are dropped.
    fn condition(&self, constraints: &[Constraint]) -> Option<AstExpr> {
        let mut cond: Option<AstExpr> = None;
        for c in constraints {
            let resolved = Constraint::new(self.resolve(&c.expr), c.kind);
            if resolved.is_trivially_true() {
                continue;
            }
            let (pos, neg) = split_signs(&resolved.expr);
            let atom = match resolved.kind {
                ConstraintKind::Equality => AstExpr::binary(AstBinOp::Eq, self.expr(&pos), self.expr(&neg)),
                // `5 >= c0` reads better as `c0 <= 5`
                ConstraintKind::Inequality if pos.is_constant() && !neg.is_constant() => {
                    AstExpr::binary(AstBinOp::Le, self.expr(&neg), self.expr(&pos))
                }
                ConstraintKind::Inequality => AstExpr::binary(AstBinOp::Ge, self.expr(&pos), self.expr(&neg)),
            };
            cond = Some(match cond {
                None => atom,
                Some(prev) => prev.and(atom),
            });
        }
        cond
    }
}

/// The build state handed to the `at_each_domain` hook.
#[derive(Debug, Clone, PartialEq)]
pub struct AstBuild {
    counters: Counters,
    schedule: BasicMap,
}

impl AstBuild {
    /// The schedule of the current leaf, `{ S[i] -> [c0, ..., cn] }`,
    /// restricted to the statement domain.
    pub fn schedule(&self) -> &BasicMap {
        &self.schedule
    }

    /// Number of loop counters in scope.
    pub fn depth(&self) -> usize {
        self.counters.len()
    }

    pub fn counter_names(&self) -> Vec<String> {
        self.counters.names()
    }

    /// An affine function of the counters as an AST expression.
    pub fn expr_from_aff(&self, e: &AffineExpr) -> AstExpr {
        self.counters.expr(e)
    }

    /// A set over the counters as a condition, `None` when it always holds.
    pub fn condition_from_set(&self, set: &IntegerSet) -> Option<AstExpr> {
        self.counters.condition(&set.constraints.constraints)
    }

    /// The AST expression of an access whose index is given over the
    /// counters. With `array` it is `A[e0][e1]...`; without, the single
    /// output of `index`. Several pieces become a chain of selects.
    pub fn access_expr(&self, array: Option<&TupleId>, index: &PwMultiAff) -> Option<AstExpr> {
        let value_of = |piece: &Piece| -> Option<AstExpr> {
            let mut outs: Vec<AstExpr> = piece.value.outputs.iter().map(|o| self.expr_from_aff(o)).collect();
            match array {
                Some(a) => Some(AstExpr::Access { array: a.clone(), indices: outs }),
                None if outs.len() == 1 => outs.pop(),
                None => None,
            }
        };
        let (last, rest) = index.pieces.split_last()?;
        let mut expr = value_of(last)?;
        for piece in rest.iter().rev() {
            let then = value_of(piece)?;
            expr = match self.condition_from_set(&piece.domain) {
                Some(cond) => AstExpr::Select {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(expr),
                },
                None => then,
            };
        }
        Some(expr)
    }
}

/// Hook called once per leaf while the AST is built.
///
/// It receives the freshly created user node and returns the node that is
/// placed in the tree. An error aborts the build.
pub trait AtEachDomain {
    fn at_each_domain(&mut self, node: UserNode, build: &AstBuild) -> Result<UserNode, CodegenError>;
}

impl<F> AtEachDomain for F
where
    F: FnMut(UserNode, &AstBuild) -> Result<UserNode, CodegenError>,
{
    fn at_each_domain(&mut self, node: UserNode, build: &AstBuild) -> Result<UserNode, CodegenError> {
        self(node, build)
    }
}

/// A statement being scanned.
#[derive(Debug, Clone)]
struct Active {
    id: TupleId,
    /// Statement domain intersected with the context
    domain: IntegerSet,
    /// Constraints over `[i | c0 .. c(depth-1)]`
    system: ConstraintSystem,
    /// One schedule row per counter, over the domain variables
    rows: Vec<AffineExpr>,
    /// Rows of the current band not scanned yet
    pending: VecDeque<AffineExpr>,
    /// Conditions over the counters, checked at the leaf
    guards: Vec<Constraint>,
}

impl Active {
    fn n_in(&self) -> usize {
        self.domain.dim()
    }

    fn n_param(&self) -> usize {
        self.domain.n_param()
    }
}

/// Builds an AST from a schedule tree.
#[derive(Debug, Default)]
pub struct AstBuilder {
    context: Option<IntegerSet>,
    counters: Counters,
    /// Facts over `[c0 .. c(depth-1)]` and the parameters
    known: ConstraintSystem,
    next_node: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constraints on the parameters assumed to hold.
    pub fn with_context(mut self, context: IntegerSet) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the AST of `schedule`, calling `hook` at every leaf.
    ///
    /// Returns a single node, or a block when the top level has several.
    pub fn node_from(&mut self, schedule: &Schedule, hook: &mut dyn AtEachDomain) -> Result<AstNode, CodegenError> {
        self.counters = Counters {
            stack: Vec::new(),
            param_names: schedule.domain.sets.first().map(|s| s.param_names()).unwrap_or_default(),
        };
        self.next_node = 0;
        let n_param = schedule.domain.sets.first().map_or(0, |s| s.n_param());
        self.known = ConstraintSystem::new(0, n_param);
        let assumed: Vec<Constraint> = self
            .context
            .iter()
            .filter(|ctx| ctx.dim() == 0)
            .flat_map(|ctx| ctx.constraints.constraints.iter().cloned())
            .collect();
        for c in assumed {
            self.assume(c);
        }

        let actives = schedule
            .domain
            .iter()
            .map(|set| self.activate(set))
            .collect::<Result<Vec<_>, _>>()?;
        let mut nodes = self.scan(actives, &schedule.root, hook)?;
        debug!("built AST with {} leaves", self.next_node);

        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            AstNode::Block { statements: nodes }
        })
    }

    fn activate(&self, set: &IntegerSet) -> Result<Active, CodegenError> {
        let id = set
            .tuple_id()
            .cloned()
            .ok_or_else(|| CodegenError::malformed(set, "statement domain has no tuple identity"))?;
        let domain = match &self.context {
            Some(ctx) if ctx.n_param() == set.n_param() => set.intersect_params(ctx),
            Some(_) => return Err(CodegenError::malformed(&id, "context parameters differ from the domain")),
            None => set.clone(),
        };
        Ok(Active {
            id,
            system: domain.constraints.normalize(),
            domain,
            rows: Vec::new(),
            pending: VecDeque::new(),
            guards: Vec::new(),
        })
    }

    fn scan(
        &mut self,
        actives: Vec<Active>,
        node: &ScheduleNode,
        hook: &mut dyn AtEachDomain,
    ) -> Result<Vec<AstNode>, CodegenError> {
        if actives.is_empty() {
            return Ok(Vec::new());
        }
        match node {
            ScheduleNode::Band(band) => {
                let actives = enter_band(actives, band)?;
                self.scan_rows(actives, &band.child, hook)
            }
            ScheduleNode::Sequence(children) => {
                let mut out = Vec::new();
                for child in children {
                    out.extend(self.scan(actives.clone(), child, hook)?);
                }
                Ok(out)
            }
            ScheduleNode::Filter { filter, child } => {
                let actives = actives.into_iter().filter(|a| filter.contains(&a.id)).collect();
                self.scan(actives, child, hook)
            }
            ScheduleNode::Leaf => self.leaf(actives, hook),
        }
    }

    /// Scan the next pending row of every active statement, then `rest`.
    fn scan_rows(
        &mut self,
        actives: Vec<Active>,
        rest: &ScheduleNode,
        hook: &mut dyn AtEachDomain,
    ) -> Result<Vec<AstNode>, CodegenError> {
        if actives.first().map_or(true, |a| a.pending.is_empty()) {
            return self.scan(actives, rest, hook);
        }

        let depth = self.counters.len();
        let name = format!("c{}", depth);
        let mut live = Vec::with_capacity(actives.len());
        let mut bounds = Vec::with_capacity(actives.len());
        for mut a in actives {
            let row = a
                .pending
                .pop_front()
                .ok_or_else(|| CodegenError::malformed(&a.id, "band has fewer members than for other statements"))?;
            let (n_in, n_param) = (a.n_in(), a.n_param());
            a.system = a.system.add_dims(1);
            let total = a.system.n_dim;
            a.system.add(Constraint::eq(AffineExpr::var(n_in + depth, total, n_param), row.resize_dims(total)));
            a.rows.push(row);

            let projected = a.system.project_out(0, n_in).normalize();
            if projected.is_obviously_infeasible() {
                trace!("{} has no instances at {}", a.id, name);
                continue;
            }
            let b = var_bounds(&projected, depth);
            if b.lowers.is_empty() || b.uppers.is_empty() {
                return Err(CodegenError::malformed(&a.id, format!("{} is unbounded", name)));
            }
            bounds.push(b);
            live.push(a);
        }
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let fixed: Vec<Option<AffineExpr>> =
            bounds.iter().map(|b| b.fixed.as_ref().map(|e| e.drop_dims(depth, 1))).collect();
        if let Some(Some(first)) = fixed.first() {
            if fixed.iter().all(|f| f.as_ref() == Some(first)) {
                return self.fixed_counter(live, name, first.clone(), rest, hook);
            }
        }
        let constants: Option<Vec<i64>> = fixed.iter().map(|f| f.as_ref().and_then(|e| e.as_constant())).collect();
        if let Some(constants) = constants {
            let n_param = live[0].n_param();
            let mut groups: BTreeMap<i64, Vec<Active>> = BTreeMap::new();
            for (a, v) in live.into_iter().zip(constants) {
                groups.entry(v).or_default().push(a);
            }
            let mut out = Vec::new();
            for (v, group) in groups {
                let value = AffineExpr::constant(v, depth, n_param);
                out.extend(self.fixed_counter(group, name.clone(), value, rest, hook)?);
            }
            return Ok(out);
        }

        self.emit_loop(live, &bounds, name, rest, hook)
    }

    /// Pin the next counter to `value` (over the enclosing counters).
    fn fixed_counter(
        &mut self,
        mut actives: Vec<Active>,
        name: String,
        value: AffineExpr,
        rest: &ScheduleNode,
        hook: &mut dyn AtEachDomain,
    ) -> Result<Vec<AstNode>, CodegenError> {
        let depth = self.counters.len();
        for a in &mut actives {
            let n_in = a.n_in();
            let v = value.insert_dims(0, n_in).resize_dims(a.system.n_dim);
            a.system = a.system.substitute(n_in + depth, &v).normalize();
        }
        trace!("{} = {}", name, self.counters.expr(&value));
        let saved = self.known.clone();
        self.known = self.known.add_dims(1);
        let counter = AffineExpr::var(depth, depth + 1, value.n_param());
        self.assume(Constraint::eq(counter, value.resize_dims(depth + 1)));

        self.counters.stack.push(Counter { name, value: Some(value) });
        let res = self.scan_rows(actives, rest, hook);
        self.counters.stack.pop();
        self.known = saved;
        res
    }

    fn emit_loop(
        &mut self,
        mut actives: Vec<Active>,
        bounds: &[VarBounds],
        name: String,
        rest: &ScheduleNode,
        hook: &mut dyn AtEachDomain,
    ) -> Result<Vec<AstNode>, CodegenError> {
        let depth = self.counters.len();
        let n_param = actives[0].n_param();
        let counter = AffineExpr::var(depth, depth + 1, n_param);
        let lower_guard = |b: &Bound| Constraint::ge_zero(counter.scale(b.div) - b.expr.clone());
        let upper_guard = |b: &Bound| Constraint::ge_zero(b.expr.clone() - counter.scale(b.div));

        let saved = self.known.clone();
        self.known = self.known.add_dims(1);

        let same = bounds.windows(2).all(|w| same_bounds(&w[0], &w[1]));
        let (lower, upper, strict) = if same {
            let lowers = self.prune(&bounds[0].lowers, true);
            let uppers = self.prune(&bounds[0].uppers, false);
            self.assume_range(&counter, &lowers, &uppers);
            let (upper, strict) = self.upper_of(&uppers);
            (self.lower_of(&lowers), upper, strict)
        } else if let Some(ranges) = constant_ranges(bounds) {
            let lo = ranges.iter().map(|r| r.0).min().unwrap_or(0);
            let hi = ranges.iter().map(|r| r.1).max().unwrap_or(0);
            for (a, &(a_lo, a_hi)) in actives.iter_mut().zip(&ranges) {
                if a_lo > lo {
                    a.guards.push(lower_guard(&Bound::exact(AffineExpr::constant(a_lo, depth + 1, n_param))));
                }
                if a_hi < hi {
                    a.guards.push(upper_guard(&Bound::exact(AffineExpr::constant(a_hi, depth + 1, n_param))));
                }
            }
            let constant = |v: i64| vec![Bound::exact(AffineExpr::constant(v, depth + 1, n_param))];
            self.assume_range(&counter, &constant(lo), &constant(hi));
            (AstExpr::Int(lo), AstExpr::Int(hi), false)
        } else {
            // min over statements of their lower bounds, max of the uppers
            let lowers: Vec<Vec<Bound>> = bounds.iter().map(|b| self.prune(&b.lowers, true)).collect();
            let uppers: Vec<Vec<Bound>> = bounds.iter().map(|b| self.prune(&b.uppers, false)).collect();
            for (a, (l, u)) in actives.iter_mut().zip(lowers.iter().zip(&uppers)) {
                a.guards.extend(l.iter().map(&lower_guard));
                a.guards.extend(u.iter().map(&upper_guard));
            }
            let (lower, lower_part) = self.hull(&lowers, true);
            let (upper, upper_part) = self.hull(&uppers, false);
            self.assume_range(
                &counter,
                lower_part.as_deref().unwrap_or_default(),
                upper_part.as_deref().unwrap_or_default(),
            );
            match upper_part {
                Some(part) => {
                    let (upper, strict) = self.upper_of(&part);
                    (lower, upper, strict)
                }
                None => (lower, upper, false),
            }
        };

        trace!("for {} from {} to {}", name, lower, upper);
        self.counters.stack.push(Counter { name: name.clone(), value: None });
        let body = self.scan_rows(actives, rest, hook);
        self.counters.stack.pop();
        self.known = saved;
        let body = body?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![AstNode::For { iterator: name, lower, upper, strict, step: 1, body }])
    }

    /// The hull of per-statement bounds: `min` of the lower bounds (each a
    /// `max`) or `max` of the upper bounds (each a `min`). When a single
    /// statement's bounds remain they are returned as well.
    fn hull(&self, parts: &[Vec<Bound>], lower: bool) -> (AstExpr, Option<Vec<Bound>>) {
        let mut parts = parts.to_vec();
        if parts.iter().all(|p| p.len() == 1) {
            let singles: Vec<Bound> = parts.iter().map(|p| p[0].clone()).collect();
            parts = self.prune(&singles, !lower).into_iter().map(|b| vec![b]).collect();
        }
        let exprs = parts
            .iter()
            .map(|p| {
                let inner = dedup(p.iter().map(|b| self.counters.bound_expr(b, lower)).collect());
                if lower {
                    AstExpr::max_of(inner)
                } else {
                    AstExpr::min_of(inner)
                }
            })
            .collect();
        let exprs = dedup(exprs);
        let expr = if lower { AstExpr::min_of(exprs) } else { AstExpr::max_of(exprs) };
        let single = match parts.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };
        (expr, single)
    }

    /// Drop the bounds another one makes redundant. With `keep_larger` the
    /// bounds are operands of a `max`, otherwise of a `min`.
    fn prune(&self, bounds: &[Bound], keep_larger: bool) -> Vec<Bound> {
        let beats = |x: &Bound, y: &Bound| if keep_larger { self.bound_ge(x, y) } else { self.bound_ge(y, x) };
        let mut kept: Vec<Bound> = Vec::with_capacity(bounds.len());
        for b in bounds {
            if kept.iter().any(|k| beats(k, b)) {
                continue;
            }
            kept.retain(|k| !beats(b, k));
            kept.push(b.clone());
        }
        kept
    }

    /// `a >= b` for two bounds of the same side; rounding keeps the order.
    fn bound_ge(&self, a: &Bound, b: &Bound) -> bool {
        self.implies_nonneg(&(a.expr.scale(b.div) - b.expr.scale(a.div)))
    }

    /// Whether `e >= 0` holds wherever the enclosing loops run.
    fn implies_nonneg(&self, e: &AffineExpr) -> bool {
        if let Some(v) = e.as_constant() {
            return v >= 0;
        }
        let (n_dim, n_param) = (self.known.n_dim, self.known.n_param);
        if e.n_param() != n_param || e.coeffs.iter().skip(n_dim).any(|&c| c != 0) {
            return false;
        }
        let mut sys = self.known.clone();
        sys.add(Constraint::ge_zero(-e.resize_dims(n_dim) - AffineExpr::constant(1, n_dim, n_param)));
        is_infeasible(&sys)
    }

    fn implies(&self, c: &Constraint) -> bool {
        match c.kind {
            ConstraintKind::Inequality => self.implies_nonneg(&c.expr),
            ConstraintKind::Equality => self.implies_nonneg(&c.expr) && self.implies_nonneg(&-c.expr.clone()),
        }
    }

    /// Record a fact over the counters in scope; facts over other
    /// parameters are ignored.
    fn assume(&mut self, c: Constraint) {
        if c.n_param() == self.known.n_param && c.n_dim() <= self.known.n_dim {
            let expr = c.expr.resize_dims(self.known.n_dim);
            self.known.add(Constraint::new(expr, c.kind));
        }
    }

    /// `lowers <= counter <= uppers`, all of them holding at once.
    fn assume_range(&mut self, counter: &AffineExpr, lowers: &[Bound], uppers: &[Bound]) {
        for l in lowers {
            self.assume(Constraint::ge_zero(counter.scale(l.div) - l.expr.clone()));
        }
        for u in uppers {
            self.assume(Constraint::ge_zero(u.expr.clone() - counter.scale(u.div)));
        }
    }

    fn lower_of(&self, lowers: &[Bound]) -> AstExpr {
        AstExpr::max_of(dedup(lowers.iter().map(|b| self.counters.bound_expr(b, true)).collect()))
    }

    /// The upper bound, printed as `c < e + 1` when it is a single
    /// non-constant affine expression with a negative constant term.
    fn upper_of(&self, uppers: &[Bound]) -> (AstExpr, bool) {
        if let [single] = uppers {
            if let Some(e) = single.as_affine() {
                let e = self.counters.resolve(&e);
                if !e.is_constant() && e.constant < 0 {
                    let mut plus_one = e;
                    plus_one.constant += 1;
                    return (self.counters.expr(&plus_one), true);
                }
            }
        }
        let exprs = uppers.iter().map(|b| self.counters.bound_expr(b, false)).collect();
        (AstExpr::min_of(dedup(exprs)), false)
    }

    fn leaf(&mut self, actives: Vec<Active>, hook: &mut dyn AtEachDomain) -> Result<Vec<AstNode>, CodegenError> {
        if actives.len() > 1 {
            let mut out = Vec::new();
            for a in actives {
                out.extend(self.leaf(vec![a], hook)?);
            }
            return Ok(out);
        }
        let Some(mut active) = actives.into_iter().next() else {
            return Ok(Vec::new());
        };

        // complete the schedule with the domain dimensions it does not
        // determine yet
        let missing = completion_rows(&active.rows, active.n_in(), active.n_param());
        if !missing.is_empty() {
            trace!("completing schedule of {} with {} dimension(s)", active.id, missing.len());
            active.pending.extend(missing);
            return self.scan_rows(vec![active], &ScheduleNode::Leaf, hook);
        }

        let node = self.user_node(active, hook)?;
        Ok(vec![node])
    }

    fn user_node(&mut self, active: Active, hook: &mut dyn AtEachDomain) -> Result<AstNode, CodegenError> {
        let depth = self.counters.len();
        let mut range = Space::set_with_params(depth, active.n_param()).with_dim_names(self.counters.names());
        range.param_names = active.domain.space.param_names.clone();
        let map = AffineMap::with_space(Space::map_from(&active.domain.space, &range), active.rows.clone());
        let schedule = BasicMap::from_affine_map(&map, &active.domain);

        let inverse = schedule
            .reverse()
            .as_pw_multi_aff()
            .map_err(|e| CodegenError::malformed(&active.id, format!("schedule cannot be inverted: {}", e)))?;
        let piece = inverse
            .pieces
            .first()
            .ok_or_else(|| CodegenError::malformed(&active.id, "inverse schedule is empty"))?;
        let mut args = vec![AstExpr::Id(active.id.clone())];
        args.extend(piece.value.outputs.iter().map(|o| self.counters.expr(o)));

        let id = NodeId(self.next_node);
        self.next_node += 1;
        let build = AstBuild { counters: self.counters.clone(), schedule };
        let node = hook.at_each_domain(UserNode::new(id, AstExpr::Call(args)), &build)?;
        trace!("leaf {} {}", id, node.expr);

        let user = AstNode::User(node);
        let guards: Vec<Constraint> = active.guards.iter().filter(|g| !self.implies(g)).cloned().collect();
        Ok(match self.counters.condition(&guards) {
            Some(condition) => AstNode::If { condition, then_body: vec![user], else_body: None },
            None => user,
        })
    }
}

fn enter_band(mut actives: Vec<Active>, band: &BandNode) -> Result<Vec<Active>, CodegenError> {
    let n_member = band.n_member();
    for a in &mut actives {
        let map = band
            .partial_for(&a.id)
            .ok_or_else(|| CodegenError::malformed(&a.id, "band has no partial schedule for the statement"))?;
        if map.n_in() != a.n_in() {
            return Err(CodegenError::malformed(
                &a.id,
                format!("partial schedule has {} inputs, domain has {}", map.n_in(), a.n_in()),
            ));
        }
        if map.n_out() != n_member {
            return Err(CodegenError::malformed(
                &a.id,
                format!("partial schedule has {} members, band has {}", map.n_out(), n_member),
            ));
        }
        if map.n_param() != a.n_param() {
            return Err(CodegenError::malformed(&a.id, "partial schedule parameters differ from the domain"));
        }
        a.pending.extend(map.outputs.iter().cloned());
    }
    Ok(actives)
}

/// Identity rows for the domain dimensions `rows` leaves undetermined.
fn completion_rows(rows: &[AffineExpr], n_in: usize, n_param: usize) -> Vec<AffineExpr> {
    if n_in == 0 {
        return Vec::new();
    }
    let mut matrix: Vec<Vec<i64>> = rows.iter().map(|r| r.coeffs.clone()).collect();
    let mut rank = rank_of(&matrix);
    let mut out = Vec::new();
    for k in 0..n_in {
        if rank == n_in {
            break;
        }
        let mut unit = vec![0; n_in];
        unit[k] = 1;
        matrix.push(unit);
        let r = rank_of(&matrix);
        if r > rank {
            rank = r;
            out.push(AffineExpr::var(k, n_in, n_param));
        } else {
            matrix.pop();
        }
    }
    out
}

fn rank_of(rows: &[Vec<i64>]) -> usize {
    if rows.is_empty() {
        0
    } else {
        RationalMatrix::from_vec(rows.to_vec()).rank()
    }
}

fn same_bounds(a: &VarBounds, b: &VarBounds) -> bool {
    let covers = |x: &[Bound], y: &[Bound]| x.len() == y.len() && x.iter().all(|e| y.contains(e));
    covers(&a.lowers, &b.lowers) && covers(&a.uppers, &b.uppers)
}

/// `[lo, hi]` per statement when every bound is a constant.
fn constant_ranges(bounds: &[VarBounds]) -> Option<Vec<(i64, i64)>> {
    bounds
        .iter()
        .map(|b| {
            let lo = b
                .lowers
                .iter()
                .map(|l| l.expr.as_constant().map(|v| -Integer::div_floor(&-v, &l.div)))
                .collect::<Option<Vec<i64>>>()?
                .into_iter()
                .max()?;
            let hi = b
                .uppers
                .iter()
                .map(|u| u.expr.as_constant().map(|v| Integer::div_floor(&v, &u.div)))
                .collect::<Option<Vec<i64>>>()?
                .into_iter()
                .min()?;
            Some((lo, hi))
        })
        .collect()
}

/// Emptiness of `sys` over the rationals, with the parameters eliminated
/// like the dimensions. An empty shadow proves there is no integer point.
fn is_infeasible(sys: &ConstraintSystem) -> bool {
    let n = sys.n_dim + sys.n_param;
    let mut flat = ConstraintSystem::new(n, 0);
    for c in &sys.constraints {
        let mut coeffs = c.expr.coeffs.clone();
        coeffs.extend_from_slice(&c.expr.param_coeffs);
        let expr = AffineExpr { constant: c.expr.constant, coeffs, param_coeffs: Vec::new() };
        flat.add(Constraint::new(expr, c.kind));
    }
    flat.project_out(0, n).normalize().is_obviously_infeasible()
}

fn dedup(exprs: Vec<AstExpr>) -> Vec<AstExpr> {
    let mut out: Vec<AstExpr> = Vec::with_capacity(exprs.len());
    for e in exprs {
        if !out.contains(&e) {
            out.push(e);
        }
    }
    out
}
