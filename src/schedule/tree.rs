//! Schedule trees.
//!
//! A schedule tree orders statement instances. Band nodes carry one
//! partial schedule per statement; every output of those maps becomes a
//! loop counter during AST building. Sequence nodes order their children,
//! filter nodes select statements and leaves end a branch.

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::id::TupleId;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::set::UnionSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::CodegenError;
use std::collections::HashMap;
use std::fmt;

/// A band: partial schedules, one per statement, with equal output arity.
#[derive(Debug, Clone, PartialEq)]
pub struct BandNode {
    pub partial: Vec<AffineMap>,
    pub child: Box<ScheduleNode>,
}

impl BandNode {
    /// Number of band members.
    pub fn n_member(&self) -> usize {
        self.partial.first().map(|m| m.n_out()).unwrap_or(0)
    }

    /// The partial schedule of statement `id`.
    pub fn partial_for(&self, id: &TupleId) -> Option<&AffineMap> {
        self.partial.iter().find(|m| m.in_tuple() == Some(id))
    }
}

/// A node of the schedule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleNode {
    Band(BandNode),
    Sequence(Vec<ScheduleNode>),
    Filter {
        filter: Vec<TupleId>,
        child: Box<ScheduleNode>,
    },
    Leaf,
}

impl ScheduleNode {
    pub fn band(partial: Vec<AffineMap>, child: ScheduleNode) -> Self {
        ScheduleNode::Band(BandNode { partial, child: Box::new(child) })
    }

    pub fn filter(filter: Vec<TupleId>, child: ScheduleNode) -> Self {
        ScheduleNode::Filter { filter, child: Box::new(child) }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            ScheduleNode::Band(band) => {
                let maps: Vec<String> = band.partial.iter().map(|m| m.to_string()).collect();
                writeln!(f, "{}band: {}", prefix, maps.join("; "))?;
                band.child.fmt_indented(f, indent + 1)
            }
            ScheduleNode::Sequence(children) => {
                writeln!(f, "{}sequence", prefix)?;
                for child in children {
                    child.fmt_indented(f, indent + 1)?;
                }
                Ok(())
            }
            ScheduleNode::Filter { filter, child } => {
                let names: Vec<String> = filter.iter().map(|id| id.to_string()).collect();
                writeln!(f, "{}filter: {{ {} }}", prefix, names.join(", "))?;
                child.fmt_indented(f, indent + 1)
            }
            ScheduleNode::Leaf => writeln!(f, "{}leaf", prefix),
        }
    }
}

/// A schedule: the instances to run and the tree ordering them.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub domain: UnionSet,
    pub root: ScheduleNode,
}

impl Schedule {
    /// A schedule without bands; statements are scanned in domain order.
    pub fn from_domain(domain: UnionSet) -> Self {
        Self { domain, root: ScheduleNode::Leaf }
    }

    /// One band whose partial schedules are `maps`.
    ///
    /// Every map must start from a statement of `domain` and all must have
    /// the same number of outputs.
    pub fn from_union_map(domain: UnionSet, maps: Vec<AffineMap>) -> Result<Self, CodegenError> {
        let arity = maps.first().map(|m| m.n_out()).unwrap_or(0);
        for map in &maps {
            let Some(id) = map.in_tuple() else {
                return Err(CodegenError::malformed(map, "schedule map has no statement tuple"));
            };
            let Some(set) = domain.find(id) else {
                return Err(CodegenError::malformed(id, "schedule names an unknown statement"));
            };
            if map.n_in() != set.dim() {
                return Err(CodegenError::malformed(
                    id,
                    format!("schedule has {} inputs, domain has {}", map.n_in(), set.dim()),
                ));
            }
            if map.n_out() != arity {
                return Err(CodegenError::malformed(
                    id,
                    format!("schedule has {} outputs, expected {}", map.n_out(), arity),
                ));
            }
        }
        Ok(Self { domain, root: ScheduleNode::band(maps, ScheduleNode::Leaf) })
    }

    /// Statements one after another, each scanned in its own domain order.
    pub fn sequential(domain: UnionSet) -> Self {
        let children = domain
            .iter()
            .filter_map(|set| {
                let id = set.tuple_id()?.clone();
                let child = if set.dim() == 0 {
                    ScheduleNode::Leaf
                } else {
                    ScheduleNode::band(vec![identity_schedule(set.space.clone())], ScheduleNode::Leaf)
                };
                Some(ScheduleNode::filter(vec![id], child))
            })
            .collect();
        Self { domain, root: ScheduleNode::Sequence(children) }
    }

    /// Flatten the tree into one schedule map per statement.
    ///
    /// Sequence positions become constant dimensions and shorter schedules
    /// are padded with zeros, so all maps have the same number of outputs.
    pub fn to_union_map(&self) -> Result<Vec<AffineMap>, CodegenError> {
        let ids = self.domain.tuple_ids();
        let mut rows: HashMap<TupleId, Vec<AffineExpr>> = HashMap::new();
        let mut flat = Vec::new();
        flatten(&self.domain, &self.root, ids, &mut rows, &mut flat)?;

        let arity = flat.iter().map(|(_, r)| r.len()).max().unwrap_or(0);
        let mut maps = Vec::with_capacity(flat.len());
        for (id, mut outputs) in flat {
            let Some(set) = self.domain.find(&id) else { continue };
            while outputs.len() < arity {
                outputs.push(AffineExpr::zero(set.dim(), set.n_param()));
            }
            let mut range = Space::set_with_params(arity, set.n_param());
            range.param_names = set.space.param_names.clone();
            maps.push(AffineMap::with_space(Space::map_from(&set.space, &range), outputs));
        }
        Ok(maps)
    }

    /// Number of statements the schedule covers.
    pub fn n_stmt(&self) -> usize {
        self.domain.len()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "domain: {}", self.domain)?;
        self.root.fmt_indented(f, 0)
    }
}

/// Print schedule maps as one union, `{ S[i] -> [0, i]; T[j] -> [1, j] }`.
pub fn format_union_map(maps: &[AffineMap]) -> String {
    let params = maps.first().map(|m| m.space.all_param_names()).unwrap_or_default();
    let bodies: Vec<String> = maps
        .iter()
        .map(|m| {
            let text = m.to_string();
            let start = text.find("{ ").map(|p| p + 2).unwrap_or(0);
            let end = text.rfind(" }").unwrap_or(text.len());
            text[start..end].to_string()
        })
        .collect();
    let prefix = if params.is_empty() { String::new() } else { format!("[{}] -> ", params.join(", ")) };
    format!("{}{{ {} }}", prefix, bodies.join("; "))
}

/// `{ S[i, j] -> [i, j] }` over the statement space.
pub(crate) fn identity_schedule(domain: Space) -> AffineMap {
    let (n, n_param) = (domain.n_dim, domain.n_param);
    let mut range = Space::set_with_params(n, n_param);
    range.param_names = domain.param_names.clone();
    let outputs = (0..n).map(|k| AffineExpr::var(k, n, n_param)).collect();
    AffineMap::with_space(Space::map_from(&domain, &range), outputs)
}

fn flatten(
    domain: &UnionSet,
    node: &ScheduleNode,
    ids: Vec<TupleId>,
    rows: &mut HashMap<TupleId, Vec<AffineExpr>>,
    out: &mut Vec<(TupleId, Vec<AffineExpr>)>,
) -> Result<(), CodegenError> {
    match node {
        ScheduleNode::Band(band) => {
            let saved = rows.clone();
            for id in &ids {
                let map = band
                    .partial_for(id)
                    .ok_or_else(|| CodegenError::malformed(id, "band has no partial schedule"))?;
                rows.entry(id.clone()).or_default().extend(map.outputs.iter().cloned());
            }
            flatten(domain, &band.child, ids, rows, out)?;
            *rows = saved;
        }
        ScheduleNode::Sequence(children) => {
            for (pos, child) in children.iter().enumerate() {
                let saved = rows.clone();
                for id in &ids {
                    let (n_dim, n_param) = domain.find(id).map(|s| (s.dim(), s.n_param())).unwrap_or((0, 0));
                    rows.entry(id.clone())
                        .or_default()
                        .push(AffineExpr::constant(pos as i64, n_dim, n_param));
                }
                flatten(domain, child, ids.clone(), rows, out)?;
                *rows = saved;
            }
        }
        ScheduleNode::Filter { filter, child } => {
            let ids = ids.into_iter().filter(|id| filter.contains(id)).collect();
            flatten(domain, child, ids, rows, out)?;
        }
        ScheduleNode::Leaf => {
            for id in ids {
                if out.iter().any(|(seen, _)| *seen == id) {
                    continue;
                }
                let r = rows.get(&id).cloned().unwrap_or_default();
                out.push((id, r));
            }
        }
    }
    Ok(())
}
