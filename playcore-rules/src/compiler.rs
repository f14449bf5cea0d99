//! Compiles the uncompiled [`crate::ast::Condition`] tree and a Play's
//! `actions` map into a validated, node-indexed form: field paths
//! resolved against a [`FieldSchema`], window durations rescaled into
//! exec-role bar counts, and every node given a stable id the
//! evaluator uses to key its per-bar history buffers.
//!
//! Everything fallible here happens once, at load — §4.6 is explicit
//! that `UndefinedField` and `TypeMismatch` are fatal at load and never
//! at runtime.

use crate::ast::{Condition, Literal, Operand};
use crate::schema::FieldSchema;
use indexmap::IndexMap;
use playcore_model::{Direction, FeatureSpec, LoadError, Play, TfRole};
use serde::Deserialize;
use smol_str::SmolStr;

/// Window operators' duration form caps at 24h regardless of anchor
/// timeframe (§4.6).
const MAX_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub enum CompiledOperand {
    Field(SmolStr),
    Num(f64),
    Bool(bool),
    Str(SmolStr),
}

#[derive(Debug, Clone, Copy)]
pub enum WindowKind {
    HoldsFor,
    OccurredWithin,
    CountTrue { min_count: i64 },
}

/// The rule tree after compilation: field paths are [`CompiledOperand::Field`]
/// (already known to resolve), window operators carry a concrete
/// exec-role bar count, and every crossover/window node carries a
/// `node_id` used to key the evaluator's per-node history.
#[derive(Debug, Clone)]
pub enum CompiledCondition {
    Gt(CompiledOperand, CompiledOperand),
    Gte(CompiledOperand, CompiledOperand),
    Lt(CompiledOperand, CompiledOperand),
    Lte(CompiledOperand, CompiledOperand),
    Eq(CompiledOperand, CompiledOperand),
    Neq(CompiledOperand, CompiledOperand),
    Between(CompiledOperand, CompiledOperand, CompiledOperand),
    In(CompiledOperand, Vec<CompiledOperand>),
    ApproxEq(CompiledOperand, CompiledOperand, f64),
    NearPct(CompiledOperand, CompiledOperand, f64),
    Cross { node_id: usize, above: bool, a: CompiledOperand, b: CompiledOperand },
    All(Vec<CompiledCondition>),
    Any(Vec<CompiledCondition>),
    Not(Box<CompiledCondition>),
    Window { node_id: usize, kind: WindowKind, n_bars: i64, cond: Box<CompiledCondition> },
}

/// One compiled `actions` entry: the condition that must hold plus the
/// [`Signal`](playcore_model::Signal) it emits when it does.
#[derive(Debug, Clone)]
pub struct CompiledAction {
    pub tag: SmolStr,
    pub direction: Direction,
    pub sizing_override: Option<f64>,
    pub when: CompiledCondition,
}

/// A Play's `actions` map, compiled once at load. The engine evaluates
/// every action against the same snapshot each exec close.
#[derive(Debug, Clone)]
pub struct CompiledPlay {
    pub actions: Vec<CompiledAction>,
    /// Total distinct node ids assigned across all actions; sizes the
    /// evaluator's history/crossover-state vectors.
    pub node_count: usize,
}

/// The logical shape of one `actions` entry in a Play's JSON. The
/// surface grammar (YAML, etc.) is out of scope; only this schema
/// matters (§1).
#[derive(Debug, Deserialize)]
struct ActionDecl {
    when: Condition,
    direction: Direction,
    #[serde(default)]
    sizing_override: Option<f64>,
}

struct Compiler<'a> {
    schema: &'a FieldSchema,
    exec_role: TfRole,
    role_tf_ms: IndexMap<TfRole, i64>,
    warmup_cap: IndexMap<TfRole, i64>,
    next_node_id: usize,
}

fn role_from_anchor(anchor_tf: Option<&str>, exec_role: TfRole) -> Result<TfRole, LoadError> {
    match anchor_tf {
        None => Ok(exec_role),
        Some("low_tf") => Ok(TfRole::LowTf),
        Some("med_tf") => Ok(TfRole::MedTf),
        Some("high_tf") => Ok(TfRole::HighTf),
        Some(other) => Err(LoadError::InvalidParams {
            id: "anchor_tf".into(),
            param: "anchor_tf".into(),
            reason: format!("unknown anchor_tf `{other}`, expected low_tf|med_tf|high_tf"),
        }),
    }
}

/// Parses a short-form duration string (`"30m"`, `"4h"`, `"1d"`) into
/// milliseconds.
fn parse_duration_ms(s: &str) -> Result<i64, LoadError> {
    let invalid = || LoadError::InvalidParams {
        id: "duration".into(),
        param: "duration".into(),
        reason: format!("`{s}` is not a valid duration (expected e.g. \"30m\", \"4h\", \"1d\")"),
    };
    let (digits, unit) = s.split_at(s.len().saturating_sub(1).min(s.len()));
    let n: i64 = digits.parse().map_err(|_| invalid())?;
    let per_unit_ms = match unit {
        "m" => 60_000,
        "h" => 60 * 60_000,
        "d" => 24 * 60 * 60_000,
        _ => return Err(invalid()),
    };
    Ok(n * per_unit_ms)
}

impl<'a> Compiler<'a> {
    fn alloc_id(&mut self) -> usize {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Converts a window operator's `n` (counted in `anchor_role`'s own
    /// bars) into an exec-role bar count, then validates it against the
    /// anchor role's warmup-bar cap.
    fn resolve_window_bars(&self, n: i64, anchor_tf: Option<&str>) -> Result<i64, LoadError> {
        let anchor_role = role_from_anchor(anchor_tf, self.exec_role)?;
        let exec_ms = self.role_tf_ms[&self.exec_role];
        let anchor_ms = self.role_tf_ms[&anchor_role];
        let n_bars = if anchor_role == self.exec_role {
            n
        } else {
            let ratio = (anchor_ms as f64 / exec_ms as f64).ceil() as i64;
            n * ratio.max(1)
        };
        let cap = self.warmup_cap.get(&anchor_role).copied().unwrap_or(i64::MAX);
        if n_bars > cap {
            return Err(LoadError::WindowTooLong { anchor_role: format!("{anchor_role:?}"), requested: n_bars, cap });
        }
        Ok(n_bars)
    }

    fn compile_operand(&self, op: &Operand) -> Result<CompiledOperand, LoadError> {
        Ok(match op {
            Operand::Field { field } => {
                self.schema.resolve(field)?;
                CompiledOperand::Field(SmolStr::new(field))
            }
            Operand::Literal(Literal::Num(n)) => CompiledOperand::Num(*n),
            Operand::Literal(Literal::Bool(b)) => CompiledOperand::Bool(*b),
            Operand::Literal(Literal::Str(s)) => CompiledOperand::Str(SmolStr::new(s)),
        })
    }

    fn compile(&mut self, cond: &Condition) -> Result<CompiledCondition, LoadError> {
        Ok(match cond {
            Condition::Gt(a, b) => CompiledCondition::Gt(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Gte(a, b) => CompiledCondition::Gte(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Lt(a, b) => CompiledCondition::Lt(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Lte(a, b) => CompiledCondition::Lte(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Eq(a, b) => CompiledCondition::Eq(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Neq(a, b) => CompiledCondition::Neq(self.compile_operand(a)?, self.compile_operand(b)?),
            Condition::Between(v, lo, hi) => {
                let v = self.compile_operand(v)?;
                let lo = self.compile_operand(lo)?;
                let hi = self.compile_operand(hi)?;
                if matches!(lo, CompiledOperand::Str(_)) || matches!(hi, CompiledOperand::Str(_)) {
                    return Err(LoadError::TypeMismatch("between bounds must be numeric".into()));
                }
                CompiledCondition::Between(v, lo, hi)
            }
            Condition::In(v, options) => {
                let v = self.compile_operand(v)?;
                let options = options.iter().map(|o| self.compile_operand(o)).collect::<Result<Vec<_>, _>>()?;
                CompiledCondition::In(v, options)
            }
            Condition::ApproxEq(a, b, tol) | Condition::NearAbs(a, b, tol) => {
                CompiledCondition::ApproxEq(self.compile_operand(a)?, self.compile_operand(b)?, *tol)
            }
            Condition::NearPct(a, b, pct) => CompiledCondition::NearPct(self.compile_operand(a)?, self.compile_operand(b)?, *pct),
            Condition::CrossAbove(a, b) => {
                let node_id = self.alloc_id();
                CompiledCondition::Cross { node_id, above: true, a: self.compile_operand(a)?, b: self.compile_operand(b)? }
            }
            Condition::CrossBelow(a, b) => {
                let node_id = self.alloc_id();
                CompiledCondition::Cross { node_id, above: false, a: self.compile_operand(a)?, b: self.compile_operand(b)? }
            }
            Condition::All(items) => {
                CompiledCondition::All(items.iter().map(|c| self.compile(c)).collect::<Result<Vec<_>, _>>()?)
            }
            Condition::Any(items) => {
                CompiledCondition::Any(items.iter().map(|c| self.compile(c)).collect::<Result<Vec<_>, _>>()?)
            }
            Condition::Not(inner) => CompiledCondition::Not(Box::new(self.compile(inner)?)),
            Condition::HoldsFor { cond, n, anchor_tf } => {
                let n_bars = self.resolve_window_bars(*n, anchor_tf.as_deref())?;
                let node_id = self.alloc_id();
                let inner = self.compile(cond)?;
                CompiledCondition::Window { node_id, kind: WindowKind::HoldsFor, n_bars, cond: Box::new(inner) }
            }
            Condition::OccurredWithin { cond, n, anchor_tf } => {
                let n_bars = self.resolve_window_bars(*n, anchor_tf.as_deref())?;
                let node_id = self.alloc_id();
                let inner = self.compile(cond)?;
                CompiledCondition::Window { node_id, kind: WindowKind::OccurredWithin, n_bars, cond: Box::new(inner) }
            }
            Condition::CountTrue { cond, n, min_count, anchor_tf } => {
                let n_bars = self.resolve_window_bars(*n, anchor_tf.as_deref())?;
                if *min_count > n_bars {
                    return Err(LoadError::InvalidParams {
                        id: "count_true".into(),
                        param: "min_count".into(),
                        reason: format!("min_count {min_count} exceeds window of {n_bars} bars"),
                    });
                }
                let node_id = self.alloc_id();
                let inner = self.compile(cond)?;
                CompiledCondition::Window {
                    node_id,
                    kind: WindowKind::CountTrue { min_count: *min_count },
                    n_bars,
                    cond: Box::new(inner),
                }
            }
            Condition::HoldsForDuration { cond, duration, anchor_tf } => {
                let duration_ms = parse_duration_ms(duration)?;
                if duration_ms > MAX_DURATION_MS {
                    return Err(LoadError::InvalidParams {
                        id: "holds_for_duration".into(),
                        param: "duration".into(),
                        reason: format!("{duration} exceeds the 24h cap"),
                    });
                }
                let anchor_role = role_from_anchor(anchor_tf.as_deref(), self.exec_role)?;
                let anchor_ms = self.role_tf_ms[&anchor_role];
                let anchor_bars = (duration_ms as f64 / anchor_ms as f64).ceil() as i64;
                let n_bars = self.resolve_window_bars(anchor_bars, anchor_tf.as_deref())?;
                let node_id = self.alloc_id();
                let inner = self.compile(cond)?;
                CompiledCondition::Window { node_id, kind: WindowKind::HoldsFor, n_bars, cond: Box::new(inner) }
            }
        })
    }
}

/// Max over a role's declared features of their registry-derived
/// warmup, used as the count-form window cap (§9's "recommended: cap
/// equal to warmup_bars_by_role[anchor_role]"). Structure warmup is
/// folded in by `playcore-engine`'s preflight pass, which is the
/// authoritative source of `warmup_bars_by_role`; this is a
/// conservative lower bound available without depending on it.
fn feature_warmup_cap(features: &[FeatureSpec]) -> i64 {
    features.iter().map(|f| playcore_ta::warmup_bars(f) as i64).max().unwrap_or(i64::MAX)
}

/// Compiles every `actions` entry of `play` against a [`FieldSchema`]
/// derived from the same Play.
pub fn compile_play(play: &Play) -> Result<CompiledPlay, LoadError> {
    if !TfRole::ALL.contains(&play.exec_role) {
        return Err(LoadError::UnresolvedExecRole);
    }
    let schema = FieldSchema::from_play(play);

    let mut role_tf_ms = IndexMap::new();
    let mut warmup_cap = IndexMap::new();
    for role in TfRole::ALL {
        role_tf_ms.insert(role, play.tf_mapping.tf_for(role).duration_ms());
        let features = play.feature_specs.get(&role).map(Vec::as_slice).unwrap_or(&[]);
        warmup_cap.insert(role, feature_warmup_cap(features));
    }

    let mut compiler = Compiler { schema: &schema, exec_role: play.exec_role, role_tf_ms, warmup_cap, next_node_id: 0 };

    let mut actions = Vec::with_capacity(play.actions.len());
    for (name, raw) in &play.actions {
        let decl: ActionDecl = serde_json::from_value(raw.clone()).map_err(|e| LoadError::InvalidParams {
            id: name.to_string(),
            param: "actions".into(),
            reason: e.to_string(),
        })?;
        let when = compiler.compile(&decl.when)?;
        actions.push(CompiledAction { tag: name.clone(), direction: decl.direction, sizing_override: decl.sizing_override, when });
    }

    Ok(CompiledPlay { actions, node_count: compiler.next_node_id })
}
