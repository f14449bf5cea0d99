//! Wires a [`StructureSpec`] to a concrete `playcore-ta` structure
//! detector plus the ids of the other instances in its role it reads
//! from. Structure kinds don't share an update signature, so this is a
//! closed enum rather than a trait object: each variant carries exactly
//! the dependency ids its `update` call needs.

use playcore_model::{LoadError, StructureKind, StructureSpec};
use playcore_ta::structures::derived_zone::{DerivedZone, DerivedZoneMode, DerivedZoneSource};
use playcore_ta::structures::fibonacci::{FibMode, Fibonacci};
use playcore_ta::structures::market_structure::MarketStructure;
use playcore_ta::structures::rolling_window::{RollingMode, RollingWindow};
use playcore_ta::structures::swing::Swing;
use playcore_ta::structures::trend::Trend;
use playcore_ta::structures::zone::{Zone, ZoneType};
use playcore_model::PriceField;
use smol_str::SmolStr;

pub enum StructureInstance {
    Swing(Swing),
    Trend { trend: Trend, swing_id: SmolStr },
    Zone { zone: Zone, swing_id: SmolStr, atr_id: SmolStr },
    RollingWindow(RollingWindow),
    Fibonacci { fib: Fibonacci, swing_id: SmolStr },
    DerivedZone { dz: DerivedZone, swing_id: SmolStr },
    MarketStructure { ms: MarketStructure, swing_id: SmolStr, trend_id: SmolStr },
}

/// `levels` lists (fibonacci retracement/extension levels, derived-zone
/// width multipliers) are declared as a comma-separated `str_param`
/// since a [`StructureSpec`]'s numeric `params` table is scalar-only.
fn parse_levels(spec: &StructureSpec) -> Result<Vec<f64>, LoadError> {
    let raw = spec.str_param("levels", "");
    if raw.is_empty() {
        return Err(LoadError::InvalidParams {
            id: spec.id.to_string(),
            param: "levels".into(),
            reason: "missing comma-separated levels list".into(),
        });
    }
    raw.split(',')
        .map(|tok| {
            tok.trim().parse::<f64>().map_err(|_| LoadError::InvalidParams {
                id: spec.id.to_string(),
                param: "levels".into(),
                reason: format!("`{tok}` is not a valid float"),
            })
        })
        .collect()
}

fn parse_price_field(spec: &StructureSpec, key: &str, default: &str) -> Result<PriceField, LoadError> {
    Ok(match spec.str_param(key, default) {
        "open" => PriceField::Open,
        "high" => PriceField::High,
        "low" => PriceField::Low,
        "close" => PriceField::Close,
        "volume" => PriceField::Volume,
        other => {
            return Err(LoadError::InvalidParams {
                id: spec.id.to_string(),
                param: key.into(),
                reason: format!("unknown price field `{other}`"),
            })
        }
    })
}

fn require_dep(spec: &StructureSpec, role: &str, key: &str) -> Result<SmolStr, LoadError> {
    let id = spec.str_param(key, "");
    if id.is_empty() {
        return Err(LoadError::UnresolvedDependency {
            role: role.into(),
            structure_id: spec.id.to_string(),
            depends_on: key.into(),
        });
    }
    Ok(SmolStr::new(id))
}

/// Builds the concrete detector for `spec`. Dependency *ids* are only
/// captured here; resolving them against sibling instances (and
/// validating they actually exist) is [`crate::tf_state::TFState`]'s job,
/// since that's where the full per-role instance list is available.
pub fn build(spec: &StructureSpec, role: &str) -> Result<StructureInstance, LoadError> {
    match spec.kind {
        StructureKind::Swing => {
            let left = spec.param_usize("left", 5);
            let right = spec.param_usize("right", 5);
            Ok(StructureInstance::Swing(Swing::new(left, right)))
        }
        StructureKind::Trend => {
            let swing_id = require_dep(spec, role, "swing_id")?;
            Ok(StructureInstance::Trend { trend: Trend::new(), swing_id })
        }
        StructureKind::Zone => {
            let swing_id = require_dep(spec, role, "swing_id")?;
            let atr_id = require_dep(spec, role, "atr_id")?;
            let zone_type = match spec.str_param("zone_type", "demand") {
                "demand" => ZoneType::Demand,
                "supply" => ZoneType::Supply,
                other => {
                    return Err(LoadError::InvalidParams {
                        id: spec.id.to_string(),
                        param: "zone_type".into(),
                        reason: format!("unknown zone_type `{other}`"),
                    })
                }
            };
            let width_atr = spec.param_f64("width_atr", 1.0);
            Ok(StructureInstance::Zone { zone: Zone::new(zone_type, width_atr), swing_id, atr_id })
        }
        StructureKind::RollingWindow => {
            let size = spec.param_usize("size", 20);
            let source = parse_price_field(spec, "source", "close")?;
            let mode = match spec.str_param("mode", "max") {
                "min" => RollingMode::Min,
                "max" => RollingMode::Max,
                other => {
                    return Err(LoadError::InvalidParams {
                        id: spec.id.to_string(),
                        param: "mode".into(),
                        reason: format!("unknown rolling_window mode `{other}`"),
                    })
                }
            };
            Ok(StructureInstance::RollingWindow(RollingWindow::new(size, source, mode)))
        }
        StructureKind::Fibonacci => {
            let swing_id = require_dep(spec, role, "swing_id")?;
            let levels = parse_levels(spec)?;
            let mode = match spec.str_param("mode", "retracement") {
                "retracement" => FibMode::Retracement,
                "extension" => FibMode::Extension,
                other => {
                    return Err(LoadError::InvalidParams {
                        id: spec.id.to_string(),
                        param: "mode".into(),
                        reason: format!("unknown fibonacci mode `{other}`"),
                    })
                }
            };
            Ok(StructureInstance::Fibonacci { fib: Fibonacci::new(levels, mode), swing_id })
        }
        StructureKind::DerivedZone => {
            let swing_id = require_dep(spec, role, "swing_id")?;
            let levels = parse_levels(spec)?;
            let source = match spec.str_param("price_source", "low") {
                "high" => DerivedZoneSource::High,
                "low" => DerivedZoneSource::Low,
                other => {
                    return Err(LoadError::InvalidParams {
                        id: spec.id.to_string(),
                        param: "price_source".into(),
                        reason: format!("unknown derived_zone price_source `{other}`"),
                    })
                }
            };
            let mode = match spec.str_param("mode", "demand") {
                "demand" => DerivedZoneMode::Demand,
                "supply" => DerivedZoneMode::Supply,
                other => {
                    return Err(LoadError::InvalidParams {
                        id: spec.id.to_string(),
                        param: "mode".into(),
                        reason: format!("unknown derived_zone mode `{other}`"),
                    })
                }
            };
            let max_active = spec.param_usize("max_active", 3);
            Ok(StructureInstance::DerivedZone { dz: DerivedZone::new(levels, source, mode, max_active), swing_id })
        }
        StructureKind::MarketStructure => {
            let swing_id = require_dep(spec, role, "swing_id")?;
            let trend_id = require_dep(spec, role, "trend_id")?;
            Ok(StructureInstance::MarketStructure { ms: MarketStructure::new(), swing_id, trend_id })
        }
    }
}

/// The sibling ids this instance reads from, used to build the
/// dependency graph for the per-role topological sort.
pub fn depends_on(instance_kind: &StructureInstance) -> Vec<SmolStr> {
    match instance_kind {
        StructureInstance::Swing(_) | StructureInstance::RollingWindow(_) => vec![],
        StructureInstance::Trend { swing_id, .. } => vec![swing_id.clone()],
        StructureInstance::Zone { swing_id, .. } => vec![swing_id.clone()],
        StructureInstance::Fibonacci { swing_id, .. } => vec![swing_id.clone()],
        StructureInstance::DerivedZone { swing_id, .. } => vec![swing_id.clone()],
        StructureInstance::MarketStructure { swing_id, trend_id, .. } => vec![swing_id.clone(), trend_id.clone()],
    }
}
