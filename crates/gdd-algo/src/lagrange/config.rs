use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::LpSolverKind;
use crate::error::LagrangeError;

/// Multiplier update strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    /// Polyak-style step `α·|Zk − bound| / ‖res‖²` along the residual
    #[default]
    Subgradient,
    /// Piecewise-linear line search over the step multiplier
    OptimalStep,
    /// Normalized residual step with a consensus penalty in the blocks
    Admm,
    /// Kelley cutting planes over a bounded multiplier box
    CuttingPlanes,
    /// Cutting planes restricted to a trust box around the current point
    Bundle,
}

impl UpdateMethod {
    pub const ALL: [UpdateMethod; 5] = [
        UpdateMethod::Subgradient,
        UpdateMethod::OptimalStep,
        UpdateMethod::Admm,
        UpdateMethod::CuttingPlanes,
        UpdateMethod::Bundle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMethod::Subgradient => "subgradient",
            UpdateMethod::OptimalStep => "optimalstep",
            UpdateMethod::Admm => "admm",
            UpdateMethod::CuttingPlanes => "cuttingplanes",
            UpdateMethod::Bundle => "bundle",
        }
    }

    /// Whether the method keeps a cut model of the dual function.
    pub fn uses_cuts(&self) -> bool {
        matches!(self, UpdateMethod::CuttingPlanes | UpdateMethod::Bundle)
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMethod {
    type Err = LagrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        UpdateMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| {
                let known: Vec<&str> = UpdateMethod::ALL.iter().map(|m| m.as_str()).collect();
                LagrangeError::InvalidConfig(format!(
                    "unknown update method '{}'; expected one of: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Variables the Lagrangian heuristic fixes before re-solving the full model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicKind {
    #[default]
    FixBinaries,
    FixIntegers,
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeuristicKind::FixBinaries => write!(f, "fix-binaries"),
            HeuristicKind::FixIntegers => write!(f, "fix-integers"),
        }
    }
}

impl FromStr for HeuristicKind {
    type Err = LagrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "fix-binaries" | "fixbinaries" => Ok(HeuristicKind::FixBinaries),
            "fix-integers" | "fixintegers" => Ok(HeuristicKind::FixIntegers),
            _ => Err(LagrangeError::InvalidConfig(format!(
                "unknown heuristic '{}'; expected fix-binaries or fix-integers",
                s
            ))),
        }
    }
}

/// Starting point for the multipliers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialMultipliers {
    #[default]
    Zero,
    /// Duals of the linking rows in the flattened LP relaxation
    Relaxation,
}

impl fmt::Display for InitialMultipliers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialMultipliers::Zero => write!(f, "zero"),
            InitialMultipliers::Relaxation => write!(f, "relaxation"),
        }
    }
}

impl FromStr for InitialMultipliers {
    type Err = LagrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(InitialMultipliers::Zero),
            "relaxation" => Ok(InitialMultipliers::Relaxation),
            _ => Err(LagrangeError::InvalidConfig(format!(
                "unknown multiplier initialization '{}'; expected zero or relaxation",
                s
            ))),
        }
    }
}

/// Configuration for the decomposition loop.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagrangeConfig {
    pub max_iterations: usize,
    pub update_method: UpdateMethod,
    /// Convergence tolerance on the residual norm
    pub epsilon: f64,
    /// Wall-clock budget in seconds, checked at the top of each iteration
    pub time_limit: f64,
    /// Step scaling factor (α)
    pub alpha: f64,
    pub heuristic: HeuristicKind,
    pub initial_multipliers: InitialMultipliers,
    /// Shrink factor applied to α after `max_no_improve` stalled iterations
    pub delta: f64,
    pub max_no_improve: usize,
    /// Box on the multipliers and on η in the cutting-plane master
    pub cp_bound: f64,
    /// Doublings of α tried by the optimal-step search before it falls back
    pub max_step_doublings: usize,
    /// Probe width Δ of the optimal-step search
    pub step_probe: f64,
    /// Consensus penalty weight ρ for ADMM block solves
    pub admm_penalty: f64,
    pub master_solver: LpSolverKind,
}

impl Default for LagrangeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            update_method: UpdateMethod::Subgradient,
            epsilon: 0.001,
            time_limit: 3600.0,
            alpha: 2.0,
            heuristic: HeuristicKind::FixBinaries,
            initial_multipliers: InitialMultipliers::Zero,
            delta: 0.5,
            max_no_improve: 3,
            cp_bound: 1e6,
            max_step_doublings: 8,
            step_probe: 0.01,
            admm_penalty: 1.0,
            master_solver: LpSolverKind::default(),
        }
    }
}

impl LagrangeConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), LagrangeError> {
        let invalid = |msg: String| Err(LagrangeError::InvalidConfig(msg));
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".into());
        }
        if !(self.epsilon > 0.0) {
            return invalid(format!("epsilon must be positive, got {}", self.epsilon));
        }
        if !(self.alpha > 0.0) || !self.alpha.is_finite() {
            return invalid(format!("alpha must be positive, got {}", self.alpha));
        }
        if !(self.delta > 0.0 && self.delta <= 1.0) {
            return invalid(format!("delta must lie in (0, 1], got {}", self.delta));
        }
        if !(self.time_limit > 0.0) {
            return invalid(format!(
                "time_limit must be positive, got {}",
                self.time_limit
            ));
        }
        if !(self.cp_bound > 0.0) {
            return invalid(format!("cp_bound must be positive, got {}", self.cp_bound));
        }
        if !(self.step_probe > 0.0) {
            return invalid(format!(
                "step_probe must be positive, got {}",
                self.step_probe
            ));
        }
        if !(self.admm_penalty > 0.0) {
            return invalid(format!(
                "admm_penalty must be positive, got {}",
                self.admm_penalty
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LagrangeConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.update_method, UpdateMethod::Subgradient);
        assert_eq!(config.epsilon, 0.001);
        assert_eq!(config.alpha, 2.0);
        assert_eq!(config.heuristic, HeuristicKind::FixBinaries);
        assert_eq!(config.initial_multipliers, InitialMultipliers::Zero);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_method_parsing() {
        assert_eq!(
            "CuttingPlanes".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::CuttingPlanes
        );
        assert_eq!(
            "optimal-step".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::OptimalStep
        );
        assert_eq!("ADMM".parse::<UpdateMethod>().unwrap(), UpdateMethod::Admm);
        for method in UpdateMethod::ALL {
            assert_eq!(method.as_str().parse::<UpdateMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_update_method_lists_choices() {
        let err = "newton".parse::<UpdateMethod>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("newton"));
        assert!(msg.contains("subgradient"));
        assert!(msg.contains("bundle"));
    }

    #[test]
    fn test_heuristic_and_init_parsing() {
        assert_eq!(
            "fix_integers".parse::<HeuristicKind>().unwrap(),
            HeuristicKind::FixIntegers
        );
        assert_eq!(
            "Relaxation".parse::<InitialMultipliers>().unwrap(),
            InitialMultipliers::Relaxation
        );
        assert!("random".parse::<InitialMultipliers>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            LagrangeConfig {
                max_iterations: 0,
                ..Default::default()
            },
            LagrangeConfig {
                epsilon: 0.0,
                ..Default::default()
            },
            LagrangeConfig {
                alpha: -1.0,
                ..Default::default()
            },
            LagrangeConfig {
                delta: 1.5,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(LagrangeError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LagrangeConfig =
            serde_json::from_str(r#"{"update_method": "bundle", "alpha": 0.5}"#).unwrap();
        assert_eq!(config.update_method, UpdateMethod::Bundle);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.heuristic, HeuristicKind::FixBinaries);
    }
}
