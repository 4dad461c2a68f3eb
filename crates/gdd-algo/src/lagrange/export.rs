//! File export for [`LagrangeSolution`].

use std::path::Path;

use anyhow::{Context, Result};

use super::solution::LagrangeSolution;

impl LagrangeSolution {
    /// Export to JSON format
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("serializing LagrangeSolution to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing JSON to {}", path.display()))?;
        Ok(())
    }

    /// Convert to JSON value (for streaming/stdout)
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("converting LagrangeSolution to JSON value")
    }

    /// Write the iteration trace as CSV, one row per iteration.
    #[cfg(feature = "csv")]
    pub fn trace_to_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating CSV writer for {}", path.display()))?;

        wtr.write_record([
            "iteration",
            "elapsed_s",
            "dual_bound",
            "iteration_s",
            "primal_bound",
            "residual_norm",
            "alpha",
        ])
        .context("writing CSV header")?;

        for rec in &self.iterations {
            wtr.write_record(&[
                rec.iteration.to_string(),
                rec.elapsed_secs.to_string(),
                rec.dual_bound.to_string(),
                rec.iteration_secs.to_string(),
                rec.primal_bound.map(|p| p.to_string()).unwrap_or_default(),
                rec.residual_norm.to_string(),
                rec.alpha.to_string(),
            ])
            .context("writing CSV record")?;
        }

        wtr.flush().context("flushing CSV writer")?;
        Ok(())
    }
}
