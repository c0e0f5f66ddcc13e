//! Anomaly detection agent
//!
//! Statistical outlier detection over the sales cube: Z-scores flag
//! anomalous months, the IQR fence flags subcategories with unusual
//! profit margins.
//!
//! Z-scores use the population standard deviation (divisor N). Quantiles
//! use linear interpolation between order statistics.

use crate::agents::{normalize_op, Agent, AgentInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::format_currency;
use crate::types::{AgentOutput, Cell, ResultTable};
use serde_json::json;

/// Agent 5: flags statistical outliers.
pub struct AnomalyDetectionAgent;

pub const AGENT_NAME: &str = "AnomalyDetection";

/// |z| above this flags a month as anomalous.
const Z_THRESHOLD: f64 = 2.0;

/// IQR fence multiplier (Tukey's rule).
const IQR_FENCE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnomalyOp {
    Monthly,
    Product,
}

impl AnomalyOp {
    fn parse(op: &str) -> Result<Self> {
        match normalize_op(op).as_str() {
            "monthly" | "time_anomaly" | "monthly_anomaly" => Ok(AnomalyOp::Monthly),
            "product" | "product_anomaly" => Ok(AnomalyOp::Product),
            _ => Err(Error::UnknownOperation {
                agent: AGENT_NAME.to_string(),
                operation: op.to_string(),
            }),
        }
    }
}

impl Agent for AnomalyDetectionAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn run(&self, input: &AgentInput, db: &Database) -> Result<AgentOutput> {
        match AnomalyOp::parse(input.operation)? {
            AnomalyOp::Monthly => self.monthly_anomaly(db),
            AnomalyOp::Product => self.product_anomaly(db),
        }
    }
}

impl AnomalyDetectionAgent {
    /// Months whose revenue sits more than two population standard
    /// deviations from the mean.
    fn monthly_anomaly(&self, db: &Database) -> Result<AgentOutput> {
        let sql = "SELECT d.year AS year, d.month AS month, d.month_name AS month_name,
       ROUND(SUM(f.revenue), 2) AS monthly_revenue
FROM fact_sales f
JOIN dim_date d ON f.date_key = d.date_key
GROUP BY d.year, d.month, d.month_name
ORDER BY d.year, d.month"
            .to_string();

        let raw = db.query(&sql, &[])?;
        let revenues = raw.column_values("monthly_revenue");
        let (mean, std) = mean_and_population_std(&revenues);

        let mut columns = raw.columns.clone();
        columns.extend([
            "z_score".to_string(),
            "anomaly".to_string(),
            "anomaly_type".to_string(),
        ]);
        let mut data = ResultTable::new(columns);

        let mut anomaly_count = 0usize;
        let mut first_anomaly: Option<(String, i64, f64)> = None;
        for row in &raw.rows {
            let revenue = row[3].as_f64().unwrap_or(0.0);
            let z = if std > 0.0 {
                round3((revenue - mean) / std)
            } else {
                0.0
            };
            let is_anomaly = z.abs() > Z_THRESHOLD;
            let kind = if z > Z_THRESHOLD {
                "High"
            } else if z < -Z_THRESHOLD {
                "Low"
            } else {
                "Normal"
            };

            if is_anomaly {
                anomaly_count += 1;
                if first_anomaly.is_none() {
                    first_anomaly = Some((
                        row[2].to_string(),
                        row[0].as_i64().unwrap_or(0),
                        z,
                    ));
                }
            }

            let mut out_row = row.clone();
            out_row.push(Cell::float(z));
            out_row.push(Cell::Int(is_anomaly as i64));
            out_row.push(Cell::Text(kind.to_string()));
            data.push_row(out_row);
        }

        let mut summary = format!(
            "Detected {} monthly revenue anomalies (Z-score threshold: ±{:.1}). Mean: {}, Std: {}.",
            anomaly_count,
            Z_THRESHOLD,
            format_currency(mean),
            format_currency(std),
        );
        if let Some((month_name, year, z)) = first_anomaly {
            summary.push_str(&format!(
                " Most extreme: {} {} (Z={})",
                month_name, year, z
            ));
        }

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "monthly_anomaly",
            sql,
            data,
            summary,
            json!({"threshold_z": Z_THRESHOLD, "anomaly_count": anomaly_count}),
        ))
    }

    /// Subcategories whose average profit margin falls outside the
    /// 1.5×IQR fence.
    fn product_anomaly(&self, db: &Database) -> Result<AgentOutput> {
        let sql = "SELECT p.category AS category, p.subcategory AS subcategory,
       ROUND(AVG(f.profit_margin), 2) AS avg_margin,
       ROUND(SUM(f.revenue), 2)       AS total_revenue
FROM fact_sales f
JOIN dim_product p ON f.product_key = p.product_key
GROUP BY p.category, p.subcategory"
            .to_string();

        let raw = db.query(&sql, &[])?;
        let margins = raw.column_values("avg_margin");
        let q1 = quantile(&margins, 0.25);
        let q3 = quantile(&margins, 0.75);
        let iqr = q3 - q1;
        let lower = q1 - IQR_FENCE * iqr;
        let upper = q3 + IQR_FENCE * iqr;

        let mut columns = raw.columns.clone();
        columns.extend(["anomaly".to_string(), "anomaly_type".to_string()]);
        let mut data = ResultTable::new(columns);

        let mut anomaly_count = 0usize;
        for row in &raw.rows {
            let margin = row[2].as_f64().unwrap_or(0.0);
            let kind = if margin > upper {
                "High margin"
            } else if margin < lower {
                "Low margin"
            } else {
                "Normal"
            };
            let is_anomaly = kind != "Normal";
            if is_anomaly {
                anomaly_count += 1;
            }

            let mut out_row = row.clone();
            out_row.push(Cell::Int(is_anomaly as i64));
            out_row.push(Cell::Text(kind.to_string()));
            data.push_row(out_row);
        }

        let summary = format!(
            "Product margin anomaly detection via IQR. Normal range: {:.1}%–{:.1}%. {} subcategories flagged.",
            lower, upper, anomaly_count,
        );

        Ok(AgentOutput::ok(
            AGENT_NAME,
            "product_anomaly",
            sql,
            data,
            summary,
            json!({"iqr_lower": round2(lower), "iqr_upper": round2(upper)}),
        ))
    }
}

/// Mean and population standard deviation (divisor N, not N-1).
fn mean_and_population_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Quantile with linear interpolation between the two nearest order
/// statistics.
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
