//! Recorded collar sensor traces.
//!
//! Expected headers:
//! t_ms,red,ir,ax,ay,az
//!
//! Example:
//! t_ms,red,ir,ax,ay,az
//! 0,61234,80211,0.01,-0.02,1.00
//! 20,61410,80502,0.02,-0.01,0.99
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub t_ms: u64,
    pub red: u32,
    pub ir: u32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

pub fn load_trace_csv(path: &Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["t_ms", "red", "ir", "ax", "ay", "az"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "trace CSV must have headers 't_ms,red,ir,ax,ay,az', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if let Some(prev) = rows.last()
            && row.t_ms < prev.t_ms
        {
            eyre::bail!("trace timestamps must not go backwards (row {})", idx + 2);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no samples", path);
    }
    Ok(rows)
}
