//! Writing trial output to disk as Graphviz DOT graphs and JSON snapshots

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use tracing::info;

use crate::{block::Block, simulation::TrialOutput, tipset::Tipset};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not write trial output")]
    Io(#[from] io::Error),
    #[error("could not serialize trial output")]
    Json(#[from] serde_json::Error),
}

/// Serializable form of a trial, from which its chain can be rebuilt.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub blocks: Vec<BlockRecord>,
    pub miners: Vec<MinerRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub nonce: u64,
    /// Parent tipset. Absent for the first genesis block.
    pub tipset: Option<TipsetRecord>,
    pub owner: usize,
    pub height: u64,
    pub null: bool,
    pub parent_weight: u64,
    pub seed: u64,
    pub in_head: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TipsetRecord {
    pub name: String,
    pub min_ticket: u64,
    pub weight: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinerRecord {
    pub id: usize,
    pub power: f64,
}

impl From<&Tipset> for TipsetRecord {
    fn from(tipset: &Tipset) -> Self {
        Self {
            name: tipset.key().to_string(),
            min_ticket: tipset.min_ticket(),
            weight: tipset.weight(),
        }
    }
}

impl Snapshot {
    pub fn from_output(output: &TrialOutput) -> Self {
        let chain = &output.chain;
        let blocks = chain
            .blocks()
            .map(|block| BlockRecord {
                nonce: block.id.get(),
                tipset: block.parent.as_deref().map(TipsetRecord::from),
                owner: block.owner.get(),
                height: block.height,
                null: block.is_null,
                parent_weight: block.parent_weight,
                seed: block.seed,
                in_head: chain.is_in_head(block.id),
            })
            .collect();
        let miners = output
            .miners
            .iter()
            .map(|miner| MinerRecord {
                id: miner.id().get(),
                power: miner.power(),
            })
            .collect();

        Self { blocks, miners }
    }
}

/// File stem identifying a trial: its parameters, the time of export, and
/// its index within the group.
pub fn trial_name(output: &TrialOutput) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    format!(
        "rds={}-lbp={}-mins={}-ts={}-{}",
        output.config.rounds,
        output.config.lookback,
        output.config.num_miners(),
        timestamp,
        output.index
    )
}

/// Writes the trial as pretty-printed JSON.
pub fn write_json<W: Write>(
    output: &TrialOutput,
    writer: W,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &Snapshot::from_output(output))?;

    Ok(())
}

fn label(block: &Block) -> String {
    format!("\"b{} (m{})\"", block.id, block.owner)
}

/// Writes the published blocks of the trial as a DOT graph, one row per
/// height, with blocks that were ever part of the head drawn in red.
pub fn write_dot<W: Write>(
    output: &TrialOutput,
    mut writer: W,
) -> Result<(), ExportError> {
    let chain = &output.chain;

    writeln!(writer, "digraph G {{")?;
    writeln!(writer, "\t{{\n\t\tnode [shape=plaintext];")?;
    write!(writer, "\t\t0")?;
    for height in 1..=chain.max_height + 1 {
        write!(writer, " -> {}", height)?;
    }
    writeln!(writer, ";")?;
    writeln!(writer, "\t}}")?;

    writeln!(writer, "\tnode [shape=box];")?;
    for (height, blocks) in chain.live_blocks_by_height().iter().rev() {
        write!(writer, "\t{{ rank = same; {};", height)?;
        for block in blocks {
            if chain.is_in_head(block.id) {
                write!(writer, " {} [color=\"red\", style=\"bold\"];", label(block))?;
            } else {
                write!(writer, " {};", label(block))?;
            }
        }
        writeln!(writer, " }}")?;

        for block in blocks.iter().filter(|b| !b.is_genesis()) {
            let Some(parent) = block.live_parent() else {
                continue;
            };
            for parent_block in parent.blocks() {
                writeln!(writer, "\t{} -> {};", label(block), label(parent_block))?;
            }
        }
    }
    writeln!(writer, "}}")?;

    Ok(())
}

/// Which files [`export_trial`] writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFormats {
    pub dot: bool,
    pub json: bool,
}

/// Writes the requested files for `output` into `dir`, creating it if
/// needed. Returns the paths written.
pub fn export_trial(
    output: &TrialOutput,
    dir: &Path,
    formats: ExportFormats,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;

    let name = trial_name(output);
    let mut written = vec![];

    if formats.dot {
        let path = dir.join(format!("{}.dot", name));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_dot(output, &mut writer)?;
        writer.flush()?;
        written.push(path);
    }
    if formats.json {
        let path = dir.join(format!("{}.json", name));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_json(output, &mut writer)?;
        writer.flush()?;
        written.push(path);
    }

    for path in written.iter() {
        info!(trial = output.index, path = %path.display(), "exported trial");
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::{export_trial, write_dot, write_json, ExportFormats};
    use crate::simulation::{Trial, TrialConfig, TrialOutput};

    fn single_miner_output() -> TrialOutput {
        let config = TrialConfig {
            lookback: NonZeroUsize::new(1).unwrap(),
            rounds: NonZeroUsize::new(1).unwrap(),
            powers: vec![1.0],
        };
        Trial::new(0, config, 11).run().unwrap()
    }

    #[test]
    fn json_lists_blocks_and_miners() {
        let output = single_miner_output();
        let mut buf = vec![];
        write_json(&output, &mut buf).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let blocks = value["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);

        let genesis = &blocks[0];
        assert_eq!(genesis["nonce"], 0);
        assert!(genesis["tipset"].is_null());
        assert_eq!(genesis["inHead"], true);

        let child = &blocks[1];
        assert_eq!(child["owner"], 1);
        assert_eq!(child["height"], 1);
        assert_eq!(child["null"], false);
        assert_eq!(child["parentWeight"], 1);
        assert_eq!(child["tipset"]["name"], "0");
        assert_eq!(child["inHead"], true);

        let miners = value["miners"].as_array().unwrap();
        assert_eq!(miners.len(), 1);
        assert_eq!(miners[0]["id"], 1);
        assert_eq!(miners[0]["power"], 1.0);
    }

    #[test]
    fn dot_marks_head_and_height_index() {
        let output = single_miner_output();
        let mut buf = vec![];
        write_dot(&output, &mut buf).unwrap();
        let dot = String::from_utf8(buf).unwrap();

        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("\t\t0 -> 1;"));
        assert!(dot.contains("{ rank = same; 0; \"b0 (m0)\" [color=\"red\", style=\"bold\"]; }"));
        // Blocks of the final round are not drawn, and genesis has no edges
        assert!(!dot.contains("\"b0 (m0)\" ->"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn export_creates_directory() {
        let output = single_miner_output();
        let dir = std::env::temp_dir()
            .join(format!("ec-sim-export-{}", std::process::id()));

        let written = export_trial(
            &output,
            &dir,
            ExportFormats { dot: true, json: true },
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        for path in written.iter() {
            assert!(path.exists());
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
