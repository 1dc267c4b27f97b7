//! Scheduler Driver Configuration
//!
//! Cell, UE and workload configuration of the `pucch_sched` driver, loaded
//! from a YAML or TOML file.

use anyhow::{anyhow, bail, Context};
use common::{Pci, Rnti};
use scheduler::pucch::resource_manager::SLOT_RES_COUNTER_RING_SIZE;
use scheduler::resource_grid::RESOURCE_GRID_RING_SIZE;
use scheduler::{default_cell_config, default_ue_config, CellConfiguration, CoresetConfiguration, UeCellConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedConfig {
    /// Cell configuration
    pub cell: CellConfiguration,
    /// UEs attached to the cell
    #[serde(default)]
    pub ues: Vec<UeCellConfiguration>,
    /// Synthetic downlink traffic
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Synthetic downlink traffic driving the HARQ-ACK allocations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkloadConfig {
    /// CORESET#0 index of the DCIs scheduling the PDSCHs
    #[serde(default)]
    pub coreset0_index: u8,
    /// Aggregation level of the DCIs
    #[serde(default = "default_aggregation_level")]
    pub aggregation_level: u8,
    /// PDCCH to PDSCH delay in slots
    #[serde(default)]
    pub k0: u32,
    /// PDSCH to HARQ-ACK delay in slots
    #[serde(default = "default_k1")]
    pub k1: u32,
    /// Every UE gets a PDSCH each `harq_period` slots
    #[serde(default = "default_harq_period")]
    pub harq_period: u32,
}

fn default_aggregation_level() -> u8 {
    4
}

fn default_k1() -> u32 {
    4
}

fn default_harq_period() -> u32 {
    1
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            coreset0_index: 0,
            aggregation_level: default_aggregation_level(),
            k0: 0,
            k1: default_k1(),
            harq_period: default_harq_period(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level used when neither the CLI nor `RUST_LOG` sets one
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SchedConfig {
    /// Load configuration from a `.yml`/`.yaml` or `.toml` file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => serde_yaml::from_str(&contents)?,
            Some("toml") => toml::from_str(&contents)?,
            _ => bail!("Unsupported configuration file format: {}", path.display()),
        };
        Ok(config)
    }

    /// Single cell with one dedicated UE and one UE on common resources
    pub fn default_config() -> Self {
        Self {
            cell: default_cell_config(Pci(1)),
            ues: vec![
                default_ue_config(Rnti(0x4601), 10, 0),
                UeCellConfiguration {
                    crnti: Rnti(0x4602),
                    pucch_cfg: None,
                },
            ],
            workload: WorkloadConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Check the whole configuration before starting the scheduler
    pub fn validate(&self) -> anyhow::Result<()> {
        self.cell.validate()?;

        let mut rntis = HashSet::new();
        for ue in &self.ues {
            if !rntis.insert(ue.crnti) {
                bail!("Duplicate UE rnti={}", ue.crnti);
            }
            ue.validate(&self.cell)?;
        }

        let workload = &self.workload;
        let coreset = CoresetConfiguration::from_coreset0_index(workload.coreset0_index)?;
        let aggr_lvl = workload.aggregation_level as u32;
        if !matches!(aggr_lvl, 1 | 2 | 4 | 8 | 16) || aggr_lvl > coreset.nof_cces() {
            bail!(
                "Aggregation level {} does not fit CORESET#0 with {} CCEs",
                aggr_lvl,
                coreset.nof_cces()
            );
        }
        if workload.harq_period == 0 {
            bail!("harq_period must be at least 1");
        }

        let max_offset = RESOURCE_GRID_RING_SIZE.min(SLOT_RES_COUNTER_RING_SIZE) as u32;
        let harq_offset = workload.k0 + workload.k1;
        if harq_offset >= max_offset {
            return Err(anyhow!(
                "k0 + k1 = {} exceeds the scheduler look-ahead of {} slots",
                harq_offset,
                max_offset - 1
            ));
        }

        Ok(())
    }
}
