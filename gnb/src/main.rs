//! Albor Space 5G PUCCH Scheduler Driver
//!
//! Runs the PUCCH allocation core of one cell slot by slot against a
//! synthetic downlink workload.

mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::SlotPoint;
use config::SchedConfig;
use scheduler::{
    CceLocation, CellResourceAllocator, CoresetConfiguration, DciDlContextInformation,
    PdcchDlInformation, PucchAllocator,
};

/// Albor Space 5G PUCCH scheduler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (.yml, .yaml or .toml). A built-in cell is used if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of slots to run
    #[arg(short, long, default_value = "10240")]
    nof_slots: u32,

    /// Pace the slots with the air interface slot duration
    #[arg(long)]
    realtime: bool,
}

/// Allocation counters of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SchedStats {
    slots: u32,
    common_harq_grants: u32,
    common_harq_failures: u32,
    ded_harq_grants: u32,
    ded_harq_failures: u32,
    sr_grants: u32,
    sr_failures: u32,
    pucch_pdus: u32,
}

/// Scheduler of one cell: resource grid ring plus the PUCCH allocator
struct CellScheduler<'a> {
    cfg: &'a SchedConfig,
    res_alloc: CellResourceAllocator,
    pucch_alloc: PucchAllocator<'a>,
    coreset_cfg: CoresetConfiguration,
    stats: SchedStats,
}

impl<'a> CellScheduler<'a> {
    fn new(cfg: &'a SchedConfig) -> Result<Self> {
        Ok(Self {
            cfg,
            res_alloc: CellResourceAllocator::new(cfg.cell.ul_bwp()),
            pucch_alloc: PucchAllocator::new(&cfg.cell)?,
            coreset_cfg: CoresetConfiguration::from_coreset0_index(cfg.workload.coreset0_index)?,
            stats: SchedStats::default(),
        })
    }

    /// Run all allocations of slot `sl`
    fn run_slot(&mut self, sl: SlotPoint) -> Result<()> {
        self.res_alloc.slot_indication(sl);
        self.pucch_alloc.slot_indication(sl);

        let cfg = self.cfg;
        let workload = &cfg.workload;
        let aggr_lvl = workload.aggregation_level as u32;
        let nof_cces = self.coreset_cfg.nof_cces();
        let mut next_cce = 0;

        for ue in &cfg.ues {
            if sl.to_uint() % workload.harq_period == 0 {
                match &ue.pucch_cfg {
                    None => {
                        let dci_info = PdcchDlInformation {
                            ctx: DciDlContextInformation {
                                coreset_cfg: self.coreset_cfg,
                                cces: CceLocation {
                                    ncce: next_cce,
                                    aggr_lvl: workload.aggregation_level,
                                },
                            },
                        };
                        next_cce = (next_cce + aggr_lvl) % nof_cces;

                        match self.pucch_alloc.alloc_common_pucch_harq_ack_ue(
                            &mut self.res_alloc,
                            ue.crnti,
                            workload.k0,
                            workload.k1,
                            &dci_info,
                        ) {
                            Some(grant) => {
                                debug!(
                                    "slot={} rnti={} common HARQ-ACK d_pri={}",
                                    sl, ue.crnti, grant.pucch_res_indicator
                                );
                                self.stats.common_harq_grants += 1;
                            }
                            None => self.stats.common_harq_failures += 1,
                        }
                    }
                    Some(_) => {
                        match self.pucch_alloc.alloc_ded_pucch_harq_ack_ue(
                            &mut self.res_alloc,
                            ue.crnti,
                            ue,
                            workload.k0,
                            workload.k1,
                        )? {
                            Some(_) => self.stats.ded_harq_grants += 1,
                            None => self.stats.ded_harq_failures += 1,
                        }
                    }
                }
            }

            let Some(pucch_cfg) = &ue.pucch_cfg else {
                continue;
            };
            if pucch_cfg.sr_res_list.iter().any(|sr| sr.is_sr_occasion(sl)) {
                match self
                    .pucch_alloc
                    .pucch_allocate_sr_opportunity(&mut self.res_alloc[0], ue.crnti, ue)?
                {
                    Some(_) => self.stats.sr_grants += 1,
                    None => self.stats.sr_failures += 1,
                }
            }
        }

        // Slot 0 of the window is final: nothing can be added to it anymore.
        let pucchs = &self.res_alloc[0].result.ul.pucchs;
        for pdu in pucchs {
            trace!("slot={} PUCCH PDU: {:?}", sl, pdu);
        }
        self.stats.pucch_pdus += pucchs.len() as u32;
        self.stats.slots += 1;
        Ok(())
    }
}

/// Run `nof_slots` slots, paced by the slot timer when `realtime` is set
async fn run(cfg: &SchedConfig, nof_slots: u32, realtime: bool) -> Result<SchedStats> {
    let mut sched = CellScheduler::new(cfg)?;
    let scs = cfg.cell.ul_bwp().scs;
    let mut slot_timer =
        tokio::time::interval(tokio::time::Duration::from_micros(scs.slot_duration_us() as u64));

    let mut sl = SlotPoint::new(scs, 0, 0);
    for _ in 0..nof_slots {
        if realtime {
            tokio::select! {
                _ = slot_timer.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        sched.run_slot(sl)?;

        if sl.slot_index() == 0 && sl.sfn() % 100 == 0 {
            debug!("slot={} PUCCH PDUs so far: {}", sl, sched.stats.pucch_pdus);
        }
        sl += 1;
    }

    Ok(sched.stats)
}

fn report(stats: &SchedStats) {
    info!("Scheduler Statistics:");
    info!("  Slots: {}, PUCCH PDUs: {}", stats.slots, stats.pucch_pdus);
    info!(
        "  Common HARQ-ACK grants: {}, failures: {}",
        stats.common_harq_grants, stats.common_harq_failures
    );
    info!(
        "  Dedicated HARQ-ACK grants: {}, failures: {}",
        stats.ded_harq_grants, stats.ded_harq_failures
    );
    info!("  SR grants: {}, failures: {}", stats.sr_grants, stats.sr_failures);
    if stats.common_harq_failures + stats.ded_harq_failures + stats.sr_failures > 0 {
        warn!("Some PUCCH allocations failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let sched_cfg = match &args.config {
        Some(path) => SchedConfig::from_file(path)?,
        None => SchedConfig::default_config(),
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&sched_cfg.log.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space 5G PUCCH scheduler");
    match &args.config {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("Using built-in configuration"),
    }

    sched_cfg.validate()?;

    let bwp = sched_cfg.cell.ul_bwp();
    info!("Cell configuration:");
    info!("  PCI: {}", sched_cfg.cell.pci.0);
    info!("  Subcarrier spacing: {} kHz", bwp.scs.khz());
    info!("  UL BWP CRBs: {}", bwp.crbs);
    info!(
        "  PUCCH common resource: {}",
        sched_cfg.cell.pucch_cfg_common().pucch_resource_common
    );
    let coreset = CoresetConfiguration::from_coreset0_index(sched_cfg.workload.coreset0_index)?;
    info!(
        "  CORESET#0: {} RBs at RB offset {}, {} symbols, {} CCEs",
        coreset.num_rbs,
        coreset.rb_offset,
        coreset.num_symbols,
        coreset.nof_cces()
    );
    info!("  UEs: {}", sched_cfg.ues.len());

    let stats = run(&sched_cfg, args.nof_slots, args.realtime).await?;
    report(&stats);

    info!("PUCCH scheduler shutdown complete");
    Ok(())
}
