//! ECC Engine
//!
//! Models per-read error correction with a physics-inspired raw-bit-error-rate
//! (RBER) model. No bit-level decoding happens here; the engine turns a
//! block's wear state into a retry count and a decode latency, or declares the
//! read uncorrectable.
//!
//! Two RBER models are supported and selected at construction:
//!
//! - [`RberModel::Linear`]: `base + read_factor*reads + erase_factor*cycles`
//! - [`RberModel::PowerLaw`]:
//!   `epsilon + alpha*cycles^k + beta*cycles^m*time^n + gamma*cycles^p*reads^q`

use crate::params::FlashParameters;
use crate::SimTimeNs;

const NS_PER_HOUR: f64 = 3600.0 * 1e9;

/// Wear counters for one flash block, owned by the block-manager side of the
/// simulator and sampled when a read completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockWearState {
    /// Program/erase cycles the block has gone through.
    pub pe_cycles: u32,
    /// Simulation time of the first page program after the last erase.
    pub first_write_time: SimTimeNs,
    /// Reads served by the block since the last erase.
    pub read_count: u64,
    pub pages_per_block: u32,
}

impl BlockWearState {
    /// Model inputs at simulation time `now`. Retention is converted to hours
    /// here so the RBER models always see the unit they are calibrated in.
    pub fn wear_input(&self, now: SimTimeNs) -> WearInput {
        WearInput {
            pe_cycles: self.pe_cycles,
            retention_hours: now.saturating_sub(self.first_write_time) as f64 / NS_PER_HOUR,
            reads_per_page: self.reads_per_page(),
        }
    }

    /// Average read count per page.
    pub fn reads_per_page(&self) -> f64 {
        if self.pages_per_block == 0 {
            0.0
        } else {
            self.read_count as f64 / self.pages_per_block as f64
        }
    }

    /// Whether the block has crossed the read-reclaim threshold and should be
    /// relocated before disturb-induced errors accumulate further.
    pub fn needs_read_reclaim(&self, threshold: u32) -> bool {
        self.read_count >= threshold as u64
    }
}

/// Per-read inputs to the RBER models.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WearInput {
    pub pe_cycles: u32,
    /// Retention age in hours.
    pub retention_hours: f64,
    /// Read count of the page (average over the block for block-granularity
    /// counters).
    pub reads_per_page: f64,
}

/// Raw-bit-error-rate model. Negative coefficients are valid configuration
/// (parameter sweeps use them); the computed rate is clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RberModel {
    /// First-order model: wear contributions are independent and linear.
    Linear {
        base: f64,
        read_factor: f64,
        erase_factor: f64,
    },
    /// Power-law model separating wear-out, retention loss, and read disturb.
    PowerLaw {
        epsilon: f64,
        alpha: f64,
        k: f64,
        beta: f64,
        m: f64,
        n: f64,
        gamma: f64,
        p: f64,
        q: f64,
    },
}

impl RberModel {
    /// Linear model from the configured coefficients.
    pub fn linear_from_params(params: &FlashParameters) -> Self {
        RberModel::Linear {
            base: params.ecc_base_rber,
            read_factor: params.ecc_read_count_factor,
            erase_factor: params.ecc_pe_cycle_factor,
        }
    }

    /// Power-law coefficients fitted to a 72-layer TLC part.
    pub fn tlc_72_layer() -> Self {
        RberModel::PowerLaw {
            epsilon: 1.48e-3,
            alpha: 3.90e-10,
            k: 2.05,
            beta: 6.28e-5,
            m: 0.14,
            n: 0.54,
            gamma: 3.73e-9,
            p: 0.33,
            q: 1.71,
        }
    }

    /// Expected raw bit error rate for the given wear, clamped at zero.
    pub fn rber(&self, wear: &WearInput) -> f64 {
        let cycles = wear.pe_cycles as f64;
        let raw = match *self {
            RberModel::Linear {
                base,
                read_factor,
                erase_factor,
            } => base + read_factor * wear.reads_per_page + erase_factor * cycles,
            RberModel::PowerLaw {
                epsilon,
                alpha,
                k,
                beta,
                m,
                n,
                gamma,
                p,
                q,
            } => {
                epsilon
                    + alpha * cycles.powf(k)
                    + beta * cycles.powf(m) * wear.retention_hours.powf(n)
                    + gamma * cycles.powf(p) * wear.reads_per_page.powf(q)
            }
        };
        raw.max(0.0)
    }
}

/// Outcome of a decode attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Decoded successfully; `retries` is 0 for a first-pass hard decode.
    Corrected { retries: u32 },
    /// All soft-decode retries exhausted; surfaced to the FTL which may
    /// trigger read-reclaim or report a media error.
    Uncorrectable,
}

impl Correction {
    pub fn retries(&self) -> Option<u32> {
        match *self {
            Correction::Corrected { retries } => Some(retries),
            Correction::Uncorrectable => None,
        }
    }

    pub fn is_uncorrectable(&self) -> bool {
        matches!(self, Correction::Uncorrectable)
    }
}

/// Decode-retry decision engine for one page geometry.
#[derive(Debug, Clone)]
pub struct EccEngine {
    model: RberModel,
    page_size_in_bits: u32,
    correction_capability: u32,
    decode_latency: SimTimeNs,
    max_retries: u32,
}

impl EccEngine {
    pub fn new(
        model: RberModel,
        page_size_in_bits: u32,
        correction_capability: u32,
        decode_latency: SimTimeNs,
        max_retries: u32,
    ) -> Self {
        EccEngine {
            model,
            page_size_in_bits,
            correction_capability,
            decode_latency,
            max_retries,
        }
    }

    /// Build from the parameter record, selecting the RBER model to run.
    pub fn from_params(params: &FlashParameters, model: RberModel) -> Self {
        EccEngine::new(
            model,
            params.page_size_in_bits(),
            params.ecc_correction_capability,
            params.ecc_decode_latency,
            params.ecc_max_retries,
        )
    }

    pub fn model(&self) -> &RberModel {
        &self.model
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Number of decode retries a read with this wear needs.
    ///
    /// The first pass is a hard decode that corrects up to the configured
    /// capability. Each soft-decode retry grows the effective capability by
    /// 50% of the base capability, modelling soft-decision LDPC decoding.
    pub fn attempt_correction(&self, wear: &WearInput) -> Correction {
        let expected_errors = self.model.rber(wear) * self.page_size_in_bits as f64;

        if expected_errors <= self.correction_capability as f64 {
            return Correction::Corrected { retries: 0 };
        }

        for retry in 1..=self.max_retries {
            let effective = self.correction_capability as f64 * (1.0 + 0.5 * retry as f64);
            if expected_errors <= effective {
                return Correction::Corrected { retries: retry };
            }
        }

        Correction::Uncorrectable
    }

    /// Total decode latency in nanoseconds. An uncorrectable read still paid
    /// for every attempt.
    pub fn decode_latency(&self, correction: Correction) -> SimTimeNs {
        let attempts = match correction {
            Correction::Corrected { retries } => 1 + retries as u64,
            Correction::Uncorrectable => 1 + self.max_retries as u64,
        };
        self.decode_latency * attempts
    }
}
