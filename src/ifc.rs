//! In-Flash GEMV Service Path
//!
//! Glues the per-read pieces together for a completed per-plane transaction:
//! the plane's dot-product execution cost, the ECC retry decision against the
//! block's wear state, and the fan-in of the partial result. The surrounding
//! event engine owns scheduling; this unit only computes outcomes and
//! latencies for it.

use crate::aggregation::AggregationUnit;
use crate::ecc::{Correction, EccEngine, RberModel, WearInput};
use crate::params::FlashParameters;
use crate::transaction::IfcTransaction;
use crate::SimTimeNs;

/// Result of servicing one completed IFC transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfcCompletion {
    pub correction: Correction,
    /// Dot-product execution plus all ECC decode attempts, nanoseconds.
    pub service_latency: SimTimeNs,
    /// Final accumulated scalar when this transaction completed its user
    /// request; `None` while partials are outstanding.
    pub result: Option<f64>,
}

/// Per-controller IFC execution unit.
#[derive(Debug)]
pub struct IfcUnit {
    ecc: EccEngine,
    aggregator: AggregationUnit,
    dot_product_latency: SimTimeNs,
}

impl IfcUnit {
    /// Build from the parameter record with the chosen RBER model.
    /// `dram_access_latency_per_partial` is the controller-side cost of
    /// folding one partial into DRAM, owned by the controller model rather
    /// than the flash parameter set.
    pub fn new(
        params: &FlashParameters,
        model: RberModel,
        dram_access_latency_per_partial: SimTimeNs,
    ) -> Self {
        IfcUnit {
            ecc: EccEngine::from_params(params, model),
            aggregator: AggregationUnit::new(
                params.ifc_aggregation_mode,
                dram_access_latency_per_partial,
            ),
            dot_product_latency: params.ifc_dot_product_latency,
        }
    }

    pub fn ecc(&self) -> &EccEngine {
        &self.ecc
    }

    pub fn aggregator(&self) -> &AggregationUnit {
        &self.aggregator
    }

    /// Service a transaction the plane has finished executing.
    ///
    /// Runs the ECC decision against `wear`, stamps the transaction's retry
    /// fields, and folds the partial into its user request.
    /// `pending_in_request` follows the aggregation unit's contract: IFC
    /// transactions still pending, excluding this one. An uncorrectable read
    /// is a data-plane outcome, not a failure of the protocol; the partial
    /// still flows to the aggregator and the caller applies media-error
    /// policy from `correction`.
    pub fn complete_read(
        &mut self,
        txn: &mut IfcTransaction,
        wear: &WearInput,
        pending_in_request: u32,
    ) -> IfcCompletion {
        let correction = self.ecc.attempt_correction(wear);
        match correction {
            Correction::Corrected { retries } => {
                txn.ecc_retry_needed = retries > 0;
                txn.ecc_retry_count = retries;
            }
            Correction::Uncorrectable => {
                txn.ecc_retry_needed = true;
                txn.ecc_retry_count = self.ecc.max_retries();
            }
        }

        let service_latency = self.dot_product_latency + self.ecc.decode_latency(correction);
        let result = self.aggregator.submit(txn, pending_in_request);

        IfcCompletion {
            correction,
            service_latency,
            result,
        }
    }

    /// See [`AggregationUnit::aggregation_latency`].
    pub fn aggregation_latency(&self, pending_in_request: u32) -> SimTimeNs {
        self.aggregator.aggregation_latency(pending_in_request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AggregationMode;
    use crate::transaction::{TransactionSource, UserRequestId};

    fn unit(model: RberModel) -> IfcUnit {
        let mut params = FlashParameters::default();
        params.ifc_enabled = true;
        params.ifc_aggregation_mode = AggregationMode::ChipLevel;
        IfcUnit::new(&params, model, 100)
    }

    fn txn(request: Option<UserRequestId>, partial: f64) -> IfcTransaction {
        let mut t = IfcTransaction::new(TransactionSource::UserIo, 0, 8192, 0, 0, request);
        t.partial_dot_product = partial;
        t
    }

    #[test]
    fn test_healthy_read_single_decode_pass() {
        let mut unit = unit(RberModel::Linear {
            base: 1e-9,
            read_factor: 0.0,
            erase_factor: 0.0,
        });
        let mut t = txn(None, 1.0);
        let done = unit.complete_read(&mut t, &WearInput::default(), 0);

        assert_eq!(done.correction, Correction::Corrected { retries: 0 });
        // 5 us dot product + 10 us single decode
        assert_eq!(done.service_latency, 15_000);
        assert_eq!(done.result, Some(1.0));
        assert!(!t.ecc_retry_needed);
    }

    #[test]
    fn test_fan_in_across_three_planes() {
        let mut unit = unit(RberModel::Linear {
            base: 0.0,
            read_factor: 0.0,
            erase_factor: 0.0,
        });
        let request = UserRequestId(9);
        let wear = WearInput::default();

        let mut t1 = txn(Some(request), 0.25);
        let mut t2 = txn(Some(request), 0.5);
        let mut t3 = txn(Some(request), 0.25);

        assert_eq!(unit.complete_read(&mut t1, &wear, 2).result, None);
        assert_eq!(unit.complete_read(&mut t2, &wear, 1).result, None);
        let last = unit.complete_read(&mut t3, &wear, 0);
        assert_eq!(last.result, Some(1.0));
        assert!(t3.aggregation_complete);
        assert_eq!(unit.aggregator().in_flight(), 0);
    }

    #[test]
    fn test_uncorrectable_read_still_aggregates() {
        let mut unit = unit(RberModel::Linear {
            base: 1.0,
            read_factor: 0.0,
            erase_factor: 0.0,
        });
        let mut t = txn(Some(UserRequestId(10)), 2.0);
        let done = unit.complete_read(&mut t, &WearInput::default(), 0);

        assert_eq!(done.correction, Correction::Uncorrectable);
        assert!(t.ecc_retry_needed);
        assert_eq!(t.ecc_retry_count, 3);
        // 5 us dot product + 4 decode attempts at 10 us
        assert_eq!(done.service_latency, 45_000);
        assert_eq!(done.result, Some(2.0));
    }

    #[test]
    fn test_aggregation_latency_forwards_mode() {
        let mut params = FlashParameters::default();
        params.ifc_aggregation_mode = AggregationMode::ControllerLevel;
        let unit = IfcUnit::new(&params, RberModel::linear_from_params(&params), 250);
        assert_eq!(unit.aggregation_latency(4), 1000);
    }
}
