//! IFC Aggregation Unit
//!
//! Tracks the fan-in of per-plane dot-product partials back into one scalar
//! per user request. A GEMV request fans out into one IFC transaction per
//! plane; as each completes, its partial is folded in here, and the submit
//! that reaches the fixed total reports completion exactly once.
//!
//! The unit runs inside a logically single-threaded event loop, so the map is
//! plain owned state. Callers must uphold two ordering rules: every IFC
//! transaction of a request is enqueued before any of them completes, and the
//! completing transaction is removed from the request's pending list before
//! it is submitted.

use std::collections::HashMap;

use crate::params::AggregationMode;
use crate::transaction::{IfcTransaction, UserRequestId};
use crate::SimTimeNs;

#[derive(Debug, Clone, Copy)]
struct AggregationState {
    accumulated_result: f64,
    completed_count: u32,
    /// Fixed at first submission; transactions added afterwards are invisible.
    total_count: u32,
}

/// Fan-in tracker keyed by user request.
#[derive(Debug)]
pub struct AggregationUnit {
    mode: AggregationMode,
    /// Controller-level cost of folding one partial into DRAM.
    dram_access_latency_per_partial: SimTimeNs,
    pending: HashMap<UserRequestId, AggregationState>,
}

impl AggregationUnit {
    pub fn new(mode: AggregationMode, dram_access_latency_per_partial: SimTimeNs) -> Self {
        AggregationUnit {
            mode,
            dram_access_latency_per_partial,
            pending: HashMap::new(),
        }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Fold one completed transaction's partial into its request.
    ///
    /// `pending_in_request` is the number of IFC transactions still pending
    /// on the request's transaction list, excluding `txn` itself (the caller
    /// removes the completing transaction before submitting). The first
    /// submission fixes the request's total from that count.
    ///
    /// Returns `Some(total)` with the fully accumulated scalar on the
    /// submission that completes the request (the transaction is flagged
    /// `aggregation_complete` and the entry is dropped), `None` while
    /// partials are still outstanding. A transaction with no user request is
    /// trivially complete and allocates no state.
    pub fn submit(&mut self, txn: &mut IfcTransaction, pending_in_request: u32) -> Option<f64> {
        let Some(request) = txn.user_request() else {
            return Some(txn.partial_dot_product);
        };

        match self.pending.get_mut(&request) {
            None => {
                let total_count = pending_in_request + 1;
                if total_count <= 1 {
                    txn.aggregation_complete = true;
                    return Some(txn.partial_dot_product);
                }
                self.pending.insert(
                    request,
                    AggregationState {
                        accumulated_result: txn.partial_dot_product,
                        completed_count: 1,
                        total_count,
                    },
                );
                None
            }
            Some(state) => {
                state.accumulated_result += txn.partial_dot_product;
                state.completed_count += 1;
                assert!(
                    state.completed_count <= state.total_count,
                    "aggregation fan-in overran its fixed total for request {:?} \
                     ({} completed, {} total)",
                    request,
                    state.completed_count,
                    state.total_count,
                );
                if state.completed_count == state.total_count {
                    let total = state.accumulated_result;
                    txn.aggregation_complete = true;
                    self.pending.remove(&request);
                    Some(total)
                } else {
                    None
                }
            }
        }
    }

    /// Latency of surfacing the aggregated result for a completed request.
    ///
    /// Chip-level accumulation happens on the die, so nothing extra is paid.
    /// Controller-level pays one DRAM access per partial still on the
    /// request's transaction list (the caller asks before clearing it).
    pub fn aggregation_latency(&self, pending_in_request: u32) -> SimTimeNs {
        match self.mode {
            AggregationMode::ChipLevel => 0,
            AggregationMode::ControllerLevel => {
                self.dram_access_latency_per_partial * pending_in_request as u64
            }
        }
    }

    /// Partial sum accumulated so far for an in-flight request.
    pub fn accumulated(&self, request: UserRequestId) -> Option<f64> {
        self.pending.get(&request).map(|s| s.accumulated_result)
    }

    /// Number of requests with outstanding partials.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Drop the entry of an abandoned request, returning its partial sum.
    /// The only cleanup path for requests whose remaining transactions will
    /// never complete.
    pub fn purge(&mut self, request: UserRequestId) -> Option<f64> {
        self.pending.remove(&request).map(|s| s.accumulated_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionSource;

    fn txn(request: Option<UserRequestId>, partial: f64) -> IfcTransaction {
        let mut t = IfcTransaction::new(TransactionSource::UserIo, 0, 8192, 0, 0, request);
        t.partial_dot_product = partial;
        t
    }

    #[test]
    fn test_in_order_fan_in() {
        let mut unit = AggregationUnit::new(AggregationMode::ControllerLevel, 100);
        let request = UserRequestId(1);

        // 3 transactions; the caller removes each from the pending list
        // before submitting, so the pending counts are 2, 1, 0.
        let mut t1 = txn(Some(request), 1.0);
        let mut t2 = txn(Some(request), 2.0);
        let mut t3 = txn(Some(request), 3.0);

        assert_eq!(unit.submit(&mut t1, 2), None);
        assert_eq!(unit.accumulated(request), Some(1.0));
        assert_eq!(unit.submit(&mut t2, 1), None);
        assert_eq!(unit.submit(&mut t3, 0), Some(6.0));

        assert!(t3.aggregation_complete);
        assert!(!t1.aggregation_complete);
        assert_eq!(unit.in_flight(), 0);
    }

    #[test]
    fn test_out_of_order_fan_in_same_sum() {
        let mut unit = AggregationUnit::new(AggregationMode::ControllerLevel, 100);
        let request = UserRequestId(2);

        let mut t3 = txn(Some(request), 3.0);
        let mut t1 = txn(Some(request), 1.0);
        let mut t2 = txn(Some(request), 2.0);

        assert_eq!(unit.submit(&mut t3, 2), None);
        assert_eq!(unit.submit(&mut t1, 1), None);
        assert_eq!(unit.submit(&mut t2, 0), Some(6.0));
        assert!(t2.aggregation_complete);
        assert_eq!(unit.in_flight(), 0);
    }

    #[test]
    fn test_single_transaction_completes_without_state() {
        let mut unit = AggregationUnit::new(AggregationMode::ChipLevel, 100);
        let mut t = txn(Some(UserRequestId(3)), 4.5);
        assert_eq!(unit.submit(&mut t, 0), Some(4.5));
        assert!(t.aggregation_complete);
        assert_eq!(unit.in_flight(), 0);
    }

    #[test]
    fn test_no_user_request_is_trivially_complete() {
        let mut unit = AggregationUnit::new(AggregationMode::ChipLevel, 100);
        let mut t = txn(None, 2.5);
        assert_eq!(unit.submit(&mut t, 5), Some(2.5));
        assert_eq!(unit.in_flight(), 0);
    }

    #[test]
    fn test_exactly_one_completion_per_request() {
        let mut unit = AggregationUnit::new(AggregationMode::ChipLevel, 0);
        let request = UserRequestId(4);
        let partials = [0.5, 1.5, 2.5, 3.5];
        let mut completions = 0;
        for (i, &p) in partials.iter().enumerate() {
            let mut t = txn(Some(request), p);
            let pending = (partials.len() - 1 - i) as u32;
            if unit.submit(&mut t, pending).is_some() {
                completions += 1;
                assert_eq!(i, partials.len() - 1);
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(unit.in_flight(), 0);
    }

    #[test]
    fn test_latency_per_mode() {
        let controller = AggregationUnit::new(AggregationMode::ControllerLevel, 200);
        assert_eq!(controller.aggregation_latency(8), 1600);
        assert_eq!(controller.aggregation_latency(0), 0);

        let chip = AggregationUnit::new(AggregationMode::ChipLevel, 200);
        assert_eq!(chip.aggregation_latency(8), 0);
    }

    #[test]
    fn test_purge_drops_abandoned_entry() {
        let mut unit = AggregationUnit::new(AggregationMode::ControllerLevel, 100);
        let request = UserRequestId(5);
        let mut t = txn(Some(request), 1.25);
        assert_eq!(unit.submit(&mut t, 3), None);
        assert_eq!(unit.purge(request), Some(1.25));
        assert_eq!(unit.in_flight(), 0);
        assert_eq!(unit.purge(request), None);
    }

    #[test]
    fn test_overflow_reports_infinity() {
        let mut unit = AggregationUnit::new(AggregationMode::ChipLevel, 0);
        let request = UserRequestId(6);
        let mut t1 = txn(Some(request), f64::MAX);
        let mut t2 = txn(Some(request), f64::MAX);
        assert_eq!(unit.submit(&mut t1, 1), None);
        assert_eq!(unit.submit(&mut t2, 0), Some(f64::INFINITY));
    }
}
