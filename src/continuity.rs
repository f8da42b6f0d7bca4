//! Continuity counter analysis and repair.
//!
//! One `PidState` is kept per filtered PID. Each packet is checked against
//! the previous input CC of its PID; discontinuities are counted, optionally
//! reported, and optionally fixed in place by renumbering the output CC.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::packet::{PidSet, TsPacket};
use crate::report::{Report, Severity};

/// Outcome of feeding one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcStatus {
    /// No discontinuity, packet untouched.
    Ok,
    /// Discontinuity detected, packet untouched.
    Error,
    /// CC field rewritten (fix or generator mode).
    Modified,
}

impl CcStatus {
    pub fn is_ok(self) -> bool {
        self == CcStatus::Ok
    }
}

/// Processing options, loadable from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityOptions {
    pub display: bool,
    pub fix: bool,
    pub generator: bool,
    pub severity: Severity,
    pub prefix: String,
    pub max_duplicates: usize,
}

impl Default for ContinuityOptions {
    fn default() -> Self {
        Self {
            display: false,
            fix: false,
            generator: false,
            severity: Severity::Info,
            prefix: String::new(),
            max_duplicates: DEFAULT_MAX_DUPLICATES,
        }
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContinuityStats {
    pub total_packets: u64,
    pub processed_packets: u64,
    pub fix_count: u64,
    pub error_count: u64,
    pub pid_count: usize,
}

#[derive(Debug, Clone)]
struct PidState {
    first_cc: u8,    // never modified after creation
    last_cc_in: u8,  // last input CC
    last_cc_out: u8, // last output CC, differs from input after fixes
    dup_count: usize,
    last_payload_pkt: Option<TsPacket>,
}

impl PidState {
    fn new(pkt: &TsPacket) -> Self {
        let cc = pkt.cc();
        Self {
            first_cc: cc,
            last_cc_in: cc,
            last_cc_out: cc,
            dup_count: 0,
            last_payload_pkt: pkt.has_payload().then_some(*pkt),
        }
    }
}

enum Fault {
    Missing { from: u8, to: u8 },
    NoPayloadChange { from: u8, to: u8 },
    Duplicates { cc: u8, count: usize },
    SameCc { cc: u8 },
}

/// Continuity counter analyzer. Single owner, no internal locking.
pub struct ContinuityAnalyzer {
    report: Option<Box<dyn Report>>,
    options: ContinuityOptions,
    total_packets: u64,
    processed_packets: u64,
    fix_count: u64,
    error_count: u64,
    pid_filter: PidSet,
    states: HashMap<u16, PidState>,
}

impl Default for ContinuityAnalyzer {
    fn default() -> Self {
        Self::new(PidSet::none(), None)
    }
}

impl ContinuityAnalyzer {
    /// `report` receives discontinuity messages when display is on; `None` drops them.
    pub fn new(pid_filter: PidSet, report: Option<Box<dyn Report>>) -> Self {
        Self {
            report,
            options: ContinuityOptions::default(),
            total_packets: 0,
            processed_packets: 0,
            fix_count: 0,
            error_count: 0,
            pid_filter,
            states: HashMap::new(),
        }
    }

    /// Clear counters and PID states. Options, report and filter are kept.
    pub fn reset(&mut self) {
        self.total_packets = 0;
        self.processed_packets = 0;
        self.fix_count = 0;
        self.error_count = 0;
        self.states.clear();
    }

    /// Analyze a packet without modifying it.
    pub fn feed_packet(&mut self, pkt: &TsPacket) -> CcStatus {
        let mut copy = *pkt;
        self.feed_internal(&mut copy, false)
    }

    /// Analyze a packet, rewriting its CC in fix or generator mode.
    pub fn feed_packet_mut(&mut self, pkt: &mut TsPacket) -> CcStatus {
        self.feed_internal(pkt, true)
    }

    fn feed_internal(&mut self, pkt: &mut TsPacket, update: bool) -> CcStatus {
        self.total_packets += 1;
        let pid = pkt.pid();
        if !self.pid_filter.test(pid) {
            return CcStatus::Ok;
        }
        self.processed_packets += 1;

        let cc = pkt.cc();
        let has_payload = pkt.has_payload();
        let generator = self.options.generator;

        let state = match self.states.entry(pid) {
            Entry::Vacant(e) => {
                e.insert(PidState::new(pkt));
                return if generator && update { CcStatus::Modified } else { CcStatus::Ok };
            }
            Entry::Occupied(e) => e.into_mut(),
        };

        if generator {
            // Input CC ignored, output is synthesized.
            if has_payload {
                state.last_cc_out = (state.last_cc_out + 1) & CC_MASK;
            }
            state.last_cc_in = cc;
            if !update {
                return CcStatus::Ok;
            }
            if cc != state.last_cc_out {
                pkt.set_cc(state.last_cc_out);
                self.fix_count += 1;
            }
            return CcStatus::Modified;
        }

        let mut fault = None;
        let next_out;
        if !has_payload {
            if cc != state.last_cc_in {
                fault = Some(Fault::NoPayloadChange { from: state.last_cc_in, to: cc });
            }
            next_out = state.last_cc_out;
        } else if cc == state.last_cc_in {
            let identical = state
                .last_payload_pkt
                .as_ref()
                .is_some_and(|prev| prev.payload() == pkt.payload());
            if identical && state.dup_count < self.options.max_duplicates {
                state.dup_count += 1;
                next_out = state.last_cc_out;
            } else if identical {
                // the run goes on: every further copy is an error
                state.dup_count += 1;
                fault = Some(Fault::Duplicates { cc, count: state.dup_count });
                next_out = (state.last_cc_out + 1) & CC_MASK;
            } else {
                fault = Some(Fault::SameCc { cc });
                state.dup_count = 0;
                next_out = (state.last_cc_out + 1) & CC_MASK;
            }
        } else {
            if cc != (state.last_cc_in + 1) & CC_MASK {
                fault = Some(Fault::Missing { from: state.last_cc_in, to: cc });
            }
            state.dup_count = 0;
            next_out = (state.last_cc_out + 1) & CC_MASK;
        }

        state.last_cc_in = cc;
        if has_payload {
            state.last_payload_pkt = Some(*pkt);
        }

        let mut status = if fault.is_some() { CcStatus::Error } else { CcStatus::Ok };
        if self.options.fix && update {
            state.last_cc_out = next_out;
            if cc != next_out {
                pkt.set_cc(next_out);
                self.fix_count += 1;
                status = CcStatus::Modified;
            }
        } else {
            state.last_cc_out = cc;
        }

        if let Some(fault) = fault {
            self.error_count += 1;
            self.report_fault(pid, fault);
        }
        status
    }

    fn report_fault(&self, pid: u16, fault: Fault) {
        if !self.options.display {
            return;
        }
        let Some(report) = self.report.as_ref() else {
            return;
        };
        let detail = match fault {
            Fault::Missing { from, to } => format!(
                "discontinuity, CC {from} -> {to}, missing {} packets",
                Self::missing_packets(from, to)
            ),
            Fault::NoPayloadChange { from, to } => {
                format!("CC changed without payload, CC {from} -> {to}")
            }
            Fault::Duplicates { cc, count } => {
                format!("too many duplicate packets, CC {cc}, {count} consecutive duplicates")
            }
            Fault::SameCc { cc } => format!("CC {cc} repeated with a different payload"),
        };
        report.log(self.options.severity, &format!("{}{}", self.line_prefix(pid), detail));
    }

    fn line_prefix(&self, pid: u16) -> String {
        format!("{}packet {}, PID 0x{:04X} ({}): ", self.options.prefix, self.total_packets, pid, pid)
    }

    /// Number of packets missing between two continuity counters.
    pub fn missing_packets(cc1: u8, cc2: u8) -> usize {
        (cc2 as i32 - cc1 as i32 - 1).rem_euclid(CC_MAX as i32) as usize
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    /// Packets on filtered PIDs only.
    pub fn processed_packets(&self) -> u64 {
        self.processed_packets
    }

    pub fn fix_count(&self) -> u64 {
        self.fix_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn stats(&self) -> ContinuityStats {
        ContinuityStats {
            total_packets: self.total_packets,
            processed_packets: self.processed_packets,
            fix_count: self.fix_count,
            error_count: self.error_count,
            pid_count: self.pid_count(),
        }
    }

    pub fn options(&self) -> &ContinuityOptions {
        &self.options
    }

    pub fn apply_options(&mut self, options: ContinuityOptions) {
        self.options = options;
    }

    pub fn set_report(&mut self, report: Option<Box<dyn Report>>) {
        self.report = report;
    }

    pub fn set_display(&mut self, display: bool) {
        self.options.display = display;
    }

    pub fn set_fix(&mut self, fix: bool) {
        self.options.fix = fix;
    }

    /// In generator mode input CCs are ignored and no error is ever reported.
    pub fn set_generator(&mut self, generator: bool) {
        self.options.generator = generator;
    }

    pub fn set_message_severity(&mut self, severity: Severity) {
        self.options.severity = severity;
    }

    pub fn set_message_prefix(&mut self, prefix: impl Into<String>) {
        self.options.prefix = prefix.into();
    }

    pub fn set_max_duplicates(&mut self, count: usize) {
        self.options.max_duplicates = count;
    }

    /// Replace the filter. States of PIDs leaving the filter are dropped.
    pub fn set_pid_filter(&mut self, pid_filter: PidSet) {
        self.states.retain(|pid, _| pid_filter.test(*pid));
        self.pid_filter = pid_filter;
    }

    pub fn add_pid(&mut self, pid: u16) {
        self.pid_filter.set(pid);
    }

    pub fn add_pids(&mut self, pids: &PidSet) {
        for pid in pids.iter() {
            self.pid_filter.set(pid);
        }
    }

    pub fn remove_pid(&mut self, pid: u16) {
        self.pid_filter.reset(pid);
        self.states.remove(&pid);
    }

    pub fn pid_count(&self) -> usize {
        self.pid_filter.count()
    }

    pub fn has_pid(&self, pid: u16) -> bool {
        self.pid_filter.test(pid)
    }

    /// First CC seen on the PID, or [`INVALID_CC`].
    pub fn first_cc(&self, pid: u16) -> u8 {
        self.state(pid).map_or(INVALID_CC, |s| s.first_cc)
    }

    /// Last output CC on the PID (possibly fixed), or [`INVALID_CC`].
    pub fn last_cc(&self, pid: u16) -> u8 {
        self.state(pid).map_or(INVALID_CC, |s| s.last_cc_out)
    }

    fn state(&self, pid: u16) -> Option<&PidState> {
        if self.pid_filter.test(pid) {
            self.states.get(&pid)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::report::CollectReport;

    const PID: u16 = 0x100;

    fn pkt(cc: u8, fill: u8) -> TsPacket {
        TsPacket::new(PID, cc, &[fill; 184])
    }

    fn af_only(cc: u8) -> TsPacket {
        let mut p = TsPacket::new(PID, cc, &[]);
        p.b[3] = (p.b[3] & 0xCF) | 0x20;
        p.b[4] = 183;
        p.b[5] = 0x00;
        p
    }

    fn analyzer() -> ContinuityAnalyzer {
        ContinuityAnalyzer::new([PID].into_iter().collect(), None)
    }

    #[test]
    fn test_missing_packets() {
        assert_eq!(ContinuityAnalyzer::missing_packets(3, 7), 3);
        assert_eq!(ContinuityAnalyzer::missing_packets(14, 2), 3);
        assert_eq!(ContinuityAnalyzer::missing_packets(5, 6), 0);
        assert_eq!(ContinuityAnalyzer::missing_packets(5, 5), 15);
    }

    #[test]
    fn test_continuous_stream_untouched() {
        for fix in [false, true] {
            let mut ca = analyzer();
            ca.set_fix(fix);
            for i in 0..40u8 {
                let mut p = pkt((i + 9) & CC_MASK, i);
                let before = p;
                assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Ok);
                assert_eq!(p, before);
            }
            assert_eq!(ca.error_count(), 0);
            assert_eq!(ca.fix_count(), 0);
            assert_eq!(ca.processed_packets(), 40);
        }
    }

    #[test]
    fn test_first_cc_is_stable() {
        let mut ca = analyzer();
        assert_eq!(ca.first_cc(PID), INVALID_CC);
        ca.feed_packet(&pkt(5, 0));
        ca.feed_packet(&pkt(9, 1));
        ca.feed_packet(&pkt(2, 2));
        assert_eq!(ca.first_cc(PID), 5);
        assert_eq!(ca.last_cc(PID), 2);
        assert_eq!(ca.error_count(), 2);

        ca.remove_pid(PID);
        assert_eq!(ca.first_cc(PID), INVALID_CC);
        ca.add_pid(PID);
        assert_eq!(ca.first_cc(PID), INVALID_CC);
        ca.feed_packet(&pkt(11, 3));
        assert_eq!(ca.first_cc(PID), 11);
    }

    #[test]
    fn test_fix_gap() {
        let mut ca = analyzer();
        ca.set_fix(true);
        let mut p = pkt(4, 0);
        assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Ok);

        // +3 jump: 4 -> 7
        let mut p = pkt(7, 1);
        assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Modified);
        assert_eq!(p.cc(), 5);
        assert_eq!(ca.error_count(), 1);
        assert_eq!(ca.fix_count(), 1);
        assert_eq!(ca.last_cc(PID), 5);

        // input continues from 7, output keeps following 5
        let mut p = pkt(8, 2);
        assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Modified);
        assert_eq!(p.cc(), 6);
        assert_eq!(ca.error_count(), 1);
        assert_eq!(ca.fix_count(), 2);
    }

    #[test]
    fn test_read_only_feed_never_modifies() {
        let mut ca = analyzer();
        ca.set_fix(true);
        ca.feed_packet(&pkt(0, 0));
        let p = pkt(3, 1);
        assert_eq!(ca.feed_packet(&p), CcStatus::Error);
        assert_eq!(p.cc(), 3);
        assert_eq!(ca.fix_count(), 0);
        assert_eq!(ca.last_cc(PID), 3);
    }

    #[test]
    fn test_gap_without_fix() {
        let mut ca = analyzer();
        ca.feed_packet(&pkt(14, 0));
        let mut p = pkt(2, 1);
        assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Error);
        assert_eq!(p.cc(), 2);
        assert_eq!(ca.last_cc(PID), 2);
        assert_eq!(ca.error_count(), 1);
        assert_eq!(ca.fix_count(), 0);
    }

    #[test]
    fn test_generator_mode() {
        let mut ca = analyzer();
        ca.set_generator(true);
        let inputs = [7u8, 7, 3, 15, 0, 12, 12, 1];
        let mut outputs = Vec::new();
        for (i, cc) in inputs.iter().enumerate() {
            let mut p = pkt(*cc, i as u8);
            assert_eq!(ca.feed_packet_mut(&mut p), CcStatus::Modified);
            outputs.push(p.cc());
        }
        assert_eq!(outputs, vec![7, 8, 9, 10, 11, 12, 13, 14]);
        assert_eq!(ca.error_count(), 0);

        // no payload: CC unchanged
        let mut p = af_only(2);
        ca.feed_packet_mut(&mut p);
        assert_eq!(p.cc(), 14);
    }

    #[test]
    fn test_duplicates() {
        let mut ca = analyzer();
        ca.feed_packet(&pkt(1, 0xAA));
        assert_eq!(ca.feed_packet(&pkt(1, 0xAA)), CcStatus::Ok);
        assert_eq!(ca.error_count(), 0);
        // second consecutive duplicate exceeds the tolerance
        assert_eq!(ca.feed_packet(&pkt(1, 0xAA)), CcStatus::Error);
        assert_eq!(ca.error_count(), 1);

        // a long run of copies: everything past the first tolerated one is an error
        let mut ca = analyzer();
        let statuses: Vec<CcStatus> = (0..5).map(|_| ca.feed_packet(&pkt(1, 0xAA))).collect();
        assert_eq!(
            statuses,
            vec![CcStatus::Ok, CcStatus::Ok, CcStatus::Error, CcStatus::Error, CcStatus::Error]
        );
        assert_eq!(ca.error_count(), 3);

        // a new CC ends the run
        assert_eq!(ca.feed_packet(&pkt(2, 0xAA)), CcStatus::Ok);
        assert_eq!(ca.feed_packet(&pkt(2, 0xAA)), CcStatus::Ok);
        assert_eq!(ca.error_count(), 3);

        // same CC, different payload
        let mut ca = analyzer();
        ca.feed_packet(&pkt(1, 0xAA));
        assert_eq!(ca.feed_packet(&pkt(1, 0xBB)), CcStatus::Error);
        assert_eq!(ca.error_count(), 1);
    }

    #[test]
    fn test_duplicate_keeps_output_cc_when_fixing() {
        let mut ca = analyzer();
        ca.set_fix(true);
        ca.feed_packet_mut(&mut pkt(3, 1));
        let mut dup = pkt(3, 1);
        assert_eq!(ca.feed_packet_mut(&mut dup), CcStatus::Ok);
        assert_eq!(dup.cc(), 3);
        let mut next = pkt(4, 2);
        assert_eq!(ca.feed_packet_mut(&mut next), CcStatus::Ok);
    }

    #[test]
    fn test_no_payload_packets() {
        let mut ca = analyzer();
        ca.feed_packet(&pkt(6, 0));
        assert_eq!(ca.feed_packet(&af_only(6)), CcStatus::Ok);
        assert_eq!(ca.feed_packet(&af_only(7)), CcStatus::Error);
        assert_eq!(ca.error_count(), 1);
    }

    #[test]
    fn test_unfiltered_pids_pass_through() {
        let mut ca = analyzer();
        let mut other = TsPacket::new(0x200, 0, &[]);
        ca.feed_packet_mut(&mut other);
        other.set_cc(9);
        assert_eq!(ca.feed_packet_mut(&mut other), CcStatus::Ok);
        assert_eq!(ca.total_packets(), 2);
        assert_eq!(ca.processed_packets(), 0);
        assert_eq!(ca.last_cc(0x200), INVALID_CC);
    }

    #[test]
    fn test_set_pid_filter_drops_states() {
        let mut ca = ContinuityAnalyzer::new(PidSet::all(), None);
        ca.feed_packet(&TsPacket::new(1, 4, &[]));
        ca.feed_packet(&TsPacket::new(2, 8, &[]));
        ca.set_pid_filter([2u16].into_iter().collect());
        assert_eq!(ca.pid_count(), 1);
        assert_eq!(ca.first_cc(1), INVALID_CC);
        assert_eq!(ca.first_cc(2), 8);
        ca.add_pid(1);
        assert_eq!(ca.first_cc(1), INVALID_CC);
    }

    #[test]
    fn test_out_of_range_pid_leaves_filter_alone() {
        let mut ca = analyzer();
        ca.feed_packet(&pkt(4, 0));
        ca.add_pid(0x2000 + PID);
        assert_eq!(ca.pid_count(), 1);
        ca.remove_pid(0x2000 + PID);
        assert!(ca.has_pid(PID));
        assert_eq!(ca.first_cc(PID), 4);
    }

    #[test]
    fn test_reset_keeps_configuration() {
        let mut ca = analyzer();
        ca.set_fix(true);
        ca.set_message_prefix("x: ");
        ca.feed_packet(&pkt(0, 0));
        ca.feed_packet(&pkt(5, 0));
        ca.reset();
        assert_eq!(ca.total_packets(), 0);
        assert_eq!(ca.error_count(), 0);
        assert_eq!(ca.first_cc(PID), INVALID_CC);
        assert!(ca.options().fix);
        assert_eq!(ca.options().prefix, "x: ");
        assert!(ca.has_pid(PID));
    }

    #[test]
    fn test_display_messages() {
        let rep = Rc::new(CollectReport::new());
        let mut ca = analyzer();
        ca.set_report(Some(Box::new(rep.clone())));
        ca.feed_packet(&pkt(3, 0));
        ca.feed_packet(&pkt(7, 0));
        assert!(rep.is_empty());

        ca.set_display(true);
        ca.set_message_prefix("cc: ");
        ca.set_message_severity(Severity::Warning);
        ca.feed_packet(&pkt(12, 0));
        let msgs = rep.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].0, Severity::Warning);
        assert!(msgs[0].1.starts_with("cc: "));
        assert!(msgs[0].1.contains("PID 0x0100 (256)"));
        assert!(msgs[0].1.contains("CC 7 -> 12, missing 4 packets"));
        assert_eq!(ca.error_count(), 2);
    }

    #[test]
    fn test_options_deserialize() {
        let opts: ContinuityOptions =
            serde_json::from_str(r#"{"fix": true, "severity": "warning"}"#).unwrap();
        assert!(opts.fix);
        assert!(!opts.generator);
        assert_eq!(opts.severity, Severity::Warning);
        assert_eq!(opts.max_duplicates, DEFAULT_MAX_DUPLICATES);
    }
}
