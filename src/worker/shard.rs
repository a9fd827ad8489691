use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Contiguous half-open slice of a work range owned by one shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardAssignment {
    pub shard: usize,
    pub start: usize,
    pub end: usize,
}

impl ShardAssignment {
    /// Split `range` evenly into `shards` parts and return part `shard`.
    pub fn split(shard: usize, shards: usize, range: Range<usize>) -> Self {
        let span = range.end.saturating_sub(range.start);
        let shards = shards.max(1);
        Self {
            shard,
            start: range.start + shard * span / shards,
            end: range.start + (shard + 1) * span / shards,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Running maximum shared by every shard of one run.
///
/// Values are non-negative, so ordering their IEEE-754 bit patterns as
/// integers preserves numeric order and `fetch_max` is a true atomic max.
#[derive(Clone, Debug, Default)]
pub struct SharedPeak {
    bits: Arc<AtomicU64>,
}

impl SharedPeak {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: f64) {
        if value.is_finite() && value > 0.0 {
            self.bits.fetch_max(value.to_bits(), Ordering::AcqRel);
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn reset(&self) {
        self.bits.store(0, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct GateState {
    arrived: usize,
    abandoned: bool,
}

/// Rendezvous point between the phases of a sharded computation.
///
/// Unlike `std::sync::Barrier`, a party that leaves without arriving marks
/// the gate abandoned, releasing everyone still waiting.
#[derive(Debug)]
pub struct PhaseGate {
    parties: usize,
    state: Mutex<GateState>,
    cvar: Condvar,
}

impl PhaseGate {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(GateState::default()),
            cvar: Condvar::new(),
        }
    }

    /// Block until all parties arrived. Returns false if the gate was abandoned.
    pub fn arrive_and_wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.arrived += 1;
        self.cvar.notify_all();
        while state.arrived < self.parties && !state.abandoned {
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !state.abandoned
    }

    pub fn abandon(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.abandoned = true;
        self.cvar.notify_all();
    }

    /// Guard that abandons the gate if dropped before [`GateTicket::arrive`].
    pub fn ticket(&self) -> GateTicket<'_> {
        GateTicket {
            gate: self,
            arrived: false,
        }
    }
}

pub struct GateTicket<'a> {
    gate: &'a PhaseGate,
    arrived: bool,
}

impl GateTicket<'_> {
    pub fn arrive(mut self) -> bool {
        self.arrived = true;
        self.gate.arrive_and_wait()
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        if !self.arrived {
            self.gate.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn split_covers_range_without_overlap() {
        let shards = 16;
        let parts: Vec<_> = (0..shards)
            .map(|s| ShardAssignment::split(s, shards, 100..1000))
            .collect();
        assert_eq!(parts[0].start, 100);
        assert_eq!(parts[shards - 1].end, 1000);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(parts.iter().map(|p| p.len()).sum::<usize>(), 900);
    }

    #[test]
    fn split_with_more_shards_than_work() {
        let parts: Vec<_> = (0..8).map(|s| ShardAssignment::split(s, 8, 0..3)).collect();
        assert_eq!(parts.iter().filter(|p| !p.is_empty()).count(), 3);
        assert_eq!(parts.iter().map(|p| p.len()).sum::<usize>(), 3);
    }

    #[test]
    fn shared_peak_is_a_concurrent_max() {
        let peak = SharedPeak::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let peak = peak.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        peak.update((t * 1000 + i) as f64 * 0.5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(peak.get(), 7999.0 * 0.5);

        peak.update(f64::NAN);
        peak.update(-1.0);
        assert_eq!(peak.get(), 7999.0 * 0.5);

        peak.reset();
        assert_eq!(peak.get(), 0.0);
    }

    #[test]
    fn gate_releases_all_parties() {
        let gate = Arc::new(PhaseGate::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.ticket().arrive())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn dropped_ticket_abandons_gate() {
        let gate = Arc::new(PhaseGate::new(2));
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.ticket().arrive())
        };
        drop(gate.ticket());
        assert!(!waiter.join().unwrap());
    }
}
