use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::fingerprint::Fingerprint;

/// In-process single-flight registry keyed by fingerprint.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    active: Mutex<HashSet<Fingerprint>>,
    released: Condvar,
}

impl SingleFlight {
    pub(crate) fn claim(&self, fingerprint: Fingerprint) -> FlightGuard<'_> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        while active.contains(&fingerprint) {
            active = self
                .released
                .wait(active)
                .unwrap_or_else(PoisonError::into_inner);
        }
        active.insert(fingerprint);
        FlightGuard {
            flights: self,
            fingerprint,
        }
    }

    fn release(&self, fingerprint: &Fingerprint) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(fingerprint);
        self.released.notify_all();
    }
}

/// Exclusive right to evaluate one fingerprint; released on drop.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flights: &'a SingleFlight,
    fingerprint: Fingerprint,
}

impl FlightGuard<'_> {
    /// Fingerprint held by this guard.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.release(&self.fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn claims_on_one_fingerprint_are_serialized() {
        let flights = Arc::new(SingleFlight::default());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fp = Fingerprint::from_bytes([7; 32]);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flights = Arc::clone(&flights);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _guard = flights.claim(fp);
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_fingerprints_do_not_block() {
        let flights = SingleFlight::default();
        let a = flights.claim(Fingerprint::from_bytes([1; 32]));
        let b = flights.claim(Fingerprint::from_bytes([2; 32]));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
