use crate::snapshot::NetworkStats;
use std::collections::HashMap;
use std::time::SystemTime;

// baseline from the last successful network query
#[derive(Debug, Default)]
pub(crate) struct RateState {
    previous: Option<NetworkSample>,
}

#[derive(Debug)]
struct NetworkSample {
    interfaces: Vec<NetworkStats>,
    taken_at: SystemTime,
}

impl RateState {
    pub(crate) fn advance(&mut self, current: &mut [NetworkStats], now: SystemTime) {
        for iface in current.iter_mut() {
            iface.send_rate = 0.0;
            iface.recv_rate = 0.0;
        }
        if let Some(prev) = &self.previous {
            fill_rates(&prev.interfaces, prev.taken_at, current, now);
        }
        self.previous = Some(NetworkSample {
            interfaces: current.to_vec(),
            taken_at: now,
        });
    }

    #[cfg(test)]
    pub(crate) fn baseline_time(&self) -> Option<SystemTime> {
        self.previous.as_ref().map(|p| p.taken_at)
    }
}

/// Bytes/second between two samples. New interfaces keep a zero rate; a counter
/// that went backwards (reset or wrap) also reports zero instead of reconstructing
/// the wrap. Nothing is computed when no time has elapsed.
pub fn fill_rates(
    previous: &[NetworkStats],
    previous_at: SystemTime,
    current: &mut [NetworkStats],
    now: SystemTime,
) {
    let elapsed = match now.duration_since(previous_at) {
        Ok(d) if !d.is_zero() => d.as_secs_f64(),
        _ => return,
    };

    let prev_by_name: HashMap<&str, &NetworkStats> = previous
        .iter()
        .map(|p| (p.interface.as_str(), p))
        .collect();

    for iface in current.iter_mut() {
        if let Some(prev) = prev_by_name.get(iface.interface.as_str()) {
            iface.send_rate = counter_rate(prev.bytes_sent, iface.bytes_sent, elapsed);
            iface.recv_rate = counter_rate(prev.bytes_recv, iface.bytes_recv, elapsed);
        }
    }
}

fn counter_rate(prev: u64, curr: u64, elapsed_secs: f64) -> f64 {
    if curr < prev {
        return 0.0;
    }
    (curr - prev) as f64 / elapsed_secs
}
