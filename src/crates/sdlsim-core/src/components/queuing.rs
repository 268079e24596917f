//! Steady-state queueing math shared by the Queue, ResourcePool and Batcher
//! models
//!
//! Continuous waiting-time laws are discretized into a parameterized bucket
//! count before they enter the outcome algebra; the cap is surfaced to users
//! as the models' `BucketCount` parameter.

/// Steady-state metrics for an M/M/c queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmcMetrics {
    /// Server utilization ρ = λ / (c·μ)
    pub utilization: f64,
    /// Erlang-C probability that an arrival waits
    pub prob_wait: f64,
    /// Mean time in queue Wq
    pub mean_wait: f64,
    /// Mean of the conditional wait given the arrival waits
    pub cond_wait: f64,
}

/// Steady-state metrics for an M/M/c/K queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmckMetrics {
    /// Blocking probability P_K (arrival finds the system full)
    pub blocking: f64,
    /// Mean queueing delay of admitted customers
    pub mean_wait: f64,
    /// Probability an admitted arrival starts service immediately
    pub prob_no_wait: f64,
    pub utilization: f64,
}

/// Erlang-B blocking probability for `servers` lines offered `offered`
/// erlangs, via the numerically stable recurrence.
pub fn erlang_b(servers: u64, offered: f64) -> f64 {
    if offered <= 0.0 {
        return 0.0;
    }
    let mut b = 1.0;
    for n in 1..=servers {
        b = offered * b / (n as f64 + offered * b);
    }
    b
}

/// Erlang-C probability of waiting for an M/M/c queue with offered load
/// `offered` = λ·Ts. Returns 1.0 at or beyond saturation.
pub fn erlang_c(servers: u64, offered: f64) -> f64 {
    let c = servers as f64;
    if offered >= c {
        return 1.0;
    }
    let b = erlang_b(servers, offered);
    c * b / (c - offered * (1.0 - b))
}

/// M/M/c steady state; `None` when the queue is unstable (ρ ≥ 1) or the
/// inputs are degenerate.
pub fn mmc(servers: u64, arrival_rate: f64, service_time: f64) -> Option<MmcMetrics> {
    if servers == 0 || arrival_rate < 0.0 || service_time <= 0.0 {
        return None;
    }
    let c = servers as f64;
    let offered = arrival_rate * service_time;
    let utilization = offered / c;
    if utilization >= 1.0 {
        return None;
    }
    if arrival_rate == 0.0 {
        return Some(MmcMetrics {
            utilization: 0.0,
            prob_wait: 0.0,
            mean_wait: 0.0,
            cond_wait: 0.0,
        });
    }
    let prob_wait = erlang_c(servers, offered);
    // Conditional wait of a delayed customer is exponential with rate
    // c·μ − λ.
    let cond_wait = service_time / (c - offered);
    Some(MmcMetrics {
        utilization,
        prob_wait,
        mean_wait: prob_wait * cond_wait,
        cond_wait,
    })
}

/// M/M/c/K steady state via the birth-death state probabilities.
///
/// `capacity` is the total number of customers the system holds (in service
/// plus queued), clamped up to `servers`.
pub fn mmck(servers: u64, capacity: u64, arrival_rate: f64, service_time: f64) -> MmckMetrics {
    let servers = servers.max(1);
    let capacity = capacity.max(servers);
    if arrival_rate <= 0.0 || service_time <= 0.0 {
        return MmckMetrics {
            blocking: 0.0,
            mean_wait: 0.0,
            prob_no_wait: 1.0,
            utilization: 0.0,
        };
    }

    let offered = arrival_rate * service_time;
    let c = servers as f64;
    let rho = offered / c;

    // Unnormalized state weights; term carries a^n / n! up to c, then the
    // geometric extension a^c/c! · ρ^(n-c).
    let mut weights = Vec::with_capacity(capacity as usize + 1);
    let mut term = 1.0;
    weights.push(term);
    for n in 1..=capacity {
        if n <= servers {
            term *= offered / n as f64;
        } else {
            term *= rho;
        }
        weights.push(term);
    }
    let norm: f64 = weights.iter().sum();

    let p = |n: usize| weights[n] / norm;
    let blocking = p(capacity as usize);

    let mut queue_len = 0.0;
    for n in (servers + 1)..=capacity {
        queue_len += (n - servers) as f64 * p(n as usize);
    }
    let admitted_rate = arrival_rate * (1.0 - blocking);
    let mean_wait = if admitted_rate > 0.0 {
        queue_len / admitted_rate
    } else {
        0.0
    };

    // Probability an *admitted* arrival finds a free server (PASTA over the
    // non-blocked states).
    let mut idle_mass = 0.0;
    for n in 0..servers {
        idle_mass += p(n as usize);
    }
    let prob_no_wait = if blocking < 1.0 {
        (idle_mass / (1.0 - blocking)).min(1.0)
    } else {
        0.0
    };

    let mut busy = 0.0;
    for n in 0..=capacity {
        busy += (n.min(servers)) as f64 * p(n as usize);
    }

    MmckMetrics {
        blocking,
        mean_wait,
        prob_no_wait,
        utilization: busy / c,
    }
}

/// Discretize a waiting-time law made of an atom at zero plus an
/// exponential tail with mean `tail_mean` into at most `buckets` tail
/// buckets, each holding equal probability mass at its quantile midpoint.
///
/// Returns `(weight, duration)` pairs with total weight 1.
pub fn discretized_wait(prob_zero: f64, tail_mean: f64, buckets: usize) -> Vec<(f64, f64)> {
    let prob_zero = prob_zero.clamp(0.0, 1.0);
    let tail_mass = 1.0 - prob_zero;
    let mut out = Vec::new();
    if prob_zero > 0.0 {
        out.push((prob_zero, 0.0));
    }
    if tail_mass <= f64::EPSILON || tail_mean <= 0.0 {
        if out.is_empty() {
            out.push((1.0, 0.0));
        }
        return out;
    }
    let n = buckets.max(1);
    let slice = tail_mass / n as f64;
    for i in 0..n {
        let q = (i as f64 + 0.5) / n as f64;
        let duration = -tail_mean * (1.0 - q).ln();
        out.push((slice, duration));
    }
    out
}
