// Step balancer: keeps the three cadence steps' daily volume even.

use crate::models::StepCounts;

/// Pick the step that should receive the next send: the one with the
/// largest deficit against an even third of the daily limit, ties broken
/// toward the lowest sequence number. Total over all inputs; when every
/// step has met its share the least over-served step is still returned and
/// the eligibility filter decides whether anything actually sends.
pub fn next_sequence(counts: &StepCounts, daily_limit: i32) -> i16 {
    let share = f64::from(daily_limit.max(0)) / 3.0;
    let deficits = [
        share - counts.seq1 as f64,
        share - counts.seq2 as f64,
        share - counts.seq3 as f64,
    ];

    let mut best = 0;
    for (i, deficit) in deficits.iter().enumerate().skip(1) {
        if *deficit > deficits[best] {
            best = i;
        }
    }
    (best + 1) as i16
}
