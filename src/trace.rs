use serde::Serialize;

use crate::model::QuadraticParams;

/// One iteration: where the cost was evaluated, its gradient there and the cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceRecord {
    pub params: QuadraticParams,
    pub gradient: [f64; 3],
    pub cost: f64,
}

impl TraceRecord {
    pub fn is_finite(&self) -> bool {
        self.cost.is_finite()
            && self.params.is_finite()
            && self.gradient.iter().all(|g| g.is_finite())
    }

    pub fn gradient_norm(&self) -> f64 {
        self.gradient.iter().map(|g| g.powi(2)).sum::<f64>().sqrt()
    }
}

/// Append-only run history plus the running lowest-cost record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizationTrace {
    records: Vec<TraceRecord>,
    best: Option<TraceRecord>,
    diverged_at: Option<usize>,
}

impl OptimizationTrace {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn push(&mut self, record: TraceRecord) {
        if self.diverged_at.is_none() && !record.is_finite() {
            self.diverged_at = Some(self.records.len());
        }

        self.best = match self.best {
            _ if record.cost.is_nan() => self.best,
            Some(best) if record.cost >= best.cost => Some(best),
            _ => Some(record),
        };

        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn best(&self) -> Option<&TraceRecord> {
        self.best.as_ref()
    }

    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.last()
    }

    pub fn costs(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.cost)
    }

    /// Index of the first record with a non-finite cost, gradient or parameter.
    pub fn diverged_at(&self) -> Option<usize> {
        self.diverged_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<TraceRecord> for OptimizationTrace {
    fn from_iter<I: IntoIterator<Item = TraceRecord>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut trace, record| {
            trace.push(record);
            trace
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cost: f64) -> TraceRecord {
        TraceRecord {
            params: QuadraticParams::new(cost, 0., 0.),
            gradient: [0.; 3],
            cost,
        }
    }

    #[test]
    fn best_is_lowest_not_last() {
        let trace: OptimizationTrace = [5., 2., 3., 4.].map(record).into_iter().collect();

        assert_eq!(trace.best().unwrap().cost, 2.);
        assert_eq!(trace.last().unwrap().cost, 4.);
        assert_eq!(trace.diverged_at(), None);
    }

    #[test]
    fn ties_keep_the_earliest_record() {
        let mut trace = OptimizationTrace::default();
        trace.push(record(1.));
        trace.push(TraceRecord {
            params: QuadraticParams::new(9., 9., 9.),
            ..record(1.)
        });

        assert_eq!(trace.best().unwrap().params.a, 1.);
    }

    #[test]
    fn divergence_is_flagged_once() {
        let trace: OptimizationTrace = [3., 10., f64::INFINITY, f64::NAN, 1e300]
            .map(record)
            .into_iter()
            .collect();

        assert_eq!(trace.diverged_at(), Some(2));
        assert_eq!(trace.best().unwrap().cost, 3.);
    }

    #[test]
    fn nan_first_does_not_poison_best() {
        let trace: OptimizationTrace = [f64::NAN, 4.].map(record).into_iter().collect();

        assert_eq!(trace.best().unwrap().cost, 4.);
    }
}
