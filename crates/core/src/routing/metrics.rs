use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::routing::RoutingType;

/// Decision-type tallies shared across concurrently routed conversations.
#[derive(Debug, Default)]
pub struct RoutingMetrics {
    ai_generated: AtomicU64,
    template_based: AtomicU64,
    human_escalation: AtomicU64,
    automated_action: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingMetricsSnapshot {
    pub ai_generated: u64,
    pub template_based: u64,
    pub human_escalation: u64,
    pub automated_action: u64,
    pub total: u64,
}

impl RoutingMetricsSnapshot {
    pub fn escalation_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.human_escalation as f64 / self.total as f64
        }
    }
}

impl RoutingMetrics {
    pub fn record(&self, routing_type: RoutingType) {
        self.counter(routing_type).fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, routing_type: RoutingType) -> u64 {
        self.counter(routing_type).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RoutingMetricsSnapshot {
        let ai_generated = self.count(RoutingType::AiGenerated);
        let template_based = self.count(RoutingType::TemplateBased);
        let human_escalation = self.count(RoutingType::HumanEscalation);
        let automated_action = self.count(RoutingType::AutomatedAction);
        RoutingMetricsSnapshot {
            ai_generated,
            template_based,
            human_escalation,
            automated_action,
            total: ai_generated + template_based + human_escalation + automated_action,
        }
    }

    fn counter(&self, routing_type: RoutingType) -> &AtomicU64 {
        match routing_type {
            RoutingType::AiGenerated => &self.ai_generated,
            RoutingType::TemplateBased => &self.template_based,
            RoutingType::HumanEscalation => &self.human_escalation,
            RoutingType::AutomatedAction => &self.automated_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::RoutingMetrics;
    use crate::domain::routing::RoutingType;

    #[test]
    fn concurrent_records_are_all_counted() {
        let metrics = Arc::new(RoutingMetrics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record(RoutingType::TemplateBased);
                    }
                    metrics.record(RoutingType::HumanEscalation);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker finished");
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.template_based, 800);
        assert_eq!(snapshot.human_escalation, 8);
        assert_eq!(snapshot.total, 808);
        assert!((snapshot.escalation_rate() - 8.0 / 808.0).abs() < f64::EPSILON);
    }
}
