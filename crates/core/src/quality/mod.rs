//! Response quality optimization: A/B experiments, effectiveness scoring, personalization
//! tuning and trend monitoring behind one explicitly constructed service.

mod experiments;
mod monitoring;
mod personalization;
mod scoring;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

pub use experiments::{
    pick_variant, winner, ExperimentError, ExperimentRegistry, NewAbTest, NewVariant,
    ResultsUpdate, TOTAL_WEIGHT,
};
pub use monitoring::{
    AlertKind, AlertSeverity, QualityAlert, QualityMonitor, QualityReport, Trend, WindowStats,
};
pub use personalization::{detect_topics, segment_for, PersonalizationSample, PersonalizationTuner};
pub use scoring::{EffectivenessScorer, QualityError, ScoringInput, NEUTRAL_SCORE};

use crate::config::QualityConfig;
use crate::domain::experiment::{
    AbTestConfiguration, AbTestId, LeadProfile, VariantAssignment, VariantOutcome,
};
use crate::domain::quality::{LeadSegment, PersonalizationProfile, ResponseEffectivenessScore};

#[derive(Debug)]
pub struct ResponseQualityOptimizer {
    experiments: ExperimentRegistry,
    scorer: EffectivenessScorer,
    tuner: PersonalizationTuner,
    monitor: QualityMonitor,
    history_limit: usize,
    history: Mutex<VecDeque<ResponseEffectivenessScore>>,
}

impl ResponseQualityOptimizer {
    pub fn new(config: QualityConfig, now: DateTime<Utc>) -> Self {
        Self {
            experiments: ExperimentRegistry::new(config.min_sample_size, config.min_variants),
            scorer: EffectivenessScorer::new(config.industry_average, config.top_performer),
            tuner: PersonalizationTuner::new(config.min_profile_samples, now),
            monitor: QualityMonitor::new(config.industry_average, config.trend_window_hours),
            history_limit: config.score_history_limit,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn scorer(&self) -> &EffectivenessScorer {
        &self.scorer
    }

    /// Scores a response without recording it. Scoring failures never reach the caller: a
    /// neutral, degraded score is returned instead.
    pub fn assess(&self, input: &ScoringInput<'_>, now: DateTime<Utc>) -> ResponseEffectivenessScore {
        match self.scorer.score(input, now) {
            Ok(score) => score,
            Err(error) => {
                warn!(
                    event_name = "quality.scoring.degraded",
                    conversation_id = %input.conversation_id,
                    error = %error,
                    "response scoring failed, using neutral score"
                );
                self.scorer.neutral(input, now)
            }
        }
    }

    /// Scores a sent response and appends it to the bounded score history.
    pub fn score_response(
        &self,
        input: &ScoringInput<'_>,
        now: DateTime<Utc>,
    ) -> ResponseEffectivenessScore {
        let score = self.assess(input, now);

        let mut history = self.history();
        history.push_back(score.clone());
        while history.len() > self.history_limit {
            history.pop_front();
        }
        score
    }

    pub fn score_history(&self) -> Vec<ResponseEffectivenessScore> {
        self.history().iter().cloned().collect()
    }

    pub fn create_ab_test(
        &self,
        new_test: NewAbTest,
        now: DateTime<Utc>,
    ) -> Result<AbTestId, ExperimentError> {
        self.experiments.create(new_test, now)
    }

    pub fn start_ab_test(&self, test_id: &AbTestId, now: DateTime<Utc>) -> Result<(), ExperimentError> {
        self.experiments.start(test_id, now)
    }

    pub fn pause_ab_test(&self, test_id: &AbTestId) -> Result<(), ExperimentError> {
        self.experiments.pause(test_id)
    }

    pub fn complete_ab_test(
        &self,
        test_id: &AbTestId,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ExperimentError> {
        self.experiments.complete(test_id, now)
    }

    pub fn update_ab_test_results(
        &self,
        test_id: &AbTestId,
        variant_id: &str,
        outcome: VariantOutcome,
        now: DateTime<Utc>,
    ) -> Result<ResultsUpdate, ExperimentError> {
        self.experiments.update_results(test_id, variant_id, outcome, now)
    }

    pub fn ab_test(&self, test_id: &AbTestId) -> Option<AbTestConfiguration> {
        self.experiments.get(test_id)
    }

    pub fn ab_tests(&self) -> Vec<AbTestConfiguration> {
        self.experiments.list()
    }

    pub fn select_variant(&self, lead: &LeadProfile) -> Option<VariantAssignment> {
        self.experiments.select_variant(lead)
    }

    pub fn select_variant_with<R: Rng + ?Sized>(
        &self,
        lead: &LeadProfile,
        rng: &mut R,
    ) -> Option<VariantAssignment> {
        self.experiments.select_variant_with(lead, rng)
    }

    pub fn personalization_profile(&self, segment: LeadSegment) -> PersonalizationProfile {
        self.tuner.profile(segment)
    }

    pub fn personalization_profiles(&self) -> Vec<PersonalizationProfile> {
        self.tuner.profiles()
    }

    pub fn retune_personalization(
        &self,
        samples: &[PersonalizationSample],
        now: DateTime<Utc>,
    ) -> Vec<LeadSegment> {
        self.tuner.retune(samples, now)
    }

    /// Trend report over the recorded score history.
    pub fn monitor(&self, now: DateTime<Utc>) -> QualityReport {
        let history: Vec<ResponseEffectivenessScore> = self.score_history();
        self.monitor.analyze(&history, now)
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<ResponseEffectivenessScore>> {
        match self.history.lock() {
            Ok(history) => history,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{NewAbTest, NewVariant, ResponseQualityOptimizer, ScoringInput};
    use crate::config::QualityConfig;
    use crate::domain::conversation::{ConversationId, LeadContext};
    use crate::domain::experiment::{
        AbTestStatus, LeadProfile, ResponseStrategy, Segmentation, VariantOutcome,
    };
    use crate::domain::quality::ResponseImpact;

    fn optimizer(history_limit: usize) -> ResponseQualityOptimizer {
        let config = QualityConfig { score_history_limit: history_limit, ..QualityConfig::default() };
        ResponseQualityOptimizer::new(config, Utc::now())
    }

    fn variant(id: &str, weight: u8) -> NewVariant {
        NewVariant {
            id: id.to_string(),
            name: format!("variant {id}"),
            weight,
            strategy: ResponseStrategy::default(),
        }
    }

    #[test]
    fn failed_scoring_records_a_neutral_degraded_score() {
        let optimizer = optimizer(10);
        let conversation_id = ConversationId("conv-7".to_string());
        let lead = LeadContext::default();
        let input = ScoringInput {
            response_id: Some("resp-1"),
            conversation_id: &conversation_id,
            response: "   ",
            original_message: "Is the Camry still available?",
            lead: &lead,
            impact: ResponseImpact::default(),
        };

        let score = optimizer.score_response(&input, Utc::now());

        assert!(score.degraded);
        assert_eq!(score.overall, 70);
        assert_eq!(optimizer.score_history().len(), 1);

        let preview = optimizer.assess(&input, Utc::now());
        assert!(preview.degraded);
        assert_eq!(optimizer.score_history().len(), 1);
    }

    #[test]
    fn score_history_is_bounded() {
        let optimizer = optimizer(2);
        let conversation_id = ConversationId("conv-8".to_string());
        let lead = LeadContext::default();
        for response in ["Happy to help!", "Would Saturday work for a test drive?", "Thanks!"] {
            let input = ScoringInput {
                response_id: None,
                conversation_id: &conversation_id,
                response,
                original_message: "Can I test drive it?",
                lead: &lead,
                impact: ResponseImpact::default(),
            };
            optimizer.score_response(&input, Utc::now());
        }

        let history = optimizer.score_history();
        assert_eq!(history.len(), 2);
        assert!(optimizer.monitor(Utc::now()).current.is_some());
    }

    #[test]
    fn experiment_flow_runs_through_the_facade() {
        let optimizer = optimizer(10);
        let now = Utc::now();
        let test_id = optimizer
            .create_ab_test(
                NewAbTest {
                    name: "tone check".to_string(),
                    segmentation: Segmentation::default(),
                    variants: vec![variant("a", 50), variant("b", 50)],
                    required_sample_size: 50,
                },
                now,
            )
            .expect("valid test");
        optimizer.start_ab_test(&test_id, now).expect("start");

        let mut rng = StdRng::seed_from_u64(7);
        let assignment = optimizer
            .select_variant_with(&LeadProfile::default(), &mut rng)
            .expect("active test matches every lead");
        assert_eq!(assignment.test_id, test_id);

        optimizer
            .update_ab_test_results(
                &test_id,
                &assignment.variant_id,
                VariantOutcome { impression: true, responded: true, ..VariantOutcome::default() },
                now,
            )
            .expect("outcome accepted");
        optimizer.pause_ab_test(&test_id).expect("pause");
        let winner = optimizer.complete_ab_test(&test_id, now).expect("complete");

        assert_eq!(winner.as_deref(), Some(assignment.variant_id.as_str()));
        let test = optimizer.ab_test(&test_id).expect("test exists");
        assert_eq!(test.status, AbTestStatus::Completed);
        assert_eq!(optimizer.ab_tests().len(), 1);
    }
}
