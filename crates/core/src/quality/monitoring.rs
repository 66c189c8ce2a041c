//! Batch trend monitoring over recorded effectiveness scores.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quality::ResponseEffectivenessScore;

pub const SHARP_DECLINE_POINTS: f64 = 10.0;
pub const TREND_STABLE_BAND: f64 = 5.0;
pub const WEAK_DIMENSION_FLOOR: f64 = 60.0;
pub const MIN_REPLY_RATE: f64 = 0.30;

const MAX_WINDOW_HOURS: u64 = 24 * 366;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BelowIndustryAverage,
    SharpDecline,
    WeakDimension,
    LowReplyRate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityAlert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub count: usize,
    pub average_overall: f64,
    pub reply_rate: f64,
    pub dimension_averages: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub current: Option<WindowStats>,
    pub previous: Option<WindowStats>,
    pub trend: Trend,
    pub alerts: Vec<QualityAlert>,
}

/// Compares the most recent window of scores with the window before it.
#[derive(Clone, Copy, Debug)]
pub struct QualityMonitor {
    industry_average: u8,
    window: Duration,
}

impl QualityMonitor {
    pub fn new(industry_average: u8, window_hours: u64) -> Self {
        let hours = window_hours.clamp(1, MAX_WINDOW_HOURS) as i64;
        Self { industry_average, window: Duration::hours(hours) }
    }

    /// Degraded placeholder scores are left out of every statistic.
    pub fn analyze(&self, scores: &[ResponseEffectivenessScore], now: DateTime<Utc>) -> QualityReport {
        let window_start = now - self.window;
        let previous_start = window_start - self.window;

        let current = window_stats(
            scores.iter().filter(|score| score.scored_at > window_start && score.scored_at <= now),
        );
        let previous = window_stats(
            scores
                .iter()
                .filter(|score| score.scored_at > previous_start && score.scored_at <= window_start),
        );

        let delta = match (&current, &previous) {
            (Some(current), Some(previous)) => Some(current.average_overall - previous.average_overall),
            _ => None,
        };
        let trend = match delta {
            Some(delta) if delta > TREND_STABLE_BAND => Trend::Improving,
            Some(delta) if delta < -TREND_STABLE_BAND => Trend::Declining,
            _ => Trend::Stable,
        };

        let mut alerts = Vec::new();
        if let Some(stats) = &current {
            let industry_average = f64::from(self.industry_average);
            if stats.average_overall < industry_average {
                alerts.push(QualityAlert {
                    kind: AlertKind::BelowIndustryAverage,
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "average effectiveness {:.1} is below the industry average of {}",
                        stats.average_overall, self.industry_average
                    ),
                });
            }

            if let Some(delta) = delta.filter(|delta| *delta < -SHARP_DECLINE_POINTS) {
                alerts.push(QualityAlert {
                    kind: AlertKind::SharpDecline,
                    severity: AlertSeverity::Critical,
                    message: format!("average effectiveness dropped {:.1} points", -delta),
                });
            }

            for (dimension, average) in &stats.dimension_averages {
                if *average < WEAK_DIMENSION_FLOOR {
                    alerts.push(QualityAlert {
                        kind: AlertKind::WeakDimension,
                        severity: AlertSeverity::Warning,
                        message: format!("{dimension} averages {average:.1}"),
                    });
                }
            }

            if stats.reply_rate < MIN_REPLY_RATE {
                alerts.push(QualityAlert {
                    kind: AlertKind::LowReplyRate,
                    severity: AlertSeverity::Critical,
                    message: format!("only {:.0}% of responses got a reply", stats.reply_rate * 100.0),
                });
            }
        }

        QualityReport { window_start, window_end: now, current, previous, trend, alerts }
    }
}

fn window_stats<'a>(
    scores: impl Iterator<Item = &'a ResponseEffectivenessScore>,
) -> Option<WindowStats> {
    let scores: Vec<&ResponseEffectivenessScore> = scores.filter(|score| !score.degraded).collect();
    if scores.is_empty() {
        return None;
    }

    let count = scores.len();
    let average_overall =
        scores.iter().map(|score| f64::from(score.overall)).sum::<f64>() / count as f64;
    let replies = scores.iter().filter(|score| score.impact.customer_replied).count();

    let mut dimension_totals: BTreeMap<String, f64> = BTreeMap::new();
    for score in &scores {
        for (name, value) in score.dimensions.named() {
            *dimension_totals.entry(name.to_string()).or_insert(0.0) += f64::from(value);
        }
    }
    let dimension_averages =
        dimension_totals.into_iter().map(|(name, total)| (name, total / count as f64)).collect();

    Some(WindowStats {
        count,
        average_overall,
        reply_rate: replies as f64 / count as f64,
        dimension_averages,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{AlertKind, QualityMonitor, Trend};
    use crate::domain::conversation::ConversationId;
    use crate::domain::quality::{
        BenchmarkTier, QualityDimensions, ResponseEffectivenessScore, ResponseImpact,
    };

    fn score(overall: u8, replied: bool, hours_ago: i64, degraded: bool) -> ResponseEffectivenessScore {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        ResponseEffectivenessScore {
            response_id: format!("resp-{overall}-{hours_ago}"),
            conversation_id: ConversationId("conv-1".to_string()),
            overall,
            dimensions: QualityDimensions::uniform(overall),
            impact: ResponseImpact { customer_replied: replied, ..ResponseImpact::default() },
            benchmark: BenchmarkTier::Average,
            recommendations: Vec::new(),
            degraded,
            scored_at: now - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn sharp_decline_and_low_scores_raise_alerts() {
        let monitor = QualityMonitor::new(72, 24);
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let scores = vec![
            score(85, true, 30, false),
            score(83, true, 40, false),
            score(56, false, 2, false),
            score(62, true, 5, false),
            score(70, false, 6, true),
        ];

        let report = monitor.analyze(&scores, now);

        assert_eq!(report.trend, Trend::Declining);
        let current = report.current.as_ref().expect("current window has scores");
        assert_eq!(current.count, 2);
        let kinds: Vec<AlertKind> = report.alerts.iter().map(|alert| alert.kind).collect();
        assert!(kinds.contains(&AlertKind::BelowIndustryAverage));
        assert!(kinds.contains(&AlertKind::SharpDecline));
        assert!(kinds.contains(&AlertKind::WeakDimension));
        assert!(!kinds.contains(&AlertKind::LowReplyRate));
    }

    #[test]
    fn healthy_window_is_quiet() {
        let monitor = QualityMonitor::new(72, 24);
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let scores = vec![score(80, true, 1, false), score(84, true, 3, false), score(79, false, 26, false)];

        let report = monitor.analyze(&scores, now);

        assert!(report.alerts.is_empty(), "alerts: {:?}", report.alerts);
        assert_eq!(report.trend, Trend::Stable);
    }

    #[test]
    fn empty_history_has_no_alerts() {
        let monitor = QualityMonitor::new(72, 24);
        let report = monitor.analyze(&[], Utc::now());

        assert!(report.current.is_none());
        assert!(report.alerts.is_empty());
        assert_eq!(report.trend, Trend::Stable);
    }
}
