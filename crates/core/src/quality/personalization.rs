//! Per-segment personalization profiles, re-tuned in batches from past response outcomes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::vocabulary;
use crate::domain::experiment::Tone;
use crate::domain::quality::{LeadSegment, PersonalizationProfile};

const MIN_RATE: f64 = 0.1;
const MAX_RATE: f64 = 0.9;
const PREFERRED_TOPIC_COUNT: usize = 3;

/// Segment keywords in match order. Anything unmatched is general.
const SEGMENT_KEYWORDS: &[(LeadSegment, &[&str])] = &[
    (
        LeadSegment::Electric,
        &["electric", "ev", "tesla", "hybrid", "plug-in", "ioniq", "leaf", "bolt", "mach-e"],
    ),
    (
        LeadSegment::Luxury,
        &["luxury", "bmw", "mercedes", "lexus", "audi", "porsche", "cadillac", "genesis", "acura"],
    ),
    (
        LeadSegment::Truck,
        &["truck", "pickup", "f-150", "silverado", "ram", "tacoma", "tundra", "sierra", "ranger"],
    ),
    (
        LeadSegment::Family,
        &["suv", "minivan", "van", "odyssey", "sienna", "pilot", "highlander", "family", "third row"],
    ),
];

/// Content topics a response can cover, keyed by the words that mark them.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("pricing", &["price", "pricing", "msrp", "discount", "deal", "offer"]),
    ("financing", &["financing", "finance", "apr", "loan", "lease", "monthly payment"]),
    ("availability", &["in stock", "available", "availability", "inventory", "on the lot"]),
    ("test_drive", &["test drive", "drive it", "take it for a spin"]),
    ("trade_in", &["trade-in", "trade in", "appraisal"]),
    ("features", &["features", "package", "trim", "technology", "interior"]),
    ("safety", &["safety", "crash", "airbags", "driver assist"]),
    ("towing", &["towing", "tow", "payload", "hitch"]),
    ("range", &["range", "charging", "charger", "battery"]),
    ("warranty", &["warranty", "coverage", "certified"]),
];

pub fn detect_topics(text: &str) -> Vec<String> {
    let padded = vocabulary::word_padded(text);
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| vocabulary::contains_phrase(&padded, keyword)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}

pub fn segment_for(vehicle_interest: Option<&str>) -> LeadSegment {
    let Some(interest) = vehicle_interest else {
        return LeadSegment::General;
    };
    let padded = vocabulary::word_padded(interest);
    SEGMENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| vocabulary::contains_phrase(&padded, keyword)))
        .map(|(segment, _)| *segment)
        .unwrap_or(LeadSegment::General)
}

/// One scored response with the personalization choices it made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizationSample {
    pub segment: LeadSegment,
    pub used_name: bool,
    pub referenced_vehicle: bool,
    pub tone: Tone,
    pub topics: Vec<String>,
    pub score: u8,
}

fn default_profile(segment: LeadSegment, now: DateTime<Utc>) -> PersonalizationProfile {
    let (tone, topics): (Tone, &[&str]) = match segment {
        LeadSegment::Luxury => (Tone::Consultative, &["features", "exclusivity", "service"]),
        LeadSegment::Truck => (Tone::Friendly, &["towing", "payload", "durability"]),
        LeadSegment::Family => (Tone::Friendly, &["safety", "space", "reliability"]),
        LeadSegment::Electric => (Tone::Consultative, &["range", "charging", "incentives"]),
        LeadSegment::General => (Tone::Friendly, &["pricing", "availability", "financing"]),
    };

    PersonalizationProfile {
        segment,
        name_usage_rate: 0.5,
        vehicle_reference_rate: 0.5,
        preferred_tone: tone,
        preferred_topics: topics.iter().map(|topic| topic.to_string()).collect(),
        effectiveness: 0.0,
        sample_count: 0,
        last_updated: now,
    }
}

#[derive(Debug)]
pub struct PersonalizationTuner {
    min_samples: usize,
    profiles: RwLock<HashMap<LeadSegment, PersonalizationProfile>>,
}

impl PersonalizationTuner {
    pub fn new(min_samples: usize, now: DateTime<Utc>) -> Self {
        let profiles =
            LeadSegment::ALL.iter().map(|segment| (*segment, default_profile(*segment, now))).collect();
        Self { min_samples, profiles: RwLock::new(profiles) }
    }

    pub fn profile(&self, segment: LeadSegment) -> PersonalizationProfile {
        self.read()
            .get(&segment)
            .cloned()
            .unwrap_or_else(|| default_profile(segment, Utc::now()))
    }

    pub fn profiles(&self) -> Vec<PersonalizationProfile> {
        let mut profiles: Vec<PersonalizationProfile> = self.read().values().cloned().collect();
        profiles.sort_by_key(|profile| profile.segment);
        profiles
    }

    /// Recomputes the profile of every segment with enough samples and returns the
    /// segments that changed.
    pub fn retune(&self, samples: &[PersonalizationSample], now: DateTime<Utc>) -> Vec<LeadSegment> {
        let mut by_segment: BTreeMap<LeadSegment, Vec<&PersonalizationSample>> = BTreeMap::new();
        for sample in samples {
            by_segment.entry(sample.segment).or_default().push(sample);
        }

        let mut profiles = self.write();
        let mut updated = Vec::new();
        for (segment, segment_samples) in by_segment {
            if segment_samples.len() < self.min_samples {
                continue;
            }
            let previous =
                profiles.get(&segment).cloned().unwrap_or_else(|| default_profile(segment, now));
            let profile = tune(&previous, &segment_samples, now);

            info!(
                event_name = "quality.personalization.retuned",
                segment = segment.as_str(),
                samples = profile.sample_count,
                effectiveness = profile.effectiveness,
                preferred_tone = profile.preferred_tone.as_str(),
                "personalization profile retuned"
            );
            profiles.insert(segment, profile);
            updated.push(segment);
        }
        updated
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<LeadSegment, PersonalizationProfile>> {
        match self.profiles.read() {
            Ok(profiles) => profiles,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<LeadSegment, PersonalizationProfile>> {
        match self.profiles.write() {
            Ok(profiles) => profiles,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn tune(
    previous: &PersonalizationProfile,
    samples: &[&PersonalizationSample],
    now: DateTime<Utc>,
) -> PersonalizationProfile {
    let name_usage_rate =
        tuned_rate(samples, |sample| sample.used_name).unwrap_or(previous.name_usage_rate);
    let vehicle_reference_rate = tuned_rate(samples, |sample| sample.referenced_vehicle)
        .unwrap_or(previous.vehicle_reference_rate);

    let mut preferred_tone = previous.preferred_tone;
    let mut best_tone_score = f64::MIN;
    for tone in [Tone::Professional, Tone::Friendly, Tone::Enthusiastic, Tone::Consultative] {
        if let Some(average) = average_score(samples.iter().filter(|sample| sample.tone == tone)) {
            if average > best_tone_score {
                best_tone_score = average;
                preferred_tone = tone;
            }
        }
    }

    let mut topic_scores: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for sample in samples {
        for topic in &sample.topics {
            let entry = topic_scores.entry(topic.as_str()).or_insert((0.0, 0));
            entry.0 += f64::from(sample.score);
            entry.1 += 1;
        }
    }
    let mut ranked_topics: Vec<(&str, f64)> =
        topic_scores.into_iter().map(|(topic, (total, count))| (topic, total / count as f64)).collect();
    ranked_topics.sort_by(|left, right| right.1.total_cmp(&left.1).then_with(|| left.0.cmp(right.0)));
    let preferred_topics = if ranked_topics.is_empty() {
        previous.preferred_topics.clone()
    } else {
        ranked_topics
            .into_iter()
            .take(PREFERRED_TOPIC_COUNT)
            .map(|(topic, _)| topic.to_string())
            .collect()
    };

    PersonalizationProfile {
        segment: previous.segment,
        name_usage_rate,
        vehicle_reference_rate,
        preferred_tone,
        preferred_topics,
        effectiveness: average_score(samples.iter()).unwrap_or(previous.effectiveness),
        sample_count: samples.len(),
        last_updated: now,
    }
}

/// Shifts the usage rate toward whichever choice scored better. `None` when the samples
/// never tried both choices.
fn tuned_rate(
    samples: &[&PersonalizationSample],
    choice: impl Fn(&PersonalizationSample) -> bool,
) -> Option<f64> {
    let with = average_score(samples.iter().filter(|sample| choice(sample)))?;
    let without = average_score(samples.iter().filter(|sample| !choice(sample)))?;
    Some((0.5 + (with - without) / 100.0).clamp(MIN_RATE, MAX_RATE))
}

fn average_score<'a, 'b: 'a>(
    samples: impl Iterator<Item = &'a &'b PersonalizationSample>,
) -> Option<f64> {
    let (total, count) = samples.fold((0.0, 0usize), |(total, count), sample| {
        (total + f64::from(sample.score), count + 1)
    });
    (count > 0).then(|| total / count as f64)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{detect_topics, segment_for, PersonalizationSample, PersonalizationTuner};
    use crate::domain::experiment::Tone;
    use crate::domain::quality::LeadSegment;

    fn sample(used_name: bool, tone: Tone, topics: &[&str], score: u8) -> PersonalizationSample {
        PersonalizationSample {
            segment: LeadSegment::Truck,
            used_name,
            referenced_vehicle: true,
            tone,
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
            score,
        }
    }

    #[test]
    fn segments_come_from_vehicle_keywords() {
        assert_eq!(segment_for(Some("2024 Ford F-150 Lariat")), LeadSegment::Truck);
        assert_eq!(segment_for(Some("Tesla Model Y")), LeadSegment::Electric);
        assert_eq!(segment_for(Some("Lexus RX 350")), LeadSegment::Luxury);
        assert_eq!(segment_for(Some("Honda Odyssey")), LeadSegment::Family);
        assert_eq!(segment_for(Some("Chevrolet Malibu")), LeadSegment::General);
        assert_eq!(segment_for(None), LeadSegment::General);
    }

    #[test]
    fn topics_are_detected_in_table_order() {
        let topics = detect_topics("We have it in stock, and the APR on financing is 2.9%. Want a test drive?");

        assert_eq!(topics, vec!["financing", "availability", "test_drive"]);
        assert!(detect_topics("Sounds good").is_empty());
    }

    #[test]
    fn retune_follows_the_better_scoring_choices() {
        let tuner = PersonalizationTuner::new(4, Utc::now());
        let samples = vec![
            sample(true, Tone::Enthusiastic, &["towing", "payload"], 90),
            sample(true, Tone::Enthusiastic, &["towing"], 86),
            sample(false, Tone::Professional, &["pricing"], 60),
            sample(false, Tone::Professional, &["pricing", "payload"], 64),
        ];

        let updated = tuner.retune(&samples, Utc::now());
        assert_eq!(updated, vec![LeadSegment::Truck]);

        let profile = tuner.profile(LeadSegment::Truck);
        assert!((profile.name_usage_rate - 0.76).abs() < 1e-9);
        assert!((profile.vehicle_reference_rate - 0.5).abs() < 1e-9);
        assert_eq!(profile.preferred_tone, Tone::Enthusiastic);
        assert_eq!(profile.preferred_topics, vec!["towing", "payload", "pricing"]);
        assert!((profile.effectiveness - 75.0).abs() < 1e-9);
        assert_eq!(profile.sample_count, 4);
    }

    #[test]
    fn segments_below_the_sample_minimum_are_left_alone() {
        let tuner = PersonalizationTuner::new(10, Utc::now());
        let before = tuner.profile(LeadSegment::Truck);

        let updated = tuner.retune(&[sample(true, Tone::Enthusiastic, &["towing"], 95)], Utc::now());

        assert!(updated.is_empty());
        assert_eq!(tuner.profile(LeadSegment::Truck).preferred_tone, before.preferred_tone);
        assert_eq!(tuner.profiles().len(), 5);
    }
}
