use serde::{Deserialize, Serialize};

use crate::symptoms::{SymptomLabel, SymptomPrediction};

/// Output of the external disease classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub disease: String,
    pub confidence: f64,
    #[serde(default)]
    pub models_used: Vec<String>,
}

/// Reconciled result shown to the user and written to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalDiagnosis {
    pub primary_disease: String,
    pub possible_conditions: Vec<String>,
    pub confidence_percent: u8,
    pub symptoms_match: bool,
    pub api_prediction: String,
    pub symptom_based_prediction: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvisoryKind {
    SymptomsAlign,
    ConsultSpecialist,
}

/// User-facing trust signal derived from `symptoms_match`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
}

impl FinalDiagnosis {
    pub fn advisory(&self) -> Advisory {
        if self.symptoms_match {
            Advisory {
                kind: AdvisoryKind::SymptomsAlign,
                message: "Symptoms align with AI prediction".to_string(),
            }
        } else {
            Advisory {
                kind: AdvisoryKind::ConsultSpecialist,
                message: "Symptoms suggest different conditions than AI prediction. \
                          Please consult a specialist for accurate diagnosis."
                    .to_string(),
            }
        }
    }
}

/// Decides whether a classifier label and a symptom label name the same condition.
pub trait LabelMatcher {
    fn matches(&self, classified: &str, candidate: &str) -> bool;
}

/// Case-insensitive containment in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl LabelMatcher for SubstringMatcher {
    fn matches(&self, classified: &str, candidate: &str) -> bool {
        let classified = classified.trim().to_lowercase();
        let candidate = candidate.trim().to_lowercase();
        if classified.is_empty() || candidate.is_empty() {
            return false;
        }
        classified.contains(&candidate) || candidate.contains(&classified)
    }
}

/// Case-insensitive equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl LabelMatcher for ExactMatcher {
    fn matches(&self, classified: &str, candidate: &str) -> bool {
        classified.trim().eq_ignore_ascii_case(candidate.trim())
    }
}

pub fn reconcile(
    classification: &ClassificationResult,
    prediction: &SymptomPrediction,
) -> FinalDiagnosis {
    reconcile_with(&SubstringMatcher, classification, prediction)
}

pub fn reconcile_with<M: LabelMatcher + ?Sized>(
    matcher: &M,
    classification: &ClassificationResult,
    prediction: &SymptomPrediction,
) -> FinalDiagnosis {
    let api_disease = classification.disease.as_str();

    let symptoms_match = prediction
        .candidates()
        .any(|label| matcher.matches(api_disease, &label.to_string()));

    let possible_conditions = possible_conditions(api_disease, prediction);

    let primary_disease = if symptoms_match {
        api_disease.to_string()
    } else {
        possible_conditions
            .first()
            .cloned()
            .unwrap_or_else(|| api_disease.to_string())
    };

    FinalDiagnosis {
        primary_disease,
        possible_conditions,
        confidence_percent: confidence_percent(classification.confidence),
        symptoms_match,
        api_prediction: api_disease.to_string(),
        symptom_based_prediction: prediction.to_strings(),
    }
}

/// Exact-string union of the classifier label and the symptom labels, classifier first.
/// Deduplication here is independent of the matcher used for `symptoms_match`.
fn possible_conditions(api_disease: &str, prediction: &SymptomPrediction) -> Vec<String> {
    let sentinel = SymptomLabel::Undetermined.to_string();
    let mut conditions: Vec<String> = Vec::new();
    let labels = std::iter::once(api_disease.to_string())
        .chain(prediction.labels().iter().map(ToString::to_string));
    for label in labels {
        if label != sentinel && !conditions.contains(&label) {
            conditions.push(label);
        }
    }
    conditions
}

fn confidence_percent(confidence: f64) -> u8 {
    if !confidence.is_finite() {
        return 0;
    }
    (confidence * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symptoms::{predict, SymptomAnswers};

    fn classification(disease: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            disease: disease.to_string(),
            confidence,
            models_used: vec![],
        }
    }

    #[test]
    fn corroborated_cataract() {
        let answers = SymptomAnswers {
            blurry_vision: true,
            halos_around_lights: true,
            ..Default::default()
        };
        let prediction = predict(&answers);
        assert_eq!(prediction.labels(), &[SymptomLabel::Cataract]);

        let diagnosis = reconcile(&classification("Cataract", 0.82), &prediction);
        assert!(diagnosis.symptoms_match);
        assert_eq!(diagnosis.primary_disease, "Cataract");
        assert_eq!(diagnosis.possible_conditions, vec!["Cataract"]);
        assert_eq!(diagnosis.confidence_percent, 82);
        assert_eq!(diagnosis.api_prediction, "Cataract");
        assert_eq!(diagnosis.symptom_based_prediction, vec!["Cataract"]);
    }

    #[test]
    fn undetermined_symptoms_never_match() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::Undetermined]);
        let diagnosis = reconcile(&classification("Normal", 0.76), &prediction);
        assert!(!diagnosis.symptoms_match);
        assert_eq!(diagnosis.possible_conditions, vec!["Normal"]);
        assert_eq!(diagnosis.primary_disease, "Normal");
        assert_eq!(diagnosis.confidence_percent, 76);
        assert_eq!(
            diagnosis.symptom_based_prediction,
            vec!["Unable to determine from symptoms"]
        );
    }

    #[test]
    fn sentinel_is_excluded_end_to_end() {
        let answers = SymptomAnswers {
            eye_pain: true,
            floaters: true,
            ..Default::default()
        };
        let diagnosis = reconcile(&classification("Normal", 0.76), &predict(&answers));
        assert!(!diagnosis.symptoms_match);
        assert_eq!(diagnosis.possible_conditions, vec!["Normal"]);
        assert_eq!(diagnosis.primary_disease, "Normal");
    }

    #[test]
    fn substring_match_is_case_insensitive_both_ways() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::DiabeticRetinopathy]);
        let diagnosis = reconcile(
            &classification("diabetic retinopathy (DR)", 0.5),
            &prediction,
        );
        assert!(diagnosis.symptoms_match);
        assert_eq!(diagnosis.primary_disease, "diabetic retinopathy (DR)");
        assert_eq!(
            diagnosis.possible_conditions,
            vec!["diabetic retinopathy (DR)", "Diabetic Retinopathy"]
        );

        let diagnosis = reconcile(&classification("retinopathy", 0.5), &prediction);
        assert!(diagnosis.symptoms_match);
    }

    #[test]
    fn disagreement_keeps_classifier_first() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::Glaucoma]);
        let diagnosis = reconcile(&classification("Cataract", 0.64), &prediction);
        assert!(!diagnosis.symptoms_match);
        assert_eq!(diagnosis.possible_conditions, vec!["Cataract", "Glaucoma"]);
        assert_eq!(diagnosis.primary_disease, "Cataract");
        assert_eq!(diagnosis.advisory().kind, AdvisoryKind::ConsultSpecialist);
    }

    #[test]
    fn exact_matcher_rejects_partial_labels() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::DiabeticRetinopathy]);
        let result = classification("diabetic retinopathy (DR)", 0.5);
        assert!(!reconcile_with(&ExactMatcher, &result, &prediction).symptoms_match);
        assert!(reconcile_with(&SubstringMatcher, &result, &prediction).symptoms_match);

        let result = classification("DIABETIC RETINOPATHY", 0.5);
        assert!(reconcile_with(&ExactMatcher, &result, &prediction).symptoms_match);
    }

    #[test]
    fn dedup_uses_exact_strings_not_matcher() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::Cataract]);
        let diagnosis = reconcile(&classification("cataract", 0.9), &prediction);
        assert!(diagnosis.symptoms_match);
        assert_eq!(diagnosis.possible_conditions, vec!["cataract", "Cataract"]);
    }

    #[test]
    fn confidence_ignores_match_outcome() {
        let result = classification("Glaucoma", 0.71);
        let matching = SymptomPrediction::from(vec![SymptomLabel::Glaucoma]);
        let differing = SymptomPrediction::from(vec![SymptomLabel::Cataract]);
        assert_eq!(reconcile(&result, &matching).confidence_percent, 71);
        assert_eq!(reconcile(&result, &differing).confidence_percent, 71);
    }

    #[test]
    fn confidence_is_bounded() {
        assert_eq!(confidence_percent(1.4), 100);
        assert_eq!(confidence_percent(-0.1), 0);
        assert_eq!(confidence_percent(f64::NAN), 0);
        assert_eq!(confidence_percent(0.996), 100);
        assert_eq!(confidence_percent(0.004), 0);
    }

    #[test]
    fn reconcile_is_deterministic() {
        let result = classification("Glaucoma", 0.71);
        for bits in 0..64u8 {
            let answers = SymptomAnswers {
                blurry_vision: bits & 1 != 0,
                eye_pain: bits & 2 != 0,
                halos_around_lights: bits & 4 != 0,
                floaters: bits & 8 != 0,
                loss_of_side_vision: bits & 16 != 0,
                history_of_diabetes: bits & 32 != 0,
            };
            let prediction = predict(&answers);
            let first = reconcile(&result, &prediction);
            assert_eq!(first, reconcile(&result, &prediction));
            assert!(
                !first
                    .possible_conditions
                    .iter()
                    .any(|c| c == "Unable to determine from symptoms")
            );
        }
    }

    #[test]
    fn sentinel_classifier_label_falls_back_to_itself() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::Undetermined]);
        let diagnosis = reconcile(
            &classification("Unable to determine from symptoms", 0.3),
            &prediction,
        );
        assert!(diagnosis.possible_conditions.is_empty());
        assert_eq!(diagnosis.primary_disease, "Unable to determine from symptoms");
    }

    #[test]
    fn advisory_for_match() {
        let prediction = SymptomPrediction::from(vec![SymptomLabel::Normal]);
        let diagnosis = reconcile(&classification("Normal", 0.9), &prediction);
        let advisory = diagnosis.advisory();
        assert_eq!(advisory.kind, AdvisoryKind::SymptomsAlign);
        assert!(advisory.message.contains("align"));
    }
}
