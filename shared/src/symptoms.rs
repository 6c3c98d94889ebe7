use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Answers to the six-question symptom checklist shown after classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymptomAnswers {
    pub blurry_vision: bool,
    pub eye_pain: bool,
    pub halos_around_lights: bool,
    pub floaters: bool,
    pub loss_of_side_vision: bool,
    pub history_of_diabetes: bool,
}

impl SymptomAnswers {
    pub fn any(&self) -> bool {
        self.blurry_vision
            || self.eye_pain
            || self.halos_around_lights
            || self.floaters
            || self.loss_of_side_vision
            || self.history_of_diabetes
    }
}

/// Labels the symptom rules can produce, declared in their fixed output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SymptomLabel {
    Cataract,
    Glaucoma,
    #[serde(rename = "Diabetic Retinopathy")]
    #[strum(serialize = "Diabetic Retinopathy")]
    DiabeticRetinopathy,
    Normal,
    #[serde(rename = "Unable to determine from symptoms")]
    #[strum(serialize = "Unable to determine from symptoms")]
    Undetermined,
}

impl SymptomLabel {
    /// The sentinel never counts as a candidate condition.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, SymptomLabel::Undetermined)
    }
}

/// Ordered, duplicate-free labels derived from a [`SymptomAnswers`]. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomPrediction(Vec<SymptomLabel>);

impl SymptomPrediction {
    pub fn labels(&self) -> &[SymptomLabel] {
        &self.0
    }

    /// Labels other than the "unable to determine" sentinel.
    pub fn candidates(&self) -> impl Iterator<Item = SymptomLabel> + '_ {
        self.0.iter().copied().filter(|label| !label.is_sentinel())
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl From<Vec<SymptomLabel>> for SymptomPrediction {
    fn from(labels: Vec<SymptomLabel>) -> Self {
        let mut unique: Vec<SymptomLabel> = Vec::with_capacity(labels.len());
        for label in labels {
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        if unique.is_empty() {
            unique.push(SymptomLabel::Normal);
        }
        Self(unique)
    }
}

/// Rule-based prediction from the checklist. Rules fire independently.
pub fn predict(answers: &SymptomAnswers) -> SymptomPrediction {
    let mut labels = Vec::new();

    if answers.blurry_vision && answers.halos_around_lights && !answers.eye_pain {
        labels.push(SymptomLabel::Cataract);
    }
    if answers.eye_pain && answers.loss_of_side_vision && !answers.history_of_diabetes {
        labels.push(SymptomLabel::Glaucoma);
    }
    if answers.blurry_vision && answers.floaters && answers.history_of_diabetes {
        labels.push(SymptomLabel::DiabeticRetinopathy);
    }
    if !answers.any() {
        labels.push(SymptomLabel::Normal);
    }

    if labels.is_empty() && answers.any() {
        labels.push(SymptomLabel::Undetermined);
    }

    // Unreachable: an all-false checklist already matched the Normal rule above.
    // Kept to mirror the observed rule set; the two Normal paths overlap.
    if labels.is_empty() {
        labels.push(SymptomLabel::Normal);
    }

    SymptomPrediction(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers_from_bits(bits: u8) -> SymptomAnswers {
        SymptomAnswers {
            blurry_vision: bits & 0b000001 != 0,
            eye_pain: bits & 0b000010 != 0,
            halos_around_lights: bits & 0b000100 != 0,
            floaters: bits & 0b001000 != 0,
            loss_of_side_vision: bits & 0b010000 != 0,
            history_of_diabetes: bits & 0b100000 != 0,
        }
    }

    #[test]
    fn no_symptoms_is_normal() {
        let prediction = predict(&SymptomAnswers::default());
        assert_eq!(prediction.labels(), &[SymptomLabel::Normal]);
    }

    #[test]
    fn every_combination_yields_a_label() {
        for bits in 0..64u8 {
            let prediction = predict(&answers_from_bits(bits));
            assert!(!prediction.labels().is_empty(), "empty for {bits:06b}");
        }
    }

    #[test]
    fn cataract_pattern_fires_regardless_of_other_answers() {
        for bits in 0..64u8 {
            let mut answers = answers_from_bits(bits);
            answers.blurry_vision = true;
            answers.halos_around_lights = true;
            answers.eye_pain = false;
            assert!(predict(&answers).labels().contains(&SymptomLabel::Cataract));
        }
    }

    #[test]
    fn multiple_rules_keep_fixed_order() {
        let answers = SymptomAnswers {
            blurry_vision: true,
            halos_around_lights: true,
            floaters: true,
            history_of_diabetes: true,
            ..Default::default()
        };
        assert_eq!(
            predict(&answers).labels(),
            &[SymptomLabel::Cataract, SymptomLabel::DiabeticRetinopathy]
        );
    }

    #[test]
    fn glaucoma_needs_no_diabetes_history() {
        let mut answers = SymptomAnswers {
            eye_pain: true,
            loss_of_side_vision: true,
            ..Default::default()
        };
        assert_eq!(predict(&answers).labels(), &[SymptomLabel::Glaucoma]);

        answers.history_of_diabetes = true;
        assert_eq!(predict(&answers).labels(), &[SymptomLabel::Undetermined]);
    }

    #[test]
    fn unmatched_symptoms_are_undetermined() {
        let answers = SymptomAnswers {
            eye_pain: true,
            floaters: true,
            ..Default::default()
        };
        let prediction = predict(&answers);
        assert_eq!(prediction.labels(), &[SymptomLabel::Undetermined]);
        assert_eq!(prediction.candidates().count(), 0);
    }

    #[test]
    fn normal_only_fires_alone() {
        for bits in 0..64u8 {
            let labels = predict(&answers_from_bits(bits)).labels().to_vec();
            if labels.contains(&SymptomLabel::Normal) {
                assert_eq!(labels, vec![SymptomLabel::Normal]);
            }
        }
    }

    #[test]
    fn prediction_is_deterministic() {
        for bits in 0..64u8 {
            let answers = answers_from_bits(bits);
            assert_eq!(predict(&answers), predict(&answers));
        }
    }

    #[test]
    fn labels_serialize_as_display_text() {
        let prediction = SymptomPrediction::from(vec![
            SymptomLabel::DiabeticRetinopathy,
            SymptomLabel::Undetermined,
        ]);
        let json = serde_json::to_string(&prediction).unwrap();
        assert_eq!(
            json,
            r#"["Diabetic Retinopathy","Unable to determine from symptoms"]"#
        );
        assert_eq!(
            prediction.to_strings(),
            vec!["Diabetic Retinopathy", "Unable to determine from symptoms"]
        );
    }

    #[test]
    fn answers_accept_partial_camel_case_json() {
        let answers: SymptomAnswers =
            serde_json::from_str(r#"{"blurryVision":true,"halosAroundLights":true}"#).unwrap();
        assert!(answers.blurry_vision && answers.halos_around_lights);
        assert!(!answers.eye_pain);
    }
}
