use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiseaseSlug {
    Glaucoma,
    Cataract,
    DiabeticRetinopathy,
    Normal,
}

impl DiseaseSlug {
    /// Resolves a free-text classifier or symptom label to a catalog entry.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("normal") {
            Some(DiseaseSlug::Normal)
        } else if label.contains("glaucoma") {
            Some(DiseaseSlug::Glaucoma)
        } else if label.contains("cataract") {
            Some(DiseaseSlug::Cataract)
        } else if label.contains("diabetic") || label.contains("retinopathy") {
            Some(DiseaseSlug::DiabeticRetinopathy)
        } else {
            None
        }
    }

    pub fn info(self) -> DiseaseInfo {
        match self {
            DiseaseSlug::Glaucoma => DiseaseInfo {
                slug: self,
                title: "Glaucoma",
                short_desc: "A group of conditions that damage the optic nerve, often linked to high intraocular pressure.",
                prevalence: "~80 million worldwide",
                risk_level: "High",
                age_group: "40+ years",
                symptoms: &[
                    "Patchy blind spots in peripheral vision",
                    "Tunnel vision in advanced stages",
                    "Eye pain and redness",
                    "Halos around lights",
                    "Sudden vision blurring",
                    "Nausea and vomiting (in acute cases)",
                ],
                prevention: &[
                    "Regular comprehensive eye exams every 1-2 years",
                    "Know your family eye history",
                    "Exercise safely and regularly",
                    "Wear eye protection during sports",
                    "Manage blood pressure and diabetes",
                    "Avoid head-down positions if at risk",
                ],
            },
            DiseaseSlug::Cataract => DiseaseInfo {
                slug: self,
                title: "Cataract",
                short_desc: "Clouding of the eye's lens causing blurry, dim, or yellowed vision; treated with lens replacement surgery.",
                prevalence: "~95 million worldwide",
                risk_level: "Medium",
                age_group: "60+ years",
                symptoms: &[
                    "Clouded, blurred or dim vision",
                    "Increasing difficulty with vision at night",
                    "Sensitivity to light and glare",
                    "Seeing 'halos' around lights",
                    "Frequent changes in eyeglass prescription",
                    "Fading or yellowing of colors",
                    "Double vision in a single eye",
                ],
                prevention: &[
                    "Regular eye examinations",
                    "Wear sunglasses with UV protection",
                    "Quit smoking and limit alcohol",
                    "Manage health problems like diabetes",
                    "Maintain healthy weight and diet",
                    "Eat antioxidant-rich foods",
                ],
            },
            DiseaseSlug::DiabeticRetinopathy => DiseaseInfo {
                slug: self,
                title: "Diabetic Retinopathy",
                short_desc: "Damage to retinal blood vessels from diabetes, which can lead to vision loss without treatment.",
                prevalence: "~103 million worldwide",
                risk_level: "High",
                age_group: "All ages (diabetes patients)",
                symptoms: &[
                    "Spots or dark strings floating in vision (floaters)",
                    "Blurred or fluctuating vision",
                    "Impaired color vision",
                    "Dark or empty areas in vision",
                    "Vision loss",
                    "Difficulty seeing at nighttime",
                ],
                prevention: &[
                    "Manage your diabetes with proper diet and medication",
                    "Monitor your blood sugar level regularly",
                    "Keep blood pressure and cholesterol under control",
                    "Quit smoking and maintain healthy weight",
                    "Pay attention to vision changes",
                    "Get regular dilated eye examinations",
                ],
            },
            DiseaseSlug::Normal => DiseaseInfo {
                slug: self,
                title: "Normal Eye",
                short_desc: "A healthy eye with clear media and intact retina/optic nerve function resulting in sharp vision.",
                prevalence: "Standard human anatomy",
                risk_level: "None",
                age_group: "All ages",
                symptoms: &[
                    "Clear, sharp vision at all distances",
                    "Good color perception",
                    "Proper depth perception",
                    "Adequate peripheral vision",
                    "Comfortable vision in various lighting",
                    "No pain, redness, or discomfort",
                ],
                prevention: &[
                    "Schedule regular comprehensive eye exams",
                    "Wear sunglasses with 100% UV protection",
                    "Eat a balanced diet rich in antioxidants",
                    "Maintain healthy weight and exercise regularly",
                    "Avoid smoking and limit alcohol consumption",
                    "Practice good computer and screen habits",
                    "Wear protective eyewear during hazardous activities",
                ],
            },
        }
    }

    pub fn catalog() -> Vec<DiseaseInfo> {
        DiseaseSlug::iter().map(DiseaseSlug::info).collect()
    }
}

/// Encyclopedia entry for one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseInfo {
    pub slug: DiseaseSlug,
    pub title: &'static str,
    pub short_desc: &'static str,
    pub prevalence: &'static str,
    pub risk_level: &'static str,
    pub age_group: &'static str,
    pub symptoms: &'static [&'static str],
    pub prevention: &'static [&'static str],
}
