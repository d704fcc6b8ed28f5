//! Preset evaluators hosted by the service, addressable by name.

use std::fmt;
use std::str::FromStr;

use crate::error::ScorableError;

macro_rules! preset_evaluators {
    ($($variant:ident => ($name:literal, $id:literal)),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PresetEvaluator {
            $($variant),+
        }

        impl PresetEvaluator {
            pub const ALL: &'static [PresetEvaluator] = &[$(PresetEvaluator::$variant),+];

            pub fn id(self) -> &'static str {
                match self {
                    $(PresetEvaluator::$variant => $id),+
                }
            }

            /// Name as the service spells it, e.g. `Non_toxicity`.
            pub fn name(self) -> &'static str {
                match self {
                    $(PresetEvaluator::$variant => $name),+
                }
            }
        }
    };
}

preset_evaluators! {
    Faithfulness => ("Faithfulness", "901794f9-634c-4852-9e41-7c558f1ff1ab"),
    Relevance => ("Relevance", "bd789257-f458-4e9e-8ce9-fa6e86dc3fb9"),
    Clarity => ("Clarity", "9976d9f3-7265-4732-b518-d61c2642b14e"),
    NonToxicity => ("Non_toxicity", "e296e374-7539-4eb2-a74a-47847dd26fb8"),
    Helpfulness => ("Helpfulness", "88bc92d5-bebf-45e4-9cd1-dfa33309c320"),
    Politeness => ("Politeness", "2856903a-e48c-4548-b3fe-520fd88c4f25"),
    Formality => ("Formality", "8ab6cf1a-42b5-4a23-a15c-21372816483d"),
    Harmlessness => ("Harmlessness", "379fee0a-4fd1-4942-833b-7d78d78b334d"),
    Confidentiality => ("Confidentiality", "2eaa0a02-47a9-48f7-9b47-66ad257f93eb"),
    Persuasiveness => ("Persuasiveness", "85bb6a74-f5dd-4130-8dcc-cffdf72327cc"),
    ContextRecall => ("Context_Recall", "8bb60975-5062-4367-9fc6-a920044cba56"),
    AnswerCorrectness => ("Answer_Correctness", "d4487568-4243-4da8-9c76-adbaf762dbe0"),
    AnswerSemanticSimilarity => ("Answer_Semantic_Similarity", "ff350bce-4b07-4af7-9640-803c9d3c2ff9"),
    SentimentRecognition => ("Sentiment_recognition", "e3782c1e-eaf4-4b2d-8d26-53db2160f1fd"),
    SafetyForChildren => ("Safety_for_Children", "39a8b5ba-de77-4726-a6b0-621d40b3cdf5"),
    Precision => ("Precision", "767bdd49-5f8c-48ca-8324-dfd6be7f8a79"),
    Originality => ("Originality", "e72cb54f-548a-44f9-a6ca-4e14e5ade7f7"),
    Engagingness => ("Engagingness", "64729487-d4a8-42d8-bd9e-72fd8390c134"),
    Conciseness => ("Conciseness", "be828d33-158a-4e92-a2eb-f4d96c13f956"),
    Coherence => ("Coherence", "e599886c-c338-458f-91b3-5d7eba452618"),
    QualityOfWritingProfessional => ("Quality_of_Writing_Professional", "059affa9-2d1c-48de-8e97-f81dd3fc3cbe"),
    QualityOfWritingCreative => ("Quality_of_Writing_Creative", "060abfb6-57c9-43b5-9a6d-8a1a9bb853b8"),
    Truthfulness => ("Truthfulness", "053df10f-b0c7-400b-892e-46ce3aa1e430"),
    ContextPrecision => ("Context_Precision", "9d1e9a25-7e76-4771-b1e3-40825d7918c5"),
    AnswerRelevance => ("Answer_Relevance", "0907d422-e94f-4c9c-a63d-ec0eefd8a903"),
    CompliancePreview => ("Compliance_Preview", "4613f248-b60e-403a-bcdc-157d1c44194a"),
    FaithfulnessSwift => ("Faithfulness_Swift", "a3a5e97b-7fcb-441e-92f2-6e59aa473b89"),
    TruthfulnessSwift => ("Truthfulness_Swift", "c8c65e61-2dc8-4f29-865a-a5e59127d208"),
    Completeness => ("Completeness", "f0832c32-6beb-4383-a1ea-cdeb883d9044"),
    ReadingEase => ("Reading_Ease", "119d9587-9b33-4d43-a6b6-ba116dfee31b"),
    AnswerWillingness => ("Answer_Willingness", "c81034ae-9439-4c93-bab3-d159eaf072bf"),
    InformationDensity => ("Information_Density", "789a3dd8-7794-4f01-b229-3a99088c82fc"),
    PlanningEfficiency => ("Planning_Efficiency", "ed3e16c2-2d4e-4ec2-b4af-b4b54a24009d"),
}

impl PresetEvaluator {
    /// Case-insensitive lookup; `_`, `-` and spaces are interchangeable.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        Self::ALL
            .iter()
            .copied()
            .find(|p| normalize(p.name()) == wanted)
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for PresetEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PresetEvaluator {
    type Err = ScorableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ScorableError::NotFound {
            resource: format!("preset evaluator '{}'", s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_by_service_name() {
        assert_eq!(
            PresetEvaluator::from_name("Non_toxicity"),
            Some(PresetEvaluator::NonToxicity)
        );
        assert_eq!(
            PresetEvaluator::from_name("quality of writing professional"),
            Some(PresetEvaluator::QualityOfWritingProfessional)
        );
        assert_eq!(
            PresetEvaluator::Clarity.id(),
            "9976d9f3-7265-4732-b518-d61c2642b14e"
        );
        assert!("Nonexistent".parse::<PresetEvaluator>().is_err());
    }

    #[test]
    fn test_ids_and_names_are_unique() {
        let ids: HashSet<_> = PresetEvaluator::ALL.iter().map(|p| p.id()).collect();
        let names: HashSet<_> = PresetEvaluator::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(ids.len(), PresetEvaluator::ALL.len());
        assert_eq!(names.len(), PresetEvaluator::ALL.len());
    }
}
