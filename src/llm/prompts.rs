//! Instruction templates for each kind of inference request

use super::InferenceRequest;
use crate::preprocessor::EncodedImage;
use crate::router::Topic;

/// Output budget for photo analysis
pub const IMAGE_MAX_TOKENS: u32 = 1000;
/// Output budget for free questions and topic questions
pub const QUESTION_MAX_TOKENS: u32 = 800;
/// Output budget for signal interpretation
pub const SIGNAL_MAX_TOKENS: u32 = 600;

const IMAGE_SYSTEM: &str = "You are an expert treasure hunter and metal detecting specialist with decades of experience.
Analyze images for potential treasure hunting signals, archaeological indicators, and valuable finds.

Focus on:
- Metal detecting signals and patterns
- Soil composition and color changes
- Potential archaeological features
- Historical artifact identification
- Ground disturbances or anomalies
- Valuable items or materials
- Dating and historical context
- Safety considerations

Provide detailed, expert analysis with practical advice.";

const QUESTION_SYSTEM: &str = "You are an expert treasure hunter, metal detecting specialist, and archaeologist.
Provide detailed, accurate, and helpful answers to treasure hunting questions.

Your expertise includes:
- Metal detecting techniques and equipment
- Historical research and site analysis
- Artifact identification and dating
- Legal and ethical treasure hunting
- Safety protocols and best practices
- Equipment recommendations
- Site permissions and regulations

Always emphasize legal and ethical practices, proper permissions, and respect for historical sites.";

const SIGNAL_SYSTEM: &str = "You are a master metal detecting specialist with expertise in signal interpretation.
Analyze signal descriptions and provide expert guidance on what they might indicate.

Consider:
- Signal strength and consistency
- Target depth indicators
- Discrimination patterns
- Ground conditions
- Potential target types
- False positive indicators
- Digging recommendations";

/// Request for a photo, optionally with the user's caption as a question.
#[must_use]
pub fn image_analysis(image: EncodedImage, caption: Option<&str>) -> InferenceRequest {
    let question = caption
        .map(|c| format!("\nUser specific question: {c}\n"))
        .unwrap_or_default();

    let text = format!(
        "Analyze this treasure hunting image in detail.
Look for any signals, patterns, artifacts, or indicators that would be valuable to treasure hunters.
{question}
Provide your analysis in a structured format covering:
1. Initial observations
2. Potential finds or signals
3. Historical/archaeological context
4. Recommendations for further investigation
5. Safety and legal considerations"
    );

    InferenceRequest {
        system: IMAGE_SYSTEM.to_string(),
        text,
        image: Some(image),
        max_tokens: IMAGE_MAX_TOKENS,
    }
}

/// Request for a free-form question.
#[must_use]
pub fn question(question: &str) -> InferenceRequest {
    InferenceRequest {
        system: QUESTION_SYSTEM.to_string(),
        text: format!(
            "Question: {question}\n\n\
             Please provide a comprehensive answer with practical advice and recommendations."
        ),
        image: None,
        max_tokens: QUESTION_MAX_TOKENS,
    }
}

/// Request for a detector signal description.
#[must_use]
pub fn signal(description: &str) -> InferenceRequest {
    InferenceRequest {
        system: SIGNAL_SYSTEM.to_string(),
        text: format!(
            "Signal description: {description}

Please analyze this metal detecting signal and provide:
1. Likely target identification
2. Confidence level assessment
3. Recommended digging approach
4. Potential challenges or considerations
5. Equipment settings suggestions"
        ),
        image: None,
        max_tokens: SIGNAL_MAX_TOKENS,
    }
}

/// Request for a question scoped to one knowledge-base topic.
#[must_use]
pub fn topic_question(topic: Topic, question: &str) -> InferenceRequest {
    let focus = match topic {
        Topic::Tips => "Focus on research, site selection and field technique.",
        Topic::Equipment => {
            "Focus on detector models, coils, settings and accessories, with options for several budgets."
        }
        Topic::Legal => {
            "Focus on permissions, permits, reporting obligations and ethics. \
             Point out that laws differ by country and region and suggest checking local rules."
        }
        Topic::Safety => {
            "Focus on personal safety, environmental hazards and dangerous finds such as unexploded ordnance."
        }
    };

    InferenceRequest {
        system: format!("{QUESTION_SYSTEM}\n\n{focus}"),
        text: format!(
            "Question about {}: {question}\n\n\
             Please provide a practical, well-structured answer.",
            topic.subject()
        ),
        image: None,
        max_tokens: QUESTION_MAX_TOKENS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_per_template() {
        assert_eq!(question("q").max_tokens, 800);
        assert_eq!(signal("s").max_tokens, 600);
        assert_eq!(topic_question(Topic::Legal, "q").max_tokens, 800);
    }

    #[test]
    fn test_image_caption_is_included() {
        let image = EncodedImage {
            bytes: vec![0xFF, 0xD8],
            width: 1,
            height: 1,
        };
        let with = image_analysis(image.clone(), Some("Is this silver?"));
        assert!(with.text.contains("User specific question: Is this silver?"));
        assert_eq!(with.max_tokens, 1000);
        assert!(with.image.is_some());

        let without = image_analysis(image, None);
        assert!(!without.text.contains("User specific question"));
    }

    #[test]
    fn test_topic_question_mentions_subject() {
        let request = topic_question(Topic::Safety, "Is it safe to dig near old wells?");
        assert!(request.text.contains("treasure hunting safety"));
        assert!(request.system.contains("unexploded ordnance"));
    }
}
