// All model prompt constants for body-photo analysis.
// Prompt wording is replaceable configuration: the pipeline only depends on
// the required top-level fields each template promises.

use crate::analysis::envelope::AnalysisKind;

/// System prompt for all vision calls. Enforces JSON-only output.
pub const VISION_SYSTEM: &str =
    "You are an expert fitness coach and body-composition analyst. \
    You assess body photos and write constructive, encouraging commentary. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies. \
    Never produce a medical diagnosis.";

/// Single-photo analysis template. Replace `{subject_context}` before sending.
pub const SINGLE_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the body photo and return a structured assessment.
{subject_context}
Return a JSON object with this EXACT schema (no extra fields):
{
  "overallScore": 72,
  "summary": "Balanced build with well-developed shoulders; core definition is moderate.",
  "bodyType": "mesomorph",
  "confidenceScore": 0.8,
  "measurements": {
    "estimatedShoulderWidthCm": 48.0,
    "estimatedWaistCm": 84.0,
    "estimatedHipCm": 96.0,
    "bmi": 23.7,
    "bmiCategory": "normal",
    "bodyFatPercentage": 18.5,
    "muscleMassIndex": 7.2
  },
  "recommendations": {
    "exercise": "Two or three compound strength sessions per week.",
    "diet": "Slight protein increase to support muscle maintenance.",
    "lifestyle": "Keep sleep at 7-8 hours and stay consistent."
  }
}

Rules:
- "overallScore" is an integer 0-100 reflecting overall physique and posture.
- "summary" is 1-3 sentences of plain, encouraging language.
- "bodyType" is one of "ectomorph", "mesomorph", "endomorph".
- "confidenceScore" is 0.0-1.0 reflecting photo quality and body visibility.
- Measurements are estimates; use null for any value the photo does not support.
- Compute "bmi" only when the subject profile provides height and weight, otherwise null.
- Recommendations must be actionable and specific to what the photo shows."#;

/// Comparison template for an earlier/later photo pair.
/// Replace `{subject_context}` before sending.
pub const COMPARE_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Compare the two body photos. The first image is the earlier photo, the second is the more recent one.
{subject_context}
Return a JSON object with this EXACT schema (no extra fields):
{
  "overallChange": "improved",
  "summary": "Noticeable reduction around the waist and better shoulder posture since the earlier photo.",
  "changes": {
    "muscleDefinition": "Slightly sharper in the upper body.",
    "bodyFat": "Appears reduced around the midsection.",
    "posture": "Shoulders sit more level than before."
  },
  "recommendations": {
    "exercise": "Keep the current split; add one lower-body session.",
    "diet": "Current approach is working; no change needed.",
    "lifestyle": "Progress photos every two weeks at the same time of day."
  }
}

Rules:
- "overallChange" is exactly one of "improved", "unchanged", "declined".
- "summary" is 1-3 sentences describing the most meaningful differences.
- Each entry in "changes" describes a specific visible difference, or states that none is visible.
- Judge only what the photos show; lighting and pose differences are not progress."#;

/// Fills the template for `kind` with the optional subject profile line.
pub fn fill_prompt(kind: AnalysisKind, subject_context: Option<&str>) -> String {
    let template = match kind {
        AnalysisKind::Single => SINGLE_ANALYSIS_PROMPT_TEMPLATE,
        AnalysisKind::Compare => COMPARE_ANALYSIS_PROMPT_TEMPLATE,
    };
    template.replace("{subject_context}", &context_block(subject_context))
}

fn context_block(subject_context: Option<&str>) -> String {
    match subject_context {
        Some(profile) => format!("\nSubject profile: {profile}.\n"),
        None => String::new(),
    }
}
