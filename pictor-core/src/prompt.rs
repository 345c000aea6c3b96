//! Prompt augmentation
//!
//! Rewrites a bare prompt into the fixed-order sectioned form the image
//! model responds best to. Augmentation is pure string templating: only
//! non-empty fields contribute a section, each on its own line.

use serde::{Deserialize, Serialize};

/// Optional augmentation hints attached to a prompt.
///
/// Field precedence when merging: job `fields.*` values win over the job's
/// flat top-level keys, which win over the global CLI defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptFields {
    pub use_case: Option<String>,
    pub scene: Option<String>,
    pub subject: Option<String>,
    pub style: Option<String>,
    pub composition: Option<String>,
    pub lighting: Option<String>,
    pub palette: Option<String>,
    pub materials: Option<String>,
    pub text: Option<String>,
    pub constraints: Option<String>,
    pub negative: Option<String>,
}

impl PromptFields {
    /// Merge `self` over `base`: any field set here wins, unset fields
    /// inherit the base value.
    pub fn merged_over(&self, base: &PromptFields) -> PromptFields {
        fn pick(over: &Option<String>, base: &Option<String>) -> Option<String> {
            over.clone().or_else(|| base.clone())
        }
        PromptFields {
            use_case: pick(&self.use_case, &base.use_case),
            scene: pick(&self.scene, &base.scene),
            subject: pick(&self.subject, &base.subject),
            style: pick(&self.style, &base.style),
            composition: pick(&self.composition, &base.composition),
            lighting: pick(&self.lighting, &base.lighting),
            palette: pick(&self.palette, &base.palette),
            materials: pick(&self.materials, &base.materials),
            text: pick(&self.text, &base.text),
            constraints: pick(&self.constraints, &base.constraints),
            negative: pick(&self.negative, &base.negative),
        }
    }
}

/// Rewrite `prompt` into the sectioned template.
///
/// Section order is fixed; the primary request is always present and every
/// other section appears only when its field is non-empty.
pub fn augment(prompt: &str, fields: &PromptFields) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(use_case) = non_empty(&fields.use_case) {
        sections.push(format!("Use case: {use_case}"));
    }
    sections.push(format!("Primary request: {prompt}"));
    if let Some(scene) = non_empty(&fields.scene) {
        sections.push(format!("Scene/background: {scene}"));
    }
    if let Some(subject) = non_empty(&fields.subject) {
        sections.push(format!("Subject: {subject}"));
    }
    if let Some(style) = non_empty(&fields.style) {
        sections.push(format!("Style/medium: {style}"));
    }
    if let Some(composition) = non_empty(&fields.composition) {
        sections.push(format!("Composition/framing: {composition}"));
    }
    if let Some(lighting) = non_empty(&fields.lighting) {
        sections.push(format!("Lighting/mood: {lighting}"));
    }
    if let Some(palette) = non_empty(&fields.palette) {
        sections.push(format!("Color palette: {palette}"));
    }
    if let Some(materials) = non_empty(&fields.materials) {
        sections.push(format!("Materials/textures: {materials}"));
    }
    if let Some(text) = non_empty(&fields.text) {
        sections.push(format!("Text (verbatim): \"{text}\""));
    }
    if let Some(constraints) = non_empty(&fields.constraints) {
        sections.push(format!("Constraints: {constraints}"));
    }
    if let Some(negative) = non_empty(&fields.negative) {
        sections.push(format!("Avoid: {negative}"));
    }

    sections.join("\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_prompt_keeps_only_primary_request() {
        let out = augment("a red fox", &PromptFields::default());
        assert_eq!(out, "Primary request: a red fox");
    }

    #[test]
    fn test_sections_appear_in_fixed_order() {
        let fields = PromptFields {
            use_case: Some("hero banner".into()),
            negative: Some("blur".into()),
            style: Some("watercolor".into()),
            ..Default::default()
        };
        let out = augment("a red fox", &fields);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Use case: hero banner",
                "Primary request: a red fox",
                "Style/medium: watercolor",
                "Avoid: blur",
            ]
        );
    }

    #[test]
    fn test_verbatim_text_is_quoted() {
        let fields = PromptFields {
            text: Some("GRAND OPENING".into()),
            ..Default::default()
        };
        let out = augment("a sign", &fields);
        assert!(out.contains("Text (verbatim): \"GRAND OPENING\""));
    }

    #[test]
    fn test_empty_string_fields_are_skipped() {
        let fields = PromptFields {
            scene: Some(String::new()),
            ..Default::default()
        };
        let out = augment("a red fox", &fields);
        assert_eq!(out, "Primary request: a red fox");
    }

    #[test]
    fn test_merged_over_prefers_override() {
        let base = PromptFields {
            scene: Some("forest".into()),
            style: Some("photo".into()),
            ..Default::default()
        };
        let over = PromptFields {
            scene: Some("beach".into()),
            ..Default::default()
        };
        let merged = over.merged_over(&base);
        assert_eq!(merged.scene.as_deref(), Some("beach"));
        assert_eq!(merged.style.as_deref(), Some("photo"));
    }
}
