//! Gated visual generation.
//!
//! [`InfographicGenerator`] puts every image request through the
//! [`CooldownGate`] before calling the image model, writes the returned PNG
//! under `<output_dir>/generated_infographics/`, and records the generation
//! so the same topic is not regenerated within the window.
//!
//! SVG summaries go through the text model and are decoded with
//! [`extract_svg`].

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use advisory_harness_core::parse::extract_svg;
use advisory_harness_core::visual::VisualStyle;

use crate::error::{HarnessError, HarnessResult};
use crate::gate::CooldownGate;
use crate::ledger::write_bytes_atomic;
use crate::reference::ReferenceImage;
use crate::remote::{GenerateRequest, GenerativeModel, ImageConfig};

/// Subdirectory of the output dir that holds generated images.
pub const INFOGRAPHIC_DIR: &str = "generated_infographics";

/// Context passed to the model is cut to this many characters.
const CONTENT_CONTEXT_CHARS: usize = 500;

/// Display names used in prompts. Anything else is treated as English.
pub const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("english", "English"),
    ("hindi", "Hindi (हिंदी)"),
    ("hinglish", "Hindi-English mix (Hinglish)"),
    ("marathi", "Marathi (मराठी)"),
    ("tamil", "Tamil (தமிழ்)"),
    ("telugu", "Telugu (తెలుగు)"),
    ("kannada", "Kannada (ಕನ್ನಡ)"),
    ("gujarati", "Gujarati (ગુજરાતી)"),
    ("punjabi", "Punjabi (ਪੰਜਾਬੀ)"),
    ("bengali", "Bengali (বাংলা)"),
    ("malayalam", "Malayalam (മലയാളം)"),
    ("odia", "Odia (ଓଡ଼ିଆ)"),
    ("assamese", "Assamese (অসমীয়া)"),
    ("urdu", "Urdu (اردو)"),
];

pub fn language_name(language: &str) -> &'static str {
    let wanted = language.trim().to_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(code, _)| *code == wanted)
        .map(|(_, name)| *name)
        .unwrap_or("English")
}

pub struct InfographicGenerator {
    gate: Arc<CooldownGate>,
    model: Option<Arc<dyn GenerativeModel>>,
    output_dir: PathBuf,
    image_model: String,
    text_model: String,
}

impl InfographicGenerator {
    pub fn new(
        gate: Arc<CooldownGate>,
        model: Option<Arc<dyn GenerativeModel>>,
        output_dir: impl Into<PathBuf>,
        image_model: impl Into<String>,
        text_model: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            model,
            output_dir: output_dir.into(),
            image_model: image_model.into(),
            text_model: text_model.into(),
        }
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    fn model(&self) -> HarnessResult<&Arc<dyn GenerativeModel>> {
        self.model
            .as_ref()
            .ok_or_else(|| HarnessError::NotConfigured("no generative model".to_string()))
    }

    /// Generate an infographic image for `topic`.
    ///
    /// Returns `Ok(None)` when the gate advises against generating or the
    /// model answers without an image. On success the path is relative to
    /// the output directory.
    pub fn generate(
        &self,
        content: &str,
        topic: &str,
        language: &str,
        force: bool,
    ) -> HarnessResult<Option<PathBuf>> {
        self.generate_with_references(content, topic, language, force, &[])
    }

    /// Like [`generate`](Self::generate), attaching reference images to the
    /// prompt.
    pub fn generate_with_references(
        &self,
        content: &str,
        topic: &str,
        language: &str,
        force: bool,
        references: &[ReferenceImage],
    ) -> HarnessResult<Option<PathBuf>> {
        if !self.gate.should_generate(topic, force) {
            return Ok(None);
        }
        let model = self.model()?;

        let lang_name = language_name(language);
        let request = GenerateRequest {
            model: self.image_model.clone(),
            prompt: image_prompt(content, topic, lang_name),
            attachments: references.iter().map(ReferenceImage::to_attachment).collect(),
            search_grounding: true,
            image_config: Some(ImageConfig::default()),
        };

        tracing::info!(
            topic,
            language = lang_name,
            model = %self.image_model,
            references = references.len(),
            "generating infographic"
        );
        let response = model
            .generate(&request)
            .map_err(|e| HarnessError::TransientIo(format!("image generation failed: {:#}", e)))?;

        let image = match response.image {
            Some(image) if !image.is_empty() => image,
            _ => {
                tracing::warn!(topic, "model returned no image");
                return Ok(None);
            }
        };

        let relative = Path::new(INFOGRAPHIC_DIR).join(format!(
            "infographic_{}_{}.png",
            file_language(language),
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let full = self.output_dir.join(&relative);
        write_bytes_atomic(&full, &image)?;
        tracing::info!(path = %full.display(), bytes = image.len(), "infographic saved");

        self.gate.record_generation(topic);
        Ok(Some(relative))
    }

    /// Ask the text model for a standalone SVG summarizing `content`.
    ///
    /// `Ok(None)` when the answer contains no SVG document.
    pub fn generate_svg(&self, content: &str, style: VisualStyle) -> HarnessResult<Option<String>> {
        let model = self.model()?;
        let prompt = format!(
            "Produce a single standalone SVG (no HTML) under 800px width that visually \
             summarizes the following content for a farmer. Use simple shapes, large \
             readable labels, and an uncluttered layout. Output ONLY the raw SVG.\n\
             Style hint: {}\nContent:\n{}",
            style.as_str(),
            content
        );
        let response = model
            .generate(&GenerateRequest::text(&self.text_model, prompt))
            .map_err(|e| HarnessError::TransientIo(format!("SVG generation failed: {:#}", e)))?;

        let svg = response.text.as_deref().and_then(extract_svg);
        if svg.is_none() {
            tracing::warn!("no SVG found in model response");
        }
        Ok(svg)
    }
}

fn image_prompt(content: &str, topic: &str, lang_name: &str) -> String {
    let context: String = content.chars().take(CONTENT_CONTEXT_CHARS).collect();
    let context = if context.trim().is_empty() {
        "General agricultural topic".to_string()
    } else {
        context
    };
    format!(
        "Generate a professional agricultural infographic on: {topic}\n\
         All text labels, headings, titles, and content in the infographic MUST be in {lang}.\n\
         Design requirements:\n\
         - Clean, modern flat design with an agricultural theme\n\
         - Green and yellow, farmer-friendly color scheme\n\
         - High clarity for mobile viewing\n\
         - Icons, text labels in {lang}, and key statistics\n\
         - Aspect ratio: 16:9\n\
         - Simple vocabulary; numbers and measurements in local conventions\n\
         Context information:\n{context}",
        topic = topic,
        lang = lang_name,
        context = context
    )
}

/// Language tag safe to embed in a file name.
fn file_language(language: &str) -> String {
    let tag: String = language
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if tag.trim_matches('-').is_empty() {
        "english".to_string()
    } else {
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::ledger::Ledger;
    use crate::remote::GenerateResponse;
    use std::sync::Mutex;

    struct ScriptedModel {
        response: GenerateResponse,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl GenerativeModel for ScriptedModel {
        fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn generator(dir: &Path, response: GenerateResponse) -> (InfographicGenerator, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel {
            response,
            requests: Mutex::new(Vec::new()),
        });
        let gate = Arc::new(CooldownGate::from_config(
            Ledger::new(dir.join("cooldown.json")),
            &GateConfig::default(),
        ));
        let generator = InfographicGenerator::new(
            gate,
            Some(model.clone() as Arc<dyn GenerativeModel>),
            dir,
            "image-model",
            "text-model",
        );
        (generator, model)
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_name("Hindi"), "Hindi (हिंदी)");
        assert_eq!(language_name("klingon"), "English");
        assert_eq!(file_language("Tamil"), "tamil");
        assert_eq!(file_language("../etc"), "---etc");
        assert_eq!(file_language(""), "english");
    }

    #[test]
    fn test_generate_writes_image_and_cools_topic() {
        let tmp = tempfile::tempdir().unwrap();
        let (generator, model) = generator(
            tmp.path(),
            GenerateResponse {
                text: None,
                image: Some(vec![0x89, b'P', b'N', b'G']),
            },
        );

        let content = "x".repeat(2000);
        let rel = generator
            .generate(&content, "irrigation of ratoon crop", "marathi", false)
            .unwrap()
            .unwrap();
        assert!(rel.starts_with(INFOGRAPHIC_DIR));
        let name = rel.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("infographic_marathi_"));
        assert!(name.ends_with(".png"));
        assert_eq!(fs::read(tmp.path().join(&rel)).unwrap(), vec![0x89, b'P', b'N', b'G']);

        {
            let requests = model.requests.lock().unwrap();
            assert_eq!(requests.len(), 1);
            assert!(requests[0].search_grounding);
            assert_eq!(requests[0].model, "image-model");
            assert_eq!(requests[0].image_config, Some(ImageConfig::default()));
            assert!(requests[0].prompt.contains("Marathi"));
            assert!(!requests[0].prompt.contains(&"x".repeat(501)));
        }

        // Same topic again: suppressed, no model call.
        assert_eq!(
            generator
                .generate(&content, "irrigation of ratoon crop", "marathi", false)
                .unwrap(),
            None
        );
        assert_eq!(model.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_image_is_none_and_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let (generator, _) = generator(
            tmp.path(),
            GenerateResponse {
                text: Some("sorry".into()),
                image: None,
            },
        );
        assert_eq!(generator.generate("", "mulching", "english", false).unwrap(), None);
        assert!(generator.gate().last_fired_at("mulching").is_none());
    }

    #[test]
    fn test_without_model_is_not_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let gate = Arc::new(CooldownGate::from_config(
            Ledger::new(tmp.path().join("cooldown.json")),
            &GateConfig::default(),
        ));
        let generator = InfographicGenerator::new(gate, None, tmp.path(), "i", "t");
        let err = generator.generate("", "topic", "english", false).unwrap_err();
        assert!(err.is_not_configured());
    }

    #[test]
    fn test_generate_svg_extracts_document() {
        let tmp = tempfile::tempdir().unwrap();
        let (generator, model) = generator(
            tmp.path(),
            GenerateResponse {
                text: Some("Here:\n```svg\n<svg width=\"10\"></svg>\n```".into()),
                image: None,
            },
        );
        let svg = generator.generate_svg("steps", VisualStyle::Timeline).unwrap();
        assert_eq!(svg.as_deref(), Some("<svg width=\"10\"></svg>"));
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].model, "text-model");
        assert!(requests[0].prompt.contains("Style hint: timeline"));
    }
}
