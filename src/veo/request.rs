//! Generation request types and prompt composition.

use std::path::Path;

use base64::Engine;

use super::client::VeoError;

/// Prompt used when the user leaves the prompt empty.
pub const DEFAULT_PROMPT: &str = "A seamless architectural transition.";

const PROMPT_PREAMBLE: &str = "A cinematic architectural timelapse.";

const PROMPT_STYLE: &str = "High quality, stable camera, progressive construction, realistic \
     lighting, sharp geometry, 100% room coverage, step-by-step transformation.";

/// A prompt with nothing but whitespace and periods.
fn is_blank_prompt(prompt: &str) -> bool {
    prompt.trim().trim_end_matches('.').trim().is_empty()
}

/// Wrap the user's prompt in the fixed cinematic preamble.
///
/// One trailing period on the user prompt is dropped so the composed
/// sentence does not end up with `..`. Blank prompts use `DEFAULT_PROMPT`.
pub fn compose_prompt(user_prompt: &str) -> String {
    let trimmed = user_prompt.trim();
    let body = if is_blank_prompt(trimmed) {
        DEFAULT_PROMPT
    } else {
        trimmed
    };
    let body = body.strip_suffix('.').unwrap_or(body).trim_end();
    format!("{} {}. {}", PROMPT_PREAMBLE, body, PROMPT_STYLE)
}

/// An image ready to be sent inline to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    /// Wrap raw bytes with their MIME type.
    ///
    /// # Errors
    ///
    /// Returns `VeoError::InvalidInput` if `bytes` is empty or the MIME type
    /// is not an image type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, VeoError> {
        let mime_type = mime_type.into();
        if bytes.is_empty() {
            return Err(VeoError::InvalidInput("image is empty".to_string()));
        }
        if !mime_type.starts_with("image/") {
            return Err(VeoError::InvalidInput(format!(
                "unsupported MIME type '{}'",
                mime_type
            )));
        }
        Ok(Self { bytes, mime_type })
    }

    /// Read an image file, inferring its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, VeoError> {
        let mime_type = mime_from_extension(path).ok_or_else(|| {
            VeoError::InvalidInput(format!(
                "unsupported image extension: {}",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        Self::new(bytes, mime_type).map_err(|e| match e {
            VeoError::InvalidInput(reason) => {
                VeoError::InvalidInput(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// A before/after timelapse request.
///
/// Images are optional at construction so that a half-filled form can be
/// represented; `images()` enforces that both are present.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub before_image: Option<ImagePayload>,
    pub after_image: Option<ImagePayload>,
    pub prompt_text: String,
}

impl GenerationRequest {
    pub fn new(before: ImagePayload, after: ImagePayload, prompt: impl Into<String>) -> Self {
        Self {
            before_image: Some(before),
            after_image: Some(after),
            prompt_text: prompt.into(),
        }
    }

    /// Both images, or `InvalidInput` naming what is missing.
    pub fn images(&self) -> Result<(&ImagePayload, &ImagePayload), VeoError> {
        match (&self.before_image, &self.after_image) {
            (Some(before), Some(after)) if !before.is_empty() && !after.is_empty() => {
                Ok((before, after))
            }
            (None, None) => Err(VeoError::InvalidInput(
                "both 'before' and 'after' images are required".to_string(),
            )),
            (None, _) => Err(VeoError::InvalidInput(
                "the 'before' image is missing".to_string(),
            )),
            (_, None) => Err(VeoError::InvalidInput(
                "the 'after' image is missing".to_string(),
            )),
            _ => Err(VeoError::InvalidInput("an image is empty".to_string())),
        }
    }

    /// The user prompt, or the fallback when it is blank.
    pub fn effective_prompt(&self) -> &str {
        if is_blank_prompt(&self.prompt_text) {
            DEFAULT_PROMPT
        } else {
            self.prompt_text.trim()
        }
    }

    /// The full prompt sent to the provider.
    pub fn composed_prompt(&self) -> String {
        compose_prompt(self.effective_prompt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn png(len: usize) -> ImagePayload {
        ImagePayload::new(vec![7; len], "image/png").unwrap()
    }

    #[test]
    fn test_compose_prompt_wraps_user_text() {
        assert_eq!(
            compose_prompt("marble counters"),
            "A cinematic architectural timelapse. marble counters. High quality, stable camera, \
             progressive construction, realistic lighting, sharp geometry, 100% room coverage, \
             step-by-step transformation."
        );
    }

    #[test]
    fn test_compose_prompt_drops_trailing_period() {
        let composed = compose_prompt("Wood cabinetry installed.");
        assert!(composed.contains("Wood cabinetry installed. High quality"));
        assert!(!composed.contains(".."));
    }

    #[test]
    fn test_dots_only_prompt_falls_back_to_default() {
        assert_eq!(compose_prompt("..."), compose_prompt(""));
        assert!(compose_prompt(" . ").contains("timelapse. A seamless architectural transition. High"));

        let request = GenerationRequest::new(png(4), png(4), "...");
        assert_eq!(request.effective_prompt(), DEFAULT_PROMPT);
    }

    #[test]
    fn test_compose_prompt_strips_only_one_period() {
        assert!(compose_prompt("Then it was done...").contains("Then it was done... High quality"));
    }

    #[test]
    fn test_blank_prompt_falls_back_to_default() {
        let request = GenerationRequest::new(png(4), png(4), "   ");
        assert_eq!(request.effective_prompt(), DEFAULT_PROMPT);
        assert!(request
            .composed_prompt()
            .contains("A seamless architectural transition. High quality"));
    }

    #[test]
    fn test_images_requires_both() {
        let request = GenerationRequest {
            before_image: Some(png(100)),
            after_image: None,
            prompt_text: String::new(),
        };
        match request.images() {
            Err(VeoError::InvalidInput(reason)) => assert!(reason.contains("'after'")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }

        let request = GenerationRequest::default();
        assert!(matches!(request.images(), Err(VeoError::InvalidInput(_))));
    }

    #[test]
    fn test_image_payload_rejects_empty_and_non_image() {
        assert!(matches!(
            ImagePayload::new(Vec::new(), "image/png"),
            Err(VeoError::InvalidInput(_))
        ));
        assert!(matches!(
            ImagePayload::new(vec![1], "text/plain"),
            Err(VeoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_to_base64() {
        let image = ImagePayload::new(b"hello".to_vec(), "image/webp").unwrap();
        assert_eq!(image.to_base64(), "aGVsbG8=");
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_from_extension(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("a.jpg")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_from_extension(Path::new("a.txt")), None);
        assert_eq!(mime_from_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();

        let image = ImagePayload::from_path(file.path()).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.bytes(), &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_from_path_rejects_empty_file() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        assert!(matches!(
            ImagePayload::from_path(file.path()),
            Err(VeoError::InvalidInput(_))
        ));
    }
}
