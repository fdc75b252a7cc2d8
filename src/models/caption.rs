//! Captioning through a vision LLM.

use super::vlm::VlmClient;
use super::Captioner;
use crate::error::ModelError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::CAPTION_SYSTEM_PROMPT;
use edgequake_llm::ChatMessage;
use image::DynamicImage;
use std::sync::Arc;

/// [`Captioner`] that asks a vision model for a one-sentence description.
pub struct VlmCaptioner {
    client: Arc<VlmClient>,
}

impl VlmCaptioner {
    pub fn new(client: Arc<VlmClient>) -> Self {
        Self { client }
    }
}

impl Captioner for VlmCaptioner {
    fn caption(&self, image: &DynamicImage) -> Result<String, ModelError> {
        let image_data =
            encode::encode_image(image).map_err(|e| ModelError::ImageEncoding(e.to_string()))?;

        // The image carries the content; the user text only satisfies APIs
        // that require a non-empty user turn.
        let messages = vec![
            ChatMessage::system(CAPTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images("Caption this image.", vec![image_data]),
        ];

        let reply = self.client.chat(&messages)?;
        Ok(postprocess::clean_caption(&reply))
    }
}
