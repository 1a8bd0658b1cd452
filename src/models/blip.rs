// BLIP captioning model
use anyhow::Context;
use candle::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip;
use candle_transformers::models::quantized_blip::{self, BlipForConditionalGeneration};
use hf_hub::api::sync::Api;
use image::imageops::FilterType;
use std::path::Path;
use tokenizers::Tokenizer;

const TOKENIZER_REPO: &str = "Salesforce/blip-image-captioning-large";
const IMAGE_SIZE: usize = 384;
const BOS_TOKEN_ID: u32 = 30522;
const SEP_TOKEN_ID: u32 = 102;
const MAX_CAPTION_TOKENS: usize = 128;
const SAMPLING_SEED: u64 = 1337;

/// Loaded caption model. Generation mutates the decoder kv-cache, so callers
/// need exclusive access for the whole encode-and-caption sequence.
pub struct BlipCaptioner {
    model: BlipForConditionalGeneration,
    tokenizer: Tokenizer,
    device: Device,
}

impl BlipCaptioner {
    pub fn load(artifact: &Path, device: Device) -> anyhow::Result<Self> {
        // tokenizer comes from the hub, weights from the local artifact
        let api = Api::new()?;
        let tokenizer_filename = api.model(TOKENIZER_REPO.to_string()).get("tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(tokenizer_filename).map_err(anyhow::Error::msg)?;

        let config = blip::Config::image_captioning_large();
        let vb = quantized_blip::VarBuilder::from_gguf(artifact, &device)
            .with_context(|| format!("loading model artifact {}", artifact.display()))?;
        let model = BlipForConditionalGeneration::new(&config, vb)?;
        log::info!("loaded caption model from {}", artifact.display());

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Reads the image file and runs the vision tower, producing the image
    /// embedding the caption decoder conditions on.
    pub fn encode_image(&self, path: &Path) -> anyhow::Result<Tensor> {
        let image = load_image(path, &self.device)
            .with_context(|| format!("loading image {}", path.display()))?;
        let embeds = image.unsqueeze(0)?.apply(self.model.vision_model())?;
        Ok(embeds)
    }

    /// Greedy-decodes a caption for the given image embedding.
    pub fn caption(&mut self, image_embeds: &Tensor) -> anyhow::Result<String> {
        self.model.reset_kv_cache();
        let mut logits_processor = LogitsProcessor::new(SAMPLING_SEED, None, None);
        let mut token_ids = vec![BOS_TOKEN_ID];
        for index in 0..MAX_CAPTION_TOKENS {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = self.model.text_decoder().forward(&input_ids, image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let token = logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }
        let caption = self
            .tokenizer
            .decode(&token_ids[1..], true)
            .map_err(anyhow::Error::msg)?;
        Ok(caption.trim().to_string())
    }
}

// BLIP expects a 384x384 RGB image normalized with the CLIP mean/std.
fn load_image(path: &Path, device: &Device) -> anyhow::Result<Tensor> {
    let image = image::ImageReader::open(path)?
        .decode()?
        .resize_to_fill(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
        .to_rgb8();
    let data = Tensor::from_vec(image.into_raw(), (IMAGE_SIZE, IMAGE_SIZE, 3), device)?
        .permute((2, 0, 1))?;
    let mean = Tensor::new(&[0.48145466f32, 0.4578275, 0.40821073], device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&[0.26862954f32, 0.26130258, 0.27577711], device)?.reshape((3, 1, 1))?;
    let image = (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?;
    Ok(image)
}
