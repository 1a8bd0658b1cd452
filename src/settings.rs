// Environment-driven configuration
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/lmz/candle-blip/resolve/main/blip-image-captioning-large-q4k.gguf";
const DEFAULT_MODEL_PATH: &str = "./blip-image-captioning-large-q4k.gguf";
const DEFAULT_IMAGE_PATH: &str = "./input.jpg";
const DEFAULT_PREDICT_WAIT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub model_url: String,
    pub model_path: PathBuf,
    pub image_path: PathBuf,
    /// How long a predict request waits for the model lock before 503.
    pub predict_wait: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let model_url = env::var("MODEL_URL").unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string());
        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));
        let image_path = env::var("IMAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_IMAGE_PATH));
        let predict_wait = env::var("PREDICT_WAIT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_PREDICT_WAIT_SECS));

        Self {
            host,
            port,
            model_url,
            model_path,
            image_path,
            predict_wait,
        }
    }
}
