//! Local model inference: image preprocessing and feature extraction.
//!
//! Both halves are traits so a batch can run any model; [`ClipTransform`] and
//! [`OnnxExtractor`] are the ONNX Runtime backed defaults.

use std::path::Path;

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::types::{FeatureError, FeatureResult};

/// CLIP image preprocessing constants.
const CLIP_IMAGE_SIZE: u32 = 224;
#[allow(clippy::excessive_precision)]
const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
#[allow(clippy::excessive_precision)]
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Turns an RGB image into a batched NCHW input tensor.
pub trait ImageTransform {
    fn apply(&self, img: &DynamicImage) -> FeatureResult<Array4<f32>>;
}

/// Runs a model over a batched input and returns the squeezed output.
pub trait FeatureExtractor {
    fn extract(&mut self, input: Array4<f32>) -> FeatureResult<Vec<f32>>;
}

impl<T: ImageTransform + ?Sized> ImageTransform for &T {
    fn apply(&self, img: &DynamicImage) -> FeatureResult<Array4<f32>> {
        (**self).apply(img)
    }
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for &mut T {
    fn extract(&mut self, input: Array4<f32>) -> FeatureResult<Vec<f32>> {
        (**self).extract(input)
    }
}

impl<T: ImageTransform + ?Sized> ImageTransform for Box<T> {
    fn apply(&self, img: &DynamicImage) -> FeatureResult<Array4<f32>> {
        (**self).apply(img)
    }
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for Box<T> {
    fn extract(&mut self, input: Array4<f32>) -> FeatureResult<Vec<f32>> {
        (**self).extract(input)
    }
}

/// Resize to 224x224 and normalize with CLIP mean/std.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipTransform;

impl ImageTransform for ClipTransform {
    fn apply(&self, img: &DynamicImage) -> FeatureResult<Array4<f32>> {
        let resized = img.resize_exact(
            CLIP_IMAGE_SIZE,
            CLIP_IMAGE_SIZE,
            image::imageops::FilterType::Lanczos3,
        );
        let rgb = resized.to_rgb8();

        let mut tensor =
            Array4::<f32>::zeros((1, 3, CLIP_IMAGE_SIZE as usize, CLIP_IMAGE_SIZE as usize));

        for y in 0..CLIP_IMAGE_SIZE {
            for x in 0..CLIP_IMAGE_SIZE {
                let pixel = rgb.get_pixel(x, y);
                for c in 0..3usize {
                    let val = pixel[c] as f32 / 255.0;
                    tensor[[0, c, y as usize, x as usize]] = (val - CLIP_MEAN[c]) / CLIP_STD[c];
                }
            }
        }
        Ok(tensor)
    }
}

/// Feature extractor backed by an ONNX model.
pub struct OnnxExtractor {
    session: Session,
}

impl OnnxExtractor {
    /// Load a model. A missing file is an error: there is no zero-vector fallback.
    pub fn new(model_path: &Path) -> FeatureResult<Self> {
        if !model_path.exists() {
            return Err(FeatureError::ModelNotAvailable(format!(
                "no ONNX model at {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading ONNX model from {}", model_path.display());

        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(1)?))
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(|e| FeatureError::Model(format!("Failed to load ONNX model: {e}")))?;

        Ok(Self { session })
    }
}

impl FeatureExtractor for OnnxExtractor {
    fn extract(&mut self, input: Array4<f32>) -> FeatureResult<Vec<f32>> {
        let (n, c, h, w) = input.dim();
        let data: Vec<f32> = input.iter().copied().collect();

        let input_tensor = Tensor::from_array(([n, c, h, w], data))
            .map_err(|e| FeatureError::Model(format!("Failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| FeatureError::Model(format!("ONNX inference failed: {e}")))?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| FeatureError::Model(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }
}

/// Decode, transform, and run the model for one image file.
pub fn extract_from_file<X, T>(path: &Path, extractor: &mut X, transform: &T) -> FeatureResult<Vec<f32>>
where
    X: FeatureExtractor + ?Sized,
    T: ImageTransform + ?Sized,
{
    let img = crate::capture::load_rgb(path)?;
    let input = transform.apply(&img)?;
    extractor.extract(input)
}
