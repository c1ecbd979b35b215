use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info_span, warn, Instrument};

use super::backend;
use super::calculations::{
    clamp_crop, quality_score, select_crop, target_dimensions, upscale_factor,
    CENTER_CROP_CONFIDENCE,
};
use super::params::{CropStrategy, Quality, UpscaleStrategy};
use crate::config::schema::MAX_IMAGE_SIZE;
use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::models::{
    AspectRatio, CropArea, CropSource, DetectionResult, FileMetadata, ProcessedImage,
    ProcessingOptions,
};
use crate::naming::{sanitize_label, NamingService, NamingSuggestion};
use crate::remote::wire::{detections_to_wire, DetectionType, RatioDimensions};
use crate::remote::{CropRequest, DetectionRequest, ProcessingService};
use crate::storage::Storage;

/// Crop produced by either branch, ready for finishing.
pub struct CroppedImage {
    pub area: CropArea,
    pub image: DynamicImage,
    pub source: CropSource,
}

struct Finished {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    upscale: f64,
}

/// Converts one image to a target aspect ratio.
///
/// Cropping is tried on the remote service first and redone locally when the
/// remote call fails for any reason. Resizing, sharpening and encoding always
/// run locally.
pub struct ConversionEngine {
    service: Arc<dyn ProcessingService>,
    storage: Arc<dyn Storage>,
    naming: Option<Arc<dyn NamingService>>,
    config: ConversionConfig,
}

impl ConversionEngine {
    pub fn new(
        config: ConversionConfig,
        service: Arc<dyn ProcessingService>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            service,
            storage,
            naming: None,
            config,
        }
    }

    pub fn with_naming(mut self, naming: Arc<dyn NamingService>) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub async fn convert(
        &self,
        file: &FileMetadata,
        aspect_ratio: &AspectRatio,
        options: &ProcessingOptions,
    ) -> Result<ProcessedImage, ConvertError> {
        let span = info_span!("convert",
            file_id = %file.id,
            file = %file.original_name,
            ratio = %aspect_ratio.name,
        );
        self.convert_inner(file, aspect_ratio, options)
            .instrument(span)
            .await
    }

    async fn convert_inner(
        &self,
        file: &FileMetadata,
        aspect_ratio: &AspectRatio,
        options: &ProcessingOptions,
    ) -> Result<ProcessedImage, ConvertError> {
        let started = Instant::now();
        aspect_ratio.validate()?;
        check_input(file)?;

        let bytes = self.storage.read_file(&file.path).await?;
        if bytes.len() as u64 > MAX_IMAGE_SIZE {
            return Err(ConvertError::FileTooLarge {
                path: file.path.clone(),
                size: bytes.len() as u64,
                limit: MAX_IMAGE_SIZE,
            });
        }
        let source_dims = backend::read_dimensions(&bytes, &file.path)?;

        let (detections, strategy) = if options.detection_enabled {
            (self.detect(file).await, self.config.crop_strategy)
        } else {
            (DetectionResult::empty(), CropStrategy::Center)
        };

        let ratio = aspect_ratio.value();
        let cropped = match self
            .crop_remote(file, aspect_ratio, &detections, strategy, source_dims)
            .await
        {
            Ok(cropped) => cropped,
            Err(e) => {
                warn!(error = %e, "Remote crop failed, cropping locally");
                self.crop_local(bytes, &file.path, ratio, &detections, strategy)
                    .await?
            }
        };

        let area = cropped.area;
        let crop_source = cropped.source;
        let finished = self.finish(cropped, ratio).await?;

        let suggestion = self.suggest(file, options).await;
        let label = suggestion
            .name
            .as_deref()
            .and_then(sanitize_label)
            .or_else(|| sanitize_label(file.stem()))
            .unwrap_or_else(|| "image".to_string());
        let output_path = self.output_path(&label, aspect_ratio);
        self.storage
            .write_file(&output_path, &finished.bytes)
            .await?;

        let source_pixels = source_dims.0 as f64 * source_dims.1 as f64;
        let crop_fraction = (area.width as f64 * area.height as f64) / source_pixels.max(1.0);
        let quality = quality_score(finished.upscale, crop_fraction, area.confidence);

        debug!(
            output = %output_path.display(),
            width = finished.width,
            height = finished.height,
            quality,
            source = ?crop_source,
            "Image converted"
        );

        Ok(ProcessedImage {
            id: uuid::Uuid::new_v4().to_string(),
            original_file_id: file.id.clone(),
            output_path,
            crop_area: area,
            aspect_ratio: aspect_ratio.clone(),
            detections,
            processing_time_ms: started.elapsed().as_millis() as u64,
            output_width: finished.width,
            output_height: finished.height,
            upscale_factor: finished.upscale,
            quality_score: quality,
            crop_source,
            captions: suggestion.caption,
        })
    }

    /// Asks the remote service for faces and persons. Failures yield no detections.
    pub async fn detect(&self, file: &FileMetadata) -> DetectionResult {
        let request = DetectionRequest {
            image_path: file.path.to_string_lossy().into_owned(),
            detection_types: vec![DetectionType::Face, DetectionType::Person],
            confidence_threshold: self.config.confidence_threshold,
        };

        match self.service.detect_objects(&request).await {
            Ok(response) => {
                let result = response.into_result();
                debug!(
                    faces = result.faces.len(),
                    persons = result.persons.len(),
                    "Detection finished"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "Detection unavailable, using a centered crop");
                DetectionResult::empty()
            }
        }
    }

    /// Remote branch: the service writes a cropped intermediate that is read
    /// back and removed.
    pub async fn crop_remote(
        &self,
        file: &FileMetadata,
        aspect_ratio: &AspectRatio,
        detections: &DetectionResult,
        strategy: CropStrategy,
        source_dims: (u32, u32),
    ) -> Result<CroppedImage, ConvertError> {
        let intermediate = self.config.output_dir.join(format!(
            ".crop-{}.jpg",
            uuid::Uuid::new_v4().simple()
        ));
        let request = CropRequest {
            image_path: file.path.to_string_lossy().into_owned(),
            target_aspect_ratio: RatioDimensions {
                width: aspect_ratio.width,
                height: aspect_ratio.height,
            },
            detection_results: (!detections.is_empty()).then(|| detections_to_wire(detections)),
            crop_strategy: strategy,
            output_path: Some(intermediate.to_string_lossy().into_owned()),
        };

        let response = self.service.crop_image(&request).await?;
        let processed_path = PathBuf::from(&response.processed_path);
        if processed_path != intermediate {
            if let Err(e) = self.storage.delete(&intermediate).await {
                debug!(error = %e, "Failed to remove remote crop intermediate");
            }
            return Err(ConvertError::Processing(format!(
                "remote crop reported '{}' instead of the requested intermediate",
                processed_path.display()
            )));
        }

        let read = self.storage.read_file(&processed_path).await;
        if let Err(e) = self.storage.delete(&processed_path).await {
            debug!(error = %e, "Failed to remove remote crop intermediate");
        }
        let bytes = read?;

        let image = run_blocking(move || backend::decode(&bytes, &processed_path)).await?;

        let bbox = response.crop_coordinates;
        let area = clamp_crop(
            CropArea {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
                confidence: crop_confidence(detections, strategy),
            },
            source_dims,
        );

        Ok(CroppedImage {
            area,
            image,
            source: CropSource::Remote,
        })
    }

    /// Local branch: crop selection and extraction on this machine.
    pub async fn crop_local(
        &self,
        bytes: Vec<u8>,
        path: &Path,
        ratio: f64,
        detections: &DetectionResult,
        strategy: CropStrategy,
    ) -> Result<CroppedImage, ConvertError> {
        let path = path.to_path_buf();
        let detections = detections.clone();

        run_blocking(move || {
            let img = backend::decode(&bytes, &path)?;
            let area = select_crop((img.width(), img.height()), ratio, &detections, strategy);
            Ok(CroppedImage {
                image: backend::crop(&img, &area),
                area,
                source: CropSource::Local,
            })
        })
        .await
    }

    async fn finish(&self, cropped: CroppedImage, ratio: f64) -> Result<Finished, ConvertError> {
        let min_output = self.config.min_output_size;
        let max_upscale = self.config.max_upscale_factor;
        let quality = Quality::new(self.config.jpeg_quality);

        run_blocking(move || {
            let crop_dims = (cropped.image.width(), cropped.image.height());
            let (width, height) = target_dimensions(crop_dims, ratio, min_output, max_upscale);
            let upscale = upscale_factor(crop_dims, (width, height));
            let strategy = UpscaleStrategy::for_scale(upscale);

            debug!(
                crop_width = crop_dims.0,
                crop_height = crop_dims.1,
                width,
                height,
                upscale,
                ?strategy,
                "Resampling"
            );

            let out = backend::resample(&cropped.image, width, height, strategy);
            Ok(Finished {
                bytes: backend::encode_jpeg(&out, quality)?,
                width,
                height,
                upscale,
            })
        })
        .await
    }

    async fn suggest(&self, file: &FileMetadata, options: &ProcessingOptions) -> NamingSuggestion {
        let wants_name = options.generate_descriptive_names;
        let wants_caption = options.generate_captions;

        let naming = match &self.naming {
            Some(naming) if wants_name || wants_caption => naming,
            _ => return NamingSuggestion::default(),
        };

        match naming.suggest(&file.path, wants_caption).await {
            Ok(suggestion) => NamingSuggestion {
                name: suggestion.name.filter(|_| wants_name),
                caption: suggestion.caption.filter(|_| wants_caption),
            },
            Err(e) => {
                warn!(error = %e, "Naming service failed, keeping the original name");
                NamingSuggestion::default()
            }
        }
    }

    /// `{label}_{ratio}_{id}.jpg` under the output directory.
    fn output_path(&self, label: &str, aspect_ratio: &AspectRatio) -> PathBuf {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.config.output_dir.join(format!(
            "{}_{}_{}.jpg",
            label,
            aspect_ratio.slug(),
            &id[..8]
        ))
    }
}

fn check_input(file: &FileMetadata) -> Result<(), ConvertError> {
    if !backend::is_supported(&file.path) {
        let ext = file
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("none");
        return Err(ConvertError::UnsupportedFormat(ext.to_string()));
    }
    if file.size > MAX_IMAGE_SIZE {
        return Err(ConvertError::FileTooLarge {
            path: file.path.clone(),
            size: file.size,
            limit: MAX_IMAGE_SIZE,
        });
    }
    Ok(())
}

fn crop_confidence(detections: &DetectionResult, strategy: CropStrategy) -> f64 {
    if strategy == CropStrategy::Center || detections.is_empty() {
        CENTER_CROP_CONFIDENCE
    } else {
        detections.confidence
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ConvertError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConvertError::Processing(format!("pixel task failed: {}", e)))?
}
