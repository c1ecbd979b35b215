//! Grid sheets and the paginated document built from them.
//!
//! Sheet pages are rendered by the remote service when it is reachable and
//! locally otherwise. The document is always assembled locally.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::config::ComposeConfig;
use crate::error::ComposeError;
use crate::imaging::backend;
use crate::imaging::params::Quality;
use crate::models::{ComposedSheet, GridLayout, Orientation, ProcessedImage};
use crate::remote::wire::OutputFormat;
use crate::remote::{ProcessingService, SheetCompositionRequest};
use crate::storage::Storage;

pub mod document;
pub mod layout;

pub use document::PageContent;

const SHEET_QUALITY: u8 = 95;

pub struct SheetComposer {
    service: Arc<dyn ProcessingService>,
    storage: Arc<dyn Storage>,
    output_dir: PathBuf,
}

impl SheetComposer {
    pub fn new(
        config: &ComposeConfig,
        service: Arc<dyn ProcessingService>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            service,
            storage,
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Lays the images out over as many pages as the grid needs, in input order.
    pub async fn compose_sheets(
        &self,
        images: &[ProcessedImage],
        grid_layout: &GridLayout,
        orientation: Orientation,
    ) -> Result<Vec<ComposedSheet>, ComposeError> {
        grid_layout.validate()?;
        if images.is_empty() {
            return Err(ComposeError::NoImages);
        }

        let capacity = grid_layout.capacity();
        let batch = short_id();
        let mut sheets = Vec::with_capacity(images.len().div_ceil(capacity));

        for (page, chunk) in images.chunks(capacity).enumerate() {
            let target = self
                .output_dir
                .join(format!("sheet_{}_{:02}.jpg", batch, page + 1));

            let output_path = match self
                .render_remote(chunk, grid_layout, orientation, &target)
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    warn!(page = page + 1, error = %e, "Remote sheet composition failed, rendering locally");
                    self.render_local(chunk, grid_layout, orientation, &target)
                        .await?;
                    target
                }
            };

            let sheet = ComposedSheet {
                id: uuid::Uuid::new_v4().to_string(),
                output_path,
                grid_layout: grid_layout.clone(),
                orientation,
                images: chunk.iter().map(|img| img.id.clone()).collect(),
                empty_slots: capacity - chunk.len(),
            };
            debug!(
                page = page + 1,
                images = sheet.images.len(),
                empty_slots = sheet.empty_slots,
                "Sheet composed"
            );
            sheets.push(sheet);
        }

        info!(
            sheets = sheets.len(),
            layout = %grid_layout.name,
            %orientation,
            "Composition finished"
        );
        Ok(sheets)
    }

    /// Builds a PDF with one page per sheet and returns where it was written.
    pub async fn generate_document(
        &self,
        sheets: &[ComposedSheet],
        orientation: Orientation,
    ) -> Result<PathBuf, ComposeError> {
        if sheets.is_empty() {
            return Err(ComposeError::NoSheets);
        }

        let mut pages = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            match self.load_page(&sheet.output_path).await {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!(
                        sheet = %sheet.output_path.display(),
                        error = %e,
                        "Sheet unavailable, inserting placeholder page"
                    );
                    pages.push(PageContent::Placeholder {
                        label: display_name(&sheet.output_path),
                    });
                }
            }
        }

        let bytes = blocking(move || document::build_document(&pages, orientation)).await?;

        let path = self
            .output_dir
            .join(format!("document_{}.pdf", short_id()));
        self.storage.write_file(&path, &bytes).await?;

        info!(path = %path.display(), pages = sheets.len(), "Document generated");
        Ok(path)
    }

    async fn render_remote(
        &self,
        images: &[ProcessedImage],
        grid_layout: &GridLayout,
        orientation: Orientation,
        target: &Path,
    ) -> Result<PathBuf, ComposeError> {
        let request = SheetCompositionRequest {
            processed_images: images
                .iter()
                .map(|img| img.output_path.to_string_lossy().into_owned())
                .collect(),
            grid_layout: grid_layout.into(),
            sheet_orientation: orientation,
            output_format: OutputFormat::Image,
            output_path: Some(target.to_string_lossy().into_owned()),
        };

        let response = self.service.compose_sheet(&request).await?;
        let path = PathBuf::from(response.output_path);
        if !self.storage.exists(&path).await {
            return Err(ComposeError::Render(format!(
                "remote sheet {} was not written",
                path.display()
            )));
        }
        Ok(path)
    }

    async fn render_local(
        &self,
        images: &[ProcessedImage],
        grid_layout: &GridLayout,
        orientation: Orientation,
        target: &Path,
    ) -> Result<(), ComposeError> {
        let mut sources = Vec::with_capacity(images.len());
        for img in images {
            let decoded = match self.storage.read_file(&img.output_path).await {
                Ok(bytes) => {
                    let path = img.output_path.clone();
                    blocking(move || {
                        backend::decode(&bytes, &path)
                            .map_err(|e| ComposeError::Render(e.to_string()))
                    })
                    .await
                }
                Err(e) => Err(e.into()),
            };
            match decoded {
                Ok(image) => sources.push(Some(image)),
                Err(e) => {
                    warn!(image = %img.id, error = %e, "Leaving sheet cell blank");
                    sources.push(None);
                }
            }
        }

        let grid = grid_layout.clone();
        let bytes = blocking(move || {
            let canvas = layout::render_sheet(&sources, &grid, orientation);
            backend::encode_jpeg(
                &DynamicImage::ImageRgb8(canvas),
                Quality::new(SHEET_QUALITY),
            )
            .map_err(|e| ComposeError::Render(e.to_string()))
        })
        .await?;

        self.storage.write_file(target, &bytes).await?;
        Ok(())
    }

    async fn load_page(&self, path: &Path) -> Result<PageContent, ComposeError> {
        let bytes = self.storage.read_file(path).await?;
        let path = path.to_path_buf();

        blocking(move || {
            let img = backend::decode(&bytes, &path)
                .map_err(|e| ComposeError::Render(e.to_string()))?;
            let (width, height) = (img.width(), img.height());
            let jpeg = match image::guess_format(&bytes) {
                Ok(ImageFormat::Jpeg) if img.color().channel_count() == 3 => bytes,
                _ => backend::encode_jpeg(&img, Quality::new(SHEET_QUALITY))
                    .map_err(|e| ComposeError::Render(e.to_string()))?,
            };
            Ok(PageContent::Sheet {
                jpeg,
                width,
                height,
            })
        })
        .await
    }
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn blocking<T, F>(f: F) -> Result<T, ComposeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ComposeError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ComposeError::Render(format!("render task failed: {}", e)))?
}
