#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(unused_mut)]
#![allow(dead_code)]
#![allow(unused_doc_comments)]
#![allow(unused_labels)]

pub mod annotation;
pub mod appconfig;
pub mod frames;
pub mod logging;
pub mod storage;
pub mod ui;
pub mod vision;

use std::path::PathBuf;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use clap::{Parser, Subcommand};

use crate::annotation::AnnotationSession;
use crate::appconfig::AppSettings;
use crate::frames::FrameSelection;
use crate::storage::FileImageSource;
use crate::vision::{Segmenter, ThresholdSegmenter};

#[derive(Parser, Debug)]
#[command(name = "polygon_annotator", version, about = "Polygon labeling for segmentation training data")]
struct Cli {
    /// Settings file, defaults are used if it doesn't exist
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Draw polygons on images and save label images
    Annotate {
        /// Images, HDF5 files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Also open files that already have labels
        #[arg(long)]
        include_labeled: bool,
    },
    /// Play a video, any key saves the frame on screen, q quits
    ExtractVideo {
        video: PathBuf,
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        wait_ms: i32,
        /// Save only this frame, no window
        #[arg(long, value_name = "N")]
        frame: Option<usize>,
    },
    /// Save strided frames of a (t, h, w) HDF5 volume
    ExtractDataset {
        file: PathBuf,
        #[arg(long, default_value = "data")]
        dataset: String,
        /// Show each frame, any key saves, q quits
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        stride: Option<usize>,
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        wait_ms: i32,
    },
    /// Resize stored HDF5 labels to the shape of their image
    ResizeLabel {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _guard = logging::init_logs();

    let cli = Cli::parse();
    let settings = AppSettings::load_or_default(&cli.config);

    match cli.command {
        Commands::Annotate {
            files,
            include_labeled,
        } => annotate(settings, files, include_labeled),
        Commands::ExtractVideo {
            video,
            out_dir,
            wait_ms,
            frame,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| settings.out_dir.clone());

            /// Single frame
            if let Some(n) = frame {
                let Some(im) = frames::read_frame(&video, n)? else {
                    bail!("{} has no frame {}", video.display(), n);
                };
                std::fs::create_dir_all(&out_dir)?;
                frames::save_frame(&out_dir, &frames::source_stem(&video), &im, n)?;
                return Ok(());
            }

            let saved = frames::select_video_frames(&video, &out_dir, wait_ms)?;
            info!("Saved {} frames from {}", saved.len(), video.display());
            Ok(())
        }
        Commands::ExtractDataset {
            file,
            dataset,
            interactive,
            start,
            end,
            stride,
            out_dir,
            wait_ms,
        } => {
            let mut selection = FrameSelection::from_settings(&settings);
            selection.start = start.unwrap_or(selection.start);
            selection.end = end.unwrap_or(selection.end);
            selection.stride = stride.unwrap_or(selection.stride);
            selection.wait_ms = wait_ms;

            let out_dir = out_dir.unwrap_or_else(|| settings.out_dir.clone());

            let data = storage::h5::read_volume(&file, &dataset)?;
            debug!("{}:{} shape {:?}", file.display(), dataset, data.dim());

            let saved =
                frames::select_dataset_frames(&file, &data, &out_dir, &selection, interactive)?;
            info!("Saved {} frames from {}", saved.len(), file.display());
            Ok(())
        }
        Commands::ResizeLabel { files } => {
            for f in files {
                storage::h5::resize_label(&f, &settings.labels_dataset, &settings.image_dataset)
                    .with_context(|| format!("Failed to resize labels in {}", f.display()))?;
            }
            Ok(())
        }
    }
}

fn annotate(settings: AppSettings, files: Vec<PathBuf>, include_labeled: bool) -> Result<()> {
    let source = FileImageSource::new(settings.clone());

    let files = source.collect_images(&files)?;
    let files = if settings.exclude_labeled && !include_labeled {
        source.filter_unlabeled(files)?
    } else {
        files
    };
    ensure!(!files.is_empty(), "Nothing to label");
    info!("{} files to label", files.len());

    let mut session = AnnotationSession::new(files)?;
    let first_image = session.load_data(&source)?;

    let segmenter: Option<Box<dyn Segmenter>> = settings
        .prediction_threshold
        .map(|t| Box::new(ThresholdSegmenter::new(t)) as Box<dyn Segmenter>);

    let (w, h) = settings.window_size;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([w, h])
            .with_min_inner_size([400.0, 300.0]),
        ..Default::default()
    };

    eframe::run_native(
        "polygon_annotator",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(ui::ui_types::App::new(
                cc,
                session,
                source,
                first_image,
                segmenter,
            )))
        }),
    )
    .map_err(|e| anyhow!("GUI failed: {}", e))
}
