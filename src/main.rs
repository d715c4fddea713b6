// src/main.rs

use anyhow::{Context, Result};
use face_redact::{Config, FaceBox, FaceDetector, Frame, ModelLoader, OrtSession, OrtSessionFactory};
use image::RgbaImage;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];

#[derive(Serialize)]
struct PhotoRecord<'a> {
    file: String,
    width: u32,
    height: u32,
    faces: &'a [FaceBox],
}

struct RunStats {
    photos: usize,
    photos_with_faces: usize,
    total_faces: usize,
    failures: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("face_redact=info,ort=warn")
        .init();

    info!("Face redaction pipeline starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;
    info!("✓ Configuration loaded from {}", config_path);

    let session = build_session(&config).await?;
    info!("✓ Inference session ready");

    let detector = FaceDetector::new(session, config.clone());

    let photos = find_photos(&config.photos.input_dir)?;
    if photos.is_empty() {
        error!("No photos found in {}", config.photos.input_dir);
        return Ok(());
    }
    info!("Found {} photo(s) to process", photos.len());

    std::fs::create_dir_all(&config.photos.output_dir)?;
    let results_path = Path::new(&config.photos.output_dir).join("faces.jsonl");
    let mut results_file = std::fs::File::create(&results_path)?;
    info!("💾 Results will be written to: {}", results_path.display());

    let mut stats = RunStats {
        photos: 0,
        photos_with_faces: 0,
        total_faces: 0,
        failures: 0,
    };

    for photo_path in &photos {
        match process_photo(photo_path, &detector, &config, &mut results_file).await {
            Ok(face_count) => {
                stats.photos += 1;
                stats.total_faces += face_count;
                if face_count > 0 {
                    stats.photos_with_faces += 1;
                }
            }
            Err(e) => {
                error!("Failed to process {}: {:#}", photo_path.display(), e);
                stats.failures += 1;
            }
        }
    }

    info!("\n📊 Final Report:");
    info!("  Photos processed: {}", stats.photos);
    info!("  Photos with faces: {}", stats.photos_with_faces);
    info!("  Total faces found: {}", stats.total_faces);
    if stats.failures > 0 {
        warn!("  Failures: {}", stats.failures);
    }

    Ok(())
}

/// Build the shared session: http(s) URLs go through the caching loader,
/// anything else is treated as a local model path.
async fn build_session(config: &Config) -> Result<Arc<OrtSession>> {
    let url = &config.model.url;
    if url.starts_with("http://") || url.starts_with("https://") {
        let loader = ModelLoader::new(OrtSessionFactory {
            num_threads: config.model.num_threads,
        });
        loader.load(url).await
    } else {
        Ok(Arc::new(OrtSession::from_file(
            url,
            config.model.num_threads,
        )?))
    }
}

fn find_photos(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut photos = Vec::new();
    for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            photos.push(path.to_path_buf());
        }
    }
    photos.sort();
    Ok(photos)
}

async fn process_photo(
    path: &Path,
    detector: &FaceDetector<Arc<OrtSession>>,
    config: &Config,
    results_file: &mut std::fs::File,
) -> Result<usize> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    let frame = Frame::new(decoded.into_raw(), width, height);

    let faces = detector
        .detect_faces(&frame, config.detection.score_threshold)
        .await?;

    info!(
        "{}: {} face(s) ({}x{})",
        path.display(),
        faces.len(),
        width,
        height
    );

    let record = PhotoRecord {
        file: path.display().to_string(),
        width,
        height,
        faces: &faces,
    };
    writeln!(results_file, "{}", serde_json::to_string(&record)?)?;
    results_file.flush()?;

    if config.photos.save_redacted && !faces.is_empty() {
        save_redacted(path, &frame, &faces, &config.photos.output_dir)?;
    }

    Ok(faces.len())
}

/// Write a copy of the photo with every detected face pixelated.
fn save_redacted(path: &Path, frame: &Frame, faces: &[FaceBox], output_dir: &str) -> Result<()> {
    let mut image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer does not match its dimensions")?;

    for face in faces {
        pixelate_region(&mut image, face);
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("photo");
    let out_path = Path::new(output_dir).join(format!("{}_redacted.png", stem));
    image
        .save(&out_path)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    info!("💾 Redacted copy saved to {}", out_path.display());
    Ok(())
}

fn pixelate_region(image: &mut RgbaImage, face: &FaceBox) {
    const BLOCK: u32 = 12;

    let (width, height) = image.dimensions();
    let x0 = face.x.max(0.0) as u32;
    let y0 = face.y.max(0.0) as u32;
    let x1 = ((face.x + face.w).max(0.0) as u32).min(width);
    let y1 = ((face.y + face.h).max(0.0) as u32).min(height);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let mut by = y0;
    while by < y1 {
        let mut bx = x0;
        let block_h = BLOCK.min(y1 - by);
        while bx < x1 {
            let block_w = BLOCK.min(x1 - bx);

            // Average the block, then flood it with that color.
            let mut sum = [0u64; 4];
            for y in by..by + block_h {
                for x in bx..bx + block_w {
                    let p = image.get_pixel(x, y);
                    for c in 0..4 {
                        sum[c] += p.0[c] as u64;
                    }
                }
            }
            let count = (block_w * block_h) as u64;
            let mean = [
                (sum[0] / count) as u8,
                (sum[1] / count) as u8,
                (sum[2] / count) as u8,
                (sum[3] / count) as u8,
            ];
            for y in by..by + block_h {
                for x in bx..bx + block_w {
                    image.put_pixel(x, y, image::Rgba(mean));
                }
            }

            bx += block_w;
        }
        by += block_h;
    }
}
