use crate::config::ExtractionConfig;
use crate::core::color::{nearest_named, NamedColor, Rgb};
use crate::core::features::{
    Fingerprint, ImageFeatures, ShapeFeatures, TextureFeatures, FINGERPRINT_GRID,
};
use crate::error::{MatchError, Result};
use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, GrayImage, RgbaImage};
use std::collections::HashMap;

/// Luma difference from the border that marks a pixel as foreground.
const FOREGROUND_THRESHOLD: f64 = 32.0;
/// Gradient magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: f64 = 32.0;
const FINGERPRINT_THRESHOLD: f64 = 127.0;
const REGULARITY_GRID: usize = 4;

/// Strategy for turning a decoded image into [`ImageFeatures`].
///
/// Implementations hold no per-call state, so one instance can serve
/// concurrent searches.
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, image: &DynamicImage) -> Result<ImageFeatures>;
}

/// Pure in-process extraction: colors, color-derived labels, pixel statistics.
#[derive(Debug, Clone, Default)]
pub struct LocalHeuristicExtractor {
    config: ExtractionConfig,
}

impl LocalHeuristicExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The image scaled to `working_size`. Filtering happens on
    /// premultiplied alpha so the hidden color of transparent pixels does
    /// not leak into the edges of opaque ones.
    fn working_image(&self, image: &DynamicImage) -> RgbaImage {
        let rgba = image.to_rgba8();
        let size = match self.config.working_size {
            Some(size) if rgba.dimensions() != (size, size) => size,
            _ => return rgba,
        };
        if !image.color().has_alpha() {
            return imageops::resize(&rgba, size, size, FilterType::Triangle);
        }

        let mut premultiplied = rgba;
        for pixel in premultiplied.pixels_mut() {
            let a = pixel.0[3] as u32;
            for c in &mut pixel.0[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
        let mut resized = imageops::resize(&premultiplied, size, size, FilterType::Triangle);
        for pixel in resized.pixels_mut() {
            let a = pixel.0[3] as u32;
            for c in &mut pixel.0[..3] {
                *c = if a == 0 {
                    0
                } else {
                    ((*c as u32 * 255 + a / 2) / a).min(255) as u8
                };
            }
        }
        resized
    }

    /// Colors of the working image. Downscaling can fade a small opaque
    /// subject below the alpha threshold; then every native pixel is sampled.
    fn colors(&self, image: &DynamicImage, working: &RgbaImage) -> Vec<Rgb> {
        let colors = dominant_colors(working, &self.config);
        if !colors.is_empty() || !image.color().has_alpha() {
            return colors;
        }
        let native = ExtractionConfig {
            sample_stride: 1,
            ..self.config.clone()
        };
        dominant_colors(&image.to_rgba8(), &native)
    }
}

impl FeatureExtractor for LocalHeuristicExtractor {
    fn name(&self) -> &'static str {
        "local-heuristic"
    }

    fn extract(&self, image: &DynamicImage) -> Result<ImageFeatures> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(MatchError::image_load("image has no pixels"));
        }

        let rgba = self.working_image(image);
        let dominant_colors = self.colors(image, &rgba);
        let luma = DynamicImage::ImageRgba8(rgba).to_luma8();

        let labels = infer_labels(&dominant_colors, self.config.max_labels);
        let gradients = Gradients::measure(&luma);
        let shape = shape_features(width, height, &luma, &gradients);
        let texture = self
            .config
            .extract_texture
            .then(|| texture_features(&luma, &gradients));
        let fingerprint = fingerprint(&image.to_luma8());

        log::debug!(
            "Extracted {} colors, {} labels from {}x{} image",
            dominant_colors.len(),
            labels.len(),
            width,
            height
        );

        Ok(ImageFeatures {
            dominant_colors,
            labels,
            shape,
            texture,
            fingerprint,
        })
    }
}

/// Most frequent quantized colors among every `sample_stride`-th opaque pixel.
/// Equal counts are ordered by RGB value so the result never depends on
/// hash iteration order.
pub fn dominant_colors(rgba: &RgbaImage, config: &ExtractionConfig) -> Vec<Rgb> {
    let mut counts: HashMap<Rgb, usize> = HashMap::new();
    for pixel in rgba.pixels().step_by(config.sample_stride.max(1)) {
        let [r, g, b, a] = pixel.0;
        if a < config.alpha_threshold {
            continue;
        }
        *counts
            .entry(Rgb(r, g, b).quantize(config.quantize_step))
            .or_insert(0) += 1;
    }

    let mut ranked: Vec<(Rgb, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(config.max_colors)
        .map(|(color, _)| color)
        .collect()
}

/// Color names first, then each color's associated item keywords.
pub fn infer_labels(colors: &[Rgb], max_labels: usize) -> Vec<String> {
    let mut named: Vec<&'static NamedColor> = Vec::new();
    for color in colors {
        let candidate = nearest_named(color);
        if !named.iter().any(|n| n.name == candidate.name) {
            named.push(candidate);
        }
    }

    let mut labels: Vec<String> = Vec::new();
    let words = named
        .iter()
        .map(|n| n.name)
        .chain(named.iter().flat_map(|n| n.keywords.iter().copied()));
    for word in words {
        if labels.len() >= max_labels {
            break;
        }
        if !labels.iter().any(|l| l == word) {
            labels.push(word.to_string());
        }
    }
    labels
}

/// Forward-difference gradient statistics of a grayscale image.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gradients {
    pub sum_abs_x: f64,
    pub sum_abs_y: f64,
    pub edges: usize,
    pub samples: usize,
}

impl Gradients {
    pub fn measure(luma: &GrayImage) -> Self {
        let (width, height) = luma.dimensions();
        let mut gradients = Gradients::default();
        if width < 2 || height < 2 {
            return gradients;
        }

        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let here = luma.get_pixel(x, y)[0] as f64;
                let gx = luma.get_pixel(x + 1, y)[0] as f64 - here;
                let gy = luma.get_pixel(x, y + 1)[0] as f64 - here;
                gradients.sum_abs_x += gx.abs();
                gradients.sum_abs_y += gy.abs();
                if (gx * gx + gy * gy).sqrt() > EDGE_THRESHOLD {
                    gradients.edges += 1;
                }
                gradients.samples += 1;
            }
        }
        gradients
    }

    /// Fraction of pixels sitting on an edge.
    pub fn edge_density(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.edges as f64 / self.samples as f64
        }
    }
}

pub fn shape_features(
    width: u32,
    height: u32,
    luma: &GrayImage,
    gradients: &Gradients,
) -> ShapeFeatures {
    let aspect_ratio = width as f64 / height as f64;
    let ratio = width.max(height) as f64 / width.min(height) as f64;

    let squareness = clamp01(1.0 - (ratio - 1.0));
    let rectangularity = clamp01(1.0 - (ratio - 1.5).abs() / 1.5);
    let roundness = clamp01(squareness * squareness * 0.8 + 0.2 * (1.0 - rectangularity));

    ShapeFeatures {
        aspect_ratio,
        rectangularity,
        roundness,
        squareness,
        symmetry: mirror_symmetry(luma),
        compactness: foreground_compactness(luma),
        complexity: gradients.edge_density(),
    }
}

pub fn texture_features(luma: &GrayImage, gradients: &Gradients) -> TextureFeatures {
    let values: Vec<f64> = luma.pixels().map(|p| p[0] as f64).collect();
    let contrast = clamp01(std_dev(&values) / 128.0);

    let total = gradients.sum_abs_x + gradients.sum_abs_y;
    let directionality = if total > 0.0 {
        (gradients.sum_abs_x - gradients.sum_abs_y).abs() / total
    } else {
        0.0
    };

    let block_means = grid_means(luma, REGULARITY_GRID);

    TextureFeatures {
        coarseness: clamp01(1.0 - gradients.edge_density()),
        contrast,
        directionality: clamp01(directionality),
        roughness: (laplacian_variance(luma) / 1000.0).min(1.0),
        regularity: clamp01(1.0 - std_dev(&block_means) / 128.0),
    }
}

/// Mean brightness of each cell of a 16x16 grid, thresholded.
pub fn fingerprint(luma: &GrayImage) -> Fingerprint {
    Fingerprint::from_bits(
        grid_means(luma, FINGERPRINT_GRID)
            .into_iter()
            .map(|mean| mean > FINGERPRINT_THRESHOLD),
    )
}

/// 1 - mean absolute difference between the image and its horizontal mirror.
fn mirror_symmetry(luma: &GrayImage) -> f64 {
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut diff = 0.0;
    for y in 0..height {
        for x in 0..width {
            let a = luma.get_pixel(x, y)[0] as f64;
            let b = luma.get_pixel(width - 1 - x, y)[0] as f64;
            diff += (a - b).abs();
        }
    }
    clamp01(1.0 - diff / (width as f64 * height as f64 * 255.0))
}

/// Foreground pixel count over foreground bounding-box area. Foreground is
/// whatever differs clearly from the average border brightness.
fn foreground_compactness(luma: &GrayImage) -> f64 {
    let (width, height) = luma.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut border_sum = 0.0;
    let mut border_count = 0.0;
    for (x, y, pixel) in luma.enumerate_pixels() {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            border_sum += pixel[0] as f64;
            border_count += 1.0;
        }
    }
    let background = border_sum / border_count;

    let mut area = 0usize;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, pixel) in luma.enumerate_pixels() {
        if (pixel[0] as f64 - background).abs() > FOREGROUND_THRESHOLD {
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if area == 0 {
        return 0.0;
    }

    let box_area = (max_x - min_x + 1) as f64 * (max_y - min_y + 1) as f64;
    clamp01(area as f64 / box_area)
}

fn laplacian_variance(luma: &GrayImage) -> f64 {
    let (width, height) = luma.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let kernel = [[0.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 0.0]];
    let mut sum = 0.0;
    let mut count = 0usize;

    for y in 1..(height - 1) {
        for x in 1..(width - 1) {
            let mut laplacian = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let value = luma.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1)[0] as f64;
                    laplacian += value * weight;
                }
            }
            sum += laplacian * laplacian;
            count += 1;
        }
    }

    sum / count as f64
}

/// Average brightness of each cell of a `grid`x`grid` overlay, row-major.
/// Images smaller than the grid reuse edge pixels so no cell is empty.
fn grid_means(luma: &GrayImage, grid: usize) -> Vec<f64> {
    let (width, height) = luma.dimensions();
    let mut means = Vec::with_capacity(grid * grid);
    if width == 0 || height == 0 {
        means.resize(grid * grid, 0.0);
        return means;
    }

    let bounds = |cell: usize, extent: u32| -> (u32, u32) {
        let start = (cell as u64 * extent as u64 / grid as u64) as u32;
        let end = ((cell as u64 + 1) * extent as u64 / grid as u64) as u32;
        (start, end.max(start + 1).min(extent))
    };

    for cy in 0..grid {
        let (y0, y1) = bounds(cy, height);
        for cx in 0..grid {
            let (x0, x1) = bounds(cx, width);
            let mut sum = 0.0;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += luma.get_pixel(x, y)[0] as f64;
                }
            }
            means.push(sum / ((x1 - x0) as f64 * (y1 - y0) as f64));
        }
    }
    means
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
