//! 图片序列输入 - 按文件名顺序逐张读取目录中的图片

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

use super::VideoSource;
use crate::error::{PipelineError, Result};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| PipelineError::source_open(dir.display().to_string(), e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::source_open(dir.display().to_string(), "目录中没有图片"));
        }

        log::info!("🖼️  图片序列: {} ({} 张)", dir.display(), files.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoSource for ImageSequence {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let image = image::open(path)
            .map_err(|e| PipelineError::SourceRead(format!("{}: {}", path.display(), e)))?;
        Ok(Some(image.to_rgb8()))
    }

    fn describe(&self) -> String {
        format!("图片序列 {} ({}张)", self.dir.display(), self.files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_reads_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("002.png", 2u8), ("001.png", 1), ("010.png", 10)] {
            RgbImage::from_pixel(2, 2, Rgb([value, 0, 0]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(source.len(), 3);
        let order: Vec<u8> = std::iter::from_fn(|| source.read().unwrap())
            .map(|img| img.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(order, vec![1, 2, 10]);
    }

    #[test]
    fn test_empty_directory_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(dir.path()),
            Err(PipelineError::SourceOpen { .. })
        ));
    }

    #[test]
    fn test_corrupt_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let mut source = ImageSequence::open(dir.path()).unwrap();
        assert!(matches!(source.read(), Err(PipelineError::SourceRead(_))));
    }
}
