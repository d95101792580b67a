//! In-process codec.
//!
//! [`MemoryCodec`] keeps "files" in a shared map keyed by path. It behaves
//! like a file system codec (create replaces, remove deletes, open of an
//! unknown path fails) and can be told to fail reads or writes for specific
//! paths.

use crate::traits::{FrameReader, FrameWriter, ImageCodec};
use crate::{IccProfile, ImageOptions, IoError, IoResult, Keyword, SubImageDescriptor};
use cosmetic_core::Image;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// One stored image with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPage {
    /// Pixel data.
    pub image: Image,
    /// Header keywords.
    pub keywords: Vec<Keyword>,
    /// Color profile.
    pub icc: Option<IccProfile>,
    /// Storage options.
    pub options: ImageOptions,
    /// Format-specific blob.
    pub format_data: Option<Vec<u8>>,
}

impl MemoryPage {
    /// Page with default options and no metadata.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            keywords: Vec::new(),
            icc: None,
            options: ImageOptions::default(),
            format_data: None,
        }
    }

    /// Sets the header keywords.
    pub fn with_keywords(mut self, keywords: Vec<Keyword>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Sets the color profile.
    pub fn with_icc(mut self, icc: IccProfile) -> Self {
        self.icc = Some(icc);
        self
    }
}

#[derive(Debug, Default)]
struct Store {
    files: HashMap<PathBuf, Vec<MemoryPage>>,
    failing_reads: HashSet<PathBuf>,
    failing_writes: HashSet<PathBuf>,
}

/// Shared in-memory file store. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCodec {
    store: Arc<Mutex<Store>>,
}

impl MemoryCodec {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> IoResult<MutexGuard<'_, Store>> {
        lock(&self.store)
    }

    /// Stores a file made of `pages`, replacing any previous content.
    pub fn insert(&self, path: impl Into<PathBuf>, pages: Vec<MemoryPage>) {
        if let Ok(mut store) = self.lock() {
            store.files.insert(path.into(), pages);
        }
    }

    /// Stores a single-image file.
    pub fn insert_image(&self, path: impl Into<PathBuf>, image: Image) {
        self.insert(path, vec![MemoryPage::new(image)]);
    }

    /// Makes every subsequent `read` of `path` fail.
    pub fn fail_reads(&self, path: impl Into<PathBuf>) {
        if let Ok(mut store) = self.lock() {
            store.failing_reads.insert(path.into());
        }
    }

    /// Makes every subsequent `write_image` to `path` fail.
    pub fn fail_writes(&self, path: impl Into<PathBuf>) {
        if let Ok(mut store) = self.lock() {
            store.failing_writes.insert(path.into());
        }
    }

    /// Returns a copy of the pages stored at `path`.
    pub fn get(&self, path: &Path) -> Option<Vec<MemoryPage>> {
        self.lock().ok()?.files.get(path).cloned()
    }

    /// Paths currently stored, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = match self.lock() {
            Ok(store) => store.files.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();
        paths
    }
}

fn lock(store: &Mutex<Store>) -> IoResult<MutexGuard<'_, Store>> {
    store
        .lock()
        .map_err(|_| IoError::Io(io::Error::other("memory store lock poisoned")))
}

impl ImageCodec for MemoryCodec {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self, path: &Path) -> IoResult<Box<dyn FrameReader>> {
        let store = self.lock()?;
        let pages = store.files.get(path).cloned().ok_or_else(|| {
            IoError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            ))
        })?;
        let images = pages
            .iter()
            .enumerate()
            .map(|(i, p)| SubImageDescriptor {
                id: format!("image{:02}", i + 1),
                width: p.image.width(),
                height: p.image.height(),
                channels: p.image.channels(),
                options: p.options,
            })
            .collect();
        Ok(Box::new(MemoryReader {
            path: path.to_path_buf(),
            fail: store.failing_reads.contains(path),
            pages,
            images,
            selected: None,
        }))
    }

    fn create(&self, path: &Path) -> IoResult<Box<dyn FrameWriter>> {
        let mut store = self.lock()?;
        store.files.insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            store: Arc::clone(&self.store),
            fail: store.failing_writes.contains(path),
            options: ImageOptions::default(),
            keywords: Vec::new(),
            icc: None,
            format_data: None,
            image: None,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock()
            .map(|store| store.files.contains_key(path))
            .unwrap_or(false)
    }

    fn remove(&self, path: &Path) -> IoResult<()> {
        self.lock()?.files.remove(path);
        Ok(())
    }
}

struct MemoryReader {
    path: PathBuf,
    fail: bool,
    pages: Vec<MemoryPage>,
    images: Vec<SubImageDescriptor>,
    selected: Option<usize>,
}

impl MemoryReader {
    fn page(&self) -> IoResult<&MemoryPage> {
        let index = self
            .selected
            .ok_or_else(|| IoError::Closed(format!("{}: no image selected", self.path.display())))?;
        Ok(&self.pages[index])
    }
}

impl FrameReader for MemoryReader {
    fn images(&self) -> &[SubImageDescriptor] {
        &self.images
    }

    fn select(&mut self, index: usize) -> IoResult<()> {
        if index >= self.pages.len() {
            return Err(IoError::NoSuchImage {
                index,
                count: self.pages.len(),
            });
        }
        self.selected = Some(index);
        Ok(())
    }

    fn read(&mut self) -> IoResult<Image> {
        if self.fail {
            return Err(IoError::DecodeError(format!(
                "{}: injected read failure",
                self.path.display()
            )));
        }
        Ok(self.page()?.image.clone())
    }

    fn read_keywords(&mut self) -> IoResult<Vec<Keyword>> {
        Ok(self.page()?.keywords.clone())
    }

    fn read_icc_profile(&mut self) -> IoResult<Option<IccProfile>> {
        Ok(self.page()?.icc.clone())
    }

    fn format_specific_data(&mut self) -> IoResult<Option<Vec<u8>>> {
        Ok(self.page()?.format_data.clone())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        Ok(())
    }
}

struct MemoryWriter {
    path: PathBuf,
    store: Arc<Mutex<Store>>,
    fail: bool,
    options: ImageOptions,
    keywords: Vec<Keyword>,
    icc: Option<IccProfile>,
    format_data: Option<Vec<u8>>,
    image: Option<Image>,
}

impl FrameWriter for MemoryWriter {
    fn set_options(&mut self, options: &ImageOptions) -> IoResult<()> {
        self.options = *options;
        Ok(())
    }

    fn set_format_specific_data(&mut self, data: &[u8]) -> IoResult<()> {
        self.format_data = Some(data.to_vec());
        Ok(())
    }

    fn write_keywords(&mut self, keywords: &[Keyword]) -> IoResult<()> {
        self.keywords = keywords.to_vec();
        Ok(())
    }

    fn write_icc_profile(&mut self, profile: &IccProfile) -> IoResult<()> {
        self.icc = Some(profile.clone());
        Ok(())
    }

    fn write_image(&mut self, image: &Image) -> IoResult<()> {
        if self.fail {
            return Err(IoError::EncodeError(format!(
                "{}: injected write failure",
                self.path.display()
            )));
        }
        self.image = Some(image.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        let this = *self;
        let image = this
            .image
            .ok_or_else(|| IoError::Closed(format!("{}: closed without an image", this.path.display())))?;
        let page = MemoryPage {
            image,
            keywords: this.keywords,
            icc: this.icc,
            options: this.options,
            format_data: this.format_data,
        };
        lock(&this.store)?.files.insert(this.path, vec![page]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing() {
        let codec = MemoryCodec::new();
        assert!(matches!(codec.open(Path::new("/nope.tif")), Err(IoError::Io(_))));
    }

    #[test]
    fn test_injected_read_failure() {
        let codec = MemoryCodec::new();
        codec.insert_image("/a.tif", Image::new(2, 2, 1).unwrap());
        codec.fail_reads("/a.tif");
        let mut reader = codec.open(Path::new("/a.tif")).unwrap();
        reader.select(0).unwrap();
        assert!(reader.read().is_err());
    }

    #[test]
    fn test_create_then_remove() {
        let codec = MemoryCodec::new();
        let path = Path::new("/out.tif");
        let mut writer = codec.create(path).unwrap();
        assert!(codec.exists(path));
        writer.write_image(&Image::new(1, 1, 1).unwrap()).unwrap();
        writer.close().unwrap();
        assert_eq!(codec.get(path).unwrap().len(), 1);
        codec.remove(path).unwrap();
        assert!(!codec.exists(path));
    }

    #[test]
    fn test_select_out_of_range() {
        let codec = MemoryCodec::new();
        codec.insert("/empty.tif", Vec::new());
        let mut reader = codec.open(Path::new("/empty.tif")).unwrap();
        assert!(reader.images().is_empty());
        assert!(matches!(reader.select(0), Err(IoError::NoSuchImage { index: 0, count: 0 })));
    }
}
