use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::document::{ImageRegion, extension_for_content_type};
use crate::util::{ensure_directory, relative_path, sha256_hex, write_atomic};

use super::Warnings;
use super::body_scan::BodyPage;

/// Position of an image within the body: page index, then its index in that
/// page's image list.
pub type ImageKey = (usize, usize);

/// Writes extracted images next to an HTML file, one file per distinct image
/// content. Identical bytes found on several pages share one file.
#[derive(Debug)]
pub struct ImageStore {
    html_dir: PathBuf,
    image_dir: PathBuf,
    by_digest: HashMap<String, String>,
}

impl ImageStore {
    /// Images for `out/report.html` go to `out/report_images/`.
    pub fn for_html(html_path: &Path) -> Self {
        let html_dir = html_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = html_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let image_dir = html_dir.join(format!("{stem}_images"));

        Self {
            html_dir,
            image_dir,
            by_digest: HashMap::new(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn unique_count(&self) -> usize {
        self.by_digest.len()
    }

    /// Stores one image and returns the `src` to reference it from the HTML.
    pub fn store(&mut self, image: &ImageRegion) -> Result<String> {
        let digest = sha256_hex(&image.bytes);
        if let Some(src) = self.by_digest.get(&digest) {
            return Ok(src.clone());
        }

        ensure_directory(&self.image_dir)?;
        let file_name = format!(
            "image_{}.{}",
            &digest[..12],
            extension_for_content_type(&image.content_type)
        );
        let path = self.image_dir.join(&file_name);
        write_atomic(&path, &image.bytes)
            .with_context(|| format!("failed to save image {}", image.id))?;

        let src = relative_path(&self.html_dir, &path);
        debug!(image = %image.id, file = %file_name, "saved image");
        self.by_digest.insert(digest, src.clone());
        Ok(src)
    }

    /// Stores every image on `pages`. An image that cannot be written is left
    /// out of the returned map and reported as a warning.
    pub fn store_pages(
        &mut self,
        pages: &[BodyPage],
        warnings: &mut Warnings,
    ) -> BTreeMap<ImageKey, String> {
        let mut sources = BTreeMap::new();

        for page in pages {
            for (index, image) in page.images.iter().enumerate() {
                match self.store(image) {
                    Ok(src) => {
                        sources.insert((page.page_index, index), src);
                    }
                    Err(err) => warnings.push(format!(
                        "page {}: image {} skipped: {err:#}",
                        page.page_index + 1,
                        image.id
                    )),
                }
            }
        }

        sources
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::document::BoundingBox;

    fn image(id: &str, bytes: &[u8]) -> ImageRegion {
        ImageRegion {
            id: id.to_string(),
            bbox: BoundingBox::default(),
            bytes: bytes.to_vec(),
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn identical_images_share_one_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ImageStore::for_html(&dir.path().join("manual.html"));

        let first = store.store(&image("a", b"pixels")).expect("store first");
        let again = store.store(&image("b", b"pixels")).expect("store duplicate");
        let other = store.store(&image("c", b"other")).expect("store other");

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(first.starts_with("manual_images/image_"));
        assert!(first.ends_with(".png"));
        assert_eq!(store.unique_count(), 2);

        let files = fs::read_dir(store.image_dir()).expect("read image dir").count();
        assert_eq!(files, 2);
    }

    #[test]
    fn store_pages_keys_sources_by_page_and_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ImageStore::for_html(&dir.path().join("doc.html"));
        let pages = vec![BodyPage {
            page_index: 4,
            images: vec![image("x", b"one"), image("y", b"two")],
            ..BodyPage::default()
        }];
        let mut warnings = Warnings::default();

        let sources = store.store_pages(&pages, &mut warnings);
        assert_eq!(sources.len(), 2);
        assert!(sources.contains_key(&(4, 1)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn unwritable_image_becomes_a_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("doc_images"), b"not a directory").expect("write blocker");
        let mut store = ImageStore::for_html(&dir.path().join("doc.html"));
        let pages = vec![BodyPage {
            page_index: 0,
            images: vec![image("x", b"one")],
            ..BodyPage::default()
        }];
        let mut warnings = Warnings::default();

        let sources = store.store_pages(&pages, &mut warnings);
        assert!(sources.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
