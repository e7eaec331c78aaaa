use std::collections::HashMap;

use super::Image;

/// Public images of one datacenter keyed by image id. Rebuilt for every lookup.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    images: HashMap<String, Image>,
}

impl Catalog {
    /// Borrow the catalogue entries keyed by their image identifier.
    pub fn images(&self) -> &HashMap<String, Image> {
        &self.images
    }

    pub fn get(&self, id: &str) -> Option<&Image> {
        self.images.get(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images whose os equals `os`. An empty `os` matches nothing.
    pub fn matches_by_os(&self, os: &str) -> Vec<&Image> {
        self.matches_by(os, Image::os)
    }

    /// Images whose code equals `code`. An empty `code` matches nothing.
    pub fn matches_by_code(&self, code: &str) -> Vec<&Image> {
        self.matches_by(code, Image::code)
    }

    fn matches_by(&self, value: &str, attr: fn(&Image) -> &str) -> Vec<&Image> {
        if value.is_empty() {
            return Vec::new();
        }
        self.images.values().filter(|i| attr(i) == value).collect()
    }

    /// Render every entry as aligned `os`, `code`, `name` columns under a
    /// header row.
    pub fn available_images(&self) -> String {
        let mut rows = vec![format!("{:<10} {:<30} {}", "os", "code", "name")];
        for image in self.images.values() {
            rows.push(format!(
                "{:<10} {:<30} {}",
                format!("\"{}\"", image.os()),
                format!("\"{}\"", image.code()),
                format!("\"{}\"", image.name()),
            ));
        }
        rows.join("\n")
    }
}

/// Later entries replace earlier ones that share an id.
impl FromIterator<Image> for Catalog {
    fn from_iter<I: IntoIterator<Item = Image>>(iter: I) -> Self {
        let images = iter
            .into_iter()
            .map(|image| (image.id().to_string(), image))
            .collect();
        Self { images }
    }
}
