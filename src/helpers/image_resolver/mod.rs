use serde::Serialize;
use tracing::{debug, info};

use crate::cloud::{Catalog, Image};
use crate::provider::{ApiError, CatalogSource};

pub const PRIVATE_IMAGES_DOC_URL: &str = "https://docs.cloud.ims-network.net";

/// Lookup inputs plus the state written back by [`resolve`]. Empty strings
/// count as unset, mirroring how configuration frameworks hand over optional
/// attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageData {
    pub id: Option<String>,
    pub datacenter_id: String,
    pub os: Option<String>,
    pub code: Option<String>,
    pub private_image_name: Option<String>,
}

#[allow(unused)]
impl ImageData {
    pub fn new(datacenter_id: impl Into<String>) -> Self {
        Self {
            datacenter_id: datacenter_id.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_private_image_name(mut self, name: impl Into<String>) -> Self {
        self.private_image_name = Some(name.into());
        self
    }

    fn id_str(&self) -> &str {
        non_empty(&self.id)
    }

    fn os_str(&self) -> &str {
        non_empty(&self.os)
    }

    fn code_str(&self) -> &str {
        non_empty(&self.code)
    }

    fn apply(&mut self, resolution: &Resolution) {
        self.id = Some(resolution.id.clone());
        self.os = Some(resolution.os.clone());
        self.code = Some(resolution.code.clone());
    }
}

fn non_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

/// The resolved identity and the attributes exposed alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub id: String,
    pub os: String,
    pub code: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("When specifying private_image_name, other attributes must not be set")]
    ConflictingInputs,
    #[error(transparent)]
    Fetch(#[from] ApiError),
    #[error(
        "could not find matching image, available public images: \n{available}\n\nPrivate images are not listed, see the following link for details: https://docs.cloud.ims-network.net"
    )]
    NotFound { available: String },
}

/// Resolve `data` to a single image id and write the result back into it.
///
/// A private image name short-circuits without touching `source`. Otherwise
/// the datacenter catalog is fetched once and run through [`select`].
pub async fn resolve<S>(source: &S, data: &mut ImageData) -> Result<Resolution, ResolveError>
where
    S: CatalogSource + ?Sized,
{
    if let Some(name) = data.private_image_name.as_deref().filter(|n| !n.is_empty()) {
        if !data.os_str().is_empty() || !data.code_str().is_empty() {
            return Err(ResolveError::ConflictingInputs);
        }
        let resolution = Resolution {
            id: name.to_string(),
            os: String::new(),
            code: String::new(),
        };
        info!(id = %resolution.id, "Using private image");
        data.id = Some(resolution.id.clone());
        return Ok(resolution);
    }

    let images = match source.fetch_images(&data.datacenter_id).await {
        Ok(images) => images,
        Err(err) => {
            data.id = None;
            return Err(err.into());
        }
    };
    let catalog: Catalog = images.into_iter().collect();
    debug!(datacenter = %data.datacenter_id, images = catalog.len(), "Fetched image catalog");

    match select(&catalog, data.id_str(), data.os_str(), data.code_str()) {
        Some(resolution) => {
            info!(id = %resolution.id, os = %resolution.os, code = %resolution.code, "Resolved public image");
            data.apply(&resolution);
            Ok(resolution)
        }
        None => {
            data.id = None;
            data.os = None;
            data.code = None;
            Err(ResolveError::NotFound {
                available: catalog.available_images(),
            })
        }
    }
}

/// Candidate sets the rules are evaluated against.
struct Candidates<'a> {
    os: &'a str,
    code: &'a str,
    exact: Option<&'a Image>,
    by_os: Vec<&'a Image>,
    by_code: Vec<&'a Image>,
}

type Rule = fn(&Candidates<'_>) -> Option<Resolution>;

/// Evaluated in order; the first rule that fires wins.
const RULES: &[(&str, Rule)] = &[
    ("id", id_confirmed),
    ("os", os_disambiguates),
    ("code", code_disambiguates),
];

/// Pick one image out of `catalog`. Empty `id`, `os` or `code` are unset.
pub fn select(catalog: &Catalog, id: &str, os: &str, code: &str) -> Option<Resolution> {
    let candidates = Candidates {
        os,
        code,
        exact: catalog.get(id),
        by_os: catalog.matches_by_os(os),
        by_code: catalog.matches_by_code(code),
    };
    debug!(
        exact = candidates.exact.is_some(),
        by_os = candidates.by_os.len(),
        by_code = candidates.by_code.len(),
        "Evaluating image candidates"
    );

    RULES.iter().find_map(|(name, rule)| {
        let hit = rule(&candidates)?;
        debug!(rule = *name, id = %hit.id, "Image rule matched");
        Some(hit)
    })
}

fn only<'a>(matches: &[&'a Image]) -> Option<&'a Image> {
    match matches {
        [image] => Some(*image),
        _ => None,
    }
}

fn id_confirmed(c: &Candidates<'_>) -> Option<Resolution> {
    let exact = c.exact?;
    let os_ok = c.by_os.is_empty()
        || (only(&c.by_os).is_some_and(|i| i.id() == exact.id()) && exact.os() == c.os);
    let code_ok = c.by_code.is_empty()
        || (only(&c.by_code).is_some_and(|i| i.id() == exact.id()) && exact.code() == c.code);

    (os_ok && code_ok).then(|| Resolution {
        id: exact.id().to_string(),
        os: exact.os().to_string(),
        code: exact.code().to_string(),
    })
}

fn os_disambiguates(c: &Candidates<'_>) -> Option<Resolution> {
    let image = only(&c.by_os)?;
    let exact_ok = c.exact.is_none_or(|e| e.os() == c.os);
    let code_ok = c.by_code.is_empty() || only(&c.by_code).is_some_and(|i| i.id() == image.id());

    (exact_ok && code_ok).then(|| Resolution {
        id: image.id().to_string(),
        os: c.os.to_string(),
        code: image.code().to_string(),
    })
}

// No cross-check against the os filter here.
fn code_disambiguates(c: &Candidates<'_>) -> Option<Resolution> {
    let image = only(&c.by_code)?;
    let exact_ok = c.exact.is_none_or(|e| e.code() == c.code);

    exact_ok.then(|| Resolution {
        id: image.id().to_string(),
        os: image.os().to_string(),
        code: c.code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        images: Vec<Image>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(images: Vec<Image>) -> Self {
            Self {
                images,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch_images(&self, datacenter_id: &str) -> Result<Vec<Image>, ApiError> {
            assert_eq!(datacenter_id, "IL");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.images.clone())
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl CatalogSource for FailingSource {
        async fn fetch_images(&self, _datacenter_id: &str) -> Result<Vec<Image>, ApiError> {
            Err(ApiError::UnexpectedResponse("connection reset".to_string()))
        }
    }

    fn two_images() -> Vec<Image> {
        vec![
            Image::new("A", "ubuntu", "u1", "Ubuntu One"),
            Image::new("B", "debian", "d1", "Debian One"),
        ]
    }

    fn resolved(id: &str, os: &str, code: &str) -> Resolution {
        Resolution {
            id: id.to_string(),
            os: os.to_string(),
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn private_image_skips_catalog() {
        let source = FakeSource::new(two_images());
        let mut data = ImageData::new("IL").with_private_image_name("my-golden-image");

        let resolution = resolve(&source, &mut data).await.expect("expected private image");

        assert_eq!(resolution.id, "my-golden-image");
        assert_eq!(data.id.as_deref(), Some("my-golden-image"));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn private_image_with_os_or_code_conflicts() {
        let source = FakeSource::new(two_images());

        let mut with_os = ImageData::new("IL").with_private_image_name("p").with_os("ubuntu");
        let mut with_code = ImageData::new("IL").with_private_image_name("p").with_code("u1");

        assert!(matches!(resolve(&source, &mut with_os).await, Err(ResolveError::ConflictingInputs)));
        assert!(matches!(resolve(&source, &mut with_code).await, Err(ResolveError::ConflictingInputs)));
        assert_eq!(with_os.id, None);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn empty_private_image_name_means_public_lookup() {
        let source = FakeSource::new(two_images());
        let mut data = ImageData::new("IL").with_private_image_name("").with_os("ubuntu");

        let resolution = resolve(&source, &mut data).await.expect("expected public image");

        assert_eq!(resolution, resolved("A", "ubuntu", "u1"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn os_alone_resolves_and_writes_code() {
        let source = FakeSource::new(two_images());
        let mut data = ImageData::new("IL").with_os("ubuntu");

        resolve(&source, &mut data).await.expect("expected image");

        assert_eq!(data.id.as_deref(), Some("A"));
        assert_eq!(data.os.as_deref(), Some("ubuntu"));
        assert_eq!(data.code.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn shared_os_is_ambiguous_and_lists_catalog() {
        let mut images = two_images();
        images.push(Image::new("C", "ubuntu", "u2", "Ubuntu Two"));
        let source = FakeSource::new(images);
        let mut data = ImageData::new("IL").with_id("stale").with_os("ubuntu");

        let err = resolve(&source, &mut data).await.unwrap_err();

        let ResolveError::NotFound { available } = &err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert!(available.contains("\"Ubuntu One\""));
        assert!(available.contains("\"Ubuntu Two\""));
        assert!(available.contains("\"Debian One\""));
        assert!(err.to_string().contains(PRIVATE_IMAGES_DOC_URL));
        assert_eq!(data.id, None);
        assert_eq!(data.os, None);
        assert_eq!(data.code, None);
    }

    #[tokio::test]
    async fn id_alone_writes_back_stored_attributes() {
        let source = FakeSource::new(two_images());
        let mut data = ImageData::new("IL").with_id("A");

        let resolution = resolve(&source, &mut data).await.expect("expected image");

        assert_eq!(resolution, resolved("A", "ubuntu", "u1"));
        assert_eq!(data.code.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn id_with_mismatched_os_fails() {
        let source = FakeSource::new(two_images());
        let mut data = ImageData::new("IL").with_id("A").with_os("debian");

        let err = resolve(&source, &mut data).await.unwrap_err();

        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(data.id, None);
    }

    #[tokio::test]
    async fn fetch_failure_clears_id() {
        let mut data = ImageData::new("IL").with_id("A").with_os("ubuntu");

        let err = resolve(&FailingSource, &mut data).await.unwrap_err();

        assert!(matches!(err, ResolveError::Fetch(_)));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(data.id, None);
        assert_eq!(data.os.as_deref(), Some("ubuntu"));
    }

    #[test]
    fn id_confirmed_by_matching_filters() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "A", "ubuntu", "u1"), Some(resolved("A", "ubuntu", "u1")));
    }

    #[test]
    fn unknown_id_falls_back_to_os() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "gone", "debian", ""), Some(resolved("B", "debian", "d1")));
    }

    #[test]
    fn code_alone_resolves_and_writes_os() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "", "", "d1"), Some(resolved("B", "debian", "d1")));
    }

    #[test]
    fn cross_matching_filters_fall_through_to_code() {
        // os points at A, code at B; only the code rule has no os cross-check.
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "", "ubuntu", "d1"), Some(resolved("B", "debian", "d1")));
    }

    #[test]
    fn code_rule_respects_confirmed_id() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "A", "", "d1"), None);
    }

    #[test]
    fn nothing_requested_matches_nothing() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "", "", ""), None);
    }

    #[test]
    fn unknown_os_matches_nothing() {
        let catalog: Catalog = two_images().into_iter().collect();
        assert_eq!(select(&catalog, "", "windows", ""), None);
    }
}
