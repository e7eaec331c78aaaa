pub mod fzf_invoker;
pub mod image_resolver;

use self::fzf_invoker::FzfInvoker;
use crate::cloud::{Catalog, Image};
use anyhow::{Context, Result, bail};

/// Wrapper around the `termenu` picker that keeps the UX consistent across the
/// project. The helper converts the supplied items into `String`s so callers do
/// not have to worry about ownership.
pub fn choose_one<S: ToString>(title: &str, items: Vec<S>) -> Result<String> {
    let display_items: Vec<String> = items.into_iter().map(|s| s.to_string()).collect();
    let picker = FzfInvoker::new(title.to_string(), display_items);
    match picker.invoke().context("failed to run menu")? {
        Some(choice) => Ok(choice),
        None => bail!("No selection made"),
    }
}

/// Label shown in the picker; the name alone is not always unique.
fn format_image_label(image: &Image) -> String {
    format!("{} | {} | {}", image.os(), image.code(), image.name())
}

/// Let the user pick one catalog entry and return its id.
pub fn pick_image(catalog: &Catalog) -> Result<String> {
    if catalog.is_empty() {
        bail!("No public images available");
    }

    let mut images: Vec<&Image> = catalog.images().values().collect();
    images.sort_by(|a, b| (a.os(), a.code()).cmp(&(b.os(), b.code())));

    let chosen_label = choose_one("Select Image", images.iter().map(|i| format_image_label(i)).collect())?;

    images
        .iter()
        .find(|i| format_image_label(i) == chosen_label)
        .map(|i| i.id().to_string())
        .context("selected label must match one image")
}
