use crate::utils::html::HtmlFragment;
use regex::Regex;
use std::sync::LazyLock;

// `![](url)`: an image whose alt text was left empty
static EMPTY_ALT_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[\]\([^)]+\)").unwrap());

static MARKDOWN_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());

/// Number of `<img>` elements without a non-empty `alt`
pub fn html_images_missing_alt(fragment: &HtmlFragment) -> usize {
    fragment
        .elements_named("img")
        .filter(|img| img.attribute("alt").is_none_or(str::is_empty))
        .count()
}

/// Number of markdown images written as `![](...)`
pub fn markdown_images_missing_alt(text: &str) -> usize {
    EMPTY_ALT_IMAGE_REGEX.find_iter(text).count()
}

/// Targets of every markdown image, in source order
pub fn markdown_image_sources(text: &str) -> Vec<&str> {
    MARKDOWN_IMAGE_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|src| !src.is_empty())
        .collect()
}

/// `src` of every `<img>` element
pub fn html_image_sources(fragment: &HtmlFragment) -> Vec<&str> {
    fragment
        .elements_named("img")
        .filter_map(|img| img.attribute("src"))
        .filter(|src| !src.is_empty())
        .collect()
}
