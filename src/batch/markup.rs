//! `<picture>` snippets referencing the responsive variants

use super::responsive::variant_file_name;
use crate::types::{ImageFormat, RESPONSIVE_VARIANTS};

/// Shape of the generated markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTemplate {
    /// Prefix for the fallback original-format image
    pub image_base: String,
    /// Prefix for the WebP variants
    pub webp_base: String,
    /// Class attribute of the fallback `<img>`
    pub img_class: String,
}

impl Default for MarkupTemplate {
    fn default() -> Self {
        Self {
            image_base: "images".to_string(),
            webp_base: "images/webp".to_string(),
            img_class: [
                "w-full h-full object-cover",
                "transition-transform duration-700 hover:scale-110",
            ]
            .join(" "),
        }
    }
}

impl MarkupTemplate {
    /// One `<picture>` element for `file` (a file name with its original extension)
    pub fn picture_element(&self, file: &str) -> String {
        let base = base_name(file);
        let srcset = RESPONSIVE_VARIANTS
            .iter()
            .map(|variant| {
                format!(
                    "{}/{} {}w",
                    self.webp_base,
                    variant_file_name(base, variant),
                    variant.width
                )
            })
            .collect::<Vec<_>>()
            .join(",\n                    ");

        format!(
            r#"<picture>
    <source srcset="{srcset}"
            type="{mime}">
    <img src="{image_base}/{file}"
         alt="{alt}"
         class="{class}"
         loading="lazy">
</picture>"#,
            srcset = srcset,
            mime = ImageFormat::WebP.mime_type(),
            image_base = self.image_base,
            file = file,
            alt = alt_text(base),
            class = self.img_class,
        )
    }

    /// Elements for every file, separated by a blank line
    pub fn picture_elements<S: AsRef<str>>(&self, files: &[S]) -> String {
        files
            .iter()
            .map(|file| self.picture_element(file.as_ref()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn base_name(file: &str) -> &str {
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

/// Human-readable alt text: `-`/`_` become spaces, each word starts upper-case
pub fn alt_text(base: &str) -> String {
    let mut previous_is_word = false;
    base.chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .map(|c| {
            let is_word = c.is_ascii_alphanumeric() || c == '_';
            let out = if is_word && !previous_is_word {
                c.to_ascii_uppercase()
            } else {
                c
            };
            previous_is_word = is_word;
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_text() {
        assert_eq!(alt_text("raw-emerald_crystals"), "Raw Emerald Crystals");
        assert_eq!(alt_text("gem"), "Gem");
        assert_eq!(alt_text("x.2nd-cut"), "X.2nd Cut");
        assert_eq!(alt_text("already Upper"), "Already Upper");
    }

    #[test]
    fn test_picture_element_shape() {
        let html = MarkupTemplate::default().picture_element("raw-emerald.jpg");

        assert!(html.starts_with("<picture>"));
        assert!(html.ends_with("</picture>"));
        for (name, width) in [("sm", 400), ("md", 800), ("lg", 1200), ("xl", 1600)] {
            assert!(html.contains(&format!("images/webp/raw-emerald-{}.webp {}w", name, width)));
        }
        assert!(html.contains(r#"type="image/webp""#));
        assert!(html.contains(r#"<img src="images/raw-emerald.jpg""#));
        assert!(html.contains(r#"alt="Raw Emerald""#));
        assert!(html.contains(r#"loading="lazy""#));
    }

    #[test]
    fn test_elements_joined_by_blank_line() {
        let html = MarkupTemplate::default().picture_elements(&["a.jpg", "b.png"]);
        assert_eq!(html.matches("<picture>").count(), 2);
        assert!(html.contains("</picture>\n\n<picture>"));
        assert!(MarkupTemplate::default().picture_elements::<&str>(&[]).is_empty());
    }
}
