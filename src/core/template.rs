//! core::template
//!
//! Version-format templates.
//!
//! A template is a short string containing the positional placeholders `{0}`
//! through `{3}`, one per version octet, e.g. `v{0}.{1}.{2}-{3}`. Parsing splits
//! it into a literal prefix plus one render fragment per octet; a fragment is the
//! placeholder followed by the literal text up to the next placeholder.
//! Fragments are taken in placeholder order and stop at the first placeholder
//! that is absent, which defines the template's octet count.
//!
//! # Zero micro
//!
//! When a template renders all four octets and the micro octet is `0`, the micro
//! fragment is elided together with the separator in front of it. The default
//! template therefore renders `0.0.1.0` as `0.0.1` and `0.0.1.1` as `0.0.1.1`.
//!
//! # Example
//!
//! ```
//! use vmn::core::template::Template;
//!
//! let t = Template::parse("v{0}.{1}.{2}-{3}").unwrap();
//! assert_eq!(t.octet_count(), 4);
//! assert_eq!(t.format("1.2.3.4").unwrap(), "v1.2.3-4");
//! assert_eq!(t.format("1.2.3").unwrap(), "v1.2.3");
//! ```

use std::fmt;

use thiserror::Error;

use super::version::Version;

/// Template used when an app does not configure one.
pub const DEFAULT_TEMPLATE: &str = "{0}.{1}.{2}.{3}";

/// Maximum template length in characters.
pub const MAX_TEMPLATE_LEN: usize = 30;

const PLACEHOLDERS: [&str; 4] = ["{0}", "{1}", "{2}", "{3}"];

/// Errors from template parsing and rendering.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template too long: {len} characters (max {MAX_TEMPLATE_LEN})")]
    TooLong { len: usize },

    #[error("invalid template '{0}': must include {{0}} at least")]
    MissingFirstPlaceholder(String),

    #[error("version '{0}' is too long: maximum is 4 octets")]
    TooManyOctets(String),
}

/// A parsed version template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    prefix: String,
    /// Literal text following each rendered placeholder, in octet order.
    suffixes: Vec<String>,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// - [`TemplateError::TooLong`] if the template exceeds 30 characters
    /// - [`TemplateError::MissingFirstPlaceholder`] if `{0}` is absent
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let len = template.chars().count();
        if len > MAX_TEMPLATE_LEN {
            return Err(TemplateError::TooLong { len });
        }

        let first = template
            .find(PLACEHOLDERS[0])
            .ok_or_else(|| TemplateError::MissingFirstPlaceholder(template.to_string()))?;

        let prefix = strip_placeholders(&template[..first]);

        let mut suffixes = Vec::with_capacity(PLACEHOLDERS.len());
        for (i, placeholder) in PLACEHOLDERS.iter().enumerate() {
            let Some(start) = template.find(placeholder) else {
                break;
            };
            let next = PLACEHOLDERS
                .get(i + 1)
                .and_then(|next| template.find(next));

            let body_start = start + placeholder.len();
            let body = match next {
                Some(end) if end >= body_start => &template[body_start..end],
                Some(_) => "",
                None => &template[body_start..],
            };
            suffixes.push(strip_placeholders(body));

            if next.is_none() {
                break;
            }
        }

        Ok(Self {
            source: template.to_string(),
            prefix,
            suffixes,
        })
    }

    /// The template text as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of octets this template renders (1 to 4).
    pub fn octet_count(&self) -> usize {
        self.suffixes.len()
    }

    /// The positional render format, e.g. `v{0}.{1}.{2}-{3}`.
    pub fn render_format(&self) -> String {
        let mut out = self.prefix.clone();
        for (placeholder, suffix) in PLACEHOLDERS.iter().zip(&self.suffixes) {
            out.push_str(placeholder);
            out.push_str(suffix);
        }
        out
    }

    /// Render a dot-separated version string through this template.
    ///
    /// Missing octets are zero-padded; extra octets beyond the template's
    /// octet count are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TooManyOctets`] if `version` has more than 4 octets.
    pub fn format(&self, version: &str) -> Result<String, TemplateError> {
        let mut octets: Vec<&str> = version.split('.').collect();
        if octets.len() > 4 {
            return Err(TemplateError::TooManyOctets(version.to_string()));
        }
        octets.resize(4, "0");

        let elide_micro = self.suffixes.len() == 4 && is_zero(octets[3]);
        let rendered = if elide_micro { 3 } else { self.suffixes.len() };

        let mut out = self.prefix.clone();
        for i in 0..rendered {
            out.push_str(octets[i]);
            if !(elide_micro && i == rendered - 1) {
                out.push_str(&self.suffixes[i]);
            }
        }
        if elide_micro {
            out.push_str(&self.suffixes[3]);
        }

        Ok(out)
    }

    /// Render a [`Version`] through this template.
    pub fn format_version(&self, version: &Version) -> String {
        // Four octets always fit.
        self.format(&version.to_string())
            .unwrap_or_else(|_| version.to_string())
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            prefix: String::new(),
            suffixes: vec![".".into(), ".".into(), ".".into(), String::new()],
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn strip_placeholders(text: &str) -> String {
    let mut out = text.to_string();
    for placeholder in PLACEHOLDERS {
        out = out.replace(placeholder, "");
    }
    out
}

fn is_zero(octet: &str) -> bool {
    !octet.is_empty() && octet.chars().all(|c| c == '0')
}
