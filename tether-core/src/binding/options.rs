//! Per-binding options.

use super::connection::BindMode;
use super::filter::FilterTemplate;
use super::target::Attr;

/// How [`Engine::bind`](crate::Engine::bind) should wire one target.
///
/// Every field is optional. An unset attribute falls back to the target
/// kind's default, and an unset mode falls back to two-way for input-like
/// targets and one-way for everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Attribute to write instead of the kind's default.
    pub attr: Option<Attr>,

    /// Template the value is substituted into before it is written.
    pub filter: Option<String>,

    /// Explicit direction. Ignored (forced one-way) with a filter or an
    /// accessor.
    pub mode: Option<BindMode>,
}

impl BindOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret one free-form argument as either a filter template or an
    /// attribute name, depending on whether it contains `placeholder`.
    ///
    /// ```
    /// use tether_core::binding::{Attr, BindOptions};
    ///
    /// let filter = BindOptions::parse("/users/{}", "{}");
    /// assert_eq!(filter.filter.as_deref(), Some("/users/{}"));
    ///
    /// let attr = BindOptions::parse("title", "{}");
    /// assert_eq!(attr.attr, Some(Attr::Named("title".into())));
    /// ```
    pub fn parse(filter_or_attr: &str, placeholder: &str) -> Self {
        if FilterTemplate::is_template(filter_or_attr, placeholder) {
            Self::new().filter(filter_or_attr)
        } else {
            Self::new().attr(Attr::parse(filter_or_attr))
        }
    }

    /// Write `attr` instead of the default attribute.
    pub fn attr(mut self, attr: Attr) -> Self {
        self.attr = Some(attr);
        self
    }

    /// Write through `template`.
    pub fn filter(mut self, template: impl Into<String>) -> Self {
        self.filter = Some(template.into());
        self
    }

    /// Force a direction.
    pub fn mode(mut self, mode: BindMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Shorthand for `mode(BindMode::OneWay)`.
    pub fn one_way(self) -> Self {
        self.mode(BindMode::OneWay)
    }

    /// Shorthand for `mode(BindMode::TwoWay)`.
    pub fn two_way(self) -> Self {
        self.mode(BindMode::TwoWay)
    }
}
