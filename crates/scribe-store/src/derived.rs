//! Memoized values derived from document content.
//!
//! Each field is an explicit [`Memo`] with a freshness bit. Promotion marks
//! every memo stale; rendering regenerates all of them with `force_fresh`.

use serde::{Deserialize, Serialize};

/// A derived field of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DerivedField {
    /// Html of the summary section (or first paragraph).
    SummaryHtml,
    /// Plain-text summary.
    Excerpt,
    /// Table of contents list.
    TocHtml,
    /// Body with the quick-links block removed.
    BodyHtml,
    /// Quick-links sidebar block.
    QuickLinksHtml,
}

impl DerivedField {
    /// All fields in regeneration order.
    pub const ALL: [Self; 5] = [
        Self::SummaryHtml,
        Self::Excerpt,
        Self::TocHtml,
        Self::BodyHtml,
        Self::QuickLinksHtml,
    ];
}

/// Computes derived field values from a content source.
pub trait FieldExtractor {
    /// Compute the value of `field`.
    fn extract(&self, field: DerivedField) -> String;
}

/// A memoized value with a freshness bit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    value: String,
    fresh: bool,
}

impl Memo {
    /// Last computed value, fresh or not.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the value reflects the current content.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Mark the value stale without discarding it.
    pub fn invalidate(&mut self) {
        self.fresh = false;
    }

    fn set(&mut self, value: String) {
        self.value = value;
        self.fresh = true;
    }
}

/// The full set of derived fields of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    summary_html: Memo,
    excerpt: Memo,
    toc_html: Memo,
    body_html: Memo,
    quick_links_html: Memo,
}

impl DerivedFields {
    /// Memo for `field`.
    #[must_use]
    pub fn get(&self, field: DerivedField) -> &Memo {
        match field {
            DerivedField::SummaryHtml => &self.summary_html,
            DerivedField::Excerpt => &self.excerpt,
            DerivedField::TocHtml => &self.toc_html,
            DerivedField::BodyHtml => &self.body_html,
            DerivedField::QuickLinksHtml => &self.quick_links_html,
        }
    }

    fn get_mut(&mut self, field: DerivedField) -> &mut Memo {
        match field {
            DerivedField::SummaryHtml => &mut self.summary_html,
            DerivedField::Excerpt => &mut self.excerpt,
            DerivedField::TocHtml => &mut self.toc_html,
            DerivedField::BodyHtml => &mut self.body_html,
            DerivedField::QuickLinksHtml => &mut self.quick_links_html,
        }
    }

    /// Fresh value of `field`, if any.
    #[must_use]
    pub fn fresh(&self, field: DerivedField) -> Option<&str> {
        let memo = self.get(field);
        memo.is_fresh().then(|| memo.value())
    }

    /// Whether every field is fresh.
    #[must_use]
    pub fn all_fresh(&self) -> bool {
        DerivedField::ALL.iter().all(|f| self.get(*f).is_fresh())
    }

    /// Mark every field stale.
    pub fn invalidate_all(&mut self) {
        for field in DerivedField::ALL {
            self.get_mut(field).invalidate();
        }
    }

    /// Recompute `field` unless it is fresh and `force_fresh` is false.
    pub fn regenerate(
        &mut self,
        field: DerivedField,
        force_fresh: bool,
        extractor: &dyn FieldExtractor,
    ) -> &str {
        let memo = self.get_mut(field);
        if force_fresh || !memo.is_fresh() {
            memo.set(extractor.extract(field));
        }
        memo.value()
    }

    /// Recompute every field.
    pub fn regenerate_all(&mut self, force_fresh: bool, extractor: &dyn FieldExtractor) {
        for field in DerivedField::ALL {
            self.regenerate(field, force_fresh, extractor);
        }
    }
}
