//! Content kinds and the teaser record.
//!
//! A teaser is the minimal normalized summary of one content item as produced
//! by a crawler: a title, an optional date, and a type-specific identifier
//! (a URL, or a video id for channel content).

use std::fmt;

use chrono::NaiveDate;

/// The kind of content a tracked source publishes.
///
/// The kind decides the snapshot document tag, which identifier is used for
/// matching, and which date field name the serialized form carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Web page listings (news, articles, press releases).
    Page,
    /// Video channel listings.
    Video,
    /// Event listings, dated by start date.
    Event,
}

impl ContentKind {
    /// Document tag for this kind. Keys the serialized snapshot.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Video => "video",
            Self::Event => "event",
        }
    }

    /// Field name of the type-specific identifier in the serialized form.
    #[must_use]
    pub const fn ident_field(self) -> &'static str {
        match self {
            Self::Video => "video_id",
            Self::Page | Self::Event => "url",
        }
    }

    /// Field name of the drift annotation for the identifier.
    #[must_use]
    pub const fn last_ident_field(self) -> &'static str {
        match self {
            Self::Video => "last_video_id",
            Self::Page | Self::Event => "last_url",
        }
    }

    /// Field name of the item date in the serialized form.
    #[must_use]
    pub const fn date_field(self) -> &'static str {
        match self {
            Self::Event => "start_date",
            Self::Page | Self::Video => "published_date",
        }
    }

    /// Whether the abnormal-shrinkage guard applies by default.
    ///
    /// Channel listings legitimately fluctuate by large margins, so video
    /// sources are exempt.
    #[must_use]
    pub const fn shrink_guarded(self) -> bool {
        !matches!(self, Self::Video)
    }

    /// Parse a document tag back into a kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "page" => Some(Self::Page),
            "video" => Some(Self::Video),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One normalized content item summary.
///
/// `ident` is a URL for page and event content and a video id for video
/// content. The `last_*` fields record the prior value when reconciliation
/// against stored content detects drift; crawlers never set them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teaser {
    /// Item title as published by the source.
    pub title: String,
    /// Published date (start date for event content), when the source carries one.
    pub date: Option<NaiveDate>,
    /// Type-specific identifier: URL, or video id for video content.
    pub ident: String,
    /// Prior title, recorded when the item was reconciled by identifier.
    pub last_title: Option<String>,
    /// Prior identifier, recorded when the item was reconciled by title.
    pub last_ident: Option<String>,
    /// Prior date, recorded when the stored date differs.
    pub last_date: Option<NaiveDate>,
}

impl Teaser {
    /// Creates a teaser with no date and no drift annotations.
    #[must_use]
    pub fn new(title: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: None,
            ident: ident.into(),
            last_title: None,
            last_ident: None,
            last_date: None,
        }
    }

    /// Sets the item date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Title key used for matching: trimmed, case-folded.
    #[must_use]
    pub fn title_key(&self) -> String {
        self.title.trim().to_lowercase()
    }

    /// Returns true if any drift annotation is set.
    #[must_use]
    pub fn is_annotated(&self) -> bool {
        self.last_title.is_some() || self.last_ident.is_some() || self.last_date.is_some()
    }
}
